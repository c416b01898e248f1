//! Helpers for working with C++ type spellings
//!
//! The declaration model carries types as the strings the extraction front end
//! printed. These helpers normalize, compare and rewrite those strings without
//! attempting real C++ parsing.

use cow_utils::CowUtils;
use rustc_hash::FxHashMap;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Collapse whitespace so that equivalent spellings compare equal.
///
/// A single space survives only between two identifier characters, so
/// `"::std::vector<unsigned  int> const &"` becomes
/// `"std::vector<unsigned int>const&"`. Leading global-scope qualifiers are
/// dropped everywhere they start a name.
pub fn normalize_type(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let mut pending_space = false;
    for c in spelling.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space
            && out.chars().next_back().is_some_and(is_ident_char)
            && is_ident_char(c)
        {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    strip_global_scope(&out)
}

fn strip_global_scope(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let bytes: Vec<char> = spelling.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ':' && bytes.get(i + 1) == Some(&':') {
            let starts_name = i == 0
                || matches!(bytes[i - 1], '<' | ',' | '(' | ' ' | '*' | '&');
            if starts_name {
                i += 2;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Drop a top-level `const` from a by-value parameter type.
///
/// `double const` and `const double` declare the same signature as `double`,
/// while `double const&` does not.
pub fn strip_top_level_const(spelling: &str) -> String {
    let normalized = normalize_type(spelling);
    if normalized.ends_with('&') {
        return normalized;
    }
    if let Some(rest) = normalized.strip_suffix("const") {
        match rest.chars().next_back() {
            Some(' ') => return rest.trim_end().to_owned(),
            Some(c) if !is_ident_char(c) => return rest.to_owned(),
            _ => {}
        }
    }
    if !normalized.contains('*')
        && let Some(rest) = normalized.strip_prefix("const ")
    {
        return rest.to_owned();
    }
    normalized
}

pub fn is_pointer(spelling: &str) -> bool {
    normalize_type(spelling)
        .trim_end_matches("const")
        .trim_end()
        .ends_with('*')
}

pub fn is_reference(spelling: &str) -> bool {
    normalize_type(spelling).ends_with('&')
}

/// Split `Foo<2, Bar<3>>` into `("Foo", ["2", "Bar<3>"])`.
///
/// Returns `None` when the spelling carries no template argument list.
pub fn split_template_args(spelling: &str) -> Option<(String, Vec<String>)> {
    let open = spelling.find('<')?;
    let close = spelling.rfind('>')?;
    if close < open {
        return None;
    }
    let base = spelling[..open].trim().to_owned();
    let inner = &spelling[open + 1..close];

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' | '(' => {
                depth += 1;
                current.push(c);
            }
            '>' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_owned());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_owned());
    }
    Some((base, args))
}

/// The name a base reference points at, with template arguments removed.
pub fn template_base_name(spelling: &str) -> String {
    let trimmed = spelling.trim();
    let base = match trimmed.find('<') {
        Some(open) => &trimmed[..open],
        None => trimmed,
    };
    strip_global_scope(base.trim())
}

/// Replace whole identifiers according to `replacements`.
///
/// An identifier qualified by `owner::` is replaced together with its
/// qualifier, so with `owner = "Foo"` both `Foo::DIM` and `DIM` become the
/// concrete value.
pub fn substitute_identifiers(
    text: &str,
    replacements: &FxHashMap<&str, &str>,
    owner: &str,
) -> String {
    if replacements.is_empty() {
        return text.to_owned();
    }
    let qualifier = format!("{owner}::");
    let mut out = String::with_capacity(text.len());
    let mut ident = String::new();

    let flush = |ident: &mut String, out: &mut String| {
        if ident.is_empty() {
            return;
        }
        if let Some(value) = replacements.get(ident.as_str()) {
            if !owner.is_empty() && out.ends_with(&qualifier) {
                let keep = out.len() - qualifier.len();
                let preceded_by_ident = out[..keep].chars().next_back().is_some_and(is_ident_char);
                if !preceded_by_ident {
                    out.truncate(keep);
                }
            }
            out.push_str(value);
        } else {
            out.push_str(ident);
        }
        ident.clear();
    };

    for c in text.chars() {
        if is_ident_char(c) {
            ident.push(c);
        } else {
            flush(&mut ident, &mut out);
            out.push(c);
        }
    }
    flush(&mut ident, &mut out);
    out
}

/// Whether `spelling` names `needle` as a complete type name.
///
/// `needle` may itself be a template-id such as `Point<2>`; both sides are
/// normalized before the search.
pub fn mentions_type(spelling: &str, needle: &str) -> bool {
    let haystack = normalize_type(spelling);
    let needle = normalize_type(needle);
    if needle.is_empty() {
        return false;
    }
    let ends_with_ident = needle.chars().next_back().is_some_and(is_ident_char);
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_ident_char(c));
        let after_ok = !ends_with_ident
            || haystack[end..]
                .chars()
                .next()
                .is_none_or(|c| !is_ident_char(c) && c != '<');
        if before_ok && after_ok {
            return true;
        }
        from = start + 1;
    }
    false
}

/// A single-token alias for a type spelling, e.g. `::Bar<2> *` becomes
/// `_Bar_lt_2_gt_Ptr`.
pub fn tidy_name(spelling: &str) -> String {
    let mut tidy = spelling.cow_replace(" ", "").into_owned();
    for (from, to) in [
        ("::", "_"),
        ("<", "_lt_"),
        (">", "_gt_"),
        (",", "_"),
        ("*", "Ptr"),
        ("&", "Ref"),
    ] {
        let replaced = tidy.cow_replace(from, to).into_owned();
        tidy = replaced;
    }
    tidy
}

/// Whether a spelling can be passed to a preprocessor macro as one argument.
pub fn needs_alias(spelling: &str) -> bool {
    tidy_name(spelling) != spelling
}
