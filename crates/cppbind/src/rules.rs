//! Name matching for exclusion, rename and similar configuration rules
//!
//! A rule key is either an exact, case-sensitive qualified name or a glob
//! using `*` and `?`. An exact key always beats a pattern; among patterns the
//! last one in configuration order wins, so later rules refine earlier ones.

use log::warn;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::errors::{GenerationError, Result};

/// Compiled form of a rule key
#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Glob { source: String, regex: Regex },
}

impl NamePattern {
    pub fn parse(text: &str) -> Result<Self> {
        if !text.contains(['*', '?']) {
            return Ok(Self::Exact(text.to_owned()));
        }
        let mut expr = String::with_capacity(text.len() + 8);
        expr.push('^');
        for c in text.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr)
            .map_err(|e| GenerationError::configuration(text, format!("invalid pattern: {e}")))?;
        Ok(Self::Glob {
            source: text.to_owned(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Exact(name) => name,
            Self::Glob { source, .. } => source,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Glob { regex, .. } => regex.is_match(name),
        }
    }
}

/// An ordered set of rules carrying a value of type `T`
#[derive(Debug, Clone)]
pub struct RuleSet<T> {
    /// Configuration section, used in diagnostics
    section: &'static str,
    exact: FxHashMap<String, T>,
    patterns: Vec<(NamePattern, T)>,
    exact_order: Vec<String>,
}

impl<T> RuleSet<T> {
    pub fn new(section: &'static str) -> Self {
        Self {
            section,
            exact: FxHashMap::default(),
            patterns: Vec::new(),
            exact_order: Vec::new(),
        }
    }

    /// Compile rules from `(key, value)` pairs in configuration order
    pub fn compile(
        section: &'static str,
        rules: impl IntoIterator<Item = (String, T)>,
    ) -> Result<Self> {
        let mut set = Self::new(section);
        for (key, value) in rules {
            match NamePattern::parse(&key)? {
                NamePattern::Exact(name) => {
                    if set.exact.insert(name.clone(), value).is_some() {
                        return Err(GenerationError::configuration(
                            format!("{section} `{name}`"),
                            "the same name is listed twice",
                        ));
                    }
                    set.exact_order.push(name);
                }
                pattern => set.patterns.push((pattern, value)),
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }

    /// Value of the winning rule for `name`
    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.lookup_first(&[name])
    }

    /// Value of the winning rule for an entity known under several names,
    /// most specific name first. Exact rules on any name beat patterns.
    pub fn lookup_first(&self, names: &[&str]) -> Option<&T> {
        self.winning_rule(names).map(|(_, value)| value)
    }

    /// Key and value of the rule [`Self::lookup_first`] would apply
    pub fn winning_rule(&self, names: &[&str]) -> Option<(&str, &T)> {
        names
            .iter()
            .find_map(|name| self.exact.get_key_value(*name))
            .map(|(key, value)| (key.as_str(), value))
            .or_else(|| {
                names.iter().find_map(|name| {
                    self.patterns
                        .iter()
                        .rev()
                        .find(|(pattern, _)| pattern.matches(name))
                        .map(|(pattern, value)| (pattern.source(), value))
                })
            })
    }

    /// Diagnostic label for the rule keyed `key`
    pub fn label(&self, key: &str) -> String {
        format!("{} `{key}`", self.section)
    }

    /// Value of an exact rule for `name`, ignoring patterns
    pub fn lookup_exact(&self, name: &str) -> Option<&T> {
        self.exact.get(name)
    }

    /// Fail on exact rules naming nothing in `known`; warn on patterns that
    /// match nothing.
    pub fn check_references<'a>(
        &self,
        known: impl Fn(&str) -> bool,
        candidates: impl Iterator<Item = &'a str> + Clone,
    ) -> Result<()> {
        for name in &self.exact_order {
            if !known(name) {
                return Err(GenerationError::configuration(
                    self.label(name),
                    "no declaration with this qualified name exists in the model",
                ));
            }
        }
        for (pattern, _) in &self.patterns {
            if !candidates.clone().any(|name| pattern.matches(name)) {
                warn!(
                    "{} pattern `{}` does not match any declaration",
                    self.section,
                    pattern.source()
                );
            }
        }
        Ok(())
    }
}
