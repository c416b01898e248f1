//! Trampoline classes forwarding virtual calls into the host
//!
//! For a class `Foo` exposed as `Foo_2` the trampoline is
//!
//! ```text
//! class Foo_2_Overrides : public Foo_2{
//!     public:
//!     using Foo_2::Foo;
//!     void bar(double d) const override {
//!         PYBIND11_OVERRIDE_PURE(
//!             void,
//!             Foo_2,
//!             bar,
//!             d);
//!     }
//! };
//! ```

use std::fmt::Write;

use indexmap::IndexSet;

use super::OVERRIDE_SUFFIX;
use crate::{
    cpp_types,
    declarations::{DeclarationNode, Virtuality},
    plan::{Trampoline, WrapPlanEntry},
};

fn return_type(method: &DeclarationNode) -> &str {
    method.return_type.as_deref().map_or("void", str::trim)
}

/// Typedefs giving multi-token return types a single-token alias
pub(super) fn return_type_aliases(trampoline: &Trampoline) -> String {
    let mut seen = IndexSet::new();
    for method in &trampoline.methods {
        let ret = return_type(method);
        if cpp_types::needs_alias(ret) {
            seen.insert(format!("typedef {ret} {};\n", cpp_types::tidy_name(ret)));
        }
    }
    seen.into_iter().collect()
}

fn param_name(index: usize, name: &str) -> String {
    if name.is_empty() {
        format!("arg{index}")
    } else {
        name.to_owned()
    }
}

fn forward(class_name: &str, method: &DeclarationNode) -> String {
    let ret = return_type(method);
    let params: Vec<String> = method
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", p.type_name.trim(), param_name(i, &p.name)))
        .collect();
    let names: Vec<String> = method
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("            {}", param_name(i, &p.name)))
        .collect();
    let constness = if method.is_const { " const" } else { "" };
    let pure = if method.virtuality == Virtuality::PureVirtual {
        "_PURE"
    } else {
        ""
    };
    let name = method.name();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "    {ret} {name}({}){constness} override {{",
        params.join(", ")
    );
    let _ = writeln!(out, "        PYBIND11_OVERRIDE{pure}(");
    let _ = writeln!(out, "            {},", cpp_types::tidy_name(ret));
    let _ = writeln!(out, "            {class_name},");
    if names.is_empty() {
        let _ = writeln!(out, "            {name});");
    } else {
        let _ = writeln!(out, "            {name},");
        let _ = writeln!(out, "{});", names.join(",\n"));
    }
    out.push_str("    }\n");
    out
}

/// The `<Name>_Overrides` class for `entry`
pub(super) fn write(entry: &WrapPlanEntry, trampoline: &Trampoline) -> String {
    let class_name = &entry.exposed_name;
    let constructor_name = cpp_types::template_base_name(&entry.cpp_name);
    let constructor_name = constructor_name
        .rsplit("::")
        .next()
        .unwrap_or(&constructor_name);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "class {class_name}{OVERRIDE_SUFFIX} : public {class_name}{{"
    );
    out.push_str("    public:\n");
    let _ = writeln!(out, "    using {class_name}::{constructor_name};");
    for method in &trampoline.methods {
        out.push_str(&forward(class_name, method));
    }
    out.push_str("};\n");
    out
}
