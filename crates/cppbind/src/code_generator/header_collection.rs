//! The package header collection
//!
//! Lists every header the wrapped declarations need, explicitly instantiates
//! each requested template tuple and gives it a `cppwg::` typedef.

use std::fmt::Write;

use indexmap::IndexSet;

use super::{HEADER_COLLECTION_FILENAME, RegistrationUnit, push_prefix};
use crate::plan::{ModulePlan, WrapPlan};

pub(super) fn write(plan: &WrapPlan, modules: &[ModulePlan]) -> RegistrationUnit {
    let guard = format!("{}_HEADERS_HPP_", plan.package.name);
    let entries: Vec<_> = modules
        .iter()
        .flat_map(|m| m.entries.iter())
        .map(|&id| plan.entry(id))
        .collect();

    let mut out = String::new();
    push_prefix(&mut out, plan);
    if !plan.package.prefix_text.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");

    out.push_str("\n// Includes\n");
    let includes: IndexSet<&str> = entries
        .iter()
        .flat_map(|e| e.includes.iter().map(String::as_str))
        .collect();
    for include in includes {
        let _ = writeln!(out, "#include {include}");
    }

    let instances: Vec<_> = entries
        .iter()
        .filter(|e| e.as_class().is_some_and(|c| c.template.is_some()))
        .collect();

    out.push_str("\n// Instantiate Template Classes\n");
    for entry in &instances {
        let _ = writeln!(out, "template class {};", entry.cpp_name);
    }

    out.push_str("\n// Typedefs for nicer naming\nnamespace cppwg\n{\n");
    for entry in &instances {
        let _ = writeln!(out, "    typedef {} {};", entry.cpp_name, entry.exposed_name);
    }
    out.push_str("} // namespace cppwg\n");

    let _ = write!(out, "\n#endif // {guard}\n");
    RegistrationUnit::new(HEADER_COLLECTION_FILENAME, out)
}
