//! Module aggregators
//!
//! One `_<package>_<module>.main.cppwg.cpp` per module: it imports the
//! modules this one depends on, then calls every registration function in
//! resolved order inside a single `PYBIND11_MODULE` entry point.

use std::{fmt::Write, path::PathBuf};

use indexmap::IndexSet;

use super::{FILE_EXTENSION, HEADER_COLLECTION_FILENAME, RegistrationUnit, push_prefix};
use crate::plan::{CasterPlan, ModulePlan, WrapPlan};

/// Extension module name, e.g. `_pyshapes_geometry`
pub(super) fn extension_name(package: &str, module: &str) -> String {
    format!("_{package}_{module}")
}

pub(super) fn write(plan: &WrapPlan, module: &ModulePlan) -> RegistrationUnit {
    let package = &plan.package.name;
    let full_name = extension_name(package, &module.name);
    let entries: Vec<_> = module.entries.iter().map(|&id| plan.entry(id)).collect();

    let mut out = String::new();
    push_prefix(&mut out, plan);
    out.push_str("#include <pybind11/pybind11.h>\n");
    if plan.package.common_include_file {
        let _ = writeln!(out, "#include \"{HEADER_COLLECTION_FILENAME}\"");
    }
    let casters: IndexSet<String> = entries
        .iter()
        .flat_map(|e| e.casters.iter())
        .filter_map(|t| plan.caster(t).map(CasterPlan::file_name))
        .collect();
    for file in &casters {
        let _ = writeln!(out, "#include \"{file}\"");
    }
    for entry in &entries {
        let _ = writeln!(
            out,
            "#include \"{}.{FILE_EXTENSION}.hpp\"",
            entry.exposed_name
        );
    }

    out.push_str("\nnamespace py = pybind11;\n");
    let _ = write!(out, "\nPYBIND11_MODULE({full_name}, m)\n{{\n");
    for dependency in &module.depends_on {
        let _ = writeln!(
            out,
            "    py::module_::import(\"{package}.{dependency}.{}\");",
            extension_name(package, dependency)
        );
    }
    for entry in &entries {
        let _ = writeln!(out, "    {}(m);", entry.register_function());
    }
    out.push_str("}\n");

    RegistrationUnit::new(
        PathBuf::from(&module.name).join(format!("{full_name}.main.{FILE_EXTENSION}.cpp")),
        out,
    )
}
