//! Class registration units

use std::fmt::Write;

use super::{
    FILE_EXTENSION, OVERRIDE_SUFFIX, RegistrationUnit, callable_writer, entry_path,
    push_entry_includes, push_prefix, trampoline_writer, write_entry_header,
};
use crate::{
    errors::Result,
    plan::{ClassPlan, ModulePlan, WrapPlan, WrapPlanEntry},
};

/// Template arguments of `py::class_`: class, trampoline, holder, bases
fn class_arguments(plan: &WrapPlan, entry: &WrapPlanEntry, class: &ClassPlan) -> String {
    let name = &entry.exposed_name;
    let mut arguments = vec![name.clone()];
    if class.trampoline.is_some() {
        arguments.push(format!("{name}{OVERRIDE_SUFFIX}"));
    }
    arguments.push(class.holder.spelling(name));
    arguments.extend(
        class
            .bases
            .iter()
            .map(|base| plan.entry(base.entry).cpp_name.clone()),
    );
    arguments.join(", ")
}

fn write_source(plan: &WrapPlan, entry: &WrapPlanEntry, class: &ClassPlan) -> Result<String> {
    let name = &entry.exposed_name;
    let mut out = String::new();
    push_prefix(&mut out, plan);
    out.push_str("#include <pybind11/pybind11.h>\n#include <pybind11/stl.h>\n");
    push_entry_includes(&mut out, plan, entry);
    let _ = writeln!(out, "#include \"{name}.{FILE_EXTENSION}.hpp\"");
    out.push_str("\nnamespace py = pybind11;\n");
    let _ = writeln!(out, "typedef {} {name};", entry.cpp_name);
    if class.holder.needs_declaration()
        && let Some(smart_ptr) = &class.holder.smart_ptr
    {
        let _ = writeln!(out, "PYBIND11_DECLARE_HOLDER_TYPE(T, {smart_ptr}<T>);");
    }
    for line in &class.prefix_code {
        out.push_str(line);
        out.push('\n');
    }

    if let Some(trampoline) = &class.trampoline {
        out.push_str(&trampoline_writer::return_type_aliases(trampoline));
        out.push('\n');
        out.push_str(&trampoline_writer::write(entry, trampoline));
    }
    out.push('\n');

    let _ = writeln!(out, "void {}(py::module &m){{", entry.register_function());
    let _ = writeln!(
        out,
        "py::class_<{}>(m, \"{name}\")",
        class_arguments(plan, entry, class)
    );
    for constructor in &class.constructors {
        out.push_str(&callable_writer::constructor(constructor)?);
    }
    for method in &class.methods {
        out.push_str(&callable_writer::method(method)?);
    }
    for field in &class.fields {
        out.push_str(&callable_writer::field(name, field));
    }
    for line in &class.suffix_code {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("    ;\n}\n");
    Ok(out)
}

/// Header and source unit registering one concrete class
pub(super) fn write(
    plan: &WrapPlan,
    module: &ModulePlan,
    entry: &WrapPlanEntry,
    class: &ClassPlan,
) -> Result<Vec<RegistrationUnit>> {
    Ok(vec![
        RegistrationUnit::new(entry_path(module, entry, "hpp"), write_entry_header(plan, entry)),
        RegistrationUnit::new(
            entry_path(module, entry, "cpp"),
            write_source(plan, entry, class)?,
        ),
    ])
}
