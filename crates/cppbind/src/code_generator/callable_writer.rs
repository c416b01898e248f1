//! Constructor, method, field and free-function registrations

use std::fmt::Write;

use super::{RegistrationUnit, entry_path, push_entry_includes, push_prefix, write_entry_header};
use crate::{
    errors::{GenerationError, Result},
    plan::{Binding, Callable, Field, FunctionGroup, ModulePlan, WrapPlan, WrapPlanEntry},
};

fn binding(callable: &Callable) -> Result<&Binding> {
    callable.binding.as_ref().ok_or_else(|| {
        GenerationError::invalid_model(
            &callable.node.qualified_name,
            format!("{} reached emission without a binding", callable.node.signature()),
        )
    })
}

/// `, py::arg("a"), py::arg("b") = 2.0`
fn keyword_args(binding: &Binding) -> String {
    let mut out = String::new();
    for arg in &binding.args {
        let _ = write!(out, ", py::arg(\"{}\")", arg.name);
        if let Some(default) = &arg.default {
            let _ = write!(out, " = {default}");
        }
    }
    out
}

fn call_policy(callable: &Callable) -> String {
    callable
        .call_policy
        .map(|policy| format!(", py::return_value_policy::{policy}"))
        .unwrap_or_default()
}

pub(super) fn constructor(callable: &Callable) -> Result<String> {
    let binding = binding(callable)?;
    Ok(format!(
        "        .def({}{})\n",
        binding.address,
        keyword_args(binding)
    ))
}

pub(super) fn method(callable: &Callable) -> Result<String> {
    let binding = binding(callable)?;
    let adorn = if callable.node.is_static { "_static" } else { "" };
    Ok(format!(
        "        .def{adorn}(\n            \"{}\",\n            {},\n            \" \"{}{})\n",
        callable.exposed_name,
        binding.address,
        keyword_args(binding),
        call_policy(callable)
    ))
}

pub(super) fn field(class_name: &str, field: &Field) -> String {
    let access = if field.readonly { "readonly" } else { "readwrite" };
    let adorn = if field.is_static { "_static" } else { "" };
    format!(
        "        .def_{access}{adorn}(\"{}\", &{class_name}::{})\n",
        field.exposed_name, field.name
    )
}

fn free_function(callable: &Callable) -> Result<String> {
    let binding = binding(callable)?;
    Ok(format!(
        "    m.def(\"{}\", {}, \" \"{}{});\n",
        callable.exposed_name,
        binding.address,
        keyword_args(binding),
        call_policy(callable)
    ))
}

/// Header and source unit registering every overload of one free function
pub(super) fn write_function_unit(
    plan: &WrapPlan,
    module: &ModulePlan,
    entry: &WrapPlanEntry,
    group: &FunctionGroup,
) -> Result<Vec<RegistrationUnit>> {
    let mut cpp = String::new();
    push_prefix(&mut cpp, plan);
    cpp.push_str("#include <pybind11/pybind11.h>\n#include <pybind11/stl.h>\n");
    push_entry_includes(&mut cpp, plan, entry);
    let _ = writeln!(
        cpp,
        "#include \"{}\"",
        entry_path(module, entry, "hpp")
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    cpp.push_str("\nnamespace py = pybind11;\n\n");
    let _ = writeln!(cpp, "void {}(py::module &m){{", entry.register_function());
    for overload in &group.overloads {
        cpp.push_str(&free_function(overload)?);
    }
    cpp.push_str("}\n");

    Ok(vec![
        RegistrationUnit::new(entry_path(module, entry, "hpp"), write_entry_header(plan, entry)),
        RegistrationUnit::new(entry_path(module, entry, "cpp"), cpp),
    ])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::ReturnValuePolicy,
        declarations::Param,
        plan::{Address, ArgBinding},
        test_support::{function, method as method_node},
    };

    fn bound(node: crate::declarations::DeclarationNode, address: Address) -> Callable {
        let args = node
            .params
            .iter()
            .map(|p| ArgBinding {
                name: p.name.clone(),
                default: p.default_value.clone(),
            })
            .collect();
        Callable {
            exposed_name: node.name().to_owned(),
            binding: Some(Binding {
                address,
                min_arity: 0,
                max_arity: node.params.len(),
                args,
            }),
            node,
            call_policy: None,
            declared_overloads: 1,
        }
    }

    #[test]
    fn test_method_with_policy() {
        let mut callable = bound(
            method_node("Mesh", "GetNode", "Node *", &[("index", "unsigned")]),
            Address::Cast("(Node *(Mesh::*)(unsigned)) &Mesh::GetNode".into()),
        );
        callable.call_policy = Some(ReturnValuePolicy::Reference);
        assert_eq!(
            method(&callable).expect("renders"),
            "        .def(\n            \"GetNode\",\n            \
             (Node *(Mesh::*)(unsigned)) &Mesh::GetNode,\n            \
             \" \", py::arg(\"index\"), py::return_value_policy::reference)\n"
        );
    }

    #[test]
    fn test_free_function_with_defaults() {
        let callable = bound(
            function(
                "add",
                "double",
                &[
                    Param::new("i", "double").with_default("1.0"),
                    Param::new("j", "double").with_default("2.0"),
                ],
            ),
            Address::Plain("&add".into()),
        );
        assert_eq!(
            free_function(&callable).expect("renders"),
            "    m.def(\"add\", &add, \" \", py::arg(\"i\") = 1.0, py::arg(\"j\") = 2.0);\n"
        );
    }

    #[test]
    fn test_unbound_callable_is_reported() {
        let mut callable = bound(
            method_node("Mesh", "GetArea", "double", &[]),
            Address::Plain("&Mesh::GetArea".into()),
        );
        callable.binding = None;
        assert_eq!(method(&callable).unwrap_err().kind(), "InvalidModel");
    }

    #[test]
    fn test_static_readonly_field() {
        let rendered = field(
            "Mesh",
            &Field {
                name: "msCount".into(),
                exposed_name: "count".into(),
                readonly: true,
                is_static: true,
            },
        );
        assert_eq!(
            rendered,
            "        .def_readonly_static(\"count\", &Mesh::msCount)\n"
        );
    }
}
