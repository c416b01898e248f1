//! Overload disambiguation and default-argument arities
//!
//! Every surviving callable gets the cheapest address expression that still
//! names exactly one declaration: a plain `&Class::name` when the name is not
//! overloaded in the model, a full function-pointer cast otherwise. Defaults
//! turn one declaration into a range of effective arities; two siblings that
//! can be called with the same argument types at a shared arity cannot be told
//! apart by the host and are rejected.

use indexmap::IndexMap;
use log::trace;

use crate::{
    cpp_types,
    declarations::{DeclKind, DeclarationNode},
    errors::{GenerationError, Result},
    plan::{Address, ArgBinding, Binding, Callable, EntryKind, WrapPlan, WrapPlanEntry},
};

/// Parameter types as compared for overload identity
fn comparable_types(node: &DeclarationNode) -> Vec<String> {
    node.params
        .iter()
        .map(|p| cpp_types::strip_top_level_const(&p.type_name))
        .collect()
}

fn spelled_types(node: &DeclarationNode) -> String {
    node.params
        .iter()
        .map(|p| p.type_name.trim())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Address expression for `node`, registered under `scope`
///
/// `scope` is the exposed class name for members (a typedef of the C++
/// spelling in the emitted unit) and empty for free functions.
fn address(node: &DeclarationNode, scope: &str, declared_overloads: usize) -> Address {
    let args = spelled_types(node);
    if node.kind == DeclKind::Constructor {
        return Address::Init(format!("py::init<{args}>()"));
    }
    let target = if scope.is_empty() {
        format!("&{}", node.qualified_name)
    } else {
        format!("&{scope}::{}", node.name())
    };
    if declared_overloads <= 1 {
        return Address::Plain(target);
    }

    let ret = node.return_type.as_deref().map_or("void", str::trim);
    let pointer = if scope.is_empty() || node.is_static {
        "*".to_owned()
    } else {
        format!("{scope}::*")
    };
    let constness = if node.is_const && !node.is_static && !scope.is_empty() {
        " const"
    } else {
        ""
    };
    Address::Cast(format!("({ret}({pointer})({args}){constness}) {target}"))
}

fn binding(callable: &Callable, scope: &str, exclude_default_args: bool) -> Binding {
    let node = &callable.node;
    let total = node.params.len();
    let all_named = node.params.iter().all(|p| !p.name.is_empty());

    let args: Vec<ArgBinding> = if all_named {
        node.params
            .iter()
            .map(|p| ArgBinding {
                name: p.name.clone(),
                default: p.default_value.clone().filter(|_| !exclude_default_args),
            })
            .collect()
    } else {
        Vec::new()
    };
    let defaults = args.iter().rev().take_while(|a| a.default.is_some()).count();

    Binding {
        address: address(node, scope, callable.declared_overloads),
        min_arity: total - defaults,
        max_arity: total,
        args,
    }
}

fn check_siblings(name: &str, group: &[&Callable]) -> Result<()> {
    for (i, first) in group.iter().enumerate() {
        let first_types = comparable_types(&first.node);
        let first_binding = first.binding.as_ref();
        for second in &group[i + 1..] {
            let second_types = comparable_types(&second.node);
            if first_types == second_types && first.node.is_const == second.node.is_const {
                return Err(GenerationError::AmbiguousOverload {
                    name: name.to_owned(),
                    first: first.node.signature(),
                    second: second.node.signature(),
                    arity: None,
                });
            }

            let (Some(a), Some(b)) = (first_binding, second.binding.as_ref()) else {
                continue;
            };
            let low = a.min_arity.max(b.min_arity);
            let high = a.max_arity.min(b.max_arity);
            for arity in low..=high {
                let through_default = arity < a.max_arity || arity < b.max_arity;
                if through_default && first_types[..arity] == second_types[..arity] {
                    return Err(GenerationError::AmbiguousOverload {
                        name: name.to_owned(),
                        first: first.node.signature(),
                        second: second.node.signature(),
                        arity: Some(arity),
                    });
                }
            }
        }
    }
    Ok(())
}

fn bind_group(callables: &mut [Callable], scope: &str, exclude_default_args: bool) -> Result<()> {
    for callable in callables.iter_mut() {
        let bound = binding(callable, scope, exclude_default_args);
        trace!(
            "{} bound as {} with arities {:?}",
            callable.node.signature(),
            bound.address,
            bound.arities()
        );
        callable.binding = Some(bound);
    }

    let mut groups: IndexMap<(DeclKind, &str), Vec<&Callable>> = IndexMap::new();
    for callable in callables.iter() {
        groups
            .entry((callable.node.kind, callable.node.name()))
            .or_default()
            .push(callable);
    }
    for ((_, name), group) in &groups {
        check_siblings(name, group)?;
    }
    Ok(())
}

/// Fill the binding of every callable of `entry`
pub fn bind_entry(entry: &mut WrapPlanEntry) -> Result<()> {
    let exclude_default_args = entry.policy.exclude_default_args;
    let scope = entry.exposed_name.clone();
    match &mut entry.kind {
        EntryKind::Class(class) => {
            bind_group(&mut class.constructors, &scope, exclude_default_args)?;
            bind_group(&mut class.methods, &scope, exclude_default_args)
        }
        EntryKind::Functions(group) => bind_group(&mut group.overloads, "", exclude_default_args),
    }
}

/// Fill the binding of every callable in the plan
pub fn bind(plan: &mut WrapPlan) -> Result<()> {
    for entry in &mut plan.entries {
        bind_entry(entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        declarations::Param,
        test_support::{function, method},
    };

    fn callable(node: DeclarationNode, declared_overloads: usize) -> Callable {
        Callable {
            exposed_name: node.name().to_owned(),
            node,
            call_policy: None,
            declared_overloads,
            binding: None,
        }
    }

    #[test]
    fn test_single_overload_uses_plain_address() {
        let mut callables = vec![callable(method("Shape", "GetArea", "double", &[]), 1)];
        bind_group(&mut callables, "Shape", false).expect("binds");
        let bound = callables[0].binding.as_ref().expect("bound");
        assert_eq!(bound.address, Address::Plain("&Shape::GetArea".into()));
        assert_eq!(bound.arities(), 0..=0);
    }

    #[test]
    fn test_siblings_get_full_casts() {
        let mut by_value = method("Shape", "Scale", "void", &[("factor", "double")]);
        by_value.is_const = false;
        let mut by_vector = method(
            "Shape",
            "Scale",
            "void",
            &[("factors", "std::vector<double> const &")],
        );
        by_vector.is_const = true;
        let mut callables = vec![callable(by_value, 2), callable(by_vector, 2)];
        bind_group(&mut callables, "Shape", false).expect("binds");

        let casts: Vec<String> = callables
            .iter()
            .map(|c| c.binding.as_ref().expect("bound").address.to_string())
            .collect();
        assert_snapshot!(casts.join("\n"), @r"
        (void(Shape::*)(double)) &Shape::Scale
        (void(Shape::*)(std::vector<double> const &) const) &Shape::Scale
        ");
    }

    #[test]
    fn test_excluded_sibling_still_forces_a_cast() {
        let mut callables = vec![callable(
            method("Mesh", "GetNode", "Node *", &[("index", "unsigned")]),
            2,
        )];
        bind_group(&mut callables, "Mesh", false).expect("binds");
        assert_eq!(
            callables[0].binding.as_ref().expect("bound").address,
            Address::Cast("(Node *(Mesh::*)(unsigned)) &Mesh::GetNode".into())
        );
    }

    #[test]
    fn test_default_arguments_expose_every_arity() {
        let add = function(
            "add",
            "double",
            &[
                Param::new("i", "double").with_default("1.0"),
                Param::new("j", "double").with_default("2.0"),
            ],
        );
        let mut callables = vec![callable(add, 1)];
        bind_group(&mut callables, "", false).expect("binds");
        let bound = callables[0].binding.as_ref().expect("bound");
        assert_eq!(bound.address, Address::Plain("&add".into()));
        assert_eq!(bound.arities().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(
            bound.defaults().collect::<Vec<_>>(),
            vec![("i", "1.0"), ("j", "2.0")]
        );
    }

    #[test]
    fn test_excluded_default_args_keep_names_only() {
        let add = function(
            "add",
            "double",
            &[Param::new("i", "double").with_default("1.0")],
        );
        let mut callables = vec![callable(add, 1)];
        bind_group(&mut callables, "", true).expect("binds");
        let bound = callables[0].binding.as_ref().expect("bound");
        assert_eq!(bound.arities(), 1..=1);
        assert_eq!(bound.defaults().count(), 0);
        assert_eq!(bound.args[0].name, "i");
    }

    #[test]
    fn test_identical_signatures_are_ambiguous() {
        let first = method("Shape", "Scale", "void", &[("factor", "double")]);
        let second = method("Shape", "Scale", "void", &[("factor", "const double")]);
        let mut callables = vec![callable(first, 2), callable(second, 2)];
        let err = bind_group(&mut callables, "Shape", false).unwrap_err();
        assert_eq!(err.kind(), "AmbiguousOverloadError");
        assert!(err.to_string().contains("Shape::Scale(double factor)"));
        assert!(err.to_string().contains("Shape::Scale(const double factor)"));
    }

    #[test]
    fn test_defaults_colliding_at_shared_arity_are_ambiguous() {
        let short = function("f", "void", &[Param::new("a", "int")]);
        let long = function(
            "f",
            "void",
            &[
                Param::new("a", "int"),
                Param::new("b", "double").with_default("1.0"),
            ],
        );
        let mut callables = vec![callable(short, 2), callable(long, 2)];
        let err = bind_group(&mut callables, "", false).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::AmbiguousOverload { arity: Some(1), .. }
        ));
    }

    #[test]
    fn test_distinct_arities_are_not_ambiguous() {
        let short = function("f", "void", &[Param::new("a", "int")]);
        let long = function(
            "f",
            "void",
            &[Param::new("a", "int"), Param::new("b", "double")],
        );
        let mut callables = vec![callable(short, 2), callable(long, 2)];
        bind_group(&mut callables, "", false).expect("binds");
        assert_eq!(
            callables[1].binding.as_ref().expect("bound").address,
            Address::Cast("(void(*)(int, double)) &f".into())
        );
    }
}
