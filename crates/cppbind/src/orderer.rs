//! Deterministic registration order
//!
//! Registration must follow the host binding library's rule that a base (or a
//! type named in a signature) exists before anything that refers to it. The
//! orderer turns the wrap plan into one `ModulePlan` per configured module,
//! each listing its entries in a legal order, and orders the modules
//! themselves by their import relationships.

use log::{debug, info};

use crate::{
    dependency_graph::{DependencyGraph, DependencyKind, build_entry_graph},
    errors::{GenerationError, Result},
    plan::{EntryId, ModulePlan, WrapPlan},
};

/// Cycle error naming the members of the first component, in declaration order
fn cycle_error<N: Copy>(
    cycles: Vec<Vec<N>>,
    order_key: impl Fn(N) -> (usize, usize),
    name: impl Fn(N) -> String,
) -> GenerationError {
    let mut components: Vec<Vec<N>> = cycles
        .into_iter()
        .map(|mut component| {
            component.sort_by_key(|&n| order_key(n));
            component
        })
        .collect();
    components.sort_by_key(|c| c.first().map(|&n| order_key(n)));
    let members = components
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(name)
        .collect();
    GenerationError::Cycle { members }
}

/// Order the entries of `plan` into module plans
pub fn order(plan: &WrapPlan) -> Result<Vec<ModulePlan>> {
    let entry_graph = build_entry_graph(plan);
    let entry_key = |id: EntryId| {
        let order = plan.entry(id).declaration_order;
        (order.index, order.instance)
    };

    let Some(entries) = entry_graph.topological_order(entry_key) else {
        return Err(cycle_error(entry_graph.find_cycles(), entry_key, |id| {
            plan.entry(id).cpp_name.clone()
        }));
    };

    let module_index = |name: &str| plan.modules.iter().position(|m| m == name);
    let mut module_graph: DependencyGraph<usize> = DependencyGraph::new();
    for idx in 0..plan.modules.len() {
        module_graph.add_node(idx);
    }
    for (dependent, dependency, kind) in entry_graph.edges() {
        let (Some(to), Some(from)) = (
            module_index(&plan.entry(dependent).module),
            module_index(&plan.entry(dependency).module),
        ) else {
            continue;
        };
        if to != from {
            debug!(
                "Module {} imports {} ({kind:?} dependency of {} on {})",
                plan.modules[to],
                plan.modules[from],
                plan.entry(dependent).cpp_name,
                plan.entry(dependency).cpp_name
            );
            module_graph.add_dependency(to, from, DependencyKind::Import);
        }
    }

    let module_key = |idx: usize| (idx, 0);
    let Some(modules) = module_graph.topological_order(module_key) else {
        return Err(cycle_error(module_graph.find_cycles(), module_key, |idx| {
            plan.modules[idx].clone()
        }));
    };

    let position: Vec<usize> = {
        let mut position = vec![0; plan.modules.len()];
        for (rank, &idx) in modules.iter().enumerate() {
            position[idx] = rank;
        }
        position
    };

    let module_plans: Vec<ModulePlan> = modules
        .iter()
        .map(|&idx| {
            let name = &plan.modules[idx];
            let mut depends_on = module_graph.dependencies(idx);
            depends_on.sort_by_key(|&dep| position[dep]);
            ModulePlan {
                name: name.clone(),
                entries: entries
                    .iter()
                    .copied()
                    .filter(|&id| &plan.entry(id).module == name)
                    .collect(),
                depends_on: depends_on
                    .into_iter()
                    .map(|dep| plan.modules[dep].clone())
                    .collect(),
            }
        })
        .collect();

    info!(
        "Ordered {} entries into {} modules",
        entries.len(),
        module_plans.len()
    );
    Ok(module_plans)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        declarations::Param,
        resolver::resolve,
        test_support::{class, config, function, method, model, template},
    };

    fn cpp_names(plan: &WrapPlan, module: &ModulePlan) -> Vec<String> {
        module
            .entries
            .iter()
            .map(|&id| plan.entry(id).cpp_name.clone())
            .collect()
    }

    #[test]
    fn test_bases_register_first() {
        let model = model(vec![
            class("Leaf", &["Middle"]),
            class("Middle", &["Root"]),
            class("Root", &[]),
            class("Unrelated", &[]),
        ]);
        let plan = resolve(
            &model,
            &config(
                "name = \"pkg\"\n[[modules]]\nname = \"m\"\n\
                 classes = [\"Leaf\", \"Middle\", \"Root\", \"Unrelated\"]",
            ),
        )
        .expect("resolves");
        let modules = order(&plan).expect("orders");
        assert_eq!(
            cpp_names(&plan, &modules[0]),
            vec!["Root", "Middle", "Leaf", "Unrelated"]
        );
    }

    #[test]
    fn test_signature_instantiation_registers_first() {
        let model = model(vec![
            class("Mesh", &[]),
            method("Mesh", "GetPoint", "Point<2>", &[]),
            template("Point", &[("DIM", None)], &[]),
        ]);
        let plan = resolve(
            &model,
            &config(
                "name = \"pkg\"\n[[modules]]\nname = \"m\"\n\
                 classes = [\"Mesh\", { name = \"Point\", template_args = [[2], [3]] }]",
            ),
        )
        .expect("resolves");
        let modules = order(&plan).expect("orders");
        assert_eq!(
            cpp_names(&plan, &modules[0]),
            vec!["Point<2>", "Mesh", "Point<3>"]
        );
    }

    #[test]
    fn test_cross_module_base_orders_modules() {
        let model = model(vec![class("Derived", &["Base"]), class("Base", &[])]);
        let plan = resolve(
            &model,
            &config(
                "name = \"pkg\"\n[[modules]]\nname = \"app\"\nclasses = [\"Derived\"]\n\
                 [[modules]]\nname = \"core\"\nclasses = [\"Base\"]",
            ),
        )
        .expect("resolves");
        let modules = order(&plan).expect("orders");
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["core", "app"]);
        assert_eq!(modules[1].depends_on, vec!["core".to_owned()]);
        assert!(modules[0].depends_on.is_empty());
    }

    #[test]
    fn test_module_cycle_is_an_error() {
        let model = model(vec![
            class("A", &[]),
            class("B", &["A"]),
            class("C", &["B"]),
        ]);
        let err = order(
            &resolve(
                &model,
                &config(
                    "name = \"pkg\"\n[[modules]]\nname = \"one\"\nclasses = [\"A\", \"C\"]\n\
                     [[modules]]\nname = \"two\"\nclasses = [\"B\"]",
                ),
            )
            .expect("resolves"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "CycleError");
        assert_eq!(err.to_string(), "dependency cycle between one -> two");
    }

    #[test]
    fn test_signature_cycle_names_members_in_declaration_order() {
        let model = model(vec![
            template("Edge", &[("DIM", None)], &[]),
            method("Edge", "GetNode", "Node<DIM>", &[]),
            template("Node", &[("DIM", None)], &[]),
            method("Node", "GetEdge", "Edge<DIM>", &[]),
        ]);
        let plan = resolve(
            &model,
            &config(
                "name = \"pkg\"\n[[modules]]\nname = \"m\"\nclasses = [\n\
                 { name = \"Node\", template_args = [[2]] },\n\
                 { name = \"Edge\", template_args = [[2]] },\n]",
            ),
        )
        .expect("resolves");
        let err = order(&plan).unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle between Edge<2> -> Node<2>");
    }

    #[test]
    fn test_free_functions_keep_declaration_order() {
        let model = model(vec![
            function("second", "void", &[]),
            function("first", "void", &[Param::new("x", "int")]),
        ]);
        let plan = resolve(
            &model,
            &config("name = \"pkg\"\n[[modules]]\nname = \"m\"\nfree_functions = [\"first\", \"second\"]"),
        )
        .expect("resolves");
        let modules = order(&plan).expect("orders");
        assert_eq!(cpp_names(&plan, &modules[0]), vec!["second", "first"]);
    }
}
