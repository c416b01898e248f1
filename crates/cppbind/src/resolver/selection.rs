//! Selection of classes and free functions per module

use indexmap::IndexMap;
use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::{
    config::{ClassConfig, ClassEntry, PackageConfig, Selection},
    declarations::{DeclKind, DeclarationModel, DeclarationNode},
    errors::{GenerationError, Result},
    plan::{DeclarationOrder, TemplateInstance},
    templates,
};

/// A concrete class chosen for a module, before exclusion rules apply
#[derive(Debug, Clone)]
pub struct ClassCandidate {
    pub module: usize,
    pub config: ClassConfig,
    pub order: DeclarationOrder,
    /// Name of the declaring node
    pub declared_name: String,
    pub cpp_name: String,
    /// Class node with bases in canonical spelling
    pub class: DeclarationNode,
    pub members: Vec<DeclarationNode>,
    pub template: Option<TemplateInstance>,
    /// Configuration path used in diagnostics
    pub rule: String,
}

/// A free-function name chosen for a module with all of its overloads
#[derive(Debug, Clone)]
pub struct FunctionCandidate {
    pub module: usize,
    pub name: String,
    pub overloads: Vec<(usize, DeclarationNode)>,
    pub rule: String,
}

fn explicit_classes(config: &PackageConfig) -> FxHashSet<&str> {
    config
        .modules
        .iter()
        .filter_map(|m| match &m.classes {
            Selection::Listed(list) => Some(list.iter().map(ClassEntry::name)),
            Selection::All(_) => None,
        })
        .flatten()
        .collect()
}

fn explicit_functions(config: &PackageConfig) -> FxHashSet<&str> {
    config
        .modules
        .iter()
        .filter_map(|m| match &m.free_functions {
            Selection::Listed(list) => Some(list.iter().map(String::as_str)),
            Selection::All(_) => None,
        })
        .flatten()
        .collect()
}

/// Classes of every module in configuration order, template classes expanded
pub fn select_classes(
    model: &DeclarationModel,
    config: &PackageConfig,
) -> Result<Vec<ClassCandidate>> {
    let explicit = explicit_classes(config);
    let mut candidates = Vec::new();

    for (module_idx, module) in config.modules.iter().enumerate() {
        let mut chosen: Vec<(usize, ClassConfig, String)> = Vec::new();
        match &module.classes {
            Selection::Listed(list) => {
                for entry in list {
                    let rule = format!("modules.{}.classes `{}`", module.name, entry.name());
                    let Some((idx, node)) = model.class(entry.name()) else {
                        return Err(GenerationError::configuration(
                            rule,
                            "no class with this qualified name exists in the model",
                        ));
                    };
                    let class_config = entry.clone().into_config();
                    if !class_config.template_args.is_empty()
                        && node.kind != DeclKind::TemplateClass
                    {
                        return Err(GenerationError::configuration(
                            rule,
                            "`template_args` given for a class that is not a template",
                        ));
                    }
                    chosen.push((idx, class_config, rule));
                }
            }
            Selection::All(_) => {
                for (idx, node) in model.nodes().iter().enumerate() {
                    if !node.kind.is_class_like()
                        || node.parent.is_some()
                        || explicit.contains(node.qualified_name.as_str())
                        || !module.covers(node.source_file.as_deref())
                    {
                        continue;
                    }
                    let rule = format!("modules.{}.classes ALL", module.name);
                    let class_config = ClassConfig::named(node.qualified_name.clone());
                    if node.kind == DeclKind::TemplateClass
                        && templates::requested_tuples(node, &class_config, config, &rule).is_err()
                    {
                        warn!(
                            "Skipping class template {} selected by {rule}: no template \
                             arguments are configured",
                            node.qualified_name
                        );
                        continue;
                    }
                    chosen.push((idx, class_config, rule));
                }
            }
        }

        for (idx, class_config, rule) in chosen {
            let node = model.node(idx);
            if node.kind == DeclKind::TemplateClass {
                let tuples = templates::requested_tuples(node, &class_config, config, &rule)?;
                for (position, tuple) in tuples.iter().enumerate() {
                    let instance = templates::expand(model, node, position, tuple, &rule)?;
                    candidates.push(ClassCandidate {
                        module: module_idx,
                        config: class_config.clone(),
                        order: DeclarationOrder {
                            index: idx,
                            instance: position,
                        },
                        declared_name: node.qualified_name.clone(),
                        cpp_name: instance.cpp_name,
                        class: instance.class,
                        members: instance.members.into_iter().map(|(_, m)| m).collect(),
                        template: Some(TemplateInstance {
                            template: node.qualified_name.clone(),
                            args: instance.args,
                        }),
                        rule: rule.clone(),
                    });
                }
            } else {
                let mut class = node.clone();
                for base in &mut class.bases {
                    base.name = templates::resolve_base(
                        model,
                        &base.name,
                        &IndexMap::new(),
                        node.name(),
                    )?;
                }
                candidates.push(ClassCandidate {
                    module: module_idx,
                    config: class_config,
                    order: DeclarationOrder {
                        index: idx,
                        instance: 0,
                    },
                    declared_name: node.qualified_name.clone(),
                    cpp_name: node.qualified_name.clone(),
                    class,
                    members: model
                        .members_of(&node.qualified_name)
                        .map(|(_, m)| m.clone())
                        .collect(),
                    template: None,
                    rule,
                });
            }
        }
    }

    debug!("Selected {} concrete classes", candidates.len());
    Ok(candidates)
}

/// Free functions of every module in configuration order, grouped by name
pub fn select_functions(
    model: &DeclarationModel,
    config: &PackageConfig,
) -> Result<Vec<FunctionCandidate>> {
    let explicit = explicit_functions(config);
    let mut candidates = Vec::new();

    for (module_idx, module) in config.modules.iter().enumerate() {
        match &module.free_functions {
            Selection::Listed(names) => {
                for name in names {
                    let rule = format!("modules.{}.free_functions `{name}`", module.name);
                    let overloads: Vec<(usize, DeclarationNode)> = model
                        .lookup(name)
                        .filter(|(_, n)| n.kind == DeclKind::FreeFunction)
                        .map(|(idx, n)| (idx, n.clone()))
                        .collect();
                    if overloads.is_empty() {
                        return Err(GenerationError::configuration(
                            rule,
                            "no free function with this qualified name exists in the model",
                        ));
                    }
                    candidates.push(FunctionCandidate {
                        module: module_idx,
                        name: name.clone(),
                        overloads,
                        rule,
                    });
                }
            }
            Selection::All(_) => {
                let mut grouped: IndexMap<&str, Vec<(usize, DeclarationNode)>> = IndexMap::new();
                for (idx, node) in model.nodes().iter().enumerate() {
                    if node.kind == DeclKind::FreeFunction
                        && !explicit.contains(node.qualified_name.as_str())
                        && module.covers(node.source_file.as_deref())
                    {
                        grouped
                            .entry(node.qualified_name.as_str())
                            .or_default()
                            .push((idx, node.clone()));
                    }
                }
                let rule = format!("modules.{}.free_functions ALL", module.name);
                candidates.extend(grouped.into_iter().map(|(name, overloads)| {
                    FunctionCandidate {
                        module: module_idx,
                        name: name.to_owned(),
                        overloads,
                        rule: rule.clone(),
                    }
                }));
            }
        }
    }
    Ok(candidates)
}
