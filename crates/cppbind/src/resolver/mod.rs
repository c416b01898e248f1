//! Configuration resolution
//!
//! Merges the declaration model with the package configuration into a
//! [`WrapPlan`]: selects classes and free functions per module, expands class
//! templates, applies exclusion and rename rules, resolves per-class policy
//! (holder, trampoline, constructors) and validates caster usage. Every rule
//! that names something missing from the model is a configuration error.

use std::path::Path;

use indexmap::IndexSet;
use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::{
    config::{ConstructorPolicy, HolderStrategy, PackageConfig, Settings},
    cpp_types,
    declarations::{Access, DeclKind, DeclarationModel, DeclarationNode, Virtuality},
    errors::{GenerationError, Result},
    plan::{
        Callable, CasterPlan, ClassPlan, DeclarationOrder, EntryId, EntryKind, FunctionGroup,
        Holder, PackageInfo, Trampoline, WrapPlan, WrapPlanEntry, builder::WrapPlanBuilder,
    },
    rules::RuleSet,
};

mod members;
mod selection;
mod settings;
pub mod virtuals;

use members::{CasterUse, MemberContext};
use selection::{ClassCandidate, FunctionCandidate};
use settings::ScopeSettings;
use virtuals::ClassView;

/// Exclusion rules plus the class spellings they remove
#[derive(Debug)]
pub struct Excluded {
    pub rules: RuleSet<bool>,
    /// Spellings whose presence in a signature prunes the callable
    needles: Vec<String>,
}

impl Excluded {
    fn new(rules: RuleSet<bool>, model: &DeclarationModel, classes: &[ClassCandidate]) -> Self {
        let mut needles = Vec::new();
        for node in model.nodes().iter().filter(|n| n.kind.is_class_like()) {
            if !rules.lookup(&node.qualified_name).copied().unwrap_or(false) {
                continue;
            }
            if node.kind != DeclKind::TemplateClass {
                needles.push(node.qualified_name.clone());
                continue;
            }
            // A re-included instance keeps the template's signatures; the
            // remaining instances get their own needles below.
            let reincluded = classes.iter().any(|c| {
                c.template.is_some()
                    && c.declared_name == node.qualified_name
                    && !Self::class_is_excluded(&rules, c)
            });
            if !reincluded {
                needles.push(format!("{}<", node.qualified_name));
            }
        }
        for candidate in classes.iter().filter(|c| c.template.is_some()) {
            if Self::class_is_excluded(&rules, candidate)
                && !needles.contains(&format!("{}<", candidate.declared_name))
            {
                needles.push(candidate.cpp_name.clone());
            }
        }
        Self { rules, needles }
    }

    fn class_is_excluded(rules: &RuleSet<bool>, candidate: &ClassCandidate) -> bool {
        rules
            .lookup_first(&[
                candidate.cpp_name.as_str(),
                candidate.declared_name.as_str(),
            ])
            .copied()
            .unwrap_or(false)
    }

    pub fn excludes_class(&self, candidate: &ClassCandidate) -> bool {
        Self::class_is_excluded(&self.rules, candidate)
    }

    /// First excluded class mentioned in the signature of `node`
    pub fn mentioned_by(&self, node: &DeclarationNode) -> Option<&str> {
        node.signature_types().find_map(|spelling| {
            self.needles
                .iter()
                .find(|needle| cpp_types::mentions_type(spelling, needle))
                .map(|needle| needle.trim_end_matches('<'))
        })
    }
}

fn resolve_casters(model: &DeclarationModel, config: &PackageConfig) -> Result<Vec<CasterPlan>> {
    let mut seen = FxHashSet::default();
    let mut casters = Vec::with_capacity(config.caster.len());
    for rule in &config.caster {
        let name = cpp_types::normalize_type(&rule.opaque_type);
        let rule_text = format!("caster `{}`", rule.opaque_type);
        if !seen.insert(name.clone()) {
            return Err(GenerationError::configuration(
                rule_text,
                "more than one caster is configured for this type",
            ));
        }
        if !model.is_external(&name) && model.class(&name).is_none() {
            return Err(GenerationError::configuration(
                rule_text,
                "the opaque type is neither declared in the model nor listed as external",
            ));
        }
        casters.push(CasterPlan {
            opaque_type: name,
            header: rule.header.clone(),
            host_type: rule.host_type.clone(),
            accept: rule.accept.clone(),
            produce: rule.produce.clone(),
            policies: rule.policies.clone(),
        });
    }
    Ok(casters)
}

/// Headers a registration unit needs: configured source includes, then the
/// declaring files by base name
fn unit_includes<'a>(
    settings: &ScopeSettings,
    source_files: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let mut includes = IndexSet::new();
    for include in &settings.source_includes {
        includes.insert(quote_include(include));
    }
    for file in source_files {
        let name = Path::new(file)
            .file_name()
            .map_or_else(|| file.to_owned(), |n| n.to_string_lossy().into_owned());
        includes.insert(quote_include(&name));
    }
    includes.into_iter().collect()
}

fn quote_include(include: &str) -> String {
    if include.starts_with('<') || include.starts_with('"') {
        include.to_owned()
    } else {
        format!("\"{include}\"")
    }
}

fn settings_levels<'a>(
    config: &'a PackageConfig,
    module: usize,
    class: Option<&'a Settings>,
) -> ScopeSettings {
    let mut levels = vec![&config.settings, &config.modules[module].settings];
    levels.extend(class);
    ScopeSettings::gather(&levels)
}

/// Rule keys the model does not contain but resolution still recognizes:
/// instantiations and their members
fn instance_names(classes: &[ClassCandidate]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for candidate in classes.iter().filter(|c| c.template.is_some()) {
        names.insert(candidate.cpp_name.clone());
        for member in &candidate.members {
            names.insert(format!("{}::{}", candidate.cpp_name, member.name()));
        }
    }
    names
}

struct Resolver<'a> {
    model: &'a DeclarationModel,
    config: &'a PackageConfig,
    excluded: Excluded,
    renames: RuleSet<String>,
    casters: Vec<CasterPlan>,
    builder: WrapPlanBuilder,
}

impl Resolver<'_> {
    fn exposed_class_name(&self, candidate: &ClassCandidate) -> String {
        match &candidate.template {
            Some(instance) => {
                if let Some(exact) = self.renames.lookup_exact(&candidate.cpp_name) {
                    return exact.clone();
                }
                let base = self
                    .renames
                    .lookup(&candidate.declared_name)
                    .cloned()
                    .unwrap_or_else(|| candidate.class.name().to_owned());
                let base = match cpp_types::split_template_args(&base) {
                    Some((stem, _)) => stem,
                    None => base,
                };
                crate::templates::instance_exposed_name(
                    &base,
                    &instance.args,
                    &self.config.effective_name_replacements(),
                )
            }
            None => self
                .renames
                .lookup(&candidate.cpp_name)
                .cloned()
                .unwrap_or_else(|| candidate.class.name().to_owned()),
        }
    }

    /// Every name in `excluded_methods` and `excluded_fields` must be a member
    fn check_member_lists(candidate: &ClassCandidate) -> Result<()> {
        let lists = [
            ("excluded_methods", &candidate.config.excluded_methods, DeclKind::Method),
            ("excluded_fields", &candidate.config.excluded_fields, DeclKind::Field),
        ];
        for (list, names, kind) in lists {
            for name in names {
                if !candidate
                    .members
                    .iter()
                    .any(|m| m.kind == kind && m.name() == name)
                {
                    return Err(GenerationError::configuration(
                        &candidate.rule,
                        format!(
                            "{list} names `{name}`, which `{}` does not declare",
                            candidate.cpp_name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn add_class(
        &mut self,
        candidate: &ClassCandidate,
    ) -> Result<Option<(EntryId, Vec<String>)>> {
        if self.excluded.excludes_class(candidate) {
            debug!("Excluding class {}", candidate.cpp_name);
            return Ok(None);
        }
        Self::check_member_lists(candidate)?;
        let module = &self.config.modules[candidate.module];
        let settings =
            settings_levels(self.config, candidate.module, Some(&candidate.config.settings));

        let view = ClassView {
            class: candidate.class.clone(),
            members: candidate.members.clone(),
        };
        let private_pure_virtual = candidate.members.iter().any(|m| {
            m.kind == DeclKind::Method
                && m.virtuality == Virtuality::PureVirtual
                && m.access == Access::Private
        });
        let abstract_lineage = virtuals::is_abstract(self.model, &view)?
            && virtuals::has_abstract_ancestor(self.model, &view)?;
        let constructors_allowed = candidate.config.constructors == ConstructorPolicy::Public
            && !private_pure_virtual
            && !abstract_lineage;

        let context = MemberContext {
            class_cpp_name: &candidate.cpp_name,
            class_rule: &candidate.rule,
            settings: &settings,
            excluded: &self.excluded,
            renames: &self.renames,
            casters: &self.casters,
            excluded_methods: &candidate.config.excluded_methods,
            excluded_fields: &candidate.config.excluded_fields,
            all_members: &candidate.members,
        };
        let mut selected = context.select(&candidate.members, constructors_allowed)?;

        let trampoline = match candidate.config.trampoline {
            Some(false) => None,
            mode => {
                let surface = virtuals::collect_virtuals(self.model, &view, false)?;
                let methods = context.trampoline_methods(surface, &mut selected.casters)?;
                if methods.is_empty() {
                    if mode == Some(true) {
                        return Err(GenerationError::configuration(
                            &candidate.rule,
                            format!(
                                "`trampoline = true` but `{}` has no virtual methods to forward",
                                candidate.cpp_name
                            ),
                        ));
                    }
                    None
                } else {
                    Some(Trampoline { methods })
                }
            }
        };
        let CasterUse {
            mut capabilities,
            opaque_types,
        } = selected.casters;
        capabilities.has_trampoline = trampoline.is_some();

        let strategy = candidate.config.holder.unwrap_or_default();
        let holder = Holder {
            strategy,
            smart_ptr: match strategy {
                HolderStrategy::Shared => settings.smart_ptr_type.clone(),
                HolderStrategy::Unique | HolderStrategy::RawReference => None,
            },
        };

        let source_file = candidate
            .config
            .source_file
            .clone()
            .or_else(|| candidate.class.source_file.clone());
        let bases: Vec<String> = candidate
            .class
            .bases
            .iter()
            .filter(|b| b.access != Access::Private)
            .map(|b| b.name.clone())
            .collect();

        let entry = WrapPlanEntry {
            id: EntryId::new(0),
            qualified_name: candidate.declared_name.clone(),
            cpp_name: candidate.cpp_name.clone(),
            exposed_name: self.exposed_class_name(candidate),
            module: module.name.clone(),
            declaration_order: candidate.order,
            includes: unit_includes(&settings, source_file.as_deref().into_iter()),
            casters: opaque_types,
            capabilities,
            policy: settings.emission_policy(),
            kind: EntryKind::Class(ClassPlan {
                holder,
                trampoline,
                constructors: selected.constructors,
                methods: selected.methods,
                fields: selected.fields,
                bases: Vec::new(),
                template: candidate.template.clone(),
                prefix_code: candidate.config.prefix_code.clone(),
                suffix_code: candidate.config.suffix_code.clone(),
            }),
        };
        let id = self.builder.add_entry(entry)?;
        Ok(Some((id, bases)))
    }

    fn add_functions(&mut self, candidate: &FunctionCandidate) -> Result<()> {
        if self
            .excluded
            .rules
            .lookup(&candidate.name)
            .copied()
            .unwrap_or(false)
        {
            debug!("Excluding free function {}", candidate.name);
            return Ok(());
        }
        let settings = settings_levels(self.config, candidate.module, None);
        let mut casters = CasterUse::default();
        let mut overloads = Vec::new();
        for (_, node) in &candidate.overloads {
            if let Some(rule) = settings.callable_exclusion(node) {
                debug!("Skipping {}: {rule}", node.signature());
                continue;
            }
            if let Some(class) = self.excluded.mentioned_by(node) {
                debug!(
                    "Skipping {}: signature mentions excluded class `{class}`",
                    node.signature()
                );
                continue;
            }
            let call_policy = settings.call_policy(node.return_type.as_deref());
            casters.check_binding(&self.casters, node, call_policy)?;
            overloads.push(Callable {
                node: node.clone(),
                exposed_name: String::new(),
                call_policy,
                declared_overloads: candidate.overloads.len(),
                binding: None,
            });
        }
        let Some((first_index, first)) = candidate.overloads.first() else {
            return Ok(());
        };
        if overloads.is_empty() {
            debug!("No overload of {} survived resolution", candidate.name);
            return Ok(());
        }

        let exposed_name =
            members::exposed_member_name(&self.renames, &[candidate.name.as_str()], first);
        for overload in &mut overloads {
            overload.exposed_name.clone_from(&exposed_name);
        }
        let includes = unit_includes(
            &settings,
            overloads
                .iter()
                .filter_map(|o| o.node.source_file.as_deref()),
        );
        let entry = WrapPlanEntry {
            id: EntryId::new(0),
            qualified_name: candidate.name.clone(),
            cpp_name: candidate.name.clone(),
            exposed_name,
            module: self.config.modules[candidate.module].name.clone(),
            declaration_order: DeclarationOrder {
                index: *first_index,
                instance: 0,
            },
            includes,
            casters: casters.opaque_types,
            capabilities: casters.capabilities,
            policy: settings.emission_policy(),
            kind: EntryKind::Functions(FunctionGroup { overloads }),
        };
        self.builder.add_entry(entry)?;
        Ok(())
    }

    fn link_bases(&mut self, pending: Vec<(EntryId, Vec<String>)>) -> Result<()> {
        for (derived, bases) in pending {
            for base in bases {
                let Some(base_id) = self.builder.class_entry(&base) else {
                    continue;
                };
                let entries = self.builder.entries();
                let derived_entry = &entries[derived.index()];
                if let (Some(d), Some(b)) =
                    (derived_entry.as_class(), entries[base_id.index()].as_class())
                    && d.holder != b.holder
                {
                    return Err(GenerationError::configuration(
                        format!(
                            "modules.{}.classes `{}`",
                            derived_entry.module, derived_entry.cpp_name
                        ),
                        format!(
                            "holder `{}` does not match holder `{}` of base `{base}`",
                            d.holder.spelling(&derived_entry.exposed_name),
                            b.holder.spelling(&entries[base_id.index()].exposed_name),
                        ),
                    ));
                }
                self.builder.link_base(derived, base_id);
            }
        }
        Ok(())
    }
}

/// Resolve `config` against `model` into a wrap plan
pub fn resolve(model: &DeclarationModel, config: &PackageConfig) -> Result<WrapPlan> {
    let exclusions = RuleSet::compile(
        "exclude",
        config.exclude.iter().map(|r| (r.name.clone(), r.excluded)),
    )?;
    let renames = RuleSet::compile("rename", members::rename_pairs(&config.rename))?;
    let casters = resolve_casters(model, config)?;

    let classes = selection::select_classes(model, config)?;
    let functions = selection::select_functions(model, config)?;

    let instances = instance_names(&classes);
    let known = |name: &str| model.contains(name) || instances.contains(name);
    let candidates = model
        .nodes()
        .iter()
        .map(|n| n.qualified_name.as_str())
        .chain(instances.iter().map(String::as_str));
    exclusions.check_references(known, candidates.clone())?;
    renames.check_references(known, candidates)?;

    for caster in &casters {
        if let Some(class) = classes
            .iter()
            .find(|c| cpp_types::normalize_type(&c.cpp_name) == caster.opaque_type)
        {
            return Err(GenerationError::configuration(
                &class.rule,
                format!(
                    "`{}` is wrapped as a class but also has a caster",
                    caster.opaque_type
                ),
            ));
        }
    }

    let mut builder = WrapPlanBuilder::new(PackageInfo {
        name: config.name.clone(),
        prefix_text: config.prefix_text.clone(),
        common_include_file: config.common_include_file,
    });
    for module in &config.modules {
        builder.add_module(module.name.clone());
    }
    for caster in &casters {
        builder.add_caster(caster.clone());
    }

    let mut resolver = Resolver {
        model,
        config,
        excluded: Excluded::new(exclusions, model, &classes),
        renames,
        casters,
        builder,
    };

    let mut pending_bases = Vec::new();
    for candidate in &classes {
        if let Some(added) = resolver.add_class(candidate)? {
            pending_bases.push(added);
        }
    }
    resolver.link_bases(pending_bases)?;
    for candidate in &functions {
        resolver.add_functions(candidate)?;
    }

    let plan = resolver.builder.build();
    info!(
        "Resolved {} entries across {} modules",
        plan.entries.len(),
        plan.modules.len()
    );
    Ok(plan)
}
