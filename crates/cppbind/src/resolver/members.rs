//! Member selection for wrapped classes and free functions

use indexmap::IndexSet;
use log::debug;

use super::{Excluded, settings::ScopeSettings};
use crate::{
    config::{ReturnValuePolicy, RenameRule},
    cpp_types,
    declarations::{Access, DeclKind, DeclarationNode, Virtuality},
    errors::{GenerationError, Result},
    plan::{Callable, CasterPlan, Capabilities, Field},
    rules::RuleSet,
};

/// Caster bookkeeping for one entry
#[derive(Debug, Default)]
pub struct CasterUse {
    pub capabilities: Capabilities,
    pub opaque_types: IndexSet<String>,
}

impl CasterUse {
    /// Check a callable bound into the host: parameters are accepted from the
    /// host, the return value is produced for it.
    pub fn check_binding(
        &mut self,
        casters: &[CasterPlan],
        node: &DeclarationNode,
        policy: Option<ReturnValuePolicy>,
    ) -> Result<()> {
        for param in &node.params {
            for caster in casters_for(casters, &param.type_name) {
                require_accept(caster, node)?;
                self.capabilities.accepts_caster = true;
                self.opaque_types.insert(caster.opaque_type.clone());
            }
        }
        if let Some(ret) = &node.return_type {
            for caster in casters_for(casters, ret) {
                let policy = policy.unwrap_or(ReturnValuePolicy::Automatic);
                require_produce(caster, node, policy)?;
                self.capabilities.produces_caster = true;
                self.opaque_types.insert(caster.opaque_type.clone());
            }
        }
        Ok(())
    }

    /// Check a trampoline override: arguments travel to the host, the host's
    /// return value travels back.
    pub fn check_override(
        &mut self,
        casters: &[CasterPlan],
        node: &DeclarationNode,
    ) -> Result<()> {
        for param in &node.params {
            for caster in casters_for(casters, &param.type_name) {
                require_produce(caster, node, ReturnValuePolicy::Automatic)?;
                self.capabilities.produces_caster = true;
                self.opaque_types.insert(caster.opaque_type.clone());
            }
        }
        if let Some(ret) = &node.return_type {
            for caster in casters_for(casters, ret) {
                require_accept(caster, node)?;
                self.capabilities.accepts_caster = true;
                self.opaque_types.insert(caster.opaque_type.clone());
            }
        }
        Ok(())
    }

    pub fn check_field(
        &mut self,
        casters: &[CasterPlan],
        node: &DeclarationNode,
        readonly: bool,
    ) -> Result<()> {
        let Some(field_type) = &node.return_type else {
            return Ok(());
        };
        for caster in casters_for(casters, field_type) {
            require_produce(caster, node, ReturnValuePolicy::Automatic)?;
            self.capabilities.produces_caster = true;
            if !readonly {
                require_accept(caster, node)?;
                self.capabilities.accepts_caster = true;
            }
            self.opaque_types.insert(caster.opaque_type.clone());
        }
        Ok(())
    }
}

fn casters_for<'a>(
    casters: &'a [CasterPlan],
    spelling: &'a str,
) -> impl Iterator<Item = &'a CasterPlan> {
    casters
        .iter()
        .filter(move |c| cpp_types::mentions_type(spelling, &c.opaque_type))
}

fn require_accept(caster: &CasterPlan, node: &DeclarationNode) -> Result<()> {
    if caster.accept.is_none() {
        return Err(GenerationError::TypeMismatch {
            opaque_type: caster.opaque_type.clone(),
            used_by: node.signature(),
            message: "the caster has no acceptance hook, so host values cannot be converted"
                .into(),
        });
    }
    Ok(())
}

fn require_produce(
    caster: &CasterPlan,
    node: &DeclarationNode,
    policy: ReturnValuePolicy,
) -> Result<()> {
    if caster.produce.is_none() || !caster.policies.contains(&policy) {
        return Err(GenerationError::Ownership {
            opaque_type: caster.opaque_type.clone(),
            used_by: node.signature(),
            policy: policy.to_string(),
        });
    }
    Ok(())
}

/// Exposed name of a member or function: a rename rule or its short name
pub fn exposed_member_name(
    renames: &RuleSet<String>,
    names: &[&str],
    node: &DeclarationNode,
) -> String {
    renames
        .lookup_first(names)
        .cloned()
        .unwrap_or_else(|| node.name().to_owned())
}

/// Everything needed to filter the members of one class
pub struct MemberContext<'a> {
    pub class_cpp_name: &'a str,
    /// Configuration path of the class entry
    pub class_rule: &'a str,
    pub settings: &'a ScopeSettings,
    pub excluded: &'a Excluded,
    pub renames: &'a RuleSet<String>,
    pub casters: &'a [CasterPlan],
    pub excluded_methods: &'a [String],
    pub excluded_fields: &'a [String],
    /// Every member of the class, used to count overloads
    pub all_members: &'a [DeclarationNode],
}

/// Surviving members of a class
#[derive(Debug, Default)]
pub struct SelectedMembers {
    pub constructors: Vec<Callable>,
    pub methods: Vec<Callable>,
    pub fields: Vec<Field>,
    pub casters: CasterUse,
}

impl MemberContext<'_> {
    fn rule_names(&self, member: &DeclarationNode) -> Vec<String> {
        vec![
            format!("{}::{}", self.class_cpp_name, member.name()),
            member.qualified_name.clone(),
        ]
    }

    fn excluded_by_rule(&self, member: &DeclarationNode) -> bool {
        let names = self.rule_names(member);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.excluded.rules.lookup_first(&names).copied().unwrap_or(false)
    }

    /// Label of the rule that leaves `method` out, if any
    fn method_exclusion(&self, method: &DeclarationNode) -> Option<String> {
        let names = self.rule_names(method);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        if let Some((key, &true)) = self.excluded.rules.winning_rule(&names) {
            return Some(self.excluded.rules.label(key));
        }
        self.excluded_methods
            .iter()
            .any(|m| m == method.name())
            .then(|| format!("{} excluded_methods", self.class_rule))
    }

    fn declared_overloads(&self, member: &DeclarationNode) -> usize {
        self.all_members
            .iter()
            .filter(|m| m.kind == member.kind && m.name() == member.name())
            .count()
    }

    fn exposed_name(&self, member: &DeclarationNode) -> String {
        let names = self.rule_names(member);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        exposed_member_name(self.renames, &names, member)
    }

    /// Reason `member` is dropped, if any
    fn drop_reason(&self, member: &DeclarationNode) -> Option<String> {
        if member.access != Access::Public {
            return Some("not public".into());
        }
        if self.excluded_by_rule(member) {
            return Some("excluded by rule".into());
        }
        if let Some(class) = self.excluded.mentioned_by(member) {
            return Some(format!("signature mentions excluded class `{class}`"));
        }
        None
    }

    pub fn select(
        &self,
        members: &[DeclarationNode],
        constructors_allowed: bool,
    ) -> Result<SelectedMembers> {
        let mut selected = SelectedMembers::default();
        for member in members {
            if let Some(reason) = self.drop_reason(member) {
                debug!("Skipping {}: {reason}", member.signature());
                continue;
            }
            match member.kind {
                DeclKind::Constructor => {
                    if !constructors_allowed {
                        continue;
                    }
                    if let Some(rule) = self.settings.constructor_exclusion(member) {
                        debug!("Skipping constructor {}: {rule}", member.signature());
                        continue;
                    }
                    if self.is_implicit_copy(member) {
                        continue;
                    }
                    selected
                        .casters
                        .check_binding(self.casters, member, None)?;
                    selected.constructors.push(Callable {
                        node: member.clone(),
                        exposed_name: "__init__".into(),
                        call_policy: None,
                        declared_overloads: self.declared_overloads(member),
                        binding: None,
                    });
                }
                DeclKind::Method => {
                    let name = member.name();
                    if name.starts_with("operator") || name.starts_with('~') {
                        continue;
                    }
                    if self.excluded_methods.iter().any(|m| m == name) {
                        debug!("Skipping {}: listed in excluded_methods", member.signature());
                        continue;
                    }
                    if let Some(rule) = self.settings.callable_exclusion(member) {
                        debug!("Skipping {}: {rule}", member.signature());
                        continue;
                    }
                    let call_policy = self.settings.call_policy(member.return_type.as_deref());
                    selected
                        .casters
                        .check_binding(self.casters, member, call_policy)?;
                    selected.methods.push(Callable {
                        node: member.clone(),
                        exposed_name: self.exposed_name(member),
                        call_policy,
                        declared_overloads: self.declared_overloads(member),
                        binding: None,
                    });
                }
                DeclKind::Field => {
                    if self.excluded_fields.iter().any(|f| f == member.name()) {
                        continue;
                    }
                    let readonly = member.is_const
                        || member
                            .return_type
                            .as_deref()
                            .is_some_and(|t| cpp_types::normalize_type(t).starts_with("const "));
                    selected.casters.check_field(self.casters, member, readonly)?;
                    selected.fields.push(Field {
                        name: member.name().to_owned(),
                        exposed_name: self.exposed_name(member),
                        readonly,
                        is_static: member.is_static,
                    });
                }
                DeclKind::Class | DeclKind::TemplateClass | DeclKind::FreeFunction => {}
            }
        }
        Ok(selected)
    }

    fn is_implicit_copy(&self, ctor: &DeclarationNode) -> bool {
        ctor.is_artificial
            && ctor.params.len() == 1
            && cpp_types::is_reference(&ctor.params[0].type_name)
            && ctor
                .parent
                .as_deref()
                .is_some_and(|owner| {
                    cpp_types::mentions_type(&ctor.params[0].type_name, owner)
                        || cpp_types::mentions_type(&ctor.params[0].type_name, self.class_cpp_name)
                })
    }

    /// Virtual methods forwarded by the trampoline, with their caster checks
    pub fn trampoline_methods(
        &self,
        surface: Vec<DeclarationNode>,
        casters: &mut CasterUse,
    ) -> Result<Vec<DeclarationNode>> {
        let mut methods = Vec::with_capacity(surface.len());
        for method in surface {
            if method.access == Access::Private {
                continue;
            }
            if let Some(rule) = self.method_exclusion(&method) {
                if method.virtuality == Virtuality::PureVirtual {
                    return Err(GenerationError::configuration(
                        rule,
                        format!(
                            "excludes pure virtual `{}`, which the trampoline of `{}` must \
                             override",
                            method.signature(),
                            self.class_cpp_name
                        ),
                    ));
                }
                debug!("Not forwarding {}: {rule}", method.signature());
                continue;
            }
            if let Some(class) = self.excluded.mentioned_by(&method) {
                debug!(
                    "Not forwarding {}: signature mentions excluded class `{class}`",
                    method.signature()
                );
                continue;
            }
            debug_assert!(method.virtuality != Virtuality::None);
            casters.check_override(self.casters, &method)?;
            methods.push(method);
        }
        Ok(methods)
    }
}

/// Rename rules as `(key, target)` pairs
pub fn rename_pairs(rules: &[RenameRule]) -> impl Iterator<Item = (String, String)> + '_ {
    rules.iter().map(|r| (r.name.clone(), r.to.clone()))
}
