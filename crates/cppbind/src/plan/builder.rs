//! Builder for incrementally constructing a WrapPlan

use rustc_hash::FxHashMap;

use super::{BaseLink, CasterPlan, EntryId, PackageInfo, WrapPlan, WrapPlanEntry};
use crate::errors::{GenerationError, Result};

/// Builder for incrementally constructing a WrapPlan
#[derive(Debug, Default)]
pub struct WrapPlanBuilder {
    plan: WrapPlan,
    by_cpp_name: FxHashMap<String, EntryId>,
    exposed: FxHashMap<(String, String), EntryId>,
}

impl WrapPlanBuilder {
    pub fn new(package: PackageInfo) -> Self {
        Self {
            plan: WrapPlan::new(package),
            ..Self::default()
        }
    }

    pub fn add_module(&mut self, name: impl Into<String>) -> &mut Self {
        self.plan.modules.push(name.into());
        self
    }

    /// Add an entry, assigning its id
    ///
    /// Two entries of one module may not share an exposed name, and one C++
    /// class may only be wrapped once per package.
    pub fn add_entry(&mut self, mut entry: WrapPlanEntry) -> Result<EntryId> {
        let id = EntryId::new(self.plan.entries.len() as u32);
        entry.id = id;

        let key = (entry.module.clone(), entry.exposed_name.clone());
        if let Some(existing) = self.exposed.get(&key) {
            return Err(GenerationError::configuration(
                format!("modules.{}", entry.module),
                format!(
                    "`{}` and `{}` are both exposed as `{}`",
                    self.plan.entry(*existing).cpp_name,
                    entry.cpp_name,
                    entry.exposed_name
                ),
            ));
        }
        if entry.is_class() {
            if let Some(existing) = self.by_cpp_name.get(&entry.cpp_name) {
                return Err(GenerationError::configuration(
                    format!("modules.{}", entry.module),
                    format!(
                        "class `{}` is already wrapped in module `{}`",
                        entry.cpp_name,
                        self.plan.entry(*existing).module
                    ),
                ));
            }
            self.by_cpp_name.insert(entry.cpp_name.clone(), id);
        }
        self.exposed.insert(key, id);
        self.plan.entries.push(entry);
        Ok(id)
    }

    /// Entry wrapping the class spelled `cpp_name`
    pub fn class_entry(&self, cpp_name: &str) -> Option<EntryId> {
        self.by_cpp_name.get(cpp_name).copied()
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut WrapPlanEntry {
        self.plan.entry_mut(id)
    }

    pub fn entries(&self) -> &[WrapPlanEntry] {
        &self.plan.entries
    }

    /// Record that `derived` registers `base` as an ancestor
    pub fn link_base(&mut self, derived: EntryId, base: EntryId) -> &mut Self {
        let cpp_name = self.plan.entry(base).cpp_name.clone();
        if let super::EntryKind::Class(class) = &mut self.plan.entry_mut(derived).kind
            && !class.bases.iter().any(|b| b.entry == base)
        {
            class.bases.push(BaseLink {
                cpp_name,
                entry: base,
            });
        }
        self
    }

    pub fn add_caster(&mut self, caster: CasterPlan) -> &mut Self {
        self.plan.casters.push(caster);
        self
    }

    pub fn build(self) -> WrapPlan {
        self.plan
    }
}
