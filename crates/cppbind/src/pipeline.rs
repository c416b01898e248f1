//! End-to-end generation run
//!
//! Resolution, ordering, overload binding and emission, in that order. Every
//! decision lives in the wrap plan built here; the emitter only follows it.

use std::path::Path;

use log::{debug, info};

use crate::{
    code_generator::{self, RegistrationUnit},
    config::PackageConfig,
    declarations::DeclarationModel,
    errors::Result,
    orderer, overloads,
    plan::{ModulePlan, WrapPlan},
    resolver,
};

/// Everything a run produced, ready to be published
#[derive(Debug, Clone)]
pub struct GeneratedPackage {
    pub plan: WrapPlan,
    pub modules: Vec<ModulePlan>,
    pub units: Vec<RegistrationUnit>,
}

impl GeneratedPackage {
    pub fn unit(&self, path: impl AsRef<Path>) -> Option<&RegistrationUnit> {
        let path = path.as_ref();
        self.units.iter().find(|u| u.path == path)
    }
}

/// Generate the registration units for `model` under `config`
pub fn generate(model: &DeclarationModel, config: &PackageConfig) -> Result<GeneratedPackage> {
    config.validate()?;
    info!(
        "Generating package {} from {} declarations",
        config.name,
        model.len()
    );

    let mut plan = resolver::resolve(model, config)?;
    let modules = orderer::order(&plan)?;
    debug!(
        "Registration order: {:?}",
        modules
            .iter()
            .map(|m| (&m.name, m.entries.len()))
            .collect::<Vec<_>>()
    );
    overloads::bind(&mut plan)?;
    let units = code_generator::emit(&plan, &modules)?;

    Ok(GeneratedPackage {
        plan,
        modules,
        units,
    })
}
