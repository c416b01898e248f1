//! Emission of pybind11 registration units
//!
//! Every unit is rendered from the ordered module plans alone; the emitter
//! never consults the declaration model or configuration again. Units are
//! rendered in parallel and collected in resolved order, so the same plan
//! always produces byte-identical output.

use std::{fmt::Write, path::PathBuf};

use log::{debug, info};
use rayon::prelude::*;

use crate::{
    errors::Result,
    plan::{CasterPlan, EntryId, EntryKind, ModulePlan, WrapPlan, WrapPlanEntry},
};

mod callable_writer;
mod caster_writer;
mod class_writer;
mod header_collection;
mod module_writer;
mod trampoline_writer;

/// Extension tag shared by every generated file
pub const FILE_EXTENSION: &str = "cppwg";
pub const HEADER_COLLECTION_FILENAME: &str = "wrapper_header_collection.cppwg.hpp";
/// Suffix of generated trampoline classes
pub const OVERRIDE_SUFFIX: &str = "_Overrides";

/// One generated file, relative to the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationUnit {
    pub path: PathBuf,
    pub contents: String,
}

impl RegistrationUnit {
    fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// A unit of emission work, in output order
#[derive(Debug, Clone, Copy)]
enum Job<'a> {
    Caster(&'a CasterPlan),
    HeaderCollection,
    Entry(&'a ModulePlan, EntryId),
    Module(&'a ModulePlan),
}

/// Render every unit for `modules`
///
/// Output order: caster headers, the header collection, then for each module
/// its entry units in registration order followed by the module aggregator.
pub fn emit(plan: &WrapPlan, modules: &[ModulePlan]) -> Result<Vec<RegistrationUnit>> {
    let mut jobs: Vec<Job<'_>> = plan.casters.iter().map(Job::Caster).collect();
    jobs.push(Job::HeaderCollection);
    for module in modules {
        jobs.extend(module.entries.iter().map(|&id| Job::Entry(module, id)));
        jobs.push(Job::Module(module));
    }
    debug!("Emitting {} jobs", jobs.len());

    let rendered: Vec<Vec<RegistrationUnit>> = jobs
        .par_iter()
        .map(|job| match *job {
            Job::Caster(caster) => Ok(vec![caster_writer::write(plan, caster)]),
            Job::HeaderCollection => Ok(vec![header_collection::write(plan, modules)]),
            Job::Entry(module, id) => {
                let entry = plan.entry(id);
                match &entry.kind {
                    EntryKind::Class(class) => class_writer::write(plan, module, entry, class),
                    EntryKind::Functions(group) => {
                        callable_writer::write_function_unit(plan, module, entry, group)
                    }
                }
            }
            Job::Module(module) => Ok(vec![module_writer::write(plan, module)]),
        })
        .collect::<Result<_>>()?;

    let units: Vec<RegistrationUnit> = rendered.into_iter().flatten().collect();
    info!("Rendered {} registration units", units.len());
    Ok(units)
}

/// `prefix_text` followed by a newline, or nothing
fn push_prefix(out: &mut String, plan: &WrapPlan) {
    if !plan.package.prefix_text.is_empty() {
        out.push_str(&plan.package.prefix_text);
        out.push('\n');
    }
}

fn caster_file_name(plan: &WrapPlan, opaque_type: &str) -> Option<String> {
    plan.caster(opaque_type).map(CasterPlan::file_name)
}

/// Include lines for the declarations an entry needs, then its caster headers
fn push_entry_includes(out: &mut String, plan: &WrapPlan, entry: &WrapPlanEntry) {
    if plan.package.common_include_file {
        let _ = writeln!(out, "#include \"{HEADER_COLLECTION_FILENAME}\"");
    } else {
        for include in &entry.includes {
            let _ = writeln!(out, "#include {include}");
        }
    }
    for opaque_type in &entry.casters {
        if let Some(file) = caster_file_name(plan, opaque_type) {
            let _ = writeln!(out, "#include \"{file}\"");
        }
    }
}

/// Header of an entry unit, declaring its registration function
fn write_entry_header(plan: &WrapPlan, entry: &WrapPlanEntry) -> String {
    let guard = format!("{}_hpp__{FILE_EXTENSION}_wrapper", entry.exposed_name);
    let mut out = String::new();
    push_prefix(&mut out, plan);
    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");
    out.push('\n');
    out.push_str("#include <pybind11/pybind11.h>\n\n");
    let _ = writeln!(out, "void {}(pybind11::module &m);", entry.register_function());
    let _ = writeln!(out, "#endif // {guard}");
    out
}

fn entry_path(module: &ModulePlan, entry: &WrapPlanEntry, suffix: &str) -> PathBuf {
    PathBuf::from(&module.name).join(format!(
        "{}.{FILE_EXTENSION}.{suffix}",
        entry.exposed_name
    ))
}
