//! Wrap plan containing every emission decision
//!
//! The WrapPlan is the resolved, policy-annotated subset of the declaration
//! model selected for exposure. It is built once per run by the resolver,
//! ordered into module plans, completed with overload bindings and then
//! handed to the code generator. Nothing in it outlives the run.

use std::fmt;

use indexmap::IndexSet;

use crate::{
    config::{HolderStrategy, ReturnValuePolicy},
    declarations::DeclarationNode,
};

pub mod builder;

#[cfg(test)]
mod tests;

/// Index of an entry inside its WrapPlan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// Package-wide emission settings
#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    pub name: String,
    pub prefix_text: String,
    pub common_include_file: bool,
}

/// The plan for one generation run
#[derive(Debug, Clone, Default)]
pub struct WrapPlan {
    pub package: PackageInfo,
    /// Module names in configuration order
    pub modules: Vec<String>,
    pub entries: Vec<WrapPlanEntry>,
    pub casters: Vec<CasterPlan>,
}

impl WrapPlan {
    pub fn new(package: PackageInfo) -> Self {
        Self {
            package,
            ..Self::default()
        }
    }

    pub fn entry(&self, id: EntryId) -> &WrapPlanEntry {
        &self.entries[id.index()]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut WrapPlanEntry {
        &mut self.entries[id.index()]
    }

    pub fn find_by_cpp_name(&self, cpp_name: &str) -> Option<&WrapPlanEntry> {
        self.entries.iter().find(|e| e.cpp_name == cpp_name)
    }

    pub fn find_by_exposed_name(&self, exposed_name: &str) -> Option<&WrapPlanEntry> {
        self.entries.iter().find(|e| e.exposed_name == exposed_name)
    }

    pub fn caster(&self, opaque_type: &str) -> Option<&CasterPlan> {
        self.casters.iter().find(|c| c.opaque_type == opaque_type)
    }
}

/// Position of an entry in the declaration model, used to break ties
///
/// Instantiations of one template share `index` and are ordered by the
/// position of their tuple in the requested tuple list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationOrder {
    pub index: usize,
    pub instance: usize,
}

/// Capability tags that drive emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Some wrapped callable takes an opaque type through a caster
    pub accepts_caster: bool,
    /// Some wrapped callable returns an opaque type through a caster
    pub produces_caster: bool,
    pub has_trampoline: bool,
}

/// Emission knobs resolved from the settings hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmissionPolicy {
    pub exclude_default_args: bool,
    pub pointer_call_policy: Option<ReturnValuePolicy>,
    pub reference_call_policy: Option<ReturnValuePolicy>,
}

/// A class or free-function group selected for exposure
#[derive(Debug, Clone)]
pub struct WrapPlanEntry {
    pub id: EntryId,
    /// Name of the declaring node; the template name for instantiations
    pub qualified_name: String,
    /// C++ spelling, e.g. `Point<2>`
    pub cpp_name: String,
    pub exposed_name: String,
    pub module: String,
    pub declaration_order: DeclarationOrder,
    /// Headers declaring the entry, quoted or angle-bracketed
    pub includes: Vec<String>,
    /// Opaque types whose caster headers the unit must include
    pub casters: IndexSet<String>,
    pub capabilities: Capabilities,
    pub policy: EmissionPolicy,
    pub kind: EntryKind,
}

impl WrapPlanEntry {
    pub fn as_class(&self) -> Option<&ClassPlan> {
        match &self.kind {
            EntryKind::Class(class) => Some(class),
            EntryKind::Functions(_) => None,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, EntryKind::Class(_))
    }

    /// Every callable in the entry, constructors first
    pub fn callables(&self) -> Box<dyn Iterator<Item = &Callable> + '_> {
        match &self.kind {
            EntryKind::Class(class) => {
                Box::new(class.constructors.iter().chain(class.methods.iter()))
            }
            EntryKind::Functions(group) => Box::new(group.overloads.iter()),
        }
    }

    pub fn callables_mut(&mut self) -> Box<dyn Iterator<Item = &mut Callable> + '_> {
        match &mut self.kind {
            EntryKind::Class(class) => Box::new(
                class
                    .constructors
                    .iter_mut()
                    .chain(class.methods.iter_mut()),
            ),
            EntryKind::Functions(group) => Box::new(group.overloads.iter_mut()),
        }
    }

    /// Name of the registration function emitted for this entry
    pub fn register_function(&self) -> String {
        match self.kind {
            EntryKind::Class(_) => format!("register_{}_class", self.exposed_name),
            EntryKind::Functions(_) => format!("register_{}_function", self.exposed_name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    Class(ClassPlan),
    Functions(FunctionGroup),
}

/// Host-side ownership of class instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    pub strategy: HolderStrategy,
    /// Smart pointer template spelling, e.g. `boost::shared_ptr`
    pub smart_ptr: Option<String>,
}

impl Holder {
    /// Holder type argument for `py::class_`, if one is spelled out
    pub fn spelling(&self, class_name: &str) -> String {
        match self.strategy {
            HolderStrategy::Shared => format!(
                "{}<{class_name}>",
                self.smart_ptr.as_deref().unwrap_or("std::shared_ptr")
            ),
            HolderStrategy::Unique => format!("std::unique_ptr<{class_name}>"),
            HolderStrategy::RawReference => {
                format!("std::unique_ptr<{class_name}, py::nodelete>")
            }
        }
    }

    /// Whether the holder needs `PYBIND11_DECLARE_HOLDER_TYPE`
    pub fn needs_declaration(&self) -> bool {
        self.strategy == HolderStrategy::Shared
            && self
                .smart_ptr
                .as_deref()
                .is_some_and(|ptr| ptr != "std::shared_ptr")
    }
}

/// A concrete instantiation of a class template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInstance {
    pub template: String,
    pub args: Vec<String>,
}

/// A base class registered by this plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseLink {
    pub cpp_name: String,
    pub entry: EntryId,
}

/// Virtual methods forwarded by the generated trampoline
#[derive(Debug, Clone)]
pub struct Trampoline {
    pub methods: Vec<DeclarationNode>,
}

#[derive(Debug, Clone)]
pub struct ClassPlan {
    pub holder: Holder,
    pub trampoline: Option<Trampoline>,
    pub constructors: Vec<Callable>,
    pub methods: Vec<Callable>,
    pub fields: Vec<Field>,
    pub bases: Vec<BaseLink>,
    pub template: Option<TemplateInstance>,
    pub prefix_code: Vec<String>,
    pub suffix_code: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionGroup {
    pub overloads: Vec<Callable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub exposed_name: String,
    pub readonly: bool,
    pub is_static: bool,
}

/// A constructor, method or free function that survived resolution
#[derive(Debug, Clone)]
pub struct Callable {
    /// Declaration with template parameters already substituted
    pub node: DeclarationNode,
    pub exposed_name: String,
    pub call_policy: Option<ReturnValuePolicy>,
    /// Number of declarations sharing this name in the model, wrapped or not
    pub declared_overloads: usize,
    /// Filled by overload resolution
    pub binding: Option<Binding>,
}

/// How a callable is registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub address: Address,
    pub min_arity: usize,
    pub max_arity: usize,
    /// One entry per parameter when every parameter is named, else empty
    pub args: Vec<ArgBinding>,
}

impl Binding {
    pub fn arities(&self) -> std::ops::RangeInclusive<usize> {
        self.min_arity..=self.max_arity
    }

    /// Ordered `(name, value)` pairs for parameters with a bound default
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args
            .iter()
            .filter_map(|a| a.default.as_deref().map(|d| (a.name.as_str(), d)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `&Class::name`
    Plain(String),
    /// `(Ret(Class::*)(Args) const) &Class::name`
    Cast(String),
    /// `py::init<Args>()`
    Init(String),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(text) | Self::Cast(text) | Self::Init(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgBinding {
    pub name: String,
    pub default: Option<String>,
}

/// A caster unit and the hooks it was configured with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasterPlan {
    pub opaque_type: String,
    pub header: String,
    pub host_type: String,
    pub accept: Option<String>,
    pub produce: Option<String>,
    pub policies: Vec<ReturnValuePolicy>,
}

impl CasterPlan {
    pub fn file_name(&self) -> String {
        format!(
            "{}_caster.{}.hpp",
            crate::cpp_types::tidy_name(&self.opaque_type),
            crate::code_generator::FILE_EXTENSION
        )
    }
}

/// Ordered entries of one generated module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePlan {
    pub name: String,
    pub entries: Vec<EntryId>,
    /// Modules that must be imported first, in resolved order
    pub depends_on: Vec<String>,
}
