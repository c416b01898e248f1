//! Package configuration
//!
//! The configuration is a TOML document describing which declarations to wrap
//! and how. Settings that influence emission live in `[settings]` tables at
//! three levels (package, module, class); lists are gathered from every level
//! while scalars are taken from the most specific level that sets them.
//!
//! ```toml
//! name = "pyshapes"
//! common_include_file = true
//!
//! [settings]
//! smart_ptr_type = "std::shared_ptr"
//! pointer_call_policy = "reference"
//!
//! [[modules]]
//! name = "geometry"
//! source_locations = ["src/geometry"]
//! classes = ["Shape", { name = "Point", template_args = [[2], [3]] }]
//! free_functions = "ALL"
//!
//! [[exclude]]
//! name = "Shape::*Internal"
//!
//! [[caster]]
//! opaque_type = "Handle"
//! header = "Handle.hpp"
//! host_type = "py::capsule"
//! produce = "handle_to_host"
//! ```

use std::{fmt, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{GenerationError, Result};

/// Text written at the top of every generated file unless overridden
pub const DEFAULT_PREFIX_TEXT: &str =
    "// This file is automatically generated by cppbind; manual changes will be overwritten.";

/// Replacements applied to generated template instantiation names
pub const DEFAULT_NAME_REPLACEMENTS: &[(&str, &str)] = &[
    ("double", "Double"),
    ("unsigned int", "Unsigned"),
    ("Unsigned int", "Unsigned"),
    ("unsigned", "Unsigned"),
    ("std::vector", "Vector"),
    ("std::pair", "Pair"),
    ("std::map", "Map"),
    ("std::string", "String"),
    ("boost::shared_ptr", "SharedPtr"),
    ("*", "Ptr"),
    ("c_vector", "CVector"),
    ("std::set", "Set"),
];

fn default_prefix_text() -> String {
    DEFAULT_PREFIX_TEXT.to_owned()
}

fn default_true() -> bool {
    true
}

/// Top-level package configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Package name, used in module entry points and the header collection guard
    pub name: String,

    #[serde(default = "default_prefix_text")]
    pub prefix_text: String,

    /// Include the header collection instead of per-class source includes
    #[serde(default)]
    pub common_include_file: bool,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub template_substitutions: Vec<TemplateSubstitution>,

    /// Extra replacements for generated names, applied after the defaults
    #[serde(default)]
    pub name_replacements: IndexMap<String, String>,

    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    #[serde(default)]
    pub exclude: Vec<ExclusionRule>,

    #[serde(default)]
    pub rename: Vec<RenameRule>,

    #[serde(default)]
    pub caster: Vec<CasterRule>,
}

impl PackageConfig {
    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| GenerationError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source =
            std::fs::read_to_string(path).map_err(|e| GenerationError::io(path, e))?;
        Self::from_toml_str(&source, path)
    }

    /// Default replacements followed by user supplied ones; a user entry for
    /// an existing key replaces the default in place.
    pub fn effective_name_replacements(&self) -> IndexMap<String, String> {
        let mut replacements: IndexMap<String, String> = DEFAULT_NAME_REPLACEMENTS
            .iter()
            .map(|(from, to)| ((*from).to_owned(), (*to).to_owned()))
            .collect();
        for (from, to) in &self.name_replacements {
            replacements.insert(from.clone(), to.clone());
        }
        replacements
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GenerationError::configuration("name", "package name is empty"));
        }
        let mut seen = indexmap::IndexSet::new();
        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(GenerationError::configuration(
                    format!("modules.{}", module.name),
                    "module declared more than once",
                ));
            }
        }
        for caster in &self.caster {
            if caster.accept.is_none() && caster.produce.is_none() {
                return Err(GenerationError::configuration(
                    format!("caster.{}", caster.opaque_type),
                    "a caster needs at least one of `accept` or `produce`",
                ));
            }
        }
        Ok(())
    }
}

/// Emission settings shared by the package, module and class levels
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub source_includes: Vec<String>,
    #[serde(default)]
    pub smart_ptr_type: Option<String>,
    #[serde(default)]
    pub exclude_default_args: Option<bool>,
    #[serde(default)]
    pub pointer_call_policy: Option<ReturnValuePolicy>,
    #[serde(default)]
    pub reference_call_policy: Option<ReturnValuePolicy>,
    /// Type spellings that exclude any callable returning or taking them
    #[serde(default)]
    pub calldef_excludes: Vec<String>,
    #[serde(default)]
    pub return_type_excludes: Vec<String>,
    #[serde(default)]
    pub arg_type_excludes: Vec<String>,
    /// Substrings that exclude a constructor when any argument contains them
    #[serde(default)]
    pub constructor_arg_type_excludes: Vec<String>,
    /// Full argument lists of constructors to skip
    #[serde(default)]
    pub constructor_signature_excludes: Vec<Vec<String>>,
}

/// A module of the generated package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    pub name: String,
    /// Source directories scanned when a selection is `"ALL"`
    #[serde(default)]
    pub source_locations: Vec<String>,
    #[serde(default)]
    pub classes: Selection<ClassEntry>,
    #[serde(default)]
    pub free_functions: Selection<String>,
    #[serde(default)]
    pub settings: Settings,
}

impl ModuleConfig {
    /// Whether `source_file` lies under one of the module's source locations
    pub fn covers(&self, source_file: Option<&str>) -> bool {
        if self.source_locations.is_empty() {
            return true;
        }
        let Some(file) = source_file else {
            return false;
        };
        let file = Path::new(file);
        self.source_locations
            .iter()
            .any(|location| file.starts_with(location))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SelectAll {
    #[serde(rename = "ALL")]
    All,
}

/// Either every matching declaration or an explicit list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Selection<T> {
    All(SelectAll),
    Listed(Vec<T>),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self::Listed(Vec::new())
    }
}

/// A class listed in a module, either by name or with overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClassEntry {
    Name(String),
    Detailed(ClassConfig),
}

impl ClassEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed(config) => &config.name,
        }
    }

    pub fn into_config(self) -> ClassConfig {
        match self {
            Self::Name(name) => ClassConfig::named(name),
            Self::Detailed(config) => config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClassConfig {
    pub name: String,
    #[serde(default)]
    pub holder: Option<HolderStrategy>,
    /// `true` forces a trampoline, `false` suppresses it, absent decides from
    /// the virtual surface
    #[serde(default)]
    pub trampoline: Option<bool>,
    #[serde(default)]
    pub constructors: ConstructorPolicy,
    /// Short names of methods to leave out
    #[serde(default)]
    pub excluded_methods: Vec<String>,
    #[serde(default)]
    pub excluded_fields: Vec<String>,
    #[serde(default)]
    pub template_args: Vec<Vec<TemplateArg>>,
    /// Header to include instead of the declaration's source file
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub prefix_code: Vec<String>,
    #[serde(default)]
    pub suffix_code: Vec<String>,
    #[serde(default)]
    pub settings: Settings,
}

impl ClassConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holder: None,
            trampoline: None,
            constructors: ConstructorPolicy::default(),
            excluded_methods: Vec::new(),
            excluded_fields: Vec::new(),
            template_args: Vec::new(),
            source_file: None,
            prefix_code: Vec::new(),
            suffix_code: Vec::new(),
            settings: Settings::default(),
        }
    }
}

/// Ownership strategy of the host-side handle
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum HolderStrategy {
    #[default]
    Shared,
    Unique,
    RawReference,
}

impl fmt::Display for HolderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Unique => write!(f, "unique"),
            Self::RawReference => write!(f, "raw-reference"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorPolicy {
    #[default]
    Public,
    None,
}

/// pybind11 return value policies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReturnValuePolicy {
    Automatic,
    AutomaticReference,
    TakeOwnership,
    Copy,
    Move,
    Reference,
    ReferenceInternal,
}

impl ReturnValuePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::AutomaticReference => "automatic_reference",
            Self::TakeOwnership => "take_ownership",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Reference => "reference",
            Self::ReferenceInternal => "reference_internal",
        }
    }
}

impl fmt::Display for ReturnValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A template argument as written in TOML, either a number or a type spelling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TemplateArg {
    Int(i64),
    Text(String),
}

impl fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Template arguments applied to every class template with these parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TemplateSubstitution {
    /// Template parameter names, e.g. `["DIM_A", "DIM_B"]`
    pub params: Vec<String>,
    pub arguments: Vec<Vec<TemplateArg>>,
}

/// Drops (or with `excluded = false`, keeps) matching declarations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExclusionRule {
    /// Qualified name, or a glob with `*` and `?`
    pub name: String,
    #[serde(default = "default_true")]
    pub excluded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RenameRule {
    pub name: String,
    pub to: String,
}

/// Conversion hooks between a host value and an opaque native type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CasterRule {
    pub opaque_type: String,
    /// Header declaring the opaque type and the hook functions
    pub header: String,
    /// pybind11 type the host value must be an instance of
    #[serde(default = "default_host_type")]
    pub host_type: String,
    /// `T accept(pybind11::handle)`
    #[serde(default)]
    pub accept: Option<String>,
    /// `pybind11::object produce(const T&)`
    #[serde(default)]
    pub produce: Option<String>,
    #[serde(default = "default_caster_policies")]
    pub policies: Vec<ReturnValuePolicy>,
}

fn default_host_type() -> String {
    "py::object".to_owned()
}

fn default_caster_policies() -> Vec<ReturnValuePolicy> {
    vec![
        ReturnValuePolicy::Automatic,
        ReturnValuePolicy::AutomaticReference,
        ReturnValuePolicy::Copy,
        ReturnValuePolicy::Move,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<PackageConfig> {
        PackageConfig::from_toml_str(source, Path::new("package.toml"))
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            name = "pyshapes"

            [[modules]]
            name = "geometry"
            classes = ["Shape", { name = "Point", template_args = [[2], [3]] }]
            "#,
        )
        .expect("config parses");

        assert_eq!(config.prefix_text, DEFAULT_PREFIX_TEXT);
        let module = config.module("geometry").expect("module exists");
        let Selection::Listed(classes) = &module.classes else {
            panic!("expected an explicit class list");
        };
        assert_eq!(classes[0], ClassEntry::Name("Shape".into()));
        let ClassEntry::Detailed(point) = &classes[1] else {
            panic!("expected detailed entry");
        };
        assert_eq!(
            point.template_args,
            vec![vec![TemplateArg::Int(2)], vec![TemplateArg::Int(3)]]
        );
        assert_eq!(module.free_functions, Selection::Listed(Vec::new()));
    }

    #[test]
    fn test_all_keyword_and_rules() {
        let config = parse(
            r#"
            name = "pkg"

            [[modules]]
            name = "core"
            free_functions = "ALL"
            classes = "ALL"

            [[exclude]]
            name = "Shape::*"

            [[exclude]]
            name = "Shape::GetArea"
            excluded = false

            [[caster]]
            opaque_type = "Handle"
            header = "Handle.hpp"
            produce = "handle_to_host"
            "#,
        )
        .expect("config parses");

        let module = &config.modules[0];
        assert_eq!(module.classes, Selection::All(SelectAll::All));
        assert!(config.exclude[0].excluded);
        assert!(!config.exclude[1].excluded);
        assert_eq!(config.caster[0].host_type, "py::object");
        assert!(config.caster[0].accept.is_none());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = parse("name = \"pkg\"\nmodles = []\n").unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn test_caster_without_hooks_is_rejected() {
        let err = parse(
            r#"
            name = "pkg"
            [[caster]]
            opaque_type = "Handle"
            header = "Handle.hpp"
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_user_name_replacements_extend_defaults() {
        let mut config = parse("name = \"pkg\"").expect("config parses");
        config
            .name_replacements
            .insert("double".into(), "Dbl".into());
        config.name_replacements.insert("Vec".into(), "V".into());
        let replacements = config.effective_name_replacements();
        assert_eq!(replacements.get_index(0), Some((&"double".to_owned(), &"Dbl".to_owned())));
        assert_eq!(replacements.last(), Some((&"Vec".to_owned(), &"V".to_owned())));
    }

    #[test]
    fn test_module_covers_source_locations() {
        let mut module = ModuleConfig {
            name: "geometry".into(),
            source_locations: vec!["src/geometry".into()],
            classes: Selection::default(),
            free_functions: Selection::default(),
            settings: Settings::default(),
        };
        assert!(module.covers(Some("src/geometry/Point.hpp")));
        assert!(!module.covers(Some("src/mesh/Mesh.hpp")));
        assert!(!module.covers(None));
        module.source_locations.clear();
        assert!(module.covers(None));
    }
}
