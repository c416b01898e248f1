//! Declaration model produced by the extraction front end
//!
//! The model is an ordered list of C++ entities. Document order is the
//! declaration order used to break ties everywhere output order is decided.
//! Nothing downstream mutates the model; template instantiation produces new,
//! owned nodes instead.

use std::{fmt, path::Path};

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::{
    cpp_types,
    errors::{GenerationError, Result},
};

/// Kind of a declared entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    #[default]
    Class,
    TemplateClass,
    Constructor,
    Method,
    Field,
    FreeFunction,
}

impl DeclKind {
    pub fn is_class_like(self) -> bool {
        matches!(self, Self::Class | Self::TemplateClass)
    }

    pub fn is_member(self) -> bool {
        matches!(self, Self::Constructor | Self::Method | Self::Field)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::TemplateClass => write!(f, "template_class"),
            Self::Constructor => write!(f, "constructor"),
            Self::Method => write!(f, "method"),
            Self::Field => write!(f, "field"),
            Self::FreeFunction => write!(f, "free_function"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Virtuality {
    #[default]
    None,
    Virtual,
    PureVirtual,
}

impl Virtuality {
    pub fn is_virtual(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

/// One entry of a callable's parameter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// A template parameter such as `DIM_B` in `template <int DIM_A, int DIM_B = DIM_A>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Weak reference to a base class, by spelling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRef {
    pub name: String,
    #[serde(default)]
    pub access: Access,
}

/// A single C++ entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationNode {
    pub qualified_name: String,
    pub kind: DeclKind,
    /// Owning class for members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    /// Return type for callables, value type for fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default)]
    pub virtuality: Virtuality,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_artificial: bool,
    #[serde(default)]
    pub template_params: Vec<TemplateParam>,
    #[serde(default)]
    pub bases: Vec<BaseRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl DeclarationNode {
    pub fn new(qualified_name: impl Into<String>, kind: DeclKind) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            kind,
            parent: None,
            params: Vec::new(),
            return_type: None,
            virtuality: Virtuality::None,
            access: Access::Public,
            is_const: false,
            is_static: false,
            is_artificial: false,
            template_params: Vec::new(),
            bases: Vec::new(),
            source_file: None,
        }
    }

    /// Unqualified name: the last `::` segment outside template brackets
    pub fn name(&self) -> &str {
        let mut depth = 0usize;
        let mut split = 0;
        let bytes = self.qualified_name.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'<' => depth += 1,
                b'>' => depth = depth.saturating_sub(1),
                b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                    split = i + 2;
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        &self.qualified_name[split..]
    }

    pub fn is_public(&self) -> bool {
        self.access == Access::Public
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Constructor | DeclKind::Method | DeclKind::FreeFunction
        )
    }

    /// Number of trailing parameters that carry a default value
    pub fn default_count(&self) -> usize {
        self.params
            .iter()
            .rev()
            .take_while(|p| p.default_value.is_some())
            .count()
    }

    /// Human readable signature used in diagnostics, e.g. `add(double i = 1.0)`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| {
                let mut s = p.type_name.clone();
                if !p.name.is_empty() {
                    s.push(' ');
                    s.push_str(&p.name);
                }
                if let Some(value) = &p.default_value {
                    s.push_str(" = ");
                    s.push_str(value);
                }
                s
            })
            .collect::<Vec<_>>()
            .join(", ");
        let constness = if self.is_const { " const" } else { "" };
        format!("{}({params}){constness}", self.qualified_name)
    }

    /// Every type spelling this node mentions in its signature
    pub fn signature_types(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(|p| p.type_name.as_str())
            .chain(self.return_type.as_deref())
    }

    fn check_default_order(&self) -> Result<()> {
        let mut seen_default = false;
        for param in &self.params {
            match (&param.default_value, seen_default) {
                (Some(_), _) => seen_default = true,
                (None, true) => {
                    return Err(GenerationError::invalid_model(
                        &self.qualified_name,
                        format!(
                            "parameter `{}` has no default value but follows a defaulted \
                             parameter in {}",
                            param.name,
                            self.signature()
                        ),
                    ));
                }
                (None, false) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default)]
    declarations: Vec<DeclarationNode>,
    #[serde(default)]
    external_types: Vec<String>,
}

/// Immutable, ordered collection of declarations
#[derive(Debug, Clone, Default)]
pub struct DeclarationModel {
    nodes: Vec<DeclarationNode>,
    external_types: FxHashSet<String>,
    by_name: FxHashMap<String, Vec<usize>>,
    members: FxHashMap<String, Vec<usize>>,
}

impl DeclarationModel {
    /// Build and validate a model from nodes in declaration order
    pub fn new(
        nodes: Vec<DeclarationNode>,
        external_types: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let mut by_name: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut members: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, node) in nodes.iter().enumerate() {
            by_name
                .entry(node.qualified_name.clone())
                .or_default()
                .push(idx);
            if let Some(parent) = &node.parent {
                members.entry(parent.clone()).or_default().push(idx);
            }
        }

        let model = Self {
            nodes,
            external_types: external_types
                .into_iter()
                .map(|t| cpp_types::template_base_name(&t))
                .collect(),
            by_name,
            members,
        };
        model.validate()?;
        debug!(
            "Loaded declaration model with {} declarations",
            model.nodes.len()
        );
        Ok(model)
    }

    pub fn from_json_str(source: &str, origin: &Path) -> Result<Self> {
        let raw: RawModel = serde_json::from_str(source).map_err(|e| GenerationError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::new(raw.declarations, raw.external_types)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source =
            std::fs::read_to_string(path).map_err(|e| GenerationError::io(path, e))?;
        Self::from_json_str(&source, path)
    }

    pub fn nodes(&self) -> &[DeclarationNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &DeclarationNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.by_name.contains_key(qualified_name)
    }

    /// All nodes sharing a qualified name, in declaration order
    pub fn lookup(&self, qualified_name: &str) -> impl Iterator<Item = (usize, &DeclarationNode)> {
        self.by_name
            .get(qualified_name)
            .into_iter()
            .flatten()
            .map(|&idx| (idx, &self.nodes[idx]))
    }

    /// The class or class template named `qualified_name`
    pub fn class(&self, qualified_name: &str) -> Option<(usize, &DeclarationNode)> {
        self.lookup(qualified_name)
            .find(|(_, node)| node.kind.is_class_like())
    }

    /// Members of a class, in declaration order
    pub fn members_of(&self, class_name: &str) -> impl Iterator<Item = (usize, &DeclarationNode)> {
        self.members
            .get(class_name)
            .into_iter()
            .flatten()
            .map(|&idx| (idx, &self.nodes[idx]))
    }

    pub fn is_external(&self, type_name: &str) -> bool {
        self.external_types
            .contains(&cpp_types::template_base_name(type_name))
    }

    fn validate(&self) -> Result<()> {
        for (qualified_name, indices) in &self.by_name {
            let classes = indices
                .iter()
                .filter(|&&idx| self.nodes[idx].kind.is_class_like())
                .count();
            if classes > 1 {
                return Err(GenerationError::invalid_model(
                    qualified_name,
                    "class declared more than once",
                ));
            }
        }

        for node in &self.nodes {
            if node.kind.is_member() {
                let Some(parent) = &node.parent else {
                    return Err(GenerationError::invalid_model(
                        &node.qualified_name,
                        format!("{} has no owning class", node.kind),
                    ));
                };
                if self.class(parent).is_none() {
                    return Err(GenerationError::invalid_model(
                        &node.qualified_name,
                        format!("owning class `{parent}` is not in the model"),
                    ));
                }
            }

            for base in &node.bases {
                let base_name = cpp_types::template_base_name(&base.name);
                if self.class(&base_name).is_none() && !self.is_external(&base_name) {
                    return Err(GenerationError::invalid_model(
                        &node.qualified_name,
                        format!(
                            "base `{}` is neither declared in the model nor listed as external",
                            base.name
                        ),
                    ));
                }
            }

            if !node.template_params.is_empty() && node.kind != DeclKind::TemplateClass {
                return Err(GenerationError::invalid_model(
                    &node.qualified_name,
                    "only class templates may declare template parameters",
                ));
            }

            node.check_default_order()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> DeclarationNode {
        DeclarationNode::new(name, DeclKind::Class)
    }

    fn method(owner: &str, name: &str) -> DeclarationNode {
        let mut node = DeclarationNode::new(format!("{owner}::{name}"), DeclKind::Method);
        node.parent = Some(owner.into());
        node.return_type = Some("void".into());
        node
    }

    #[test]
    fn test_short_name_ignores_template_scopes() {
        let node = class("geo::Mesh<geo::Point<2>>");
        assert_eq!(node.name(), "Mesh<geo::Point<2>>");
        assert_eq!(method("Shape", "GetArea").name(), "GetArea");
    }

    #[test]
    fn test_lookup_keeps_overloads_in_order() {
        let mut first = method("Shape", "Scale");
        first.params.push(Param::new("factor", "double"));
        let second = method("Shape", "Scale");
        let model =
            DeclarationModel::new(vec![class("Shape"), first, second], Vec::new()).expect("valid");

        let found: Vec<usize> = model.lookup("Shape::Scale").map(|(idx, _)| idx).collect();
        assert_eq!(found, vec![1, 2]);
        assert_eq!(model.members_of("Shape").count(), 2);
    }

    #[test]
    fn test_unknown_base_is_rejected_unless_external() {
        let mut derived = class("Derived");
        derived.bases.push(BaseRef {
            name: "vtkObject".into(),
            access: Access::Public,
        });

        let err = DeclarationModel::new(vec![derived.clone()], Vec::new()).unwrap_err();
        assert_eq!(err.kind(), "InvalidModel");

        let model = DeclarationModel::new(vec![derived], vec!["vtkObject".to_owned()]);
        assert!(model.is_ok());
    }

    #[test]
    fn test_default_must_extend_to_the_right() {
        let mut func = DeclarationNode::new("add", DeclKind::FreeFunction);
        func.params = vec![
            Param::new("i", "double").with_default("1.0"),
            Param::new("j", "double"),
        ];
        let err = DeclarationModel::new(vec![func], Vec::new()).unwrap_err();
        assert!(err.to_string().contains("follows a defaulted parameter"));
    }

    #[test]
    fn test_model_from_json() {
        let source = r#"{
            "declarations": [
                {"qualified_name": "Point", "kind": "template_class",
                 "template_params": [{"name": "DIM"}], "source_file": "Point.hpp"},
                {"qualified_name": "Point::GetLocation", "kind": "method", "parent": "Point",
                 "return_type": "double", "is_const": true,
                 "params": [{"name": "index", "type": "unsigned int"}]}
            ]
        }"#;
        let model = DeclarationModel::from_json_str(source, Path::new("model.json"))
            .expect("model parses");
        assert_eq!(model.len(), 2);
        let (_, point) = model.class("Point").expect("class present");
        assert_eq!(point.kind, DeclKind::TemplateClass);
        assert_eq!(point.template_params[0].name, "DIM");
    }
}
