//! Shorthand constructors for unit tests

use std::path::Path;

use indexmap::IndexSet;

use crate::{
    config::{HolderStrategy, PackageConfig},
    declarations::{
        Access, BaseRef, DeclKind, DeclarationModel, DeclarationNode, Param, TemplateParam,
        Virtuality,
    },
    plan::{
        Capabilities, ClassPlan, DeclarationOrder, EmissionPolicy, EntryId, EntryKind, Holder,
        WrapPlanEntry,
    },
};

pub fn class(name: &str, bases: &[&str]) -> DeclarationNode {
    let mut node = DeclarationNode::new(name, DeclKind::Class);
    node.source_file = Some(format!("src/{name}.hpp"));
    node.bases = bases
        .iter()
        .map(|b| BaseRef {
            name: (*b).into(),
            access: Access::Public,
        })
        .collect();
    node
}

pub fn template(name: &str, params: &[(&str, Option<&str>)], bases: &[&str]) -> DeclarationNode {
    let mut node = class(name, bases);
    node.kind = DeclKind::TemplateClass;
    node.template_params = params
        .iter()
        .map(|(p, d)| TemplateParam {
            name: (*p).into(),
            default: d.map(Into::into),
        })
        .collect();
    node
}

pub fn method(owner: &str, name: &str, ret: &str, params: &[(&str, &str)]) -> DeclarationNode {
    let mut node = DeclarationNode::new(format!("{owner}::{name}"), DeclKind::Method);
    node.parent = Some(owner.into());
    node.return_type = Some(ret.into());
    node.params = params.iter().map(|(n, t)| Param::new(*n, *t)).collect();
    node
}

pub fn virtual_method(
    owner: &str,
    name: &str,
    ret: &str,
    params: &[(&str, &str)],
    virtuality: Virtuality,
) -> DeclarationNode {
    let mut node = method(owner, name, ret, params);
    node.virtuality = virtuality;
    node
}

pub fn constructor(owner: &str, params: &[(&str, &str)]) -> DeclarationNode {
    let short = owner.rsplit("::").next().unwrap_or(owner);
    let mut node = DeclarationNode::new(format!("{owner}::{short}"), DeclKind::Constructor);
    node.parent = Some(owner.into());
    node.params = params.iter().map(|(n, t)| Param::new(*n, *t)).collect();
    node
}

pub fn field(owner: &str, name: &str, field_type: &str) -> DeclarationNode {
    let mut node = DeclarationNode::new(format!("{owner}::{name}"), DeclKind::Field);
    node.parent = Some(owner.into());
    node.return_type = Some(field_type.into());
    node
}

pub fn function(name: &str, ret: &str, params: &[Param]) -> DeclarationNode {
    let mut node = DeclarationNode::new(name, DeclKind::FreeFunction);
    node.return_type = Some(ret.into());
    node.params = params.to_vec();
    node.source_file = Some("src/functions.hpp".into());
    node
}

pub fn model(nodes: Vec<DeclarationNode>) -> DeclarationModel {
    model_with_external(nodes, &[])
}

pub fn model_with_external(nodes: Vec<DeclarationNode>, external: &[&str]) -> DeclarationModel {
    DeclarationModel::new(nodes, external.iter().map(|e| (*e).to_owned())).expect("valid model")
}

pub fn config(source: &str) -> PackageConfig {
    PackageConfig::from_toml_str(source, Path::new("package.toml")).expect("valid config")
}

/// Declarations for `Base` (pure virtual `scale`) and `Derived` (overrides it)
pub fn shapes_model() -> DeclarationModel {
    model(vec![
        class("Base", &[]),
        virtual_method("Base", "scale", "void", &[("factor", "double")], Virtuality::PureVirtual),
        class("Derived", &["Base"]),
        constructor("Derived", &[]),
        virtual_method("Derived", "scale", "void", &[("factor", "double")], Virtuality::Virtual),
    ])
}

/// A class entry with an empty surface and the default holder
pub fn class_entry(module: &str, cpp_name: &str, exposed: &str) -> WrapPlanEntry {
    WrapPlanEntry {
        id: EntryId::new(0),
        qualified_name: cpp_name.into(),
        cpp_name: cpp_name.into(),
        exposed_name: exposed.into(),
        module: module.into(),
        declaration_order: DeclarationOrder {
            index: 0,
            instance: 0,
        },
        includes: Vec::new(),
        casters: IndexSet::new(),
        capabilities: Capabilities::default(),
        policy: EmissionPolicy::default(),
        kind: EntryKind::Class(ClassPlan {
            holder: Holder {
                strategy: HolderStrategy::Shared,
                smart_ptr: None,
            },
            trampoline: None,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            bases: Vec::new(),
            template: None,
            prefix_code: Vec::new(),
            suffix_code: Vec::new(),
        }),
    }
}
