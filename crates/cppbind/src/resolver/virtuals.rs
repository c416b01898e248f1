//! Virtual surface of a class
//!
//! The surface is every virtual method a host-side subclass could override:
//! the class's own virtual and pure virtual methods plus those inherited from
//! any ancestor and not redeclared on the way down. The most derived
//! declaration of a signature wins, so a concrete override of an inherited
//! pure virtual is forwarded as a plain virtual.

use rustc_hash::FxHashSet;

use crate::{
    cpp_types,
    declarations::{Access, DeclKind, DeclarationModel, DeclarationNode, Virtuality},
    errors::Result,
    templates,
};

/// A class node together with its (substituted) members
#[derive(Debug, Clone)]
pub struct ClassView {
    pub class: DeclarationNode,
    pub members: Vec<DeclarationNode>,
}

/// Identity of a method for override purposes
fn override_key(method: &DeclarationNode) -> (String, Vec<String>, bool) {
    (
        method.name().to_owned(),
        method
            .params
            .iter()
            .map(|p| cpp_types::strip_top_level_const(&p.type_name))
            .collect(),
        method.is_const,
    )
}

/// Look up a base by its canonical spelling, expanding template instances
pub fn base_view(model: &DeclarationModel, spelling: &str) -> Result<Option<ClassView>> {
    if let Some((name, args)) = cpp_types::split_template_args(spelling)
        && let Some((_, template)) = model.class(&name)
        && template.kind == DeclKind::TemplateClass
    {
        let instance = templates::expand(
            model,
            template,
            0,
            &args,
            &format!("base `{spelling}`"),
        )?;
        return Ok(Some(ClassView {
            class: instance.class,
            members: instance.members.into_iter().map(|(_, m)| m).collect(),
        }));
    }

    let Some((_, class)) = model.class(spelling) else {
        return Ok(None);
    };
    let mut class = class.clone();
    for base in &mut class.bases {
        base.name = templates::resolve_base(model, &base.name, &Default::default(), "")?;
    }
    let members = model
        .members_of(spelling)
        .map(|(_, m)| m.clone())
        .collect();
    Ok(Some(ClassView { class, members }))
}

/// Walk `view` and its ancestors depth first, left to right, calling `visit`
/// for each class exactly once.
fn walk(
    model: &DeclarationModel,
    view: &ClassView,
    visited: &mut FxHashSet<String>,
    visit: &mut dyn FnMut(&ClassView),
) -> Result<()> {
    if !visited.insert(view.class.qualified_name.clone()) {
        return Ok(());
    }
    visit(view);
    for base in &view.class.bases {
        if let Some(base_view) = base_view(model, &base.name)? {
            walk(model, &base_view, visited, visit)?;
        }
    }
    Ok(())
}

/// Virtual methods of `view` and its ancestors, most derived declaration first
///
/// With `include_private` false, private virtuals are left out of the result
/// but still hide inherited declarations of the same signature.
pub fn collect_virtuals(
    model: &DeclarationModel,
    view: &ClassView,
    include_private: bool,
) -> Result<Vec<DeclarationNode>> {
    let mut seen = FxHashSet::default();
    let mut surface = Vec::new();
    let mut visited = FxHashSet::default();
    walk(model, view, &mut visited, &mut |class| {
        for method in class.members.iter().filter(|m| m.kind == DeclKind::Method) {
            if !seen.insert(override_key(method)) {
                continue;
            }
            let hidden = !include_private && method.access == Access::Private;
            if method.virtuality.is_virtual() && !hidden {
                surface.push(method.clone());
            }
        }
    })?;
    Ok(surface)
}

/// Whether a pure virtual remains without a concrete override
pub fn is_abstract(model: &DeclarationModel, view: &ClassView) -> Result<bool> {
    Ok(collect_virtuals(model, view, true)?
        .iter()
        .any(|m| m.virtuality == Virtuality::PureVirtual))
}

/// Whether any ancestor of `view` is abstract on its own
pub fn has_abstract_ancestor(model: &DeclarationModel, view: &ClassView) -> Result<bool> {
    let mut ancestors = Vec::new();
    let mut visited = FxHashSet::default();
    walk(model, view, &mut visited, &mut |class| {
        ancestors.push(class.clone());
    })?;
    for ancestor in ancestors.iter().skip(1) {
        if is_abstract(model, ancestor)? {
            return Ok(true);
        }
    }
    Ok(false)
}
