//! Tests for wrap plan module

use super::*;
use crate::{plan::builder::WrapPlanBuilder, test_support::class_entry};

#[test]
fn test_wrap_plan_creation() {
    let plan = WrapPlan::new(PackageInfo::default());
    assert!(plan.entries.is_empty());
    assert!(plan.casters.is_empty());
    assert!(plan.modules.is_empty());
}

#[test]
fn test_builder_assigns_ids_and_links_bases() {
    let mut builder = WrapPlanBuilder::new(PackageInfo::default());
    builder.add_module("shapes");
    let base = builder
        .add_entry(class_entry("shapes", "Shape", "Shape"))
        .expect("first entry");
    let derived = builder
        .add_entry(class_entry("shapes", "Rectangle", "Rectangle"))
        .expect("second entry");
    builder.link_base(derived, base).link_base(derived, base);

    let plan = builder.build();
    assert_eq!(plan.entry(derived).id, derived);
    assert_eq!(
        plan.entry(derived).as_class().map(|c| c.bases.clone()),
        Some(vec![BaseLink {
            cpp_name: "Shape".into(),
            entry: base,
        }])
    );
    assert_eq!(plan.entry(base).register_function(), "register_Shape_class");
}

#[test]
fn test_duplicate_exposed_name_is_rejected() {
    let mut builder = WrapPlanBuilder::new(PackageInfo::default());
    builder
        .add_entry(class_entry("shapes", "Point<2>", "Point"))
        .expect("first entry");
    let err = builder
        .add_entry(class_entry("shapes", "Point<3>", "Point"))
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
}

#[test]
fn test_holder_spelling() {
    let custom = Holder {
        strategy: HolderStrategy::Shared,
        smart_ptr: Some("boost::shared_ptr".into()),
    };
    assert_eq!(custom.spelling("Shape"), "boost::shared_ptr<Shape>");
    assert!(custom.needs_declaration());

    let raw = Holder {
        strategy: HolderStrategy::RawReference,
        smart_ptr: None,
    };
    assert_eq!(raw.spelling("Shape"), "std::unique_ptr<Shape, py::nodelete>");
    assert!(!raw.needs_declaration());
}
