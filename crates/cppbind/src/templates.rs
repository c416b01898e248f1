//! Class template expansion
//!
//! Each requested argument tuple of a class template becomes an independent
//! concrete class: a fresh declaration node named after the instantiation,
//! with every template parameter reference in its signatures, default values
//! and base references replaced by the concrete argument.

use cow_utils::CowUtils;
use indexmap::IndexMap;
use log::trace;
use rustc_hash::FxHashMap;

use crate::{
    config::{ClassConfig, PackageConfig},
    cpp_types,
    declarations::{DeclKind, DeclarationModel, DeclarationNode},
    errors::{GenerationError, Result},
};

/// One concrete instantiation of a class template
#[derive(Debug, Clone)]
pub struct Instantiation {
    /// Position of the tuple in the requested tuple list
    pub position: usize,
    /// Complete argument list, defaults filled in
    pub args: Vec<String>,
    /// C++ spelling, e.g. `Point<2>`
    pub cpp_name: String,
    pub class: DeclarationNode,
    /// Members in declaration order, with their model index
    pub members: Vec<(usize, DeclarationNode)>,
}

/// Argument tuples requested for `template` by the class entry or by a
/// package-level substitution
pub fn requested_tuples(
    template: &DeclarationNode,
    class_config: &ClassConfig,
    config: &PackageConfig,
    rule: &str,
) -> Result<Vec<Vec<String>>> {
    let to_strings = |tuples: &[Vec<crate::config::TemplateArg>]| -> Vec<Vec<String>> {
        tuples
            .iter()
            .map(|tuple| tuple.iter().map(ToString::to_string).collect())
            .collect()
    };

    if !class_config.template_args.is_empty() {
        return Ok(to_strings(&class_config.template_args));
    }

    let params: Vec<&str> = template
        .template_params
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    if let Some(substitution) = config
        .template_substitutions
        .iter()
        .find(|s| s.params.iter().map(String::as_str).eq(params.iter().copied()))
    {
        return Ok(to_strings(&substitution.arguments));
    }

    Err(GenerationError::configuration(
        rule,
        format!(
            "class template `{}` needs `template_args` or a matching template substitution",
            template.qualified_name
        ),
    ))
}

/// Bind `args` to the template parameters, filling trailing defaults
///
/// Defaults may refer to earlier parameters (`DIM_B = DIM_A`).
pub fn bind_arguments(
    template: &DeclarationNode,
    args: &[String],
    rule: &str,
) -> Result<IndexMap<String, String>> {
    let params = &template.template_params;
    if args.len() > params.len() {
        return Err(GenerationError::configuration(
            rule,
            format!(
                "`{}` takes {} template argument(s) but {} were given",
                template.qualified_name,
                params.len(),
                args.len()
            ),
        ));
    }

    let mut bound: IndexMap<String, String> = IndexMap::with_capacity(params.len());
    for (position, param) in params.iter().enumerate() {
        let value = match (args.get(position), &param.default) {
            (Some(arg), _) => arg.trim().to_owned(),
            (None, Some(default)) => {
                let lookup: FxHashMap<&str, &str> = bound
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                cpp_types::substitute_identifiers(default, &lookup, template.name())
            }
            (None, None) => {
                return Err(GenerationError::configuration(
                    rule,
                    format!(
                        "template parameter `{}` of `{}` has no argument and no default",
                        param.name, template.qualified_name
                    ),
                ));
            }
        };
        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}

/// C++ spelling of an instantiation: `Foo<2, 2>`
pub fn instance_cpp_name(template: &str, args: &[String]) -> String {
    format!("{template}<{}>", args.join(", "))
}

fn tidy_component(text: &str, replacements: &IndexMap<String, String>) -> String {
    let mut name = text.to_owned();
    for (from, to) in replacements {
        let replaced = name.cow_replace(from.as_str(), to.as_str()).into_owned();
        name = replaced;
    }
    name.retain(|c| !matches!(c, '<' | '>' | ',' | ' '));
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if name.len() > 1 => first.to_uppercase().chain(chars).collect(),
        _ => name,
    }
}

/// Generated host name of an instantiation: `Foo_2_2`
pub fn instance_exposed_name(
    base_name: &str,
    args: &[String],
    replacements: &IndexMap<String, String>,
) -> String {
    let mut name = tidy_component(base_name, replacements);
    for arg in args {
        name.push('_');
        name.push_str(&tidy_component(arg, replacements));
    }
    name
}

/// Canonical spelling of a base reference after substitution
///
/// `Base<DIM>` inside `Derived<2>` becomes `Base<2, 2>` when `Base` declares
/// `template <int A, int B = A>`.
pub fn resolve_base(
    model: &DeclarationModel,
    spelling: &str,
    bindings: &IndexMap<String, String>,
    owner: &str,
) -> Result<String> {
    let lookup: FxHashMap<&str, &str> = bindings
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let substituted = cpp_types::substitute_identifiers(spelling, &lookup, owner);
    let normalized = cpp_types::normalize_type(&substituted);

    let Some((base_name, args)) = cpp_types::split_template_args(&normalized) else {
        return Ok(normalized);
    };
    match model.class(&base_name) {
        Some((_, base)) if base.kind == DeclKind::TemplateClass => {
            let full = bind_arguments(base, &args, &format!("base `{spelling}` of `{owner}`"))?;
            let values: Vec<String> = full.into_values().collect();
            Ok(instance_cpp_name(&base_name, &values))
        }
        _ => Ok(instance_cpp_name(&base_name, &args)),
    }
}

fn substitute_node(
    node: &DeclarationNode,
    lookup: &FxHashMap<&str, &str>,
    owner: &str,
) -> DeclarationNode {
    let mut concrete = node.clone();
    for param in &mut concrete.params {
        param.type_name = cpp_types::substitute_identifiers(&param.type_name, lookup, owner);
        if let Some(default) = &param.default_value {
            param.default_value = Some(cpp_types::substitute_identifiers(default, lookup, owner));
        }
    }
    if let Some(ret) = &concrete.return_type {
        concrete.return_type = Some(cpp_types::substitute_identifiers(ret, lookup, owner));
    }
    concrete
}

/// Expand `template` for one requested tuple
pub fn expand(
    model: &DeclarationModel,
    template: &DeclarationNode,
    position: usize,
    tuple: &[String],
    rule: &str,
) -> Result<Instantiation> {
    let bindings = bind_arguments(template, tuple, rule)?;
    let args: Vec<String> = bindings.values().cloned().collect();
    let cpp_name = instance_cpp_name(&template.qualified_name, &args);
    let owner = template.name();
    let lookup: FxHashMap<&str, &str> = bindings
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let mut class = template.clone();
    class.qualified_name = cpp_name.clone();
    class.kind = DeclKind::Class;
    class.template_params.clear();
    for base in &mut class.bases {
        base.name = resolve_base(model, &base.name, &bindings, owner)?;
    }

    let members = model
        .members_of(&template.qualified_name)
        .map(|(idx, member)| (idx, substitute_node(member, &lookup, owner)))
        .collect();

    trace!("Expanded {} as {cpp_name}", template.qualified_name);
    Ok(Instantiation {
        position,
        args,
        cpp_name,
        class,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DEFAULT_NAME_REPLACEMENTS,
        declarations::{Access, BaseRef, Param, TemplateParam},
    };

    fn replacements() -> IndexMap<String, String> {
        DEFAULT_NAME_REPLACEMENTS
            .iter()
            .map(|(a, b)| ((*a).to_owned(), (*b).to_owned()))
            .collect()
    }

    fn template(name: &str, params: &[(&str, Option<&str>)]) -> DeclarationNode {
        let mut node = DeclarationNode::new(name, DeclKind::TemplateClass);
        node.template_params = params
            .iter()
            .map(|(p, d)| TemplateParam {
                name: (*p).into(),
                default: d.map(Into::into),
            })
            .collect();
        node
    }

    fn model() -> DeclarationModel {
        let base = template("Base", &[("DIM_A", None), ("DIM_B", Some("DIM_A"))]);
        let mut derived = template("Derived", &[("DIM", None)]);
        derived.bases.push(BaseRef {
            name: "Base<DIM>".into(),
            access: Access::Public,
        });
        let mut method = DeclarationNode::new("Derived::Move", DeclKind::Method);
        method.parent = Some("Derived".into());
        method.return_type = Some("Point<DIM>".into());
        method.params = vec![
            Param::new("offset", "std::array<double, DIM> const &"),
            Param::new("dim", "unsigned int").with_default("Derived::DIM"),
        ];
        DeclarationModel::new(vec![base, derived, method], Vec::new()).expect("valid model")
    }

    #[test]
    fn test_defaults_reference_earlier_parameters() {
        let base = template("Base", &[("DIM_A", None), ("DIM_B", Some("DIM_A"))]);
        let bound = bind_arguments(&base, &["3".into()], "test").expect("binds");
        assert_eq!(bound.get("DIM_B").map(String::as_str), Some("3"));

        let err = bind_arguments(&base, &[], "test").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_instance_names() {
        let args = vec!["2".to_owned(), "2".to_owned()];
        assert_eq!(instance_cpp_name("Foo", &args), "Foo<2, 2>");
        assert_eq!(instance_exposed_name("Foo", &args, &replacements()), "Foo_2_2");
        assert_eq!(
            instance_exposed_name("mesh", &["unsigned int".to_owned()], &replacements()),
            "Mesh_Unsigned"
        );
    }

    #[test]
    fn test_expand_substitutes_members_and_bases() {
        let model = model();
        let (_, derived) = model.class("Derived").expect("template present");
        let instance = expand(&model, derived, 0, &["2".into()], "test").expect("expands");

        assert_eq!(instance.cpp_name, "Derived<2>");
        assert_eq!(instance.class.kind, DeclKind::Class);
        assert_eq!(instance.class.bases[0].name, "Base<2, 2>");

        let (_, method) = &instance.members[0];
        assert_eq!(method.return_type.as_deref(), Some("Point<2>"));
        assert_eq!(method.params[0].type_name, "std::array<double, 2> const &");
        assert_eq!(method.params[1].default_value.as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_tuples_are_a_configuration_error() {
        let model = model();
        let (_, derived) = model.class("Derived").expect("template present");
        let config = PackageConfig::from_toml_str("name = \"pkg\"", std::path::Path::new("p.toml"))
            .expect("config parses");
        let err = requested_tuples(derived, &ClassConfig::named("Derived"), &config, "classes")
            .unwrap_err();
        assert!(err.to_string().contains("template_args"));
    }
}
