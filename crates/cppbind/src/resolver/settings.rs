//! Settings resolved across the package, module and class levels

use cow_utils::CowUtils;

use crate::{
    config::{ReturnValuePolicy, Settings},
    cpp_types,
    declarations::DeclarationNode,
    plan::EmissionPolicy,
};

/// A type spelling with every space removed, the form exclusion lists are
/// compared in
pub fn squash(spelling: &str) -> String {
    cpp_types::normalize_type(spelling)
        .cow_replace(" ", "")
        .into_owned()
}

/// `std::vector<int> const &` reduced to `std::vector<int>`
fn squash_bare(spelling: &str) -> String {
    let mut bare = squash(spelling);
    loop {
        let trimmed = bare
            .trim_end_matches(['&', '*'])
            .trim_end_matches("const")
            .trim_start_matches("const");
        if trimmed.len() == bare.len() {
            return bare;
        }
        bare = trimmed.to_owned();
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScopeSettings {
    pub source_includes: Vec<String>,
    pub smart_ptr_type: Option<String>,
    pub exclude_default_args: bool,
    pub pointer_call_policy: Option<ReturnValuePolicy>,
    pub reference_call_policy: Option<ReturnValuePolicy>,
    calldef_excludes: Vec<String>,
    return_type_excludes: Vec<String>,
    arg_type_excludes: Vec<String>,
    constructor_arg_type_excludes: Vec<String>,
    constructor_signature_excludes: Vec<Vec<String>>,
}

impl ScopeSettings {
    /// Merge levels from least to most specific
    pub fn gather(levels: &[&Settings]) -> Self {
        let mut merged = Self::default();
        for level in levels {
            merged
                .source_includes
                .extend(level.source_includes.iter().cloned());
            if level.smart_ptr_type.is_some() {
                merged.smart_ptr_type.clone_from(&level.smart_ptr_type);
            }
            if let Some(value) = level.exclude_default_args {
                merged.exclude_default_args = value;
            }
            merged.pointer_call_policy = level.pointer_call_policy.or(merged.pointer_call_policy);
            merged.reference_call_policy =
                level.reference_call_policy.or(merged.reference_call_policy);
            merged
                .calldef_excludes
                .extend(level.calldef_excludes.iter().map(|t| squash(t)));
            merged
                .return_type_excludes
                .extend(level.return_type_excludes.iter().map(|t| squash(t)));
            merged
                .arg_type_excludes
                .extend(level.arg_type_excludes.iter().map(|t| squash(t)));
            merged
                .constructor_arg_type_excludes
                .extend(level.constructor_arg_type_excludes.iter().map(|t| squash(t)));
            merged.constructor_signature_excludes.extend(
                level
                    .constructor_signature_excludes
                    .iter()
                    .map(|sig| sig.iter().map(|t| squash(t)).collect()),
            );
        }
        merged
    }

    pub fn emission_policy(&self) -> EmissionPolicy {
        EmissionPolicy {
            exclude_default_args: self.exclude_default_args,
            pointer_call_policy: self.pointer_call_policy,
            reference_call_policy: self.reference_call_policy,
        }
    }

    /// Call policy for a callable returning `return_type`
    pub fn call_policy(&self, return_type: Option<&str>) -> Option<ReturnValuePolicy> {
        let ret = return_type?;
        if cpp_types::is_pointer(ret) {
            self.pointer_call_policy
        } else if cpp_types::is_reference(ret) {
            self.reference_call_policy
        } else {
            None
        }
    }

    /// Name of the exclusion list that drops this method or free function
    pub fn callable_exclusion(&self, node: &DeclarationNode) -> Option<&'static str> {
        if let Some(ret) = &node.return_type {
            let ret = squash(ret);
            if self.calldef_excludes.contains(&ret) {
                return Some("calldef_excludes");
            }
            if self.return_type_excludes.contains(&ret) {
                return Some("return_type_excludes");
            }
        }
        for param in &node.params {
            let full = squash(&param.type_name);
            let bare = squash_bare(&param.type_name);
            if self.calldef_excludes.contains(&full) || self.calldef_excludes.contains(&bare) {
                return Some("calldef_excludes");
            }
            if self.arg_type_excludes.contains(&full) || self.arg_type_excludes.contains(&bare) {
                return Some("arg_type_excludes");
            }
        }
        None
    }

    /// Name of the rule that drops this constructor, if any
    pub fn constructor_exclusion(&self, node: &DeclarationNode) -> Option<&'static str> {
        let signature: Vec<String> = node.params.iter().map(|p| squash(&p.type_name)).collect();
        for arg in &signature {
            if arg.cow_to_lowercase().contains("iterator") {
                return Some("iterator argument");
            }
            if self.calldef_excludes.contains(arg) {
                return Some("calldef_excludes");
            }
            if self
                .constructor_arg_type_excludes
                .iter()
                .any(|excluded| arg.contains(excluded.as_str()))
            {
                return Some("constructor_arg_type_excludes");
            }
        }
        if self.constructor_signature_excludes.contains(&signature) {
            return Some("constructor_signature_excludes");
        }
        None
    }
}
