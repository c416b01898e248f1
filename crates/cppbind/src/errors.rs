//! Structured failures surfaced by a generation run
//!
//! Every stage fails fast with exactly one of these. The variants carry the
//! qualified names, rules and signatures a user needs to fix their input.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the generation pipeline
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors that can terminate a generation run
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A configuration rule references a missing or ambiguous entity,
    /// or a policy contradicts the declarations it applies to.
    #[error("configuration error in rule `{rule}`: {message}")]
    Configuration { rule: String, message: String },

    /// The declaration model violates one of its own invariants.
    #[error("invalid declaration model at `{name}`: {message}")]
    InvalidModel { name: String, message: String },

    /// Registration order cannot be satisfied.
    #[error("dependency cycle between {}", members.join(" -> "))]
    Cycle { members: Vec<String> },

    /// Two overloads cannot be told apart by any cast we could emit.
    #[error(
        "ambiguous overload for `{name}`: `{first}` and `{second}` are indistinguishable{}",
        arity.map(|n| format!(" when called with {n} argument(s)")).unwrap_or_default()
    )]
    AmbiguousOverload {
        name: String,
        first: String,
        second: String,
        arity: Option<usize>,
    },

    /// A caster cannot accept a host value for the opaque type.
    #[error("type mismatch for opaque type `{opaque_type}` used by `{used_by}`: {message}")]
    TypeMismatch {
        opaque_type: String,
        used_by: String,
        message: String,
    },

    /// A caster cannot produce a host value under the requested policy.
    #[error(
        "ownership error for opaque type `{opaque_type}` returned by `{used_by}`: policy \
         `{policy}` is not supported"
    )]
    Ownership {
        opaque_type: String,
        used_by: String,
        policy: String,
    },

    /// Reading or parsing an input document failed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Writing output failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenerationError {
    pub fn configuration(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn invalid_model(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::InvalidModel { .. } => "InvalidModel",
            Self::Cycle { .. } => "CycleError",
            Self::AmbiguousOverload { .. } => "AmbiguousOverloadError",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::Ownership { .. } => "OwnershipError",
            Self::Parse { .. } => "ParseError",
            Self::Io { .. } => "IoError",
        }
    }
}
