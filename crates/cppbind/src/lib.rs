//! cppbind: pybind11 registration code from a C++ declaration model
//!
//! The library runs the whole generation pipeline: it resolves a package
//! configuration against a declaration model into a wrap plan, orders it,
//! binds overloads and renders registration units. Publishing to disk is a
//! separate step so callers can inspect units first.

pub mod code_generator;
pub mod config;
pub mod cpp_types;
pub mod declarations;
pub mod dependency_graph;
pub mod errors;
pub mod orderer;
pub mod output;
pub mod overloads;
pub mod pipeline;
pub mod plan;
pub mod resolver;
pub mod rules;
pub mod templates;

#[cfg(test)]
mod test_support;

pub use errors::{GenerationError, Result};
pub use pipeline::{GeneratedPackage, generate};
