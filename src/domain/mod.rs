//! Core model for the build pipeline
//!
//! Build definitions, the dependency graph and the tag registry, free of
//! any I/O concerns.

mod build;
pub mod graph;
mod registry;

pub use build::{Build, ForBindings, RunParams, ValidationError, VarMap};
pub use graph::GraphError;
pub use registry::{LookupError, TagRegistry};
