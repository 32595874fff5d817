//! Bakery CLI - declarative Docker image building
//!
//! Bakery turns a YAML description of image builds (Dockerfile templates,
//! tag templates, dependencies, loop variables) into a deterministic,
//! dependency-ordered sequence of `docker build` / `docker push`
//! invocations, with every template able to reference the tags of images
//! built earlier in the run.

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod render;

pub use domain::{Build, RunParams, TagRegistry};
pub use engine::{Action, PlannedBuild};
