//! Template rendering environment
//!
//! Tags, tag suffixes, Dockerfile templates and loop-variable values are all
//! minijinja templates evaluated against a per-call [`RenderContext`]. The
//! context carries the build identifier, the current variable environment,
//! the tag registry and the current iteration indices; `None` indices mark
//! renders that happen outside any iteration, where `outer_idx()` and
//! `inner_idx()` are errors.
//!
//! Functions available inside templates:
//!
//! | Function | Meaning |
//! |----------|---------|
//! | `getenv(name)` | environment variable value, empty string if unset |
//! | `build_id()` | this run's build identifier |
//! | `tag(image, outer, inner)` | a tag recorded earlier in the run |
//! | `outer_idx()` / `inner_idx()` | current iteration indices |
//!
//! Variable substitution (`{{ name }}`) draws from the merged template and
//! loop variables; referencing an unbound variable is a render error.

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use thiserror::Error;

use crate::domain::{TagRegistry, VarMap};

#[derive(Debug, Error)]
#[error("template rendering failed: {0}")]
pub struct RenderError(#[from] minijinja::Error);

/// Everything a single template evaluation may observe
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub build_id: &'a str,
    pub vars: &'a VarMap,
    pub tags: &'a TagRegistry,
    pub outer_idx: Option<usize>,
    pub inner_idx: Option<usize>,
}

impl<'a> RenderContext<'a> {
    /// Context for renders that happen outside any iteration.
    pub fn unindexed(build_id: &'a str, vars: &'a VarMap, tags: &'a TagRegistry) -> Self {
        Self {
            build_id,
            vars,
            tags,
            outer_idx: None,
            inner_idx: None,
        }
    }

    /// Renders a template against this context.
    ///
    /// A fresh environment is built per call so that repeated renders with
    /// different contexts cannot observe each other's state.
    pub fn render(&self, template: &str) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_function("getenv", |name: String| {
            std::env::var(&name).unwrap_or_default()
        });

        let build_id = self.build_id.to_string();
        env.add_function("build_id", move || build_id.clone());

        let tags = self.tags.clone();
        env.add_function(
            "tag",
            move |image: String, outer: usize, inner: usize| -> Result<String, minijinja::Error> {
                tags.lookup(&image, outer, inner)
                    .map(str::to_string)
                    .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))
            },
        );

        let outer_idx = self.outer_idx;
        env.add_function("outer_idx", move || -> Result<usize, minijinja::Error> {
            outer_idx.ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    "outer_idx is not set in this context",
                )
            })
        });

        let inner_idx = self.inner_idx;
        env.add_function("inner_idx", move || -> Result<usize, minijinja::Error> {
            inner_idx.ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    "inner_idx is not set in this context",
                )
            })
        });

        Ok(env.render_str(template, self.vars)?)
    }
}
