//! Build definitions and run-wide parameters
//!
//! A [`Build`] is a named, independently taggable image definition with
//! optional dependencies and its own loop variables. [`RunParams`] carries
//! the run-wide configuration shared by every build in a run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Variable environment passed to template rendering
pub type VarMap = BTreeMap<String, String>;

/// `for` loop bindings: variable name -> one value template per iteration
///
/// A `BTreeMap` fixes the evaluation order of loop variables within one
/// iteration to lexicographic name order.
pub type ForBindings = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("the following variables are defined as both template and 'for' variables: {}", names.join(", "))]
    CollidingVariables { names: Vec<String> },

    #[error("length of all '{scope}' for-variable lists must be the same: {}", describe_lengths(lengths))]
    LengthMismatch {
        scope: String,
        lengths: Vec<(String, usize)>,
    },
}

fn describe_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name}: {len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single image build definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Build {
    /// Unique name, referenced by `requires` lists and `tag()` lookups
    pub name: String,
    /// Path to the Dockerfile template rendered for this build
    pub docker_template: PathBuf,
    /// Tag template; the run-wide suffix is appended to its output
    pub tag: String,
    /// Per-build ("inner") loop variables
    pub for_vars: ForBindings,
    /// Names of builds that must run before this one
    pub requires: Vec<String>,
}

impl Build {
    /// Checks that this build's `for` lists all have the same length.
    pub fn validate_bindings(&self) -> Result<(), ValidationError> {
        check_equal_lengths(&self.name, &self.for_vars)
    }
}

/// Run-wide parameters shared by all builds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunParams {
    /// Environment variable holding the build identifier for this run
    pub build_id_var: Option<String>,
    /// Variables rendered once per run and exposed to all templates
    pub template_vars: VarMap,
    /// Template appended to every rendered tag; `None` selects the default
    pub tag_suffix: Option<String>,
    /// Run-wide ("outer") loop variables applied to every build
    pub for_vars: ForBindings,
}

impl RunParams {
    /// Validates the run-wide invariants against the builds taking part in
    /// the run: every `for` map (outer and per-build) has equal-length
    /// lists, and no variable is bound both as a template variable and as a
    /// loop variable.
    pub fn validate<'a>(
        &self,
        builds: impl IntoIterator<Item = &'a Build>,
    ) -> Result<(), ValidationError> {
        let builds: Vec<&Build> = builds.into_iter().collect();

        let colliding: Vec<String> = self
            .template_vars
            .keys()
            .filter(|name| {
                self.for_vars.contains_key(*name)
                    || builds.iter().any(|b| b.for_vars.contains_key(*name))
            })
            .cloned()
            .collect();
        if !colliding.is_empty() {
            return Err(ValidationError::CollidingVariables { names: colliding });
        }

        check_equal_lengths("outer", &self.for_vars)?;
        for build in builds {
            build.validate_bindings()?;
        }
        Ok(())
    }
}

fn check_equal_lengths(scope: &str, bindings: &ForBindings) -> Result<(), ValidationError> {
    let mut expected = None;
    for values in bindings.values() {
        match expected {
            None => expected = Some(values.len()),
            Some(len) if len != values.len() => {
                return Err(ValidationError::LengthMismatch {
                    scope: scope.to_string(),
                    lengths: bindings
                        .iter()
                        .map(|(name, values)| (name.clone(), values.len()))
                        .collect(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}
