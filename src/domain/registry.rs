//! Accumulated tag registry
//!
//! Maps build name -> outer iterations -> inner tag lists. The pipeline
//! appends one outer entry per build as that build finishes an outer
//! iteration; later template evaluations read the registry through the
//! `tag()` function. Entries are never mutated after being recorded.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("unknown image name {0}")]
    UnknownImage(String),

    #[error("outer index out of bounds: requested {requested}, have {available}")]
    OuterOutOfBounds { requested: usize, available: usize },

    #[error("inner index out of bounds: requested {requested}, have {available}")]
    InnerOutOfBounds { requested: usize, available: usize },
}

/// Tags recorded so far in a run, keyed by build name and iteration position
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagRegistry {
    entries: BTreeMap<String, Vec<Vec<String>>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the inner tag list for the next outer iteration of `build`.
    ///
    /// Index `j` of `tags` corresponds to inner iteration `j`; the appended
    /// list becomes the build's next outer index.
    pub fn record(&mut self, build: &str, tags: Vec<String>) {
        self.entries.entry(build.to_string()).or_default().push(tags);
    }

    /// Looks up the tag recorded for `build` at the given iteration indices.
    pub fn lookup(&self, build: &str, outer: usize, inner: usize) -> Result<&str, LookupError> {
        let outers = self
            .entries
            .get(build)
            .ok_or_else(|| LookupError::UnknownImage(build.to_string()))?;
        let inners = outers.get(outer).ok_or(LookupError::OuterOutOfBounds {
            requested: outer,
            available: outers.len(),
        })?;
        inners
            .get(inner)
            .map(String::as_str)
            .ok_or(LookupError::InnerOutOfBounds {
                requested: inner,
                available: inners.len(),
            })
    }

    /// Returns true if no tags have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over recorded builds in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<String>])> {
        self.entries.iter().map(|(name, outers)| (name.as_str(), outers.as_slice()))
    }
}
