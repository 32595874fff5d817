//! Build selection and executor assignment
//!
//! Resolves user-requested image names against the configuration, expands
//! the selection to its dependency closure, orders it for execution and
//! decides which executor each build gets.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::domain::{graph, Build};
use crate::engine::{CommandExecutor, Executor, NoopExecutor, PlannedBuild, PrintExecutor};

#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    #[error("the following images are not defined in configuration: {}; valid images: {}", missing.join(", "), valid.join(", "))]
    UnknownImages {
        missing: Vec<String>,
        valid: Vec<String>,
    },
}

/// How external commands should run for this invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Print commands instead of running them
    pub dry_run: bool,
    /// Skip external commands for builds pulled in only as dependencies
    pub no_deps: bool,
}

/// Plans the set of builds to run.
///
/// An empty `requested` list selects every build. Unknown names are
/// reported all at once, sorted, together with the sorted list of valid
/// names. The requested builds are expanded to their dependency closure,
/// kept in configuration order and topologically sorted. Builds present
/// only as dependencies get a no-op executor when `no_deps` is set; they
/// still run through the pipeline so their tags get recorded.
pub fn plan(
    all: &[Build],
    requested: &[String],
    options: SelectOptions,
) -> Result<Vec<PlannedBuild>, SelectError> {
    let defined: BTreeSet<&str> = all.iter().map(|b| b.name.as_str()).collect();

    let missing: Vec<String> = requested
        .iter()
        .filter(|name| !defined.contains(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        let mut missing = missing;
        missing.sort();
        missing.dedup();
        return Err(SelectError::UnknownImages {
            missing,
            valid: defined.iter().map(|name| name.to_string()).collect(),
        });
    }

    let requested_names: BTreeSet<&str> = if requested.is_empty() {
        defined.clone()
    } else {
        requested.iter().map(String::as_str).collect()
    };

    let mut selected: BTreeSet<String> = BTreeSet::new();
    for build in all.iter().filter(|b| requested_names.contains(b.name.as_str())) {
        for dep in graph::required_closure(build, all) {
            selected.insert(dep.name);
        }
    }

    // Filter in configuration order so topological ties break the same way
    // they would for a full run.
    let ordered: Vec<Build> = all
        .iter()
        .filter(|b| selected.contains(&b.name))
        .cloned()
        .collect();

    Ok(graph::topological_sort(&ordered)
        .into_iter()
        .map(|build| {
            let dependency_only = !requested_names.contains(build.name.as_str());
            let executor: Box<dyn Executor> = if options.no_deps && dependency_only {
                Box::new(NoopExecutor)
            } else if options.dry_run {
                Box::new(PrintExecutor)
            } else {
                Box::new(CommandExecutor)
            };
            PlannedBuild { build, executor }
        })
        .collect())
}
