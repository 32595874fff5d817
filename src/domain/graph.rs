//! Dependency graph for image builds
//!
//! Validates the `requires` relation (all references defined, no cycles)
//! and answers the two ordering queries the pipeline needs: the dependency
//! closure of a single build and a stable topological order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;

use super::build::Build;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("image {build} requires image {dependency}, which is not defined in configuration")]
    MissingDependency { build: String, dependency: String },

    #[error("dependency cycle exists: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Validates that every `requires` entry names a defined build and that the
/// relation contains no cycles.
///
/// A cycle is reported with the full traversal path from the first build
/// that reaches it, e.g. `foo -> bar -> foo`.
pub fn validate(builds: &[Build]) -> Result<(), GraphError> {
    let defined: BTreeSet<&str> = builds.iter().map(|b| b.name.as_str()).collect();
    for build in builds {
        for dep in &build.requires {
            if !defined.contains(dep.as_str()) {
                return Err(GraphError::MissingDependency {
                    build: build.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // First-level dependency lists, deduplicated for a bounded traversal.
    let mut deps: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for build in builds {
        let unique: BTreeSet<&str> = build.requires.iter().map(String::as_str).collect();
        deps.insert(&build.name, unique.into_iter().collect());
    }

    let mut cleared: BTreeSet<&str> = BTreeSet::new();
    let mut path: Vec<&str> = Vec::new();
    for build in builds {
        visit(&build.name, &deps, &mut path, &mut cleared)?;
    }
    Ok(())
}

// Depth-first walk with an explicit ancestor path. A name reappearing in its
// own path is a cycle; nodes fully explored without one are cleared and never
// walked again, which bounds the recursion depth by the number of builds.
fn visit<'a>(
    name: &'a str,
    deps: &BTreeMap<&str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    cleared: &mut BTreeSet<&'a str>,
) -> Result<(), GraphError> {
    path.push(name);
    if path[..path.len() - 1].contains(&name) {
        return Err(GraphError::Cycle {
            path: path.iter().map(|s| s.to_string()).collect(),
        });
    }
    if !cleared.contains(name) {
        for dep in deps.get(name).into_iter().flatten().copied() {
            visit(dep, deps, path, cleared)?;
        }
        cleared.insert(name);
    }
    path.pop();
    Ok(())
}

/// Returns the dependency closure of `build`: every build reachable through
/// `requires` edges, including `build` itself, sorted by name.
pub fn required_closure(build: &Build, all: &[Build]) -> Vec<Build> {
    let by_name: BTreeMap<&str, &Build> = all.iter().map(|b| (b.name.as_str(), b)).collect();

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(&build.name);
    queue.push_back(&build.name);
    while let Some(name) = queue.pop_front() {
        if let Some(current) = by_name.get(name) {
            for dep in &current.requires {
                if seen.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }
    }

    // BTreeSet iteration yields the name-sorted order.
    seen.iter()
        .filter_map(|name| by_name.get(name).map(|b| (*b).clone()))
        .collect()
}

/// Topologically sorts `builds` so every build appears after all builds it
/// directly or transitively requires.
///
/// The order is stable with respect to the input: builds with no ordering
/// constraint between them keep their original relative order. Builds are
/// visited in reverse input order, each build's reverse-dependents are
/// walked depth-first before the build itself is appended, and the
/// accumulated list is reversed at the end.
pub fn topological_sort(builds: &[Build]) -> Vec<Build> {
    let mut reverse_deps: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for build in builds {
        for dep in &build.requires {
            let dependents = reverse_deps.entry(dep).or_default();
            if !dependents.contains(&build.name.as_str()) {
                dependents.push(&build.name);
            }
        }
    }

    let by_name: BTreeMap<&str, &Build> = builds.iter().map(|b| (b.name.as_str(), b)).collect();
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut sorted: Vec<&Build> = Vec::new();
    for build in builds.iter().rev() {
        topo_visit(build, &by_name, &reverse_deps, &mut visited, &mut sorted);
    }
    sorted.reverse();
    sorted.into_iter().cloned().collect()
}

fn topo_visit<'a>(
    build: &'a Build,
    by_name: &BTreeMap<&str, &'a Build>,
    reverse_deps: &BTreeMap<&str, Vec<&'a str>>,
    visited: &mut BTreeSet<&'a str>,
    sorted: &mut Vec<&'a Build>,
) {
    if !visited.insert(&build.name) {
        return;
    }
    for dependent in reverse_deps
        .get(build.name.as_str())
        .into_iter()
        .flatten()
        .copied()
    {
        if let Some(&next) = by_name.get(dependent) {
            topo_visit(next, by_name, reverse_deps, visited, sorted);
        }
    }
    sorted.push(build);
}
