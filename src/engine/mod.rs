//! # Build pipeline
//!
//! Drives every selected build through validation, iteration expansion,
//! template rendering and the requested action, strictly sequentially:
//! outer iterations, then builds in dependency order, then each build's
//! inner iterations. Tags are recorded per (build, outer iteration) as the
//! pipeline advances, so templates evaluated later in the run can reference
//! them through `tag()`.
//!
//! The first failure at any level aborts the run. External side effects of
//! already-completed steps (built or pushed images) are left in place.

mod action;
mod executor;
mod iter;

pub use action::{Action, Invocation};
pub use executor::{CommandExecutor, ExecError, Executor, NoopExecutor, PrintExecutor};
pub use iter::run_iterations;

use std::io::Write;

use anyhow::{bail, Context, Result};

use crate::domain::{Build, RunParams, TagRegistry, VarMap};
use crate::render::RenderContext;

/// Build identifier used when no build-id variable is set
pub const DEFAULT_BUILD_ID: &str = "unspecified";

/// Suffix template appended to tags unless the configuration overrides it
pub const DEFAULT_TAG_SUFFIX: &str = "-{{ build_id() }}";

/// A build paired with the executor that runs its external commands
pub struct PlannedBuild {
    pub build: Build,
    pub executor: Box<dyn Executor>,
}

impl std::fmt::Debug for PlannedBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedBuild")
            .field("build", &self.build)
            .finish_non_exhaustive()
    }
}

/// Runs `action` for every planned build and returns the accumulated tags.
///
/// `builds` must already be in dependency order (see
/// [`crate::domain::graph::topological_sort`]); the pipeline runs them
/// exactly in the order given.
pub fn run(
    action: Action,
    builds: &[PlannedBuild],
    params: &RunParams,
    out: &mut dyn Write,
) -> Result<TagRegistry> {
    params
        .validate(builds.iter().map(|p| &p.build))
        .context("invalid run parameters")?;

    let build_id = resolve_build_id(params);
    let tag_suffix = params
        .tag_suffix
        .clone()
        .unwrap_or_else(|| DEFAULT_TAG_SUFFIX.to_string());

    // Template variables render once, outside any iteration: no loop
    // variables, no recorded tags, no indices.
    let empty_vars = VarMap::new();
    let empty_tags = TagRegistry::new();
    let mut base_vars = VarMap::new();
    for (name, template) in &params.template_vars {
        let value = RenderContext::unindexed(&build_id, &empty_vars, &empty_tags)
            .render(template)
            .with_context(|| format!("failed to render template variable {name}"))?;
        base_vars.insert(name.clone(), value);
    }

    let mut state = RunState {
        action,
        build_id,
        tag_suffix,
        registry: TagRegistry::new(),
        out,
    };
    run_iterations(
        &mut state,
        &params.for_vars,
        &base_vars,
        RunState::render_loop_var,
        |state, outer_idx, vars| state.run_outer_pass(builds, outer_idx, vars),
    )?;
    Ok(state.registry)
}

fn resolve_build_id(params: &RunParams) -> String {
    params
        .build_id_var
        .as_deref()
        .filter(|name| !name.is_empty())
        .and_then(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BUILD_ID.to_string())
}

struct RunState<'a> {
    action: Action,
    build_id: String,
    tag_suffix: String,
    registry: TagRegistry,
    out: &'a mut dyn Write,
}

impl RunState<'_> {
    // Loop-variable values render without iteration indices, like one-off
    // template variables, but with previously recorded tags visible.
    fn render_loop_var(&mut self, template: &str, vars: &VarMap) -> Result<String> {
        Ok(RenderContext::unindexed(&self.build_id, vars, &self.registry).render(template)?)
    }

    fn run_outer_pass(
        &mut self,
        builds: &[PlannedBuild],
        outer_idx: usize,
        vars: &VarMap,
    ) -> Result<()> {
        for planned in builds {
            let tags = self
                .run_build(planned, outer_idx, vars)
                .with_context(|| format!("failed to run build {}", planned.build.name))?;
            self.registry.record(&planned.build.name, tags);
        }
        Ok(())
    }

    /// Runs one build's inner iterations for the given outer index and
    /// returns the tags rendered for them, in inner-iteration order.
    fn run_build(
        &mut self,
        planned: &PlannedBuild,
        outer_idx: usize,
        vars: &VarMap,
    ) -> Result<Vec<String>> {
        let mut tags = Vec::new();
        run_iterations(
            self,
            &planned.build.for_vars,
            vars,
            Self::render_loop_var,
            |state, inner_idx, vars| {
                let tag = state.render_tag(&planned.build, vars, outer_idx, inner_idx)?;
                tags.push(tag.clone());

                let action = state.action;
                let mut invocation = Invocation {
                    build: &planned.build,
                    executor: planned.executor.as_ref(),
                    tag: &tag,
                    build_id: &state.build_id,
                    vars,
                    tags: &state.registry,
                    outer_idx,
                    inner_idx,
                    out: &mut *state.out,
                };
                action.invoke(&mut invocation)
            },
        )?;
        Ok(tags)
    }

    fn render_tag(
        &self,
        build: &Build,
        vars: &VarMap,
        outer_idx: usize,
        inner_idx: usize,
    ) -> Result<String> {
        let ctx = RenderContext {
            build_id: &self.build_id,
            vars,
            tags: &self.registry,
            outer_idx: Some(outer_idx),
            inner_idx: Some(inner_idx),
        };
        let tag = ctx
            .render(&build.tag)
            .context("failed to render tag template")?;
        let suffix = ctx
            .render(&self.tag_suffix)
            .context("failed to render tag suffix template")?;

        let full = format!("{tag}{suffix}");
        if full.is_empty() {
            bail!("rendered tag must be non-empty");
        }
        Ok(full)
    }
}
