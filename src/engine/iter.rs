//! Iteration expansion for `for` bindings
//!
//! Replays a body once per iteration index, rendering loop-variable value
//! templates into the variable environment as each index begins. The
//! pipeline uses this twice: once for the run-wide outer bindings and once
//! per build for its inner bindings.

use anyhow::{Context, Result};

use crate::domain::{ForBindings, VarMap};

/// Runs `body` once per iteration of `bindings`.
///
/// With no bindings the body runs exactly once at index 0 with an unmodified
/// copy of `vars`. Otherwise the shared list length (pre-validated equal)
/// determines the iteration count; at each index every binding's value
/// template is rendered in lexicographic variable order against the current
/// accumulated environment, so later variables may reference ones rendered
/// earlier in the same pass. The caller's `vars` is never modified.
///
/// `ctx` threads mutable caller state through both closures. The first
/// render or body error aborts the remaining iterations.
pub fn run_iterations<C>(
    ctx: &mut C,
    bindings: &ForBindings,
    vars: &VarMap,
    render: impl Fn(&mut C, &str, &VarMap) -> Result<String>,
    mut body: impl FnMut(&mut C, usize, &VarMap) -> Result<()>,
) -> Result<()> {
    let mut vars = vars.clone();

    if bindings.is_empty() {
        return body(ctx, 0, &vars);
    }

    let count = bindings.values().next().map_or(0, Vec::len);
    for i in 0..count {
        for (name, values) in bindings {
            let value = render(ctx, &values[i], &vars)
                .with_context(|| format!("failed to render 'for' variable {name} at index {i}"))?;
            vars.insert(name.clone(), value);
        }
        body(ctx, i, &vars)?;
    }
    Ok(())
}
