//! Actions dispatched per rendered tag
//!
//! The pipeline is identical for every action; only the per-iteration step
//! differs. The set is closed, so it is a plain enum dispatching over one
//! shared parameter struct rather than open-ended trait dispatch.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::domain::{Build, TagRegistry, VarMap};
use crate::render::RenderContext;

use super::executor::Executor;

/// What to do with each fully rendered tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Render the Dockerfile template and run `docker build`
    Build,
    /// Run `docker push` for the tag
    Push,
    /// Write the tag to the output sink
    PrintTag,
}

/// Parameters shared by every action invocation
pub struct Invocation<'a> {
    pub build: &'a Build,
    pub executor: &'a dyn Executor,
    pub tag: &'a str,
    pub build_id: &'a str,
    pub vars: &'a VarMap,
    pub tags: &'a TagRegistry,
    pub outer_idx: usize,
    pub inner_idx: usize,
    pub out: &'a mut dyn Write,
}

impl Action {
    pub fn invoke(self, inv: &mut Invocation<'_>) -> Result<()> {
        match self {
            Action::Build => build_image(inv),
            Action::Push => push_image(inv),
            Action::PrintTag => {
                writeln!(inv.out, "{}", inv.tag)?;
                Ok(())
            }
        }
    }
}

fn build_image(inv: &mut Invocation<'_>) -> Result<()> {
    let template_path = &inv.build.docker_template;
    if template_path.as_os_str().is_empty() {
        bail!("docker template path must be non-empty");
    }

    let contents = fs::read_to_string(template_path).with_context(|| {
        format!(
            "failed to read Dockerfile template {}",
            template_path.display()
        )
    })?;
    let rendered = RenderContext {
        build_id: inv.build_id,
        vars: inv.vars,
        tags: inv.tags,
        outer_idx: Some(inv.outer_idx),
        inner_idx: Some(inv.inner_idx),
    }
    .render(&contents)
    .context("failed to render Dockerfile template")?;

    let context_dir = match template_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    // The rendered Dockerfile lives beside its template for the duration of
    // the build so the build context stays the template's directory.
    let mut rendered_file = tempfile::Builder::new()
        .prefix("Dockerfile")
        .tempfile_in(&context_dir)
        .context("failed to create temporary file for rendered Dockerfile")?;
    rendered_file
        .write_all(rendered.as_bytes())
        .context("failed to write rendered Dockerfile")?;
    rendered_file
        .flush()
        .context("failed to flush rendered Dockerfile")?;

    let rendered_path = rendered_file.path().display().to_string();
    let context_dir = context_dir.display().to_string();
    inv.executor.run(
        inv.out,
        "docker",
        &[
            "build",
            "-t",
            inv.tag,
            "-f",
            rendered_path.as_str(),
            context_dir.as_str(),
        ],
    )?;

    // Drop also deletes the file on the error paths above; only an explicit
    // close reports a removal failure after a successful build.
    rendered_file
        .close()
        .context("failed to remove temporary rendered Dockerfile")?;
    Ok(())
}

fn push_image(inv: &mut Invocation<'_>) -> Result<()> {
    inv.executor.run(inv.out, "docker", &["push", inv.tag])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PrintExecutor;
    use std::path::Path;

    fn invocation<'a>(
        build: &'a Build,
        tag: &'a str,
        vars: &'a VarMap,
        tags: &'a TagRegistry,
        out: &'a mut Vec<u8>,
    ) -> Invocation<'a> {
        Invocation {
            build,
            executor: &PrintExecutor,
            tag,
            build_id: "unspecified",
            vars,
            tags,
            outer_idx: 0,
            inner_idx: 0,
            out,
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut entries: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn print_tag_writes_the_tag() {
        let build = Build::default();
        let vars = VarMap::new();
        let tags = TagRegistry::new();
        let mut out = Vec::new();

        let mut inv = invocation(&build, "repo/foo:1", &vars, &tags, &mut out);
        Action::PrintTag.invoke(&mut inv).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "repo/foo:1\n");
    }

    #[test]
    fn push_runs_docker_push() {
        let build = Build::default();
        let vars = VarMap::new();
        let tags = TagRegistry::new();
        let mut out = Vec::new();

        let mut inv = invocation(&build, "repo/foo:1", &vars, &tags, &mut out);
        Action::Push.invoke(&mut inv).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "docker push repo/foo:1\n"
        );
    }

    #[test]
    fn build_renders_template_and_runs_docker_build() {
        let dir = tempfile::TempDir::new().unwrap();
        let template = dir.path().join("Dockerfile.tmpl");
        fs::write(&template, "FROM scratch\nENV greeting {{ greeting }}\n").unwrap();

        let build = Build {
            name: "foo".to_string(),
            docker_template: template.clone(),
            ..Default::default()
        };
        let vars: VarMap = [("greeting".to_string(), "hello".to_string())].into();
        let tags = TagRegistry::new();
        let mut out = Vec::new();

        let mut inv = invocation(&build, "repo/foo:1", &vars, &tags, &mut out);
        Action::Build.invoke(&mut inv).unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.starts_with("docker build -t repo/foo:1 -f "));
        assert!(output.trim_end().ends_with(&dir.path().display().to_string()));

        // The rendered temp file is gone once the invocation finishes.
        assert_eq!(dir_entries(dir.path()), vec!["Dockerfile.tmpl".to_string()]);
    }

    #[test]
    fn build_fails_on_empty_template_path() {
        let build = Build {
            name: "foo".to_string(),
            ..Default::default()
        };
        let vars = VarMap::new();
        let tags = TagRegistry::new();
        let mut out = Vec::new();

        let mut inv = invocation(&build, "repo/foo:1", &vars, &tags, &mut out);
        let err = Action::Build.invoke(&mut inv).unwrap_err();
        assert!(err.to_string().contains("must be non-empty"));
    }

    #[test]
    fn build_fails_on_missing_template_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let build = Build {
            name: "foo".to_string(),
            docker_template: dir.path().join("nope.tmpl"),
            ..Default::default()
        };
        let vars = VarMap::new();
        let tags = TagRegistry::new();
        let mut out = Vec::new();

        let mut inv = invocation(&build, "repo/foo:1", &vars, &tags, &mut out);
        let err = Action::Build.invoke(&mut inv).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read Dockerfile template"));
    }

    #[test]
    fn build_fails_on_unbound_template_variable() {
        let dir = tempfile::TempDir::new().unwrap();
        let template = dir.path().join("Dockerfile.tmpl");
        fs::write(&template, "FROM scratch\nENV x {{ missing }}\n").unwrap();

        let build = Build {
            name: "foo".to_string(),
            docker_template: template,
            ..Default::default()
        };
        let vars = VarMap::new();
        let tags = TagRegistry::new();
        let mut out = Vec::new();

        let mut inv = invocation(&build, "repo/foo:1", &vars, &tags, &mut out);
        let err = Action::Build.invoke(&mut inv).unwrap_err();
        assert!(format!("{err:#}").contains("failed to render Dockerfile template"));

        // The temp file does not outlive the failed render.
        assert_eq!(dir_entries(dir.path()), vec!["Dockerfile.tmpl".to_string()]);
    }
}
