//! Declarative build configuration
//!
//! Configuration is a single YAML file:
//!
//! ```yaml
//! build-id-var: CIRCLE_BUILD_NUM
//! template-vars:
//!   registry: quay.io/example
//! tag-suffix: "-t{{ build_id() }}"
//! for:
//!   channel: [stable, nightly]
//! builds:
//!   base:
//!     docker-template: base/Dockerfile.tmpl
//!     tag: "{{ registry }}/base:{{ channel }}"
//!   app:
//!     docker-template: app/Dockerfile.tmpl
//!     tag: "{{ registry }}/app:{{ channel }}"
//!     requires:
//!       - base
//! ```
//!
//! The `builds` mapping is order-sensitive: definition order decides how
//! ties break in the topological sort, so entries are kept as an ordered
//! list rather than a map.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::domain::{graph, Build, ForBindings, RunParams, VarMap};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Environment variable holding the unique identifier for this run
    pub build_id_var: Option<String>,
    /// Variables rendered once per run and exposed to all templates
    pub template_vars: VarMap,
    /// Template appended to every tag; defaults to `-{{ build_id() }}`
    pub tag_suffix: Option<String>,
    /// Run-wide loop variables applied to every build
    #[serde(rename = "for")]
    pub for_vars: ForBindings,
    /// All builds, in definition order
    pub builds: Builds,
}

/// A single build entry in the configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BuildConfig {
    /// Path to the Dockerfile template for this image
    pub docker_template: PathBuf,
    /// Tag template for the generated image
    pub tag: String,
    /// Per-build loop variables
    #[serde(rename = "for")]
    pub for_vars: ForBindings,
    /// Builds that must run before this one
    pub requires: Vec<String>,
}

/// Build entries in configuration order
#[derive(Debug, Clone, Default)]
pub struct Builds(Vec<(String, BuildConfig)>);

impl Builds {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BuildConfig)> {
        self.0.iter().map(|(name, config)| (name, config))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Builds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BuildsVisitor;

        impl<'de> Visitor<'de> for BuildsVisitor {
            type Value = Builds;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a mapping of build name to build configuration")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, BuildConfig)> = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    // A bare `name:` entry is an empty build config.
                    let config = map.next_value::<Option<BuildConfig>>()?.unwrap_or_default();
                    if entries.iter().any(|(existing, _)| existing == &name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate build name {name}"
                        )));
                    }
                    entries.push((name, config));
                }
                Ok(Builds(entries))
            }
        }

        deserializer.deserialize_map(BuildsVisitor)
    }
}

impl Config {
    /// Loads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Converts the `builds` section into validated build definitions.
    ///
    /// Fails if any `requires` entry names an undefined build or the
    /// dependency relation contains a cycle.
    pub fn build_params(&self) -> Result<Vec<Build>> {
        let builds: Vec<Build> = self
            .builds
            .iter()
            .map(|(name, config)| Build {
                name: name.clone(),
                docker_template: config.docker_template.clone(),
                tag: config.tag.clone(),
                for_vars: config.for_vars.clone(),
                requires: config.requires.clone(),
            })
            .collect();
        graph::validate(&builds).context("invalid configuration")?;
        Ok(builds)
    }

    /// Extracts the run-wide parameters.
    pub fn run_params(&self) -> RunParams {
        RunParams {
            build_id_var: self.build_id_var.clone(),
            template_vars: self.template_vars.clone(),
            tag_suffix: self.tag_suffix.clone(),
            for_vars: self.for_vars.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn parses_all_top_level_keys() {
        let config = parse(
            r#"
build-id-var: CIRCLE_BUILD_NUM
template-vars:
  registry: quay.io/example
tag-suffix: "-t{{ build_id() }}"
for:
  channel:
    - stable
    - nightly
builds:
  base:
    docker-template: base/Dockerfile.tmpl
    tag: "{{ registry }}/base:{{ channel }}"
"#,
        );

        assert_eq!(config.build_id_var.as_deref(), Some("CIRCLE_BUILD_NUM"));
        assert_eq!(config.template_vars["registry"], "quay.io/example");
        assert_eq!(config.tag_suffix.as_deref(), Some("-t{{ build_id() }}"));
        assert_eq!(config.for_vars["channel"], vec!["stable", "nightly"]);
        assert_eq!(config.builds.len(), 1);
    }

    #[test]
    fn builds_keep_definition_order() {
        let config = parse(
            r#"
builds:
  zebra:
  apple:
  mango:
"#,
        );

        let names: Vec<&String> = config.builds.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn bare_build_entry_is_an_empty_config() {
        let config = parse("builds:\n  foo:\n");

        let (_, build) = config.builds.iter().next().unwrap();
        assert!(build.docker_template.as_os_str().is_empty());
        assert!(build.tag.is_empty());
        assert!(build.requires.is_empty());
    }

    #[test]
    fn duplicate_build_names_are_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("builds:\n  foo:\n  foo:\n");

        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn build_params_reports_undefined_requires() {
        let config = parse(
            r#"
builds:
  foo:
    requires:
      - bar
"#,
        );

        let err = config.build_params().unwrap_err();
        assert!(format!("{err:#}")
            .contains("image foo requires image bar, which is not defined in configuration"));
    }

    #[test]
    fn build_params_reports_self_cycle() {
        let config = parse(
            r#"
builds:
  foo:
    docker-template: foo/Dockerfile.tmpl
    tag: "test/foo:snapshot"
    requires:
      - foo
"#,
        );

        let err = config.build_params().unwrap_err();
        assert!(format!("{err:#}").contains("dependency cycle exists: foo -> foo"));
    }

    #[test]
    fn build_params_reports_transitive_cycle() {
        let config = parse(
            r#"
builds:
  foo:
    requires:
      - bar
  bar:
    requires:
      - foo
"#,
        );

        let err = config.build_params().unwrap_err();
        assert!(format!("{err:#}").contains("dependency cycle exists: foo -> bar -> foo"));
    }

    #[test]
    fn build_params_converts_fields() {
        let config = parse(
            r#"
builds:
  bar:
  foo:
    docker-template: foo/Dockerfile.tmpl
    tag: "test/foo:snapshot"
    for:
      arch:
        - amd64
        - arm64
    requires:
      - bar
"#,
        );

        let builds = config.build_params().unwrap();
        assert_eq!(builds.len(), 2);
        let foo = &builds[1];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.docker_template, PathBuf::from("foo/Dockerfile.tmpl"));
        assert_eq!(foo.tag, "test/foo:snapshot");
        assert_eq!(foo.for_vars["arch"], vec!["amd64", "arm64"]);
        assert_eq!(foo.requires, vec!["bar"]);
    }

    #[test]
    fn run_params_copies_the_global_section() {
        let config = parse(
            r#"
build-id-var: BUILD_NUM
tag-suffix: ""
for:
  x:
    - a
"#,
        );

        let params = config.run_params();
        assert_eq!(params.build_id_var.as_deref(), Some("BUILD_NUM"));
        // An explicitly empty suffix stays empty instead of becoming the default.
        assert_eq!(params.tag_suffix.as_deref(), Some(""));
        assert_eq!(params.for_vars["x"], vec!["a"]);
    }

    #[test]
    fn missing_config_file_is_reported_with_its_path() {
        let err = Config::load(Path::new("/nonexistent/bakery.yml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/bakery.yml"));
    }
}
