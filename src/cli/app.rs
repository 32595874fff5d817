//! Main CLI application structure

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::select::{self, SelectOptions};
use crate::config::Config;
use crate::engine::{self, Action};

#[derive(Parser)]
#[command(name = "bakery")]
#[command(author, version)]
#[command(about = "Builds, tags and pushes Docker images from declarative templated configuration")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the build configuration file
    #[arg(long, global = true, env = "BAKERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the commands that would run without running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Run only the requested images, without their dependencies
    #[arg(long, global = true)]
    pub no_deps: bool,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Builds and tags the images defined in the configuration
    ///
    /// With no arguments every image is built; otherwise the named images
    /// and their dependencies are built.
    Build {
        /// Names of the images to build
        images: Vec<String>,
    },

    /// Pushes the tags for the images defined in the configuration
    Push {
        /// Names of the images to push
        images: Vec<String>,
    },

    /// Prints the tags for the images defined in the configuration
    Tags {
        /// Names of the images whose tags are printed
        images: Vec<String>,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    let Some(config_path) = cli.config else {
        bail!("--config flag is required");
    };
    output.verbose(&format!(
        "loading configuration from {}",
        config_path.display()
    ));

    let config = Config::load(&config_path)?;
    let builds = config.build_params()?;
    let params = config.run_params();

    let (action, images) = match &cli.command {
        Commands::Build { images } => (Action::Build, images),
        Commands::Push { images } => (Action::Push, images),
        Commands::Tags { images } => (Action::PrintTag, images),
    };

    let options = SelectOptions {
        dry_run: cli.dry_run,
        no_deps: cli.no_deps,
    };
    let planned = select::plan(&builds, images, options)?;
    output.verbose(&format!("planned {} builds", planned.len()));

    if action == Action::PrintTag && output.is_json() {
        // Collect quietly, then emit the whole registry as one document.
        let registry = engine::run(action, &planned, &params, &mut io::sink())?;
        output.data(&registry);
    } else {
        let stdout = io::stdout();
        engine::run(action, &planned, &params, &mut stdout.lock())?;
    }
    Ok(())
}
