use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

mod build;
mod config;
mod error;

use build::BuildPlan;
use build::render::{self, Format};
use config::{Mode, Settings};

#[derive(Parser)]
#[command(name = "wasm-testbed")]
#[command(about = "Plans the native-to-wasm build and dev server for a browser testbed page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the build plan and print it
    Plan {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Write the plan to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },
    /// Validate the project layout without printing the plan
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Build mode; only "production" selects a production build
    #[arg(long, env = "NODE_ENV", default_value = "development")]
    mode: String,

    /// Project root all relative paths are resolved against
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Settings file [default: <base-dir>/testbed.toml if present]
    #[arg(long)]
    config: Option<PathBuf>,
}

impl TargetArgs {
    fn resolve(&self) -> Result<(BuildPlan, PathBuf)> {
        let mode = Mode::from_arg(&self.mode);
        let base_dir =
            std::path::absolute(&self.base_dir).context("Failed to resolve base directory")?;

        let plan = match &self.config {
            Some(path) => build::produce_build_plan_with(mode, &base_dir, &Settings::load(path)?)?,
            None => build::produce_build_plan(mode, &base_dir)?,
        };
        Ok((plan, base_dir))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            target,
            format,
            out,
            quiet,
        } => {
            let (plan, base_dir) = target.resolve()?;
            report(&plan, &base_dir, quiet);

            let rendered = render::render(&plan, format)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write plan to {:?}", path))?;
                    if !quiet {
                        eprintln!("Plan written to {:?}", path);
                    }
                }
                None => print!("{}", rendered),
            }
        }
        Commands::Check { target } => {
            let (plan, base_dir) = target.resolve()?;
            report(&plan, &base_dir, false);
            eprintln!("Configuration OK");
        }
    }

    Ok(())
}

/// Progress summary on stderr; stdout stays reserved for the plan itself.
fn report(plan: &BuildPlan, base_dir: &Path, quiet: bool) {
    for warning in &plan.warnings {
        eprintln!("warning: {}", warning);
    }
    if quiet {
        return;
    }

    let rel = |path: &Path| {
        pathdiff::diff_paths(path, base_dir)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| path.to_path_buf())
    };

    eprintln!("Mode: {}", plan.mode);
    eprintln!(
        "Output: {}/{{{}, {}}}",
        rel(&plan.out_dir).display(),
        plan.output.js,
        plan.output.wasm
    );
    if plan.dev_server.enabled {
        eprintln!("Dev server: port {}", plan.dev_server.port);
    }
    for rule in plan.copy_rules() {
        eprintln!(
            "Copy: {} -> {}",
            rel(&rule.from).display(),
            rel(&rule.to).display()
        );
    }
    for hook in plan.watch_hooks() {
        eprintln!("Watch: {}", rel(&hook.dir).display());
    }
    if let Some(native) = plan.native_build() {
        eprintln!("Native build: {}", native);
    }
}
