use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use crate::config::{BuildConfig, Mode, Settings};
use crate::error::ConfigurationError;

pub mod plugins;
pub mod render;

use plugins::{CopyRule, NativeBuild, Plugin, WatchHook};

/// Everything the execution engine needs to run one build or serve session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub mode: Mode,
    pub out_dir: PathBuf,
    pub entry: PathBuf,
    pub output: OutputFiles,
    pub dev_server: DevServer,
    /// Keep running and rebuild on change, rather than bundle once
    pub watch: bool,
    pub compression: bool,
    pub plugins: Vec<Plugin>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFiles {
    pub js: String,
    pub wasm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevServer {
    pub enabled: bool,
    pub port: u16,
    pub content_base: PathBuf,
}

impl BuildPlan {
    /// Build a plan from an already validated config. Cannot fail.
    pub fn from_config(config: &BuildConfig) -> Self {
        let production = config.mode.is_production();

        Self {
            mode: config.mode,
            out_dir: config.dist_path.clone(),
            entry: config.entry_point.clone(),
            output: OutputFiles {
                js: config.output_filename_js.clone(),
                wasm: config.output_filename_wasm.clone(),
            },
            dev_server: DevServer {
                enabled: !production,
                port: config.dev_server_port,
                content_base: config.dist_path.clone(),
            },
            watch: !production,
            compression: production,
            plugins: Plugin::for_config(config),
            warnings: diagnose(config),
        }
    }

    pub fn watch_hooks(&self) -> impl Iterator<Item = &WatchHook> {
        self.plugins.iter().filter_map(|p| match p {
            Plugin::WatchDependency(hook) => Some(hook),
            _ => None,
        })
    }

    pub fn copy_rules(&self) -> impl Iterator<Item = &CopyRule> {
        self.plugins.iter().filter_map(|p| match p {
            Plugin::CopyAssets(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn native_build(&self) -> Option<&NativeBuild> {
        self.plugins.iter().find_map(|p| match p {
            Plugin::NativeBuild(build) => Some(build),
            _ => None,
        })
    }
}

/// Produce the plan for `mode`, reading `testbed.toml` from `base_dir` when present.
pub fn produce_build_plan(mode: Mode, base_dir: &Path) -> Result<BuildPlan, ConfigurationError> {
    if !base_dir.is_absolute() {
        return Err(ConfigurationError::RelativeBaseDir(base_dir.to_path_buf()));
    }
    let settings = Settings::discover(base_dir)?;
    produce_build_plan_with(mode, base_dir, &settings)
}

/// Produce the plan from explicit settings. Validation completes before any
/// part of the plan is built.
pub fn produce_build_plan_with(
    mode: Mode,
    base_dir: &Path,
    settings: &Settings,
) -> Result<BuildPlan, ConfigurationError> {
    let config = BuildConfig::resolve(mode, base_dir, settings)?;
    Ok(BuildPlan::from_config(&config))
}

/// Non-fatal findings about the watched directory. Production never watches,
/// so it gets none.
fn diagnose(config: &BuildConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.mode.is_production() {
        return warnings;
    }

    let watched = &config.watched_external_source_dir;
    if !watched.is_dir() {
        warnings.push(format!(
            "watched directory {} does not exist; changes there will not trigger rebuilds",
            watched.display()
        ));
    }

    let inside_root = pathdiff::diff_paths(watched, &config.base_dir)
        .is_some_and(|rel| !matches!(rel.components().next(), Some(Component::ParentDir)));
    if inside_root {
        warnings.push(format!(
            "watched directory {} is inside the project root {}",
            watched.display(),
            config.base_dir.display()
        ));
    }

    warnings
}
