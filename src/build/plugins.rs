//! Declarative definitions of the steps a plan hands to the execution engine.
//!
//! A plan is a flat list of [`Plugin`]s. Which variants appear depends only
//! on the build mode:
//! - `CopyAssets` and `NativeBuild` are always present
//! - `WatchDependency` is present in development only

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::{BuildConfig, Mode};

/// Flag that keeps the compiler from emitting `.d.ts` companions.
pub const NO_TYPESCRIPT_FLAG: &str = "--no-typescript";

/// One step of the build, tagged by `kind` when serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Plugin {
    /// Copy a directory verbatim into the output directory
    CopyAssets(CopyRule),
    /// Compile the native crate to wasm
    NativeBuild(NativeBuild),
    /// Treat changes under a directory as a rebuild trigger
    WatchDependency(WatchHook),
}

impl Plugin {
    /// Build the plugin list for a mode. Optional entries are only pushed
    /// when they apply; there are no placeholder entries.
    pub fn for_config(config: &BuildConfig) -> Vec<Plugin> {
        let mut plugins = vec![
            Plugin::CopyAssets(CopyRule {
                from: config.static_assets_dir.clone(),
                to: config.dist_path.clone(),
            }),
            Plugin::NativeBuild(NativeBuild::for_config(config)),
        ];

        match config.mode {
            Mode::Development => plugins.push(Plugin::WatchDependency(WatchHook {
                dir: config.watched_external_source_dir.clone(),
            })),
            Mode::Production => {}
        }

        plugins
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyRule {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchHook {
    pub dir: PathBuf,
}

/// Compiler profile requested from the native build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeProfile {
    Dev,
    Release,
}

impl NativeProfile {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Development => Self::Dev,
            Mode::Production => Self::Release,
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Self::Dev => "--dev",
            Self::Release => "--release",
        }
    }
}

/// How the execution engine should invoke the native-to-wasm compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeBuild {
    pub tool: String,
    pub profile: NativeProfile,
    pub crate_dir: PathBuf,
    pub args: Vec<String>,
}

impl NativeBuild {
    pub fn for_config(config: &BuildConfig) -> Self {
        let profile = NativeProfile::for_mode(config.mode);
        let compiler = &config.compiler;

        let mut args = vec![
            "build".to_string(),
            profile.flag().to_string(),
            NO_TYPESCRIPT_FLAG.to_string(),
        ];
        args.extend(compiler.extra_args.iter().cloned());
        args.push(config.crate_dir.display().to_string());

        Self {
            tool: compiler.tool.clone(),
            profile,
            crate_dir: config.crate_dir.clone(),
            args,
        }
    }
}

impl fmt::Display for NativeBuild {
    /// Shell-style command line, for progress output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
