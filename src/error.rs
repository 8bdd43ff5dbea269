use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a plan from being produced.
///
/// All variants are fatal: the plan is never partially built.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{what} not found: {}", .path.display())]
    MissingPath { what: &'static str, path: PathBuf },

    #[error("base directory must be absolute, got {}", .0.display())]
    RelativeBaseDir(PathBuf),

    #[error("invalid output name {0:?}: expected letters, digits, '_', '-' or '.'")]
    InvalidName(String),

    #[error("dev server port must be non-zero")]
    InvalidPort,

    #[error("failed to load settings from {}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    #[error("failed to read native crate manifest {}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
}

/// Underlying cause of a settings or manifest failure.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("missing `package.name`")]
    NoPackageName,
}
