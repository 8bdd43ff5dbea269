use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{ConfigurationError, SourceError};

/// Settings file looked up in the project root when `--config` is not given.
pub const SETTINGS_FILE: &str = "testbed.toml";

/// Output name used when neither the settings nor a crate manifest name one.
pub const DEFAULT_OUTPUT_NAME: &str = "index";

static OUTPUT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("output name pattern is valid")
});

/// Build mode, fixed for the lifetime of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    /// Interpret a `--mode` / `NODE_ENV` value. Only "production" selects
    /// production; anything else, including an empty string, is development.
    pub fn from_arg(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contents of `testbed.toml`. Every field has a default, so an absent file
/// and an empty file are equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Bootstrap script the bundle starts from
    pub entry: PathBuf,
    /// Directory copied verbatim into the output directory
    pub static_dir: PathBuf,
    pub output: OutputSection,
    pub dev_server: DevServerSection,
    pub native: NativeSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("bootstrap.js"),
            static_dir: PathBuf::from("static"),
            output: OutputSection::default(),
            dev_server: DevServerSection::default(),
            native: NativeSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub dir: PathBuf,
    /// Stem shared by the `.js` and `.wasm` artifacts
    pub name: Option<String>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dist"),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevServerSection {
    pub port: u16,
}

impl Default for DevServerSection {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeSection {
    /// Crate compiled to wasm, relative to the project root
    pub crate_dir: PathBuf,
    /// Out-of-tree sources whose changes trigger a rebuild in development
    pub watch: PathBuf,
    /// Compiler front-end invoked by the execution engine
    pub tool: String,
    /// Appended after the generated arguments
    pub extra_args: Vec<String>,
}

impl Default for NativeSection {
    fn default() -> Self {
        Self {
            crate_dir: PathBuf::from("."),
            watch: PathBuf::from("../../src"),
            tool: "wasm-pack".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let wrap = |source: SourceError| ConfigurationError::Settings {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
        toml::from_str(&content).map_err(|e| wrap(e.into()))
    }

    /// Load `testbed.toml` from the project root, falling back to defaults
    /// when it does not exist.
    pub fn discover(base_dir: &Path) -> Result<Self, ConfigurationError> {
        let path = base_dir.join(SETTINGS_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Fully resolved, validated inputs for one plan. All paths are absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub mode: Mode,
    pub base_dir: PathBuf,
    pub dist_path: PathBuf,
    pub entry_point: PathBuf,
    pub output_filename_js: String,
    pub output_filename_wasm: String,
    pub watched_external_source_dir: PathBuf,
    pub static_assets_dir: PathBuf,
    pub dev_server_port: u16,
    pub crate_dir: PathBuf,
    pub compiler: CompilerSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerSettings {
    pub tool: String,
    pub extra_args: Vec<String>,
}

impl BuildConfig {
    /// Validate everything up front and resolve paths against `base_dir`.
    ///
    /// Nothing is created or modified; the only filesystem access is
    /// existence checks and reading the native crate manifest.
    pub fn resolve(
        mode: Mode,
        base_dir: &Path,
        settings: &Settings,
    ) -> Result<Self, ConfigurationError> {
        if !base_dir.is_absolute() {
            return Err(ConfigurationError::RelativeBaseDir(base_dir.to_path_buf()));
        }
        let base_dir = normalize(base_dir);
        if !base_dir.is_dir() {
            return Err(ConfigurationError::MissingPath {
                what: "base directory",
                path: base_dir,
            });
        }

        let static_assets_dir = normalize(&base_dir.join(&settings.static_dir));
        if !static_assets_dir.is_dir() {
            return Err(ConfigurationError::MissingPath {
                what: "static assets directory",
                path: static_assets_dir,
            });
        }

        let entry_point = normalize(&base_dir.join(&settings.entry));
        if !entry_point.is_file() {
            return Err(ConfigurationError::MissingPath {
                what: "entry point",
                path: entry_point,
            });
        }

        if settings.dev_server.port == 0 {
            return Err(ConfigurationError::InvalidPort);
        }

        let crate_dir = normalize(&base_dir.join(&settings.native.crate_dir));
        let name = match &settings.output.name {
            Some(name) => name.clone(),
            None => derive_output_name(&crate_dir)?,
        };
        if !is_valid_output_name(&name) {
            return Err(ConfigurationError::InvalidName(name));
        }

        Ok(Self {
            mode,
            dist_path: normalize(&base_dir.join(&settings.output.dir)),
            entry_point,
            output_filename_js: format!("{}.js", name),
            output_filename_wasm: format!("{}.wasm", name),
            watched_external_source_dir: normalize(&base_dir.join(&settings.native.watch)),
            static_assets_dir,
            dev_server_port: settings.dev_server.port,
            compiler: CompilerSettings {
                tool: settings.native.tool.clone(),
                extra_args: settings.native.extra_args.clone(),
            },
            crate_dir,
            base_dir,
        })
    }
}

/// Output name from the native crate's `package.name`, used as is.
fn derive_output_name(crate_dir: &Path) -> Result<String, ConfigurationError> {
    let manifest = crate_dir.join("Cargo.toml");
    if !manifest.is_file() {
        return Ok(DEFAULT_OUTPUT_NAME.to_string());
    }

    let wrap = |source: SourceError| ConfigurationError::Manifest {
        path: manifest.clone(),
        source,
    };
    let content = std::fs::read_to_string(&manifest).map_err(|e| wrap(e.into()))?;
    let parsed: toml::Value = toml::from_str(&content).map_err(|e| wrap(e.into()))?;

    parsed
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(String::from)
        .ok_or_else(|| wrap(SourceError::NoPackageName))
}

fn is_valid_output_name(name: &str) -> bool {
    OUTPUT_NAME.is_match(name)
}

/// Lexically collapse `.` and `..` so that `/proj/../src` reads `/src`.
/// Symlinks are not followed.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn project() -> assert_fs::TempDir {
        let tmp = assert_fs::TempDir::new().unwrap();
        tmp.child("static/index.html").write_str("<html></html>").unwrap();
        tmp.child("bootstrap.js").write_str("import('./index.js');").unwrap();
        tmp
    }

    #[test]
    fn test_mode_from_arg() {
        assert_eq!(Mode::from_arg("production"), Mode::Production);
        assert_eq!(Mode::from_arg(" Production\n"), Mode::Production);
        assert_eq!(Mode::from_arg("development"), Mode::Development);
        assert_eq!(Mode::from_arg("staging"), Mode::Development);
        assert_eq!(Mode::from_arg(""), Mode::Development);
    }

    #[test]
    fn test_normalize_collapses_parent_dirs() {
        assert_eq!(normalize(Path::new("/proj/../src")), PathBuf::from("/src"));
        assert_eq!(normalize(Path::new("/proj/./dist")), PathBuf::from("/proj/dist"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_settings_defaults_from_empty_file() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.dev_server.port, 8000);
        assert_eq!(settings.native.watch, PathBuf::from("../../src"));
    }

    #[test]
    fn test_settings_rejects_unknown_keys() {
        let tmp = project();
        tmp.child(SETTINGS_FILE)
            .write_str("[dev_server]\nprot = 9000\n")
            .unwrap();

        let err = Settings::discover(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Settings { .. }));
    }

    #[test]
    fn test_settings_partial_override() {
        let tmp = project();
        tmp.child(SETTINGS_FILE)
            .write_str("static_dir = \"public\"\n\n[dev_server]\nport = 9000\n")
            .unwrap();

        let settings = Settings::discover(tmp.path()).unwrap();
        assert_eq!(settings.static_dir, PathBuf::from("public"));
        assert_eq!(settings.dev_server.port, 9000);
        assert_eq!(settings.entry, PathBuf::from("bootstrap.js"));
    }

    #[test]
    fn test_resolve_defaults() {
        let tmp = project();
        let config = BuildConfig::resolve(Mode::Development, tmp.path(), &Settings::default())
            .unwrap();

        assert_eq!(config.dist_path, tmp.path().join("dist"));
        assert_eq!(config.output_filename_js, "index.js");
        assert_eq!(config.output_filename_wasm, "index.wasm");
        assert_eq!(config.dev_server_port, 8000);
        assert_eq!(
            config.watched_external_source_dir,
            normalize(&tmp.path().join("../../src"))
        );
    }

    #[test]
    fn test_resolve_keeps_manifest_name_verbatim() {
        let tmp = project();
        tmp.child("Cargo.toml")
            .write_str("[package]\nname = \"seed-testbed\"\nversion = \"0.1.0\"\n")
            .unwrap();

        let config = BuildConfig::resolve(Mode::Production, tmp.path(), &Settings::default())
            .unwrap();
        assert_eq!(config.output_filename_js, "seed-testbed.js");
        assert_eq!(config.output_filename_wasm, "seed-testbed.wasm");
    }

    #[test]
    fn test_resolve_testbed_under_examples_dir() {
        // <root>/examples/seed-testbed watches <root>/src
        let tmp = assert_fs::TempDir::new().unwrap();
        let testbed = tmp.child("examples/seed-testbed");
        testbed.child("static").create_dir_all().unwrap();
        testbed.child("bootstrap.js").write_str("").unwrap();
        testbed
            .child("Cargo.toml")
            .write_str("[package]\nname = \"seed-testbed\"\nversion = \"0.1.0\"\n")
            .unwrap();
        tmp.child("src/lib.rs").write_str("").unwrap();

        let config =
            BuildConfig::resolve(Mode::Development, testbed.path(), &Settings::default()).unwrap();
        assert_eq!(config.output_filename_js, "seed-testbed.js");
        assert_eq!(config.output_filename_wasm, "seed-testbed.wasm");
        assert_eq!(config.watched_external_source_dir, tmp.path().join("src"));
    }

    #[test]
    fn test_resolve_manifest_without_name() {
        let tmp = project();
        tmp.child("Cargo.toml").write_str("[workspace]\n").unwrap();

        let err = BuildConfig::resolve(Mode::Production, tmp.path(), &Settings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Manifest {
                source: SourceError::NoPackageName,
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_missing_static_dir() {
        let tmp = assert_fs::TempDir::new().unwrap();
        tmp.child("bootstrap.js").write_str("").unwrap();

        let err = BuildConfig::resolve(Mode::Development, tmp.path(), &Settings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingPath {
                what: "static assets directory",
                ..
            }
        ));
        assert!(err.to_string().contains("static"));
    }

    #[test]
    fn test_resolve_missing_entry_point() {
        let tmp = assert_fs::TempDir::new().unwrap();
        tmp.child("static").create_dir_all().unwrap();

        let err = BuildConfig::resolve(Mode::Development, tmp.path(), &Settings::default())
            .unwrap_err();
        assert!(err.to_string().contains("bootstrap.js"));
    }

    #[test]
    fn test_resolve_missing_base_dir() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err =
            BuildConfig::resolve(Mode::Development, &missing, &Settings::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingPath {
                what: "base directory",
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_rejects_relative_base_dir() {
        let err = BuildConfig::resolve(Mode::Development, Path::new("proj"), &Settings::default())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::RelativeBaseDir(_)));
    }

    #[test]
    fn test_output_name_pattern() {
        assert!(is_valid_output_name("seed-testbed"));
        assert!(is_valid_output_name("index.min"));
        assert!(!is_valid_output_name(""));
        assert!(!is_valid_output_name(".hidden"));
        assert!(!is_valid_output_name("a/b"));
    }

    #[test]
    fn test_resolve_rejects_bad_name_and_port() {
        let tmp = project();

        let mut settings = Settings::default();
        settings.output.name = Some("../escape".to_string());
        let err = BuildConfig::resolve(Mode::Development, tmp.path(), &settings).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidName(_)));

        let mut settings = Settings::default();
        settings.dev_server.port = 0;
        let err = BuildConfig::resolve(Mode::Development, tmp.path(), &settings).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPort));
    }
}
