use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::attr_path::{escape_attribute_path, parse_attribute_path};
use crate::error::AttributePathError;
use crate::version::types::VersionPreference;

// =============================================================================
// Network and concurrency constants
// =============================================================================

/// Timeout for every outbound HTTP request in seconds
pub const FETCH_TIMEOUT_SECS: u64 = 60;

/// Identifying header sent with every outbound HTTP request
pub const USER_AGENT: &str = concat!("nix-bump/", env!("CARGO_PKG_VERSION"));

/// Upper bound on git dependency prefetches running at the same time
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 8;

/// Default regex applied to every fetched version number
pub const DEFAULT_VERSION_REGEX: &str = "(.*)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings read from the user's configuration file
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub http: HttpSettings,
    pub prefetch: PrefetchSettings,
}

/// HTTP client settings shared by every fetcher
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Read from `GITHUB_TOKEN`, never from the file
    #[serde(skip)]
    pub github_token: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: FETCH_TIMEOUT_SECS,
            user_agent: USER_AGENT.to_string(),
            github_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PrefetchSettings {
    pub max_concurrency: usize,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Settings>(&content).map_err(|source| {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        settings.http.github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        if settings.prefetch.max_concurrency == 0 {
            settings.prefetch.max_concurrency = 1;
        }
        Ok(settings)
    }
}

/// Returns the path to the configuration file.
/// Uses $XDG_CONFIG_HOME/nix-bump/config.toml if XDG_CONFIG_HOME is set,
/// otherwise falls back to ~/.config/nix-bump/config.toml,
/// or ./nix-bump/config.toml if neither is available.
pub fn config_path() -> PathBuf {
    config_dir_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir())
        .join("config.toml")
}

fn config_dir_with_env(xdg_config_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let config_dir = xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    config_dir.join("nix-bump")
}

/// What the caller asked the version to become
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Stable,
    Unstable,
    Skip,
    /// Latest commit of the named branch
    Branch(String),
    /// Literal version supplied by the caller
    Fixed(String),
}

impl VersionSpec {
    pub fn preference(&self) -> VersionPreference {
        match self {
            VersionSpec::Stable => VersionPreference::Stable,
            VersionSpec::Unstable => VersionPreference::Unstable,
            VersionSpec::Skip => VersionPreference::Skip,
            VersionSpec::Branch(_) => VersionPreference::Branch,
            VersionSpec::Fixed(_) => VersionPreference::Fixed,
        }
    }
}

impl FromStr for VersionSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            // "auto" is a deprecated alias
            "auto" | "stable" => VersionSpec::Stable,
            "unstable" => VersionSpec::Unstable,
            "skip" => VersionSpec::Skip,
            "branch" => VersionSpec::Branch("HEAD".to_string()),
            _ => match s.strip_prefix("branch=") {
                Some(branch) => VersionSpec::Branch(branch.to_string()),
                None => VersionSpec::Fixed(s.to_string()),
            },
        })
    }
}

/// Options for a single attribute update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOptions {
    pub attribute: String,
    pub attribute_path: Vec<String>,
    pub import_path: PathBuf,
    pub flake: bool,
    pub version: VersionSpec,
    pub version_regex: String,
    pub subpackages: Vec<String>,
    pub override_filename: Option<PathBuf>,
    pub url: Option<String>,
    pub use_update_script: bool,
    pub update_script_args: Vec<String>,
    pub generate_lockfile: bool,
    pub lockfile_metadata_path: String,
    pub src_only: bool,
    pub update_src: bool,
    pub use_github_releases: bool,
    pub system: Option<String>,
    pub extra_flags: Vec<String>,
}

impl UpdateOptions {
    pub fn new(attribute: &str, import_path: impl Into<PathBuf>) -> Result<Self, AttributePathError> {
        Ok(Self {
            attribute: attribute.to_string(),
            attribute_path: parse_attribute_path(attribute)?,
            import_path: import_path.into(),
            flake: false,
            version: VersionSpec::Stable,
            version_regex: DEFAULT_VERSION_REGEX.to_string(),
            subpackages: Vec::new(),
            override_filename: None,
            url: None,
            use_update_script: false,
            update_script_args: Vec::new(),
            generate_lockfile: false,
            lockfile_metadata_path: ".".to_string(),
            src_only: false,
            update_src: true,
            use_github_releases: false,
            system: None,
            extra_flags: Vec::new(),
        })
    }

    /// Options for updating `<attribute>.<name>` once the root version is decided.
    pub fn for_subpackage(&self, name: &str) -> Result<Self, AttributePathError> {
        let attribute = format!("{}.{}", self.attribute, name);
        Ok(Self {
            attribute_path: parse_attribute_path(&attribute)?,
            attribute,
            subpackages: Vec::new(),
            version: VersionSpec::Skip,
            ..self.clone()
        })
    }

    pub fn escaped_attribute(&self) -> String {
        escape_attribute_path(&self.attribute_path)
    }

    pub fn escaped_import_path(&self) -> String {
        serde_json::Value::String(self.import_path.to_string_lossy().into_owned()).to_string()
    }

    /// Nix expression that evaluates to the package being updated.
    pub fn package_expr(&self) -> String {
        let import_path = self.escaped_import_path();
        let attribute = self.escaped_attribute();
        if self.flake {
            return format!(
                "(let flake = builtins.getFlake {import_path}; in flake.packages.${{builtins.currentSystem}}.{attribute} or flake.{attribute})"
            );
        }
        // checkMeta would reject packages marked broken or insecure
        let disable_check_meta = format!(
            "(if (builtins.hasAttr \"config\" (builtins.functionArgs (import {import_path}))) then {{ config.checkMeta = false; overlays = []; }} else {{ }})"
        );
        format!("(import {import_path} {disable_check_meta}).{attribute}")
    }
}
