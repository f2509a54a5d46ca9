//! Package evaluation
//!
//! The [`Evaluator`] turns an attribute of a Nix expression tree into a
//! [`Package`] snapshot: where the version is declared, which source URL it
//! is fetched from, and every hash the update may need to rewrite.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::config::{UpdateOptions, VersionSpec};
use crate::error::UpdateError;

const EVAL_NIX: &str = include_str!("eval.nix");

/// Location of the `version` attribute definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Position {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

/// Where the `Cargo.lock` of a `cargoLock`-based package lives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CargoLockDescriptor {
    #[default]
    Absent,
    /// Only available by unpacking the package's source
    InBuildOutput,
    /// Checked in next to the package expression
    InSourceTree(PathBuf),
}

/// Fixed-output dependency derivations whose hash is pinned in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    GoModules,
    GoModulesOld,
    CargoDeps,
    CargoVendorDeps,
    ComposerDeps,
    ComposerDepsOld,
    NpmDeps,
    PnpmDeps,
    YarnDeps,
    YarnDepsOld,
    MavenDeps,
    MixDeps,
    ZigDeps,
}

impl DependencyKind {
    /// Every kind, in the order the dependency pipeline visits them
    pub const ALL: [DependencyKind; 13] = [
        DependencyKind::GoModules,
        DependencyKind::GoModulesOld,
        DependencyKind::CargoDeps,
        DependencyKind::CargoVendorDeps,
        DependencyKind::ComposerDeps,
        DependencyKind::ComposerDepsOld,
        DependencyKind::NpmDeps,
        DependencyKind::PnpmDeps,
        DependencyKind::YarnDeps,
        DependencyKind::YarnDepsOld,
        DependencyKind::MavenDeps,
        DependencyKind::MixDeps,
        DependencyKind::ZigDeps,
    ];

    /// Attribute of the package that builds the dependency derivation
    pub fn attribute(self) -> &'static str {
        match self {
            DependencyKind::GoModules => "goModules",
            DependencyKind::GoModulesOld => "go-modules",
            DependencyKind::CargoDeps => "cargoDeps",
            DependencyKind::CargoVendorDeps => "cargoDeps.vendorStaging",
            DependencyKind::ComposerDeps => "composerVendor",
            DependencyKind::ComposerDepsOld => "composerRepository",
            DependencyKind::NpmDeps => "npmDeps",
            DependencyKind::PnpmDeps => "pnpmDeps",
            DependencyKind::YarnDeps => "yarnOfflineCache",
            DependencyKind::YarnDepsOld => "offlineCache",
            DependencyKind::MavenDeps => "fetchedMavenDeps",
            DependencyKind::MixDeps => "mixFodDeps",
            DependencyKind::ZigDeps => "zigDeps",
        }
    }
}

/// Snapshot of a package as evaluated before the update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Package {
    pub attribute: String,
    pub name: String,
    pub pname: String,
    pub old_version: String,
    /// File holding the version declaration
    pub filename: PathBuf,
    pub version_position: Option<Position>,
    pub urls: Vec<String>,
    pub url: Option<String>,
    pub src_homepage: Option<String>,
    pub rev: Option<String>,
    pub tag: Option<String>,
    /// Output hash of `src`
    pub hash: Option<String>,
    /// Current hash of each dependency derivation the package has
    pub dependency_hashes: Vec<(DependencyKind, String)>,
    pub cargo_lock: CargoLockDescriptor,
    pub has_nuget_deps: bool,
    pub tests: Vec<String>,
    pub has_update_script: bool,
}

impl Package {
    /// `src.url`, or the first of `src.urls`
    pub fn source_url(&self) -> Option<&str> {
        self.url.as_deref().or_else(|| self.urls.first().map(String::as_str))
    }

    pub fn parsed_url(&self) -> Option<Url> {
        self.source_url().and_then(|url| Url::parse(url).ok())
    }

    /// Revision or tag the source is currently pinned to
    pub fn old_rev_tag(&self) -> Option<&str> {
        self.rev
            .as_deref()
            .filter(|r| !r.is_empty())
            .or_else(|| self.tag.as_deref().filter(|t| !t.is_empty()))
    }
}

/// Produces [`Package`] snapshots
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, opts: &UpdateOptions) -> Result<Package, UpdateError>;
}

/// Output of the embedded evaluation expression
#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    pname: String,
    old_version: String,
    filename: Option<PathBuf>,
    urls: Option<Vec<String>>,
    url: Option<String>,
    src_homepage: Option<String>,
    rev: Option<String>,
    tag: Option<String>,
    hash: Option<String>,
    go_modules: Option<String>,
    go_modules_old: Option<String>,
    cargo_deps: Option<String>,
    cargo_vendor_deps: Option<String>,
    npm_deps: Option<String>,
    pnpm_deps: Option<String>,
    yarn_deps: Option<String>,
    yarn_deps_old: Option<String>,
    composer_deps: Option<String>,
    composer_deps_old: Option<String>,
    maven_deps: Option<String>,
    mix_deps: Option<String>,
    zig_deps: Option<String>,
    #[serde(default)]
    has_nuget_deps: bool,
    #[serde(default)]
    tests: Vec<String>,
    #[serde(default)]
    has_update_script: bool,
    raw_version_position: Option<Position>,
    /// `false`, a path, or `null`
    raw_cargo_lock: Option<serde_json::Value>,
}

impl RawPackage {
    fn dependency_hash(&self, kind: DependencyKind) -> Option<&String> {
        match kind {
            DependencyKind::GoModules => self.go_modules.as_ref(),
            DependencyKind::GoModulesOld => self.go_modules_old.as_ref(),
            DependencyKind::CargoDeps => self.cargo_deps.as_ref(),
            DependencyKind::CargoVendorDeps => self.cargo_vendor_deps.as_ref(),
            DependencyKind::ComposerDeps => self.composer_deps.as_ref(),
            DependencyKind::ComposerDepsOld => self.composer_deps_old.as_ref(),
            DependencyKind::NpmDeps => self.npm_deps.as_ref(),
            DependencyKind::PnpmDeps => self.pnpm_deps.as_ref(),
            DependencyKind::YarnDeps => self.yarn_deps.as_ref(),
            DependencyKind::YarnDepsOld => self.yarn_deps_old.as_ref(),
            DependencyKind::MavenDeps => self.maven_deps.as_ref(),
            DependencyKind::MixDeps => self.mix_deps.as_ref(),
            DependencyKind::ZigDeps => self.zig_deps.as_ref(),
        }
    }

    fn into_package(self, attribute: &str, import_path: &Path) -> Package {
        let dependency_hashes = DependencyKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.dependency_hash(kind)
                    .filter(|h| !h.is_empty())
                    .map(|h| (kind, h.clone()))
            })
            .collect();
        let cargo_lock = cargo_lock_descriptor(self.raw_cargo_lock.as_ref(), import_path);

        let filename = self
            .filename
            .or_else(|| self.raw_version_position.as_ref().map(|p| p.file.clone()))
            .unwrap_or_default();
        let version_position = self.raw_version_position.map(|position| Position {
            file: filename.clone(),
            ..position
        });

        Package {
            attribute: attribute.to_string(),
            name: self.name,
            pname: self.pname,
            old_version: self.old_version,
            filename,
            version_position,
            urls: self.urls.unwrap_or_default(),
            url: self.url,
            src_homepage: self.src_homepage,
            rev: self.rev,
            tag: self.tag,
            hash: self.hash,
            dependency_hashes,
            cargo_lock,
            has_nuget_deps: self.has_nuget_deps,
            tests: self.tests,
            has_update_script: self.has_update_script,
        }
    }
}

fn cargo_lock_descriptor(raw: Option<&serde_json::Value>, import_path: &Path) -> CargoLockDescriptor {
    match raw {
        None | Some(serde_json::Value::Null) => CargoLockDescriptor::Absent,
        Some(serde_json::Value::String(path)) => {
            let path = PathBuf::from(path);
            let resolved = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            let root = std::fs::canonicalize(import_path).unwrap_or_else(|_| import_path.to_path_buf());
            if resolved.starts_with(&root) {
                CargoLockDescriptor::InSourceTree(path)
            } else {
                CargoLockDescriptor::InBuildOutput
            }
        }
        Some(_) => CargoLockDescriptor::InBuildOutput,
    }
}

/// Evaluates packages with `nix-instantiate`
pub struct NixEvaluator {
    runner: Arc<dyn CommandRunner>,
}

impl NixEvaluator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn command(opts: &UpdateOptions, expression: &Path) -> CommandSpec {
        let attribute_json = serde_json::Value::from(opts.attribute_path.clone()).to_string();
        let mut spec = CommandSpec::new("nix-instantiate")
            .args(["--eval", "--json", "--strict"])
            .arg(expression.to_string_lossy())
            .args(["--argstr", "importPath"])
            .arg(opts.import_path.to_string_lossy())
            .args(["--argstr", "attribute"])
            .arg(attribute_json)
            .args(["--arg", "isFlake", if opts.flake { "true" } else { "false" }])
            .args([
                "--arg",
                "sanitizePositions",
                if opts.override_filename.is_some() {
                    "false"
                } else {
                    "true"
                },
            ]);
        if let Some(system) = &opts.system {
            spec = spec.args(["--argstr", "system"]).arg(system);
        }
        spec
    }
}

#[async_trait::async_trait]
impl Evaluator for NixEvaluator {
    async fn evaluate(&self, opts: &UpdateOptions) -> Result<Package, UpdateError> {
        let mut expression = tempfile::Builder::new()
            .prefix("nix-bump-eval")
            .suffix(".nix")
            .tempfile()?;
        expression.write_all(EVAL_NIX.as_bytes())?;
        expression.flush()?;

        let output = run_checked(
            self.runner.as_ref(),
            &Self::command(opts, expression.path()),
        )
        .await?;
        let mut raw: RawPackage = serde_json::from_str(&output.stdout)?;
        debug!("evaluated {}: {:?}", opts.attribute, raw);

        if let Some(filename) = &opts.override_filename {
            raw.filename = Some(filename.clone());
        }
        if let Some(url) = &opts.url {
            raw.url = Some(url.clone());
        }

        let package = raw.into_package(&opts.attribute, &opts.import_path);
        if opts.version != VersionSpec::Skip && package.old_version.is_empty() {
            return Err(UpdateError::UnparsableVersion(package.name));
        }
        Ok(package)
    }
}
