//! Dependency hash pipeline
//!
//! After the source hash is updated every fixed-output dependency
//! derivation of the package is rebuilt with a blanked hash, and the
//! `outputHashes` of git dependencies in a `cargoLock` block are recomputed.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures::{StreamExt, TryStreamExt};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::config::UpdateOptions;
use crate::error::UpdateError;
use crate::eval::{CargoLockDescriptor, DependencyKind, Package};
use crate::git::git_prefetch;
use crate::hashes::update_hash_with_prefetch;
use crate::lockfile::{LockfileKind, generate_lockfile};
use crate::update::write_atomically;

static GIT_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git\+([^?]+)(\?(rev|tag|branch)=.*)?#(.*)$").unwrap());

static SHORT_LOCKFILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)cargoLock\.lockFile\s*=\s*(.+?)\s*;\s*$").unwrap());

static EXPANDED_LOCKFILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)lockFile\s*=\s*(.+?)\s*;\s*$").unwrap());

/// Refresh every dependency hash pinned by `package`.
///
/// Nothing happens for `--src-only` runs, or when the source hash exists
/// but was left untouched.
pub async fn update_dependency_hashes(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    package: &Package,
    update_hash: bool,
    max_concurrency: usize,
) -> Result<(), UpdateError> {
    if !(update_hash || package.hash.is_none()) || opts.src_only {
        return Ok(());
    }

    for (kind, hash) in &package.dependency_hashes {
        match kind {
            DependencyKind::NpmDeps if opts.generate_lockfile => {
                generate_lockfile(runner, opts, &package.filename, LockfileKind::Npm).await?;
            }
            _ => {
                update_hash_with_prefetch(runner, opts, &package.filename, kind.attribute(), hash)
                    .await?;
            }
        }
    }

    update_cargo_lock(
        runner,
        opts,
        &package.filename,
        &package.cargo_lock,
        max_concurrency,
    )
    .await?;

    if package.has_nuget_deps {
        update_nuget_deps(runner, opts).await?;
    }
    Ok(())
}

async fn update_nuget_deps(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
) -> Result<(), UpdateError> {
    let spec = CommandSpec::new("nix-build")
        .arg(opts.import_path.to_string_lossy())
        .arg("-A")
        .arg(format!("{}.fetch-deps", opts.attribute))
        .arg("--no-out-link");
    let script = run_checked(runner, &spec).await?;

    // The script works out its output path by itself
    run_checked(runner, &CommandSpec::new(script.stdout.trim())).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CargoLockFile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    source: Option<String>,
}

/// A git revision pinned by `Cargo.lock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitDependency {
    /// `<name>-<version>` of the first package built from the revision
    pub key: String,
    pub url: String,
    pub rev: String,
}

/// Git dependencies of a `Cargo.lock`, one per resolved revision, in lockfile order.
pub fn git_dependencies(lockfile: &str) -> Result<Vec<GitDependency>, UpdateError> {
    let lock: CargoLockFile = toml::from_str(lockfile)?;
    let mut by_rev: IndexMap<String, GitDependency> = IndexMap::new();

    for package in lock.package {
        let Some(captures) = package.source.as_deref().and_then(|s| GIT_SOURCE.captures(s)) else {
            continue;
        };
        let rev = captures[4].to_string();
        by_rev.entry(rev.clone()).or_insert_with(|| GitDependency {
            key: format!("{}-{}", package.name, package.version),
            url: captures[1].to_string(),
            rev,
        });
    }

    Ok(by_rev.into_values().collect())
}

/// Prefetch every dependency with at most `max_concurrency` in flight.
pub async fn prefetch_git_dependencies(
    runner: &dyn CommandRunner,
    dependencies: Vec<GitDependency>,
    max_concurrency: usize,
) -> Result<IndexMap<String, String>, UpdateError> {
    let hashes: Vec<(String, String)> = futures::stream::iter(dependencies)
        .map(|dependency| async move {
            debug!("prefetch {} at {}", dependency.url, dependency.rev);
            let hash = git_prefetch(runner, &dependency.url, &dependency.rev).await?;
            Ok::<_, UpdateError>((dependency.key, hash))
        })
        .buffered(max_concurrency.max(1))
        .try_collect()
        .await?;

    Ok(hashes.into_iter().collect())
}

async fn build_cargo_lock(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    out_dir: &Path,
) -> Result<Option<PathBuf>, UpdateError> {
    let expr = format!(
        r#"{}.overrideAttrs (old: {{
  cargoDeps = null;
  postUnpack = ''
    cp -r "$sourceRoot/${{old.cargoRoot or "."}}/Cargo.lock" $out
    exit
  '';
  outputs = [ "out" ];
  separateDebugInfo = false;
}})"#,
        opts.package_expr()
    );
    let spec = CommandSpec::new("nix")
        .arg("build")
        .arg("--out-link")
        .arg(out_dir.join("result").to_string_lossy())
        .args(["--impure", "--print-out-paths", "--expr"])
        .arg(expr)
        .args(&opts.extra_flags);
    let output = run_checked(runner, &spec).await?;

    let lockfile = PathBuf::from(output.stdout.trim());
    Ok(lockfile.is_file().then_some(lockfile))
}

fn push_output_hashes(out: &mut String, indent: &str, hashes: &IndexMap<String, String>) {
    if hashes.is_empty() {
        return;
    }
    out.push_str(&format!("{indent}outputHashes = {{\n"));
    for (key, hash) in hashes {
        out.push_str(&format!("{indent}  \"{key}\" = \"{hash}\";\n"));
    }
    out.push_str(&format!("{indent}}};\n"));
}

/// Write `hashes` as the `outputHashes` of the first `cargoLock` declaration in
/// `contents`.
///
/// `cargoLock.lockFile = ...;` is expanded into a block when there is
/// anything to add. In an existing block everything between `lockFile` and
/// the closing brace is replaced.
pub fn splice_output_hashes(contents: &str, hashes: &IndexMap<String, String>) -> String {
    let lines: Vec<&str> = contents.split_inclusive('\n').collect();
    let mut out = String::with_capacity(contents.len());

    for (i, line) in lines.iter().enumerate() {
        let bare = line.trim_end_matches(['\n', '\r']);

        if let Some(captures) = SHORT_LOCKFILE.captures(bare) {
            if hashes.is_empty() {
                return contents.to_string();
            }
            let indent = &captures[1];
            out.push_str(&format!("{indent}cargoLock = {{\n"));
            out.push_str(&format!("{indent}  lockFile = {};\n", &captures[2]));
            push_output_hashes(&mut out, &format!("{indent}  "), hashes);
            out.push_str(&format!("{indent}}};\n"));
            lines[i + 1..].iter().for_each(|rest| out.push_str(rest));
            return out;
        }

        if let Some(captures) = EXPANDED_LOCKFILE.captures(bare) {
            out.push_str(line);
            if !line.ends_with('\n') {
                out.push('\n');
            }
            push_output_hashes(&mut out, &captures[1], hashes);

            let mut depth = 0i32;
            for (j, next) in lines.iter().enumerate().skip(i + 1) {
                for c in next.chars() {
                    match c {
                        '{' => depth -= 1,
                        '}' => depth += 1,
                        _ => {}
                    }
                    if depth == 1 {
                        lines[j..].iter().for_each(|rest| out.push_str(rest));
                        return out;
                    }
                }
            }
            warn!("could not find the end of the cargoLock block");
            return contents.to_string();
        }

        out.push_str(line);
    }

    out
}

/// Recompute the `outputHashes` of the package's `cargoLock` block.
pub async fn update_cargo_lock(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    filename: &Path,
    descriptor: &CargoLockDescriptor,
    max_concurrency: usize,
) -> Result<(), UpdateError> {
    if *descriptor == CargoLockDescriptor::Absent {
        return Ok(());
    }
    if opts.generate_lockfile {
        return generate_lockfile(runner, opts, filename, LockfileKind::Cargo).await;
    }

    let out_dir = tempfile::tempdir()?;
    let Some(built) = build_cargo_lock(runner, opts, out_dir.path()).await? else {
        debug!("package build produced no Cargo.lock");
        return Ok(());
    };
    let lockfile = std::fs::read_to_string(&built)?;
    if let CargoLockDescriptor::InSourceTree(path) = descriptor {
        info!("Write {}", path.display());
        std::fs::write(path, &lockfile)?;
    }

    let dependencies = git_dependencies(&lockfile)?;
    let hashes = prefetch_git_dependencies(runner, dependencies, max_concurrency).await?;

    let contents = std::fs::read_to_string(filename)?;
    let spliced = splice_output_hashes(&contents, &hashes);
    if spliced != contents {
        write_atomically(filename, &spliced)?;
    }
    Ok(())
}
