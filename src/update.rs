//! Update orchestration
//!
//! [`Updater::update`] evaluates the package, resolves the new version,
//! rewrites the manifest and then refreshes the source hash, sub-packages
//! and dependency hashes, in that order.

use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::config::{Settings, UpdateOptions, VersionSpec};
use crate::deps::update_dependency_hashes;
use crate::diff_urls::diff_url;
use crate::error::UpdateError;
use crate::eval::{Evaluator, Package};
use crate::git::old_version_from_git;
use crate::hashes::update_src_hash;
use crate::version::ordering::compare_versions;
use crate::version::types::FetcherArgs;
use crate::version::{FetcherRegistry, Version, VersionFetchConfig, fetch_latest_version};

/// Result of updating one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The package as evaluated before the update
    pub package: Package,
    /// `None` when the version was skipped
    pub new_version: Option<Version>,
    /// Whether the manifest's version or revision was rewritten
    pub changed: bool,
    pub diff_url: Option<String>,
}

struct VersionUpdate {
    new_version: Version,
    changed: bool,
    diff_url: Option<String>,
}

/// Replace `path` with `contents` without ever exposing a partially written file.
pub fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)?.permissions();

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().set_permissions(permissions)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Rewrite the version and revision tokens of the package manifest.
///
/// Returns whether anything had to change. When the declaration line of
/// `version` holds the quoted old version only that line is touched;
/// otherwise every quoted occurrence is replaced.
pub fn replace_version(package: &Package, new_version: &Version) -> Result<bool, UpdateError> {
    let old_rev_tag = package.old_rev_tag();
    let old_version = package.old_version.as_str();
    let new_number = new_version.number.strip_prefix('v').unwrap_or(&new_version.number);

    let changed = old_version != new_number
        || new_version
            .rev
            .as_deref()
            .is_some_and(|rev| Some(rev) != old_rev_tag);
    if !changed {
        info!("Not updating version, already {}", old_version);
        return Ok(false);
    }

    info!(
        "Update {} -> {} in {}",
        old_version,
        new_number,
        package.filename.display()
    );
    let contents = std::fs::read_to_string(&package.filename)?;
    let quoted_old = format!("\"{old_version}\"");
    let quoted_new = format!("\"{new_number}\"");
    let declaration_line = package.version_position.as_ref().map(|p| p.line);
    let only_declaration = declaration_line.is_some_and(|line| {
        contents
            .lines()
            .nth(line.saturating_sub(1))
            .is_some_and(|l| l.contains(&quoted_old))
    });

    let mut rewritten = String::with_capacity(contents.len());
    for (i, line) in contents.split_inclusive('\n').enumerate() {
        let mut line = line.to_string();
        if let (Some(old_rev), Some(new_rev)) = (old_rev_tag, new_version.rev.as_deref()) {
            line = line.replace(old_rev, new_rev);
        }
        if !only_declaration || declaration_line == Some(i + 1) {
            line = line.replace(&quoted_old, &quoted_new);
        }
        rewritten.push_str(&line);
    }

    if rewritten != contents {
        write_atomically(&package.filename, &rewritten)?;
    }
    Ok(true)
}

/// Drives the update of one attribute and its sub-packages
pub struct Updater {
    registry: FetcherRegistry,
    evaluator: Arc<dyn Evaluator>,
    runner: Arc<dyn CommandRunner>,
    settings: Settings,
}

impl Updater {
    pub fn new(
        registry: FetcherRegistry,
        evaluator: Arc<dyn Evaluator>,
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            evaluator,
            runner,
            settings,
        }
    }

    pub async fn update(&self, opts: &UpdateOptions) -> Result<UpdateOutcome, UpdateError> {
        let mut package = self.evaluator.evaluate(opts).await?;

        if package.has_update_script && opts.use_update_script {
            self.run_update_script(opts, &package).await?;
            let updated = self.evaluator.evaluate(opts).await?;
            let new_version = Version {
                number: updated.old_version,
                rev: updated.rev,
                tag: updated.tag,
                ..Default::default()
            };
            let changed = new_version.number != package.old_version;
            return Ok(UpdateOutcome {
                package,
                new_version: Some(new_version),
                changed,
                diff_url: None,
            });
        }

        let mut outcome_version = None;
        let mut changed = false;
        let mut diff = None;
        let update_hash = if opts.version == VersionSpec::Skip {
            true
        } else {
            let update = self.update_version(opts, &mut package).await?;
            changed = update.changed;
            diff = update.diff_url;
            outcome_version = Some(update.new_version);
            changed
        };

        let src_hash = package
            .hash
            .as_deref()
            .filter(|_| update_hash && opts.update_src);
        if let Some(hash) = src_hash {
            update_src_hash(self.runner.as_ref(), opts, &package.filename, hash).await?;
        }

        for name in &opts.subpackages {
            info!("Updating subpackage {}", name);
            let sub_opts = opts.for_subpackage(name)?;
            Box::pin(self.update(&sub_opts)).await?;
        }

        update_dependency_hashes(
            self.runner.as_ref(),
            opts,
            &package,
            update_hash,
            self.settings.prefetch.max_concurrency,
        )
        .await?;

        Ok(UpdateOutcome {
            package,
            new_version: outcome_version,
            changed,
            diff_url: diff,
        })
    }

    async fn fetch_new_version(
        &self,
        opts: &UpdateOptions,
        package: &Package,
    ) -> Result<Version, UpdateError> {
        let branch = match &opts.version {
            VersionSpec::Fixed(version) => return Ok(Version::new(version.clone())),
            VersionSpec::Branch(branch) => Some(branch.clone()),
            _ => None,
        };
        let url = package.parsed_url().ok_or(UpdateError::NoUrl)?;

        let old_rev_tag = package.old_rev_tag();
        let version_prefix = match (&branch, old_rev_tag) {
            (None, Some(rev_tag)) => rev_tag
                .strip_suffix(package.old_version.as_str())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };

        let config = VersionFetchConfig {
            branch,
            old_rev_tag: old_rev_tag.map(str::to_string),
            version_prefix,
            fetcher_args: FetcherArgs {
                use_github_releases: opts.use_github_releases,
            },
            ..VersionFetchConfig::new(opts.version.preference(), opts.version_regex.clone())
        };
        Ok(fetch_latest_version(&self.registry, &url, &config).await?)
    }

    async fn update_version(
        &self,
        opts: &UpdateOptions,
        package: &mut Package,
    ) -> Result<VersionUpdate, UpdateError> {
        let mut new_version = self.fetch_new_version(opts, package).await?;
        if let Some(stripped) = new_version.number.strip_prefix('v') {
            new_version.number = stripped.to_string();
        }
        let new_number = new_version.number.clone();

        if compare_versions(&new_number, &package.old_version) == Ordering::Less
            && !matches!(opts.version, VersionSpec::Fixed(_) | VersionSpec::Branch(_))
        {
            warn!(
                "New version {} is older than the current version {}",
                new_number, package.old_version
            );
        }

        // The manifest may already carry the new version from an uncommitted edit
        let position = package
            .version_position
            .as_ref()
            .filter(|_| new_number == package.old_version);
        if let Some(position) = position {
            let recovered = old_version_from_git(
                self.runner.as_ref(),
                &position.file,
                position.line as u32,
                &new_number,
            )
            .await;
            if let Some(recovered) = recovered.filter(|v| !v.is_empty()) {
                info!("Version already changed in the working tree, was {}", recovered);
                package.old_version = recovered;
                return Ok(VersionUpdate {
                    new_version,
                    changed: false,
                    diff_url: None,
                });
            }
        }

        if !replace_version(package, &new_version)? {
            return Ok(VersionUpdate {
                new_version,
                changed: false,
                diff_url: None,
            });
        }

        let diff_url = diff_url(self.evaluator.as_ref(), opts, package, &new_version).await?;
        Ok(VersionUpdate {
            new_version,
            changed: true,
            diff_url,
        })
    }

    async fn run_update_script(
        &self,
        opts: &UpdateOptions,
        package: &Package,
    ) -> Result<(), UpdateError> {
        let runner = self.runner.as_ref();

        if !opts.flake {
            let spec = CommandSpec::new("nix-shell")
                .args(&opts.extra_flags)
                .arg(
                    opts.import_path
                        .join("maintainers/scripts/update.nix")
                        .to_string_lossy(),
                )
                .args(["--argstr", "package"])
                .arg(opts.attribute.as_str())
                .args(["--argstr", "skip-prompt", "true"])
                .args(&opts.update_script_args);
            run_checked(runner, &spec).await?;
            return Ok(());
        }

        let package_expr = opts.package_expr();
        let build = CommandSpec::new("nix")
            .arg("build")
            .args(&opts.extra_flags)
            .args(["--print-out-paths", "--impure", "--expr"])
            .arg(format!(
                "with import <nixpkgs> {{}}; let pkg = {package_expr}; in (pkgs.writeScript \"updateScript\" (lib.escapeShellArgs (pkgs.lib.toList (pkg.updateScript.command or pkg.updateScript))))"
            ));
        let script = run_checked(runner, &build).await?;

        let command = format!(
            "env UPDATE_NIX_NAME={} UPDATE_NIX_PNAME={} UPDATE_NIX_OLD_VERSION={} UPDATE_NIX_ATTR_PATH={} {}",
            package.name,
            package.pname,
            package.old_version,
            package.attribute,
            script.stdout.trim()
        );
        let develop = CommandSpec::new("nix")
            .arg("develop")
            .args(&opts.extra_flags)
            .args(["--impure", "--expr"])
            .arg(format!(
                "with import <nixpkgs> {{}}; pkgs.mkShell {{inputsFrom = [{package_expr}];}}"
            ))
            .args(["--command", "bash", "-c"])
            .arg(command)
            .args(&opts.update_script_args)
            .cwd(&opts.import_path);
        run_checked(runner, &develop).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, MockCommandRunner};
    use crate::config::HttpSettings;
    use crate::eval::{MockEvaluator, Position};
    use crate::version::VersionPreference;
    use crate::version::error::VersionError;
    use crate::version::fetcher::{Fetcher, MockFetcher};
    use crate::version::fetchers::GitLabFetcher;
    use crate::version::http::HttpClient;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const FD_MANIFEST: &str = r#"{ fetchFromGitHub, rustPlatform }:

rustPlatform.buildRustPackage rec {
  pname = "fd";
  version = "8.0.0";

  src = fetchFromGitHub {
    owner = "sharkdp";
    repo = "fd";
    rev = "v${version}";
    hash = "sha256-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
  };
}
"#;

    fn fd_package(filename: PathBuf, version: &str) -> Package {
        Package {
            attribute: "fd".to_string(),
            name: format!("fd-{version}"),
            pname: "fd".to_string(),
            old_version: version.to_string(),
            version_position: Some(Position {
                file: filename.clone(),
                line: 5,
                column: 3,
            }),
            filename,
            url: Some(format!(
                "https://github.com/sharkdp/fd/archive/v{version}.tar.gz"
            )),
            rev: Some(format!("v{version}")),
            hash: Some("sha256-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string()),
            ..Default::default()
        }
    }

    fn registry_returning(numbers: &'static [&'static str]) -> FetcherRegistry {
        let mut fetcher = MockFetcher::new();
        fetcher.expect_name().return_const("github");
        fetcher
            .expect_fetch_versions()
            .returning(|_, _| Ok(numbers.iter().map(|n| Version::new(*n)).collect()));
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(fetcher)];
        FetcherRegistry::with_fetchers(fetchers, vec![])
    }

    /// Evaluator that reads the version back from the manifest on disk
    fn manifest_evaluator(filename: PathBuf) -> MockEvaluator {
        let mut evaluator = MockEvaluator::new();
        evaluator.expect_evaluate().returning(move |_| {
            let contents = std::fs::read_to_string(&filename).unwrap();
            let version = contents
                .lines()
                .find_map(|l| l.trim().strip_prefix("version = \""))
                .and_then(|rest| rest.strip_suffix("\";"))
                .unwrap()
                .to_string();
            Ok(fd_package(filename.clone(), &version))
        });
        evaluator
    }

    /// Runner that answers the source rebuild and finds no working-tree edits
    fn nix_runner(got_hash: &'static str) -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(move |spec| {
            let output = match spec.program.as_str() {
                "nix-build" => CommandOutput {
                    status: Some(1),
                    stdout: String::new(),
                    stderr: format!("error: hash mismatch\n         got:    {got_hash}\n"),
                },
                _ => CommandOutput {
                    status: Some(0),
                    ..Default::default()
                },
            };
            Ok(output)
        });
        runner
    }

    fn package_with(contents: &str, old: &str, line: usize) -> (tempfile::TempDir, Package) {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("default.nix");
        std::fs::write(&filename, contents).unwrap();
        let package = Package {
            old_version: old.to_string(),
            version_position: Some(Position {
                file: filename.clone(),
                line,
                column: 3,
            }),
            filename,
            ..Default::default()
        };
        (dir, package)
    }

    #[test]
    fn replace_version_only_touches_declaration_line() {
        let contents = "{\n  version = \"1.0\";\n  compat = \"1.0\";\n}\n";
        let (_dir, package) = package_with(contents, "1.0", 2);

        let changed = replace_version(&package, &Version::new("v1.1")).unwrap();

        assert!(changed);
        assert_eq!(
            std::fs::read_to_string(&package.filename).unwrap(),
            "{\n  version = \"1.1\";\n  compat = \"1.0\";\n}\n"
        );
    }

    #[test]
    fn replace_version_replaces_everywhere_when_declaration_is_indirect() {
        let contents = "let v = \"1.0\"; in {\n  version = v;\n  other = \"1.0\";\n}\n";
        let (_dir, package) = package_with(contents, "1.0", 2);

        replace_version(&package, &Version::new("1.1")).unwrap();

        assert_eq!(
            std::fs::read_to_string(&package.filename).unwrap(),
            "let v = \"1.1\"; in {\n  version = v;\n  other = \"1.1\";\n}\n"
        );
    }

    #[test]
    fn replace_version_rewrites_revision() {
        let contents = "{\n  version = \"0-unstable-2024-01-01\";\n  rev = \"aaaa\";\n}\n";
        let (_dir, mut package) = package_with(contents, "0-unstable-2024-01-01", 2);
        package.rev = Some("aaaa".to_string());

        let changed = replace_version(
            &package,
            &Version::new("0-unstable-2024-02-02").with_rev("bbbb"),
        )
        .unwrap();

        assert!(changed);
        assert_eq!(
            std::fs::read_to_string(&package.filename).unwrap(),
            "{\n  version = \"0-unstable-2024-02-02\";\n  rev = \"bbbb\";\n}\n"
        );
    }

    #[test]
    fn replace_version_same_version_and_rev_is_unchanged() {
        let contents = "{\n  version = \"1.0\";\n  rev = \"v1.0\";\n}\n";
        let (_dir, mut package) = package_with(contents, "1.0", 2);
        package.rev = Some("v1.0".to_string());

        let changed = replace_version(&package, &Version::new("v1.0").with_rev("v1.0")).unwrap();

        assert!(!changed);
        assert_eq!(std::fs::read_to_string(&package.filename).unwrap(), contents);
    }

    #[tokio::test]
    async fn update_bumps_version_and_source_hash() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("default.nix");
        std::fs::write(&filename, FD_MANIFEST).unwrap();
        let updater = Updater::new(
            registry_returning(&["v8.5.2", "v8.5.1", "v8.0.0"]),
            Arc::new(manifest_evaluator(filename.clone())),
            Arc::new(nix_runner("sha256-kRMUuBeA8m/a+H4XF0IQvb1AyGusF5UhLyV83CNqHng=")),
            Settings::default(),
        );
        let opts = UpdateOptions::new("fd", dir.path()).unwrap();

        let outcome = updater.update(&opts).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.new_version.unwrap().number, "8.5.2");
        assert_eq!(
            outcome.diff_url.as_deref(),
            Some("https://github.com/sharkdp/fd/compare/v8.0.0...v8.5.2")
        );
        assert_eq!(
            std::fs::read_to_string(&filename).unwrap(),
            FD_MANIFEST
                .replace("\"8.0.0\"", "\"8.5.2\"")
                .replace(
                    "sha256-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=",
                    "sha256-kRMUuBeA8m/a+H4XF0IQvb1AyGusF5UhLyV83CNqHng="
                )
        );
    }

    #[tokio::test]
    async fn update_twice_leaves_manifest_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("default.nix");
        std::fs::write(&filename, FD_MANIFEST).unwrap();
        let updater = Updater::new(
            registry_returning(&["v8.5.2"]),
            Arc::new(manifest_evaluator(filename.clone())),
            Arc::new(nix_runner("sha256-kRMUuBeA8m/a+H4XF0IQvb1AyGusF5UhLyV83CNqHng=")),
            Settings::default(),
        );
        let opts = UpdateOptions::new("fd", dir.path()).unwrap();
        updater.update(&opts).await.unwrap();
        let after_first = std::fs::read_to_string(&filename).unwrap();

        let outcome = updater.update(&opts).await.unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.diff_url, None);
        assert_eq!(std::fs::read_to_string(&filename).unwrap(), after_first);
    }

    #[tokio::test]
    async fn update_recovers_old_version_from_working_tree() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("default.nix");
        let edited = FD_MANIFEST.replace("\"8.0.0\"", "\"8.5.2\"");
        std::fs::write(&filename, &edited).unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec| spec.program == "git")
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    status: Some(0),
                    stdout: "@@ -5,7 +5,7 @@\n version = \n-\"8.0.0\";\n+\"8.5.2\";\n~\n"
                        .to_string(),
                    stderr: String::new(),
                })
            });
        let updater = Updater::new(
            registry_returning(&["v8.5.2"]),
            Arc::new(manifest_evaluator(filename.clone())),
            Arc::new(runner),
            Settings::default(),
        );
        let mut opts = UpdateOptions::new("fd", dir.path()).unwrap();
        opts.update_src = false;

        let outcome = updater.update(&opts).await.unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.package.old_version, "8.0.0");
        assert_eq!(std::fs::read_to_string(&filename).unwrap(), edited);
    }

    #[tokio::test]
    async fn update_reports_version_without_leading_v() {
        let contents = "{\n  version = \"8.0.0\";\n}\n";
        let (_dir, mut package) = package_with(contents, "8.0.0", 2);
        package.url = Some("https://example.org/fd-8.0.0.tar.gz".to_string());
        let filename = package.filename.clone();
        let mut evaluator = MockEvaluator::new();
        evaluator
            .expect_evaluate()
            .returning(move |_| Ok(package.clone()));
        let updater = Updater::new(
            registry_returning(&["v8.5.2"]),
            Arc::new(evaluator),
            Arc::new(nix_runner("sha256-kRMUuBeA8m/a+H4XF0IQvb1AyGusF5UhLyV83CNqHng=")),
            Settings::default(),
        );
        let mut opts = UpdateOptions::new("fd", "/src").unwrap();
        opts.update_src = false;

        let outcome = updater.update(&opts).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.new_version.unwrap().number, "8.5.2");
        assert_eq!(
            std::fs::read_to_string(&filename).unwrap(),
            "{\n  version = \"8.5.2\";\n}\n"
        );
    }

    #[tokio::test]
    async fn update_current_gitlab_tag_leaves_manifest_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/group%2Frepo/repository/tags")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"name": "v1.3.0", "commit": {"id": "0123456789abcdef"}, "release": null}]"#,
            )
            .create_async()
            .await;
        let gitlab = GitLabFetcher::with_base_url(
            HttpClient::new(&HttpSettings::default()).unwrap(),
            &server.url(),
        );
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(gitlab)];

        let contents = "{\n  version = \"1.3.0\";\n  src = fetchFromGitLab {\n    rev = \"v1.3.0\";\n  };\n}\n";
        let (_dir, mut package) = package_with(contents, "1.3.0", 2);
        package.url = Some(
            "https://gitlab.com/api/v4/projects/group%2Frepo/repository/archive.tar.gz?sha=v1.3.0"
                .to_string(),
        );
        package.rev = Some("v1.3.0".to_string());
        let filename = package.filename.clone();
        let mut evaluator = MockEvaluator::new();
        evaluator
            .expect_evaluate()
            .returning(move |_| Ok(package.clone()));
        let updater = Updater::new(
            FetcherRegistry::with_fetchers(fetchers, vec![]),
            Arc::new(evaluator),
            Arc::new(nix_runner("sha256-kRMUuBeA8m/a+H4XF0IQvb1AyGusF5UhLyV83CNqHng=")),
            Settings::default(),
        );
        let opts = UpdateOptions::new("foo", "/src").unwrap();

        let outcome = updater.update(&opts).await.unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.new_version.unwrap().rev, None);
        assert_eq!(std::fs::read_to_string(&filename).unwrap(), contents);
    }

    #[tokio::test]
    async fn update_without_url_fails() {
        let mut evaluator = MockEvaluator::new();
        evaluator.expect_evaluate().returning(|_| {
            Ok(Package {
                old_version: "1.0".to_string(),
                ..Default::default()
            })
        });
        let updater = Updater::new(
            FetcherRegistry::with_fetchers(vec![], vec![]),
            Arc::new(evaluator),
            Arc::new(MockCommandRunner::new()),
            Settings::default(),
        );
        let opts = UpdateOptions::new("foo", "/src").unwrap();

        let result = updater.update(&opts).await;

        assert!(matches!(result, Err(UpdateError::NoUrl)));
    }

    #[tokio::test]
    async fn update_propagates_resolution_errors() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("default.nix");
        std::fs::write(&filename, FD_MANIFEST).unwrap();
        let updater = Updater::new(
            registry_returning(&["v9.0.0-rc1"]),
            Arc::new(manifest_evaluator(filename.clone())),
            Arc::new(MockCommandRunner::new()),
            Settings::default(),
        );
        let opts = UpdateOptions::new("fd", dir.path()).unwrap();

        let result = updater.update(&opts).await;

        assert!(matches!(
            result,
            Err(UpdateError::Version(VersionError::OnlyUnstable(_)))
        ));
        assert_eq!(std::fs::read_to_string(&filename).unwrap(), FD_MANIFEST);
    }

    #[tokio::test]
    async fn fixed_version_skips_fetchers() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("default.nix");
        std::fs::write(&filename, FD_MANIFEST).unwrap();
        let mut fetcher = MockFetcher::new();
        fetcher.expect_name().return_const("github");
        fetcher.expect_fetch_versions().never();
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(fetcher)];
        let updater = Updater::new(
            FetcherRegistry::with_fetchers(fetchers, vec![]),
            Arc::new(manifest_evaluator(filename.clone())),
            Arc::new(nix_runner("sha256-kRMUuBeA8m/a+H4XF0IQvb1AyGusF5UhLyV83CNqHng=")),
            Settings::default(),
        );
        let mut opts = UpdateOptions::new("fd", dir.path()).unwrap();
        opts.version = VersionSpec::Fixed("8.1.0".to_string());
        opts.update_src = false;

        let outcome = updater.update(&opts).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.new_version, Some(Version::new("8.1.0")));
        assert!(std::fs::read_to_string(&filename).unwrap().contains("version = \"8.1.0\";"));
    }

    #[tokio::test]
    async fn subpackages_are_updated_with_skipped_version() {
        let seen: Arc<Mutex<Vec<(String, VersionPreference)>>> = Arc::default();
        let recorded = Arc::clone(&seen);
        let mut evaluator = MockEvaluator::new();
        evaluator.expect_evaluate().returning(move |opts| {
            recorded
                .lock()
                .unwrap()
                .push((opts.attribute.clone(), opts.version.preference()));
            Ok(Package {
                old_version: "1.0".to_string(),
                ..Default::default()
            })
        });
        let updater = Updater::new(
            FetcherRegistry::with_fetchers(vec![], vec![]),
            Arc::new(evaluator),
            Arc::new(MockCommandRunner::new()),
            Settings::default(),
        );
        let mut opts = UpdateOptions::new("foo", "/src").unwrap();
        opts.version = VersionSpec::Skip;
        opts.subpackages = vec!["goModules".to_string(), "ui".to_string()];

        let outcome = updater.update(&opts).await.unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.new_version, None);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("foo".to_string(), VersionPreference::Skip),
                ("foo.goModules".to_string(), VersionPreference::Skip),
                ("foo.ui".to_string(), VersionPreference::Skip),
            ]
        );
    }

    #[tokio::test]
    async fn update_script_reports_reevaluated_version() {
        let mut evaluator = MockEvaluator::new();
        let mut calls = 0;
        evaluator.expect_evaluate().times(2).returning(move |_| {
            calls += 1;
            let version = if calls == 1 { "1.0" } else { "1.1" };
            Ok(Package {
                attribute: "foo".to_string(),
                old_version: version.to_string(),
                has_update_script: true,
                ..Default::default()
            })
        });
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec| {
                spec.program == "nix-shell"
                    && spec.args[0] == "/src/maintainers/scripts/update.nix"
                    && spec.args[1..5] == ["--argstr", "package", "foo", "--argstr"]
            })
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    status: Some(0),
                    ..Default::default()
                })
            });
        let updater = Updater::new(
            FetcherRegistry::with_fetchers(vec![], vec![]),
            Arc::new(evaluator),
            Arc::new(runner),
            Settings::default(),
        );
        let mut opts = UpdateOptions::new("foo", "/src").unwrap();
        opts.use_update_script = true;

        let outcome = updater.update(&opts).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.package.old_version, "1.0");
        assert_eq!(outcome.new_version, Some(Version::new("1.1")));
    }

    #[test]
    fn write_atomically_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("default.nix");
        std::fs::write(&file, "old").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_atomically(&file, "new").unwrap();

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "new");
        assert_eq!(
            std::fs::metadata(&file).unwrap().permissions().mode() & 0o777,
            0o644
        );
    }
}
