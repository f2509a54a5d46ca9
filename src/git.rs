//! Git helpers: working-tree drift recovery and git dependency prefetch

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::error::UpdateError;
use crate::hashes::to_sri;

static HUNK_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -(\d+),(\d+) \+(\d+),(\d+) @@$").unwrap());

/// Recover the version that `new_version` replaced on `line_number`, given the
/// output of `git diff --word-diff=porcelain`.
///
/// Returns `None` whenever the diff does not show a replacement on that line.
pub fn old_version_from_diff(diff: &str, line_number: u32, new_version: &str) -> Option<String> {
    let mut current_line: u32 = 0;
    let mut old: Option<&str> = None;
    let mut new: Option<&str> = None;

    for line in diff.split('\n') {
        if let Some(captures) = HUNK_HEADER.captures(line) {
            current_line = captures[3].parse().ok()?;
        } else if line.starts_with('~') {
            current_line += 1;
            if current_line > line_number {
                return None;
            }
        } else if current_line == line_number {
            if let Some(removed) = line.strip_prefix('-') {
                old = Some(removed);
            } else if let Some(added) = line.strip_prefix('+') {
                if added.contains(new_version) {
                    new = Some(added);
                    break;
                }
                old = None;
            }
        }
    }

    let (old, new) = (old.filter(|s| !s.is_empty())?, new.filter(|s| !s.is_empty())?);
    let idx = new.find(new_version)?;
    let prefix = &new[..idx];
    let suffix = &new[idx + new_version.len()..];
    Some(
        old.trim_start_matches(|c: char| prefix.contains(c))
            .trim_end_matches(|c: char| suffix.contains(c))
            .to_string(),
    )
}

/// Uncommitted edit of `filename` that already put `new_version` on
/// `line_number`, if any.
pub async fn old_version_from_git(
    runner: &dyn CommandRunner,
    filename: &Path,
    line_number: u32,
    new_version: &str,
) -> Option<String> {
    let mut spec = CommandSpec::new("git")
        .args(["diff", "--color=never", "--word-diff=porcelain", "--"])
        .arg(filename.to_string_lossy());
    if let Some(dir) = filename.parent().filter(|d| !d.as_os_str().is_empty()) {
        spec = spec.cwd(dir);
    }

    let output = match runner.run(&spec).await {
        Ok(output) if output.success() => output,
        Ok(output) => {
            debug!("git diff failed: {}", output.stderr.trim());
            return None;
        }
        Err(e) => {
            debug!("git diff failed: {}", e);
            return None;
        }
    };
    if output.stdout.is_empty() {
        return None;
    }
    old_version_from_diff(&output.stdout, line_number, new_version)
}

#[derive(Debug, Deserialize)]
struct PrefetchGitOutput {
    hash: Option<String>,
    sha256: Option<String>,
}

/// SRI hash of the tree at `rev` of the repository at `url`, submodules included.
pub async fn git_prefetch(
    runner: &dyn CommandRunner,
    url: &str,
    rev: &str,
) -> Result<String, UpdateError> {
    let spec = CommandSpec::new("nix-prefetch-git")
        .args(["--url", url, "--rev", rev, "--fetch-submodules"]);
    let output = run_checked(runner, &spec).await?;

    let prefetched: PrefetchGitOutput = serde_json::from_str(&output.stdout)?;
    let hash = prefetched
        .hash
        .or(prefetched.sha256)
        .ok_or_else(|| UpdateError::HashExtraction {
            attribute: format!("{url}#{rev}"),
        })?;
    to_sri(runner, &hash).await
}
