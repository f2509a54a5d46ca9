//! Evaluator test utilities

use std::path::PathBuf;

use async_trait::async_trait;

use nix_bump::config::UpdateOptions;
use nix_bump::error::UpdateError;
use nix_bump::eval::{Evaluator, Package, Position};

/// Evaluator that reads `version = "...";` back from a manifest on disk,
/// standing in for `nix-instantiate` on a `fetchFromGitHub` package.
pub struct ManifestEvaluator {
    filename: PathBuf,
    owner: String,
    repo: String,
    hash: Option<String>,
}

impl ManifestEvaluator {
    pub fn new(filename: PathBuf, owner: &str, repo: &str) -> Self {
        Self {
            filename,
            owner: owner.to_string(),
            repo: repo.to_string(),
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: &str) -> Self {
        self.hash = Some(hash.to_string());
        self
    }

    fn declared_version(contents: &str) -> Option<(usize, String)> {
        contents.lines().enumerate().find_map(|(i, line)| {
            let rest = line.trim().strip_prefix("version = \"")?;
            let version = rest.strip_suffix("\";")?;
            Some((i + 1, version.to_string()))
        })
    }
}

#[async_trait]
impl Evaluator for ManifestEvaluator {
    async fn evaluate(&self, opts: &UpdateOptions) -> Result<Package, UpdateError> {
        let contents = std::fs::read_to_string(&self.filename)?;
        let (line, version) = Self::declared_version(&contents)
            .ok_or_else(|| UpdateError::UnparsableVersion(opts.attribute.clone()))?;

        Ok(Package {
            attribute: opts.attribute.clone(),
            name: format!("{}-{}", self.repo, version),
            pname: self.repo.clone(),
            filename: self.filename.clone(),
            version_position: Some(Position {
                file: self.filename.clone(),
                line,
                column: 3,
            }),
            url: Some(format!(
                "https://github.com/{}/{}/archive/v{}.tar.gz",
                self.owner, self.repo, version
            )),
            rev: Some(format!("v{version}")),
            hash: self.hash.clone(),
            old_version: version,
            ..Default::default()
        })
    }
}
