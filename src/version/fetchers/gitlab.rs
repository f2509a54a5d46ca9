//! GitLab fetcher implementation
//!
//! Handles `fetchFromGitLab` archive URLs of the form
//! `https://<domain>/api/v4/projects/<id>/repository/archive.tar.gz?sha=<rev>`
//! on gitlab.com and self-hosted instances.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::version::error::{FetchError, VersionError};
use crate::version::fetcher::{Fetcher, SnapshotFetcher, latest_release_number, snapshot_version};
use crate::version::http::HttpClient;
use crate::version::types::{Commit, FetcherArgs, Version};

static GITLAB_API: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^http(s)?://(?P<domain>[^/]+)/api/v4/projects/(?P<project_id>[^/]*)/repository/archive\.tar\.gz\?sha=(?P<version>.+)",
    )
    .unwrap()
});

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    /// Present when the tag has a release attached
    release: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    id: String,
    committed_date: String,
}

/// Fetcher for GitLab-hosted sources
#[derive(Debug, Clone)]
pub struct GitLabFetcher {
    http: HttpClient,
    base_url: Option<String>,
}

impl GitLabFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: None,
        }
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: Some(base_url.to_string()),
        }
    }

    /// `https://<domain>/api/v4/projects/<id>` for a matching archive URL
    fn project_url(&self, url: &Url) -> Option<String> {
        let captures = GITLAB_API.captures(url.as_str())?;
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", &captures["domain"]));
        Some(format!("{}/api/v4/projects/{}", base, &captures["project_id"]))
    }

    async fn tags(&self, project_url: &str) -> Result<Vec<Version>, VersionError> {
        let tags: Vec<Tag> = self
            .http
            .get_json(&format!("{project_url}/repository/tags"))
            .await?;
        if tags.is_empty() {
            return Err(VersionError::NoTags);
        }

        let (released, unreleased): (Vec<_>, Vec<_>) =
            tags.into_iter().partition(|t| t.release.is_some());
        let preferred = if released.is_empty() {
            unreleased
        } else {
            released
        };

        Ok(preferred
            .into_iter()
            .map(|t| Version::new(t.name.clone()).with_tag(t.name))
            .collect())
    }
}

#[async_trait::async_trait]
impl Fetcher for GitLabFetcher {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        match self.project_url(url) {
            Some(project_url) => self.tags(&project_url).await,
            None => Ok(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for GitLabFetcher {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn fetch_snapshots(
        &self,
        url: &Url,
        branch: &str,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        let Some(project_url) = self.project_url(url) else {
            return Ok(vec![]);
        };

        let ref_name: String = url::form_urlencoded::byte_serialize(branch.as_bytes()).collect();
        let commits: Vec<CommitResponse> = self
            .http
            .get_json(&format!(
                "{project_url}/repository/commits?ref_name={ref_name}"
            ))
            .await?;
        let Some(head) = commits.into_iter().next() else {
            return Ok(vec![]);
        };

        let latest = latest_release_number(self.tags(&project_url).await);
        match DateTime::parse_from_rfc3339(&head.committed_date) {
            Ok(date) => {
                let day = date.format("%Y-%m-%d").to_string();
                Ok(vec![snapshot_version(&latest, &day, &head.id).with_commit(
                    Commit {
                        sha: head.id.clone(),
                        date,
                    },
                )])
            }
            Err(e) => Err(FetchError::InvalidResponse(format!(
                "unparsable committed_date {}: {}",
                head.committed_date, e
            ))
            .into()),
        }
    }
}
