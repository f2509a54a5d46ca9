//! GitHub fetcher implementation
//!
//! Releases are read from the public Atom feed by default, or from the REST
//! API when `use_github_releases` is set (the API reports prerelease flags).
//! Branch snapshots come from the commits Atom feed.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::version::error::{FetchError, VersionError};
use crate::version::feed::parse_feed;
use crate::version::fetcher::{Fetcher, SnapshotFetcher, latest_release_number, snapshot_version};
use crate::version::fetchers::last_segment;
use crate::version::http::HttpClient;
use crate::version::types::{Commit, FetcherArgs, Version};

/// Default base URL for GitHub API
const DEFAULT_API_URL: &str = "https://api.github.com";

/// `https://github.com/<owner>/<repo>/archive/<rev>.tar.gz`, on any host
static GITHUB_PUBLIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?P<owner>[^~]+?)/(?P<repo>.+?)(\.git)?/archive/(?P<rev>.+)\.tar\.gz$").unwrap()
});

/// Any `https://github.com/<owner>/<repo>/...` URL
static GITHUB_PUBLIC_GENERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?P<owner>[^~]+?)/(?P<repo>.+?)(\.git)?(/|$)").unwrap());

/// `https://api.github.com/repos/<owner>/<repo>/tarball/<rev>` and the GHE `/api/v3` variant
static GITHUB_PRIVATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(/api/v3)?/repos/(?P<owner>[^~]+?)/(?P<repo>.+?)/tarball/(?P<rev>.+)$").unwrap()
});

/// Response from GitHub Releases API
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    prerelease: bool,
}

/// Fetcher for GitHub (and GitHub Enterprise archive) sources
#[derive(Debug, Clone)]
pub struct GitHubFetcher {
    http: HttpClient,
    /// Replaces both `https://<host>` and the API URL when set
    base_url: Option<String>,
}

struct Repository {
    server: String,
    owner: String,
    repo: String,
}

impl GitHubFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: None,
        }
    }

    /// Creates a new GitHubFetcher that sends every request to `base_url`
    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: Some(base_url.to_string()),
        }
    }

    /// Owner and repository of a GitHub source URL
    pub fn owner_and_repo(url: &Url) -> Option<(String, String)> {
        let path = url.path();
        let captures = GITHUB_PUBLIC
            .captures(path)
            .or_else(|| GITHUB_PRIVATE.captures(path))
            .or_else(|| {
                if url.host_str() == Some("github.com") {
                    GITHUB_PUBLIC_GENERAL.captures(path)
                } else {
                    None
                }
            })?;
        Some((captures["owner"].to_string(), captures["repo"].to_string()))
    }

    fn repository(&self, url: &Url) -> Option<Repository> {
        let (owner, repo) = Self::owner_and_repo(url)?;
        let server = match &self.base_url {
            Some(base) => base.clone(),
            None => match url.host_str()? {
                // The API host does not serve the web feeds
                "api.github.com" => "https://github.com".to_string(),
                host => format!("https://{host}"),
            },
        };
        Some(Repository {
            server,
            owner,
            repo,
        })
    }

    async fn versions_from_feed(&self, repository: &Repository) -> Result<Vec<Version>, VersionError> {
        let feed_url = format!(
            "{}/{}/{}/releases.atom",
            repository.server, repository.owner, repository.repo
        );
        let body = self.http.get_bytes(&feed_url).await?;
        let entries = parse_feed(&body)?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| entry.link)
            .map(|link| Version::new(last_segment(&link)))
            .collect())
    }

    async fn versions_from_releases(
        &self,
        repository: &Repository,
    ) -> Result<Vec<Version>, VersionError> {
        let api_base = self.base_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let api_url = format!(
            "{}/repos/{}/{}/releases?per_page=100",
            api_base, repository.owner, repository.repo
        );
        let mut headers = vec![("Accept", "application/vnd.github+json".to_string())];
        if let Some(token) = self.http.github_token() {
            headers.push(("Authorization", format!("Bearer {token}")));
        }

        let releases: Vec<Release> = self.http.get_json_with_headers(&api_url, &headers).await?;

        Ok(releases
            .into_iter()
            .map(|r| Version::new(r.tag_name).with_prerelease(r.prerelease))
            .collect())
    }

    async fn versions(
        &self,
        repository: &Repository,
        args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        if args.use_github_releases {
            self.versions_from_releases(repository).await
        } else {
            self.versions_from_feed(repository).await
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for GitHubFetcher {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        match self.repository(url) {
            Some(repository) => self.versions(&repository, args).await,
            None => Ok(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for GitHubFetcher {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch_snapshots(
        &self,
        url: &Url,
        branch: &str,
        args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        let Some(repository) = self.repository(url) else {
            return Ok(vec![]);
        };

        let feed_url = format!(
            "{}/{}/{}/commits/{}.atom",
            repository.server, repository.owner, repository.repo, branch
        );
        let body = self.http.get_bytes(&feed_url).await?;
        let Some(head) = parse_feed(&body)?.into_iter().next() else {
            return Ok(vec![]);
        };

        let (Some(link), Some(updated)) = (head.link, head.updated) else {
            return Err(FetchError::InvalidResponse(format!(
                "commit entry without link or updated element in {feed_url}"
            ))
            .into());
        };
        let sha = last_segment(&link);
        let date = updated.split('T').next().unwrap_or_default().to_string();

        let latest = latest_release_number(self.versions(&repository, args).await);
        let mut version = snapshot_version(&latest, &date, &sha);
        match DateTime::parse_from_rfc3339(&updated) {
            Ok(date) => version = version.with_commit(Commit { sha, date }),
            Err(e) => warn!("unparsable commit date {}: {}", updated, e),
        }

        Ok(vec![version])
    }
}
