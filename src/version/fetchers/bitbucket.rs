//! Bitbucket fetcher implementation

use serde::Deserialize;
use url::Url;

use crate::version::error::VersionError;
use crate::version::fetcher::{Fetcher, SnapshotFetcher, latest_release_number, snapshot_version};
use crate::version::fetchers::{base_for, owner_and_repo};
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

#[derive(Debug, Deserialize)]
struct Page<T> {
    values: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    target: Target,
}

#[derive(Debug, Deserialize)]
struct Target {
    hash: String,
    date: String,
}

#[derive(Debug, Clone)]
pub struct BitbucketFetcher {
    http: HttpClient,
    base_url: Option<String>,
}

impl BitbucketFetcher {
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

    /// `<base>/!api/2.0/repositories/<owner>/<repo>`
    fn api_url(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        if host != "bitbucket.org" && host != "bitbucket.io" {
            return None;
        }
        let (owner, repo) = owner_and_repo(url)?;
        Some(format!(
            "{}/!api/2.0/repositories/{}/{}",
            base_for(&self.base_url, host),
            owner,
            repo
        ))
    }

    async fn tags(&self, api_url: &str) -> Result<Vec<Version>, VersionError> {
        let page: Page<Tag> = self
            .http
            .get_json(&format!("{api_url}/refs/tags?sort=-target.date"))
            .await?;
        Ok(page.values.into_iter().map(|t| Version::new(t.name)).collect())
    }
}

#[async_trait::async_trait]
impl Fetcher for BitbucketFetcher {
    fn name(&self) -> &'static str {
        "bitbucket"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        match self.api_url(url) {
            Some(api_url) => self.tags(&api_url).await,
            None => Ok(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for BitbucketFetcher {
    fn name(&self) -> &'static str {
        "bitbucket"
    }

    async fn fetch_snapshots(
        &self,
        url: &Url,
        branch: &str,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        let Some(api_url) = self.api_url(url) else {
            return Ok(vec![]);
        };

        let query: String =
            url::form_urlencoded::byte_serialize(format!("name=\"{branch}\"").as_bytes()).collect();
        let page: Page<Branch> = self
            .http
            .get_json(&format!("{api_url}/refs?q={query}"))
            .await?;
        let Some(head) = page.values.into_iter().next() else {
            return Ok(vec![]);
        };

        let date: String = head.target.date.chars().take(10).collect();
        let latest = latest_release_number(self.tags(&api_url).await);
        Ok(vec![snapshot_version(&latest, &date, &head.target.hash)])
    }
}
