//! sourcehut fetcher implementation (`https://git.sr.ht/~owner/repo`)

use chrono::DateTime;
use url::Url;

use crate::version::error::{FetchError, VersionError};
use crate::version::feed::parse_feed;
use crate::version::fetcher::{Fetcher, SnapshotFetcher, latest_release_number, snapshot_version};
use crate::version::fetchers::{base_for, last_segment, path_parts};
use crate::version::http::HttpClient;
use crate::version::types::{Commit, FetcherArgs, Version};

const HOST: &str = "git.sr.ht";

#[derive(Debug, Clone)]
pub struct SourcehutFetcher {
    http: HttpClient,
    base_url: Option<String>,
}

impl SourcehutFetcher {
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

    /// `https://git.sr.ht/~owner/repo` for a source URL on git.sr.ht
    fn repository_url(&self, url: &Url) -> Option<String> {
        if url.host_str() != Some(HOST) {
            return None;
        }
        let parts = path_parts(url);
        let owner = parts.get(1).filter(|p| !p.is_empty())?;
        let repo = parts.get(2).filter(|p| !p.is_empty())?;
        Some(format!("{}/{}/{}", base_for(&self.base_url, HOST), owner, repo))
    }

    async fn tags(&self, repository_url: &str) -> Result<Vec<Version>, VersionError> {
        let body = self
            .http
            .get_bytes(&format!("{repository_url}/refs/rss.xml"))
            .await?;
        Ok(parse_feed(&body)?
            .into_iter()
            .filter_map(|item| item.link)
            .map(|link| Version::new(last_segment(&link)))
            .collect())
    }
}

#[async_trait::async_trait]
impl Fetcher for SourcehutFetcher {
    fn name(&self) -> &'static str {
        "sourcehut"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        match self.repository_url(url) {
            Some(repository_url) => self.tags(&repository_url).await,
            None => Ok(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for SourcehutFetcher {
    fn name(&self) -> &'static str {
        "sourcehut"
    }

    async fn fetch_snapshots(
        &self,
        url: &Url,
        branch: &str,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        let Some(repository_url) = self.repository_url(url) else {
            return Ok(vec![]);
        };

        let log_url = format!("{repository_url}/log/{branch}/rss.xml");
        let body = self.http.get_bytes(&log_url).await?;
        let Some(head) = parse_feed(&body)?.into_iter().next() else {
            return Err(VersionError::NoRelease(format!("no commits in {log_url}")));
        };
        let (Some(link), Some(pub_date)) = (head.link, head.pub_date) else {
            return Err(FetchError::InvalidResponse(format!(
                "commit item without link or pubDate in {log_url}"
            ))
            .into());
        };

        let date = DateTime::parse_from_rfc2822(&pub_date).map_err(|e| {
            FetchError::InvalidResponse(format!("unparsable pubDate {pub_date}: {e}"))
        })?;
        let sha = last_segment(&link);
        let latest = latest_release_number(self.tags(&repository_url).await);

        Ok(vec![
            snapshot_version(&latest, &date.format("%Y-%m-%d").to_string(), &sha)
                .with_commit(Commit { sha, date }),
        ])
    }
}
