//! Gitea and Forgejo fetcher implementation
//!
//! Well-known instances are matched by host; any other host is probed for
//! the Gitea settings endpoint before it is treated as one.

use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::version::error::{FetchError, VersionError};
use crate::version::fetcher::{Fetcher, SnapshotFetcher, latest_release_number, snapshot_version};
use crate::version::fetchers::{base_for, owner_and_repo};
use crate::version::http::HttpClient;
use crate::version::types::{Commit, FetcherArgs, Version};

const KNOWN_HOSTS: &[&str] = &["codeberg.org", "gitea.com", "akkoma.dev"];

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: Signature,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: String,
}

#[derive(Debug, Clone)]
pub struct GiteaFetcher {
    http: HttpClient,
    base_url: Option<String>,
}

impl GiteaFetcher {
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

    /// `<base>/api/v1/repos/<owner>/<repo>` when the URL is on a Gitea instance
    async fn repo_api_url(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let (owner, repo) = owner_and_repo(url)?;
        let base = base_for(&self.base_url, host);

        if !KNOWN_HOSTS.contains(&host)
            && !self.http.probe(&format!("{base}/api/v1/settings/api")).await
        {
            debug!("{} does not look like a Gitea instance", host);
            return None;
        }

        Some(format!("{base}/api/v1/repos/{owner}/{repo}"))
    }

    async fn tags(&self, api_url: &str) -> Result<Vec<Version>, VersionError> {
        let tags: Vec<Tag> = self.http.get_json(&format!("{api_url}/tags")).await?;
        Ok(tags.into_iter().map(|t| Version::new(t.name)).collect())
    }
}

#[async_trait::async_trait]
impl Fetcher for GiteaFetcher {
    fn name(&self) -> &'static str {
        "gitea"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        match self.repo_api_url(url).await {
            Some(api_url) => self.tags(&api_url).await,
            None => Ok(vec![]),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for GiteaFetcher {
    fn name(&self) -> &'static str {
        "gitea"
    }

    async fn fetch_snapshots(
        &self,
        url: &Url,
        branch: &str,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        let Some(api_url) = self.repo_api_url(url).await else {
            return Ok(vec![]);
        };

        let commits: Vec<CommitEntry> = self
            .http
            .get_json(&format!(
                "{api_url}/commits?sha={branch}&limit=1&stat=false&verification=false&files=false"
            ))
            .await?;
        let Some(head) = commits.into_iter().next() else {
            return Ok(vec![]);
        };

        let committed = head.commit.committer.date;
        let date = DateTime::parse_from_rfc3339(&committed).map_err(|e| {
            FetchError::InvalidResponse(format!("unparsable commit date {committed}: {e}"))
        })?;
        let day: String = committed.chars().take(10).collect();
        let latest = latest_release_number(self.tags(&api_url).await);

        Ok(vec![snapshot_version(&latest, &day, &head.sha).with_commit(
            Commit {
                sha: head.sha.clone(),
                date,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use mockito::{Matcher, Server};

    fn fetcher(base_url: &str) -> GiteaFetcher {
        GiteaFetcher::with_base_url(HttpClient::new(&HttpSettings::default()).unwrap(), base_url)
    }

    #[tokio::test]
    async fn fetch_versions_on_known_host_skips_probe() {
        let mut server = Server::new_async().await;
        let probe = server
            .mock("GET", "/api/v1/settings/api")
            .expect(0)
            .create_async()
            .await;
        let tags = server
            .mock("GET", "/api/v1/repos/forgejo/forgejo/tags")
            .with_status(200)
            .with_body(r#"[{"name": "v9.0.1"}, {"name": "v9.0.0"}]"#)
            .create_async()
            .await;

        let url = Url::parse("https://codeberg.org/forgejo/forgejo/archive/v8.0.0.tar.gz").unwrap();
        let result = fetcher(&server.url())
            .fetch_versions(&url, &FetcherArgs::default())
            .await
            .unwrap();

        probe.assert_async().await;
        tags.assert_async().await;
        assert_eq!(result, vec![Version::new("v9.0.1"), Version::new("v9.0.0")]);
    }

    #[tokio::test]
    async fn fetch_versions_probes_unknown_host() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/settings/api")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/repos/team/tool/tags")
            .with_status(200)
            .with_body(r#"[{"name": "1.4.0"}]"#)
            .create_async()
            .await;

        let url = Url::parse("https://git.example.org/team/tool/archive/1.3.0.tar.gz").unwrap();
        let result = fetcher(&server.url())
            .fetch_versions(&url, &FetcherArgs::default())
            .await
            .unwrap();

        assert_eq!(result, vec![Version::new("1.4.0")]);
    }

    #[tokio::test]
    async fn fetch_versions_skips_host_failing_probe() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/settings/api")
            .with_status(302)
            .with_header("location", "/login")
            .create_async()
            .await;

        let url = Url::parse("https://example.org/team/tool/archive/1.3.0.tar.gz").unwrap();
        let result = fetcher(&server.url())
            .fetch_versions(&url, &FetcherArgs::default())
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn fetch_snapshots_reads_latest_commit() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/api/v1/repos/forgejo/forgejo/commits".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sha".into(), "forgejo".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[{"sha": "1a2b3c", "commit": {"committer": {"date": "2024-09-10T11:12:13Z"}}}]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/repos/forgejo/forgejo/tags")
            .with_status(200)
            .with_body(r#"[{"name": "v9.0.1"}]"#)
            .create_async()
            .await;

        let url = Url::parse("https://codeberg.org/forgejo/forgejo").unwrap();
        let result = fetcher(&server.url())
            .fetch_snapshots(&url, "forgejo", &FetcherArgs::default())
            .await
            .unwrap();

        assert_eq!(result[0].number, "v9.0.1-unstable-2024-09-10");
        assert_eq!(result[0].rev.as_deref(), Some("1a2b3c"));
        assert!(result[0].commit.is_some());
    }
}
