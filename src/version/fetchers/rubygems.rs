//! RubyGems fetcher implementation

use serde::Deserialize;
use url::Url;

use crate::version::error::VersionError;
use crate::version::fetcher::Fetcher;
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

/// Default base URL for rubygems.org
const DEFAULT_BASE_URL: &str = "https://rubygems.org";

#[derive(Debug, Deserialize)]
struct GemVersion {
    number: String,
    prerelease: bool,
}

/// Fetcher for `https://rubygems.org/gems/<name>-<version>.gem` sources
#[derive(Debug, Clone)]
pub struct RubyGemsFetcher {
    http: HttpClient,
    base_url: String,
}

impl RubyGemsFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for RubyGemsFetcher {
    fn name(&self) -> &'static str {
        "rubygems"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        if url.host_str() != Some("rubygems.org") {
            return Ok(vec![]);
        }
        let gem = url.path().rsplit('/').next().unwrap_or_default();
        let Some((gem_name, _)) = gem.rsplit_once('-') else {
            return Ok(vec![]);
        };

        let api_url = format!("{}/api/v1/versions/{}.json", self.base_url, gem_name);
        let versions: Vec<GemVersion> = self.http.get_json(&api_url).await?;
        if versions.is_empty() {
            return Err(VersionError::NoRelease(format!(
                "no versions of {gem_name} on rubygems.org"
            )));
        }

        Ok(versions
            .into_iter()
            .map(|v| Version::new(v.number).with_prerelease(v.prerelease))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use mockito::Server;

    fn fetcher(base_url: &str) -> RubyGemsFetcher {
        RubyGemsFetcher::with_base_url(HttpClient::new(&HttpSettings::default()).unwrap(), base_url)
    }

    #[tokio::test]
    async fn fetch_versions_keeps_prerelease_flags() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/versions/rails.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"number": "8.0.0.rc1", "prerelease": true},
                    {"number": "7.2.1", "prerelease": false}
                ]"#,
            )
            .create_async()
            .await;

        let url = Url::parse("https://rubygems.org/gems/rails-7.2.0.gem").unwrap();
        let result = fetcher(&server.url())
            .fetch_versions(&url, &FetcherArgs::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            result,
            vec![
                Version::new("8.0.0.rc1").with_prerelease(true),
                Version::new("7.2.1").with_prerelease(false),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_versions_fails_when_gem_has_no_versions() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/versions/ghost.json")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let url = Url::parse("https://rubygems.org/gems/ghost-0.1.0.gem").unwrap();
        let result = fetcher(&server.url())
            .fetch_versions(&url, &FetcherArgs::default())
            .await;

        assert!(matches!(result, Err(VersionError::NoRelease(_))));
    }
}
