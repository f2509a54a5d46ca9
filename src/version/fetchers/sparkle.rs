//! Sparkle appcast fetcher
//!
//! Used for macOS applications whose source URL is the appcast XML itself.

use url::Url;

use crate::version::error::VersionError;
use crate::version::feed::parse_feed;
use crate::version::fetcher::Fetcher;
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

#[derive(Debug, Clone)]
pub struct SparkleFetcher {
    http: HttpClient,
}

impl SparkleFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Fetcher for SparkleFetcher {
    fn name(&self) -> &'static str {
        "sparkle"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        if !url.path().ends_with(".xml") {
            return Ok(vec![]);
        }

        let body = self.http.get_bytes(url.as_str()).await?;
        Ok(parse_feed(&body)?
            .into_iter()
            .filter_map(|item| item.sparkle_version)
            .map(Version::new)
            .collect())
    }
}
