//! crates.io fetcher implementation

use serde::Deserialize;
use url::Url;

use crate::version::error::VersionError;
use crate::version::fetcher::Fetcher;
use crate::version::fetchers::path_parts;
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

/// Default base URL for crates.io
const DEFAULT_BASE_URL: &str = "https://crates.io";

/// Response from crates.io versions API
#[derive(Debug, Deserialize)]
struct CratesIoResponse {
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
struct CrateVersion {
    num: String,
    yanked: bool,
}

/// Fetcher for `https://crates.io/api/v1/crates/<name>/<version>/download` sources
#[derive(Debug, Clone)]
pub struct CratesIoFetcher {
    http: HttpClient,
    base_url: String,
}

impl CratesIoFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Creates a new CratesIoFetcher with a custom base URL
    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for CratesIoFetcher {
    fn name(&self) -> &'static str {
        "crates.io"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        if url.host_str() != Some("crates.io") {
            return Ok(vec![]);
        }
        let Some(package) = path_parts(url).get(4).map(|p| p.to_string()) else {
            return Ok(vec![]);
        };

        let api_url = format!("{}/api/v1/crates/{}/versions", self.base_url, package);
        let response: CratesIoResponse = self.http.get_json(&api_url).await?;

        Ok(response
            .versions
            .into_iter()
            .filter(|v| !v.yanked)
            .map(|v| Version::new(v.num))
            .collect())
    }
}
