//! npm registry fetcher implementation

use serde::Deserialize;
use url::Url;

use crate::version::error::VersionError;
use crate::version::fetcher::Fetcher;
use crate::version::fetchers::path_parts;
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

/// Default base URL for npm registry
const DEFAULT_BASE_URL: &str = "https://registry.npmjs.org";

/// Response from the npm `/<package>/latest` endpoint
#[derive(Debug, Deserialize)]
struct NpmLatestResponse {
    version: String,
}

/// Fetcher for `https://registry.npmjs.org/<package>/-/<tarball>` sources
#[derive(Debug, Clone)]
pub struct NpmFetcher {
    http: HttpClient,
    base_url: String,
}

impl NpmFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Creates a new NpmFetcher with a custom base URL
    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Package name from the tarball path, handling scoped packages
    pub fn package_name(url: &Url) -> Option<String> {
        let parts = path_parts(url);
        let first = parts.get(1).filter(|p| !p.is_empty())?;
        if first.starts_with('@') {
            // Scoped package: /@scope/name/-/name-1.0.0.tgz
            let name = parts.get(2)?;
            Some(format!("{first}/{name}"))
        } else {
            Some(first.to_string())
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for NpmFetcher {
    fn name(&self) -> &'static str {
        "npm"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        if url.host_str() != Some("registry.npmjs.org") {
            return Ok(vec![]);
        }
        let Some(package) = Self::package_name(url) else {
            return Ok(vec![]);
        };

        let api_url = format!("{}/{}/latest", self.base_url, package);
        let latest: NpmLatestResponse = self.http.get_json(&api_url).await?;

        Ok(vec![Version::new(latest.version)])
    }
}
