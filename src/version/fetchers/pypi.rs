//! PyPI fetcher for `mirror://pypi/...` sources

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::version::error::VersionError;
use crate::version::fetcher::Fetcher;
use crate::version::fetchers::path_parts;
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

const DEFAULT_PYPI_REGISTRY: &str = "https://pypi.org";

/// PyPI fetcher
#[derive(Debug, Clone)]
pub struct PypiFetcher {
    http: HttpClient,
    base_url: String,
}

impl PypiFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_PYPI_REGISTRY)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

/// PyPI JSON API response structure
#[derive(Debug, Deserialize)]
struct PypiResponse {
    info: PypiInfo,
}

/// Package information from PyPI
#[derive(Debug, Deserialize)]
struct PypiInfo {
    /// Latest version (according to PyPI)
    version: String,
}

#[async_trait]
impl Fetcher for PypiFetcher {
    fn name(&self) -> &'static str {
        "pypi"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        // mirror://pypi/<initial>/<package>/<file>
        if url.host_str() != Some("pypi") {
            return Ok(vec![]);
        }
        let Some(package) = path_parts(url).get(2).map(|p| p.to_string()) else {
            return Ok(vec![]);
        };

        let api_url = format!("{}/pypi/{}/json", self.base_url, package);
        let response: PypiResponse = self.http.get_json(&api_url).await?;

        Ok(vec![Version::new(response.info.version)])
    }
}
