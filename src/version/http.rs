//! Shared HTTP client for all fetchers

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::HttpSettings;
use crate::version::error::FetchError;

/// Immutable HTTP client built once at start-up and shared by every fetcher.
///
/// Every request carries the configured user agent and timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// Does not follow redirects; used for host probes
    probe_client: reqwest::Client,
    github_token: Option<String>,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(timeout)
            .build()?;
        let probe_client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            probe_client,
            github_token: settings.github_token.clone(),
        })
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }

    /// GET `url` and return the raw body
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_bytes_with_headers(url, &[]).await
    }

    pub async fn get_bytes_with_headers(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<Vec<u8>, FetchError> {
        info!("fetch {}", url);

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            warn!("{} returned status {}", url, status);
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// A body that does not decode is [`FetchError::InvalidResponse`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.get_json_with_headers(url, &[]).await
    }

    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let body = self.get_bytes_with_headers(url, headers).await?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to parse response from {}: {}", url, e);
            FetchError::InvalidResponse(e.to_string())
        })
    }

    /// Returns true when `url` answers 200 without following redirects.
    pub async fn probe(&self, url: &str) -> bool {
        match self.probe_client.get(url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("probe {} failed: {}", url, e);
                false
            }
        }
    }
}
