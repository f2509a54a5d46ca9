//! GNU Savannah fetcher for `mirror://savannah/<project>/...` sources
//!
//! Savannah has no API; the release directory listing sorted by
//! modification time is scraped instead.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::version::error::VersionError;
use crate::version::fetcher::Fetcher;
use crate::version::fetchers::path_parts;
use crate::version::http::HttpClient;
use crate::version::types::{FetcherArgs, Version};

const DEFAULT_BASE_URL: &str = "https://download.savannah.nongnu.org";

static HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).unwrap());

/// `<name>-<version>.tar.<ext>`
static TARBALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+(?:\.\d+)*(?:-[^-.]+)?)\.tar\.[^.]+$").unwrap());

#[derive(Debug, Clone)]
pub struct SavannahFetcher {
    http: HttpClient,
    base_url: String,
}

impl SavannahFetcher {
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

/// Versions of every tarball linked from the table body of a directory listing
fn versions_from_listing(listing: &str, dir_url: &Url) -> Vec<Version> {
    let body = match (listing.find("<tbody>"), listing.find("</tbody>")) {
        (Some(start), Some(end)) if start < end => &listing[start..end],
        _ => return vec![],
    };

    HREF.captures_iter(body)
        .filter_map(|c| dir_url.join(&c[1]).ok())
        .filter_map(|link| {
            TARBALL
                .captures(link.path())
                .map(|c| Version::new(c[1].to_string()))
        })
        .collect()
}

#[async_trait::async_trait]
impl Fetcher for SavannahFetcher {
    fn name(&self) -> &'static str {
        "savannah"
    }

    async fn fetch_versions(
        &self,
        url: &Url,
        _args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError> {
        if url.scheme() != "mirror" || url.host_str() != Some("savannah") {
            return Ok(vec![]);
        }
        let Some(project) = path_parts(url).get(1).filter(|p| !p.is_empty()).map(|p| p.to_string())
        else {
            return Ok(vec![]);
        };

        let dir = format!("{}/releases/{}/", self.base_url, project);
        let Ok(dir_url) = Url::parse(&dir) else {
            return Ok(vec![]);
        };
        let listing = self.http.get_bytes(&format!("{dir}?C=M&O=D")).await?;

        Ok(versions_from_listing(
            &String::from_utf8_lossy(&listing),
            &dir_url,
        ))
    }
}
