//! Fetcher traits for discovering upstream versions of a source URL

#[cfg(test)]
use mockall::automock;
use tracing::debug;
use url::Url;

use crate::version::error::VersionError;
use crate::version::types::{FetcherArgs, Version};

/// Maps a source URL to the versions its provider publishes
///
/// Implementations return an empty list immediately when the URL does not
/// belong to their provider.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &'static str;

    /// Fetches candidate versions for `url`
    ///
    /// # Returns
    /// * `Ok(Vec<Version>)` - Candidates ordered from newest to oldest, empty if the URL is foreign
    /// * `Err(VersionError)` - If the provider matched but the fetch failed
    async fn fetch_versions(
        &self,
        url: &Url,
        args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError>;
}

/// Maps a source URL and branch to a synthetic version for the branch head
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait SnapshotFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns at most one version: `<latest release or 0>-unstable-<date>`
    /// with `rev` set to the head commit.
    async fn fetch_snapshots(
        &self,
        url: &Url,
        branch: &str,
        args: &FetcherArgs,
    ) -> Result<Vec<Version>, VersionError>;
}

/// Number of the newest release, or `"0"` when there is none or the lookup failed.
pub fn latest_release_number(releases: Result<Vec<Version>, VersionError>) -> String {
    match releases {
        Ok(versions) => versions
            .into_iter()
            .next()
            .map(|v| v.number)
            .unwrap_or_else(|| "0".to_string()),
        Err(e) => {
            debug!("ignoring release lookup failure for snapshot: {}", e);
            "0".to_string()
        }
    }
}

/// Build the snapshot version for a branch head committed on `date` (`YYYY-MM-DD`).
pub fn snapshot_version(latest_release: &str, date: &str, sha: &str) -> Version {
    Version::new(format!("{latest_release}-unstable-{date}")).with_rev(sha)
}
