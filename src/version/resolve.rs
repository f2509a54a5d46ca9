//! Latest version resolution across the fetcher registry

use tracing::{debug, info, warn};
use url::Url;

use crate::version::error::{FetchError, VersionError};
use crate::version::extract::{VersionExtractor, is_unstable};
use crate::version::registry::FetcherRegistry;
use crate::version::tie_break::find_prefixed_version;
use crate::version::types::{Version, VersionFetchConfig, VersionPreference};

/// Candidates of one provider, split by the extraction and stability filters
#[derive(Debug, Default)]
struct Buckets {
    filtered: Vec<String>,
    unstable: Vec<Version>,
    accepted: Vec<Version>,
}

impl Buckets {
    fn sort(
        versions: Vec<Version>,
        extractor: &VersionExtractor,
        preference: VersionPreference,
    ) -> Self {
        let mut buckets = Self::default();
        for version in versions {
            match extractor.extract(&version) {
                None => buckets.filtered.push(version.number),
                Some(v) if preference == VersionPreference::Stable && is_unstable(&v) => {
                    buckets.unstable.push(v)
                }
                Some(v) => buckets.accepted.push(v),
            }
        }
        buckets
    }
}

/// Treats a malformed payload as an empty answer; any other failure aborts.
fn tolerate_invalid_response(
    provider: &str,
    result: Result<Vec<Version>, VersionError>,
) -> Result<Vec<Version>, VersionError> {
    match result {
        Err(VersionError::Fetch(FetchError::InvalidResponse(reason))) => {
            warn!("ignoring malformed response from {}: {}", provider, reason);
            Ok(vec![])
        }
        other => other,
    }
}

/// Newest version of the source at `url` according to `config`.
///
/// Providers are asked in registry order and the first one whose candidates
/// survive filtering decides the result; candidates of different providers
/// are never merged. With [`VersionPreference::Branch`] the snapshot
/// fetchers are used instead and no prefix tie-break applies.
pub async fn fetch_latest_version(
    registry: &FetcherRegistry,
    url: &Url,
    config: &VersionFetchConfig,
) -> Result<Version, VersionError> {
    let extractor = VersionExtractor::new(&config.version_regex)?;

    let mut filtered: Vec<String> = Vec::new();
    let mut unstable: Vec<Version> = Vec::new();

    if config.preference == VersionPreference::Branch {
        let branch = config.branch.as_deref().ok_or(VersionError::MissingBranch)?;
        for fetcher in registry.snapshot_fetchers() {
            let versions = tolerate_invalid_response(
                fetcher.name(),
                fetcher
                    .fetch_snapshots(url, branch, &config.fetcher_args)
                    .await,
            )?;
            let buckets = Buckets::sort(versions, &extractor, config.preference);
            debug!(
                "{}: {} snapshot(s), {} filtered",
                fetcher.name(),
                buckets.accepted.len(),
                buckets.filtered.len()
            );
            filtered.extend(buckets.filtered);
            unstable.extend(buckets.unstable);
            if let Some(version) = buckets.accepted.into_iter().next() {
                info!("{} reported snapshot {}", fetcher.name(), version.number);
                return Ok(version);
            }
        }
    } else {
        for fetcher in registry.fetchers() {
            let versions = tolerate_invalid_response(
                fetcher.name(),
                fetcher.fetch_versions(url, &config.fetcher_args).await,
            )?;
            let buckets = Buckets::sort(versions, &extractor, config.preference);
            debug!(
                "{}: {} accepted, {} unstable, {} filtered",
                fetcher.name(),
                buckets.accepted.len(),
                buckets.unstable.len(),
                buckets.filtered.len()
            );
            filtered.extend(buckets.filtered);
            unstable.extend(buckets.unstable);

            let Some(newest) = buckets.accepted.first() else {
                continue;
            };
            let version = find_prefixed_version(
                &buckets.accepted,
                &config.version_prefix,
                config.old_rev_tag.as_deref(),
            )
            .unwrap_or_else(|| newest.clone());
            info!("{} reported version {}", fetcher.name(), version.number);
            return Ok(version);
        }
    }

    if !filtered.is_empty() {
        return Err(VersionError::NoMatch { found: filtered });
    }
    if let Some(first) = unstable.into_iter().next() {
        return Err(VersionError::OnlyUnstable(first.number));
    }
    Err(VersionError::NoFetcher)
}
