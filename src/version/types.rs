//! Common version types

use chrono::{DateTime, FixedOffset};

/// Commit metadata attached to snapshot versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub date: DateTime<FixedOffset>,
}

/// A candidate version reported by a fetcher
///
/// Fetchers return `number` in the provider's own format (e.g. `v1.2.3`);
/// the updater strips the leading `v` before writing it anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    pub number: String,
    /// `None` when the provider does not say
    pub prerelease: Option<bool>,
    pub rev: Option<String>,
    pub tag: Option<String>,
    pub commit: Option<Commit>,
}

impl Version {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Default::default()
        }
    }

    pub fn with_prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = Some(prerelease);
        self
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_commit(mut self, commit: Commit) -> Self {
        self.commit = Some(commit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPreference {
    Stable,
    Unstable,
    Fixed,
    Skip,
    Branch,
}

/// Provider-specific knobs passed through to fetchers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetcherArgs {
    /// Read GitHub releases from the REST API instead of the Atom feed
    pub use_github_releases: bool,
}

/// Everything the resolver needs besides the source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFetchConfig {
    pub preference: VersionPreference,
    pub version_regex: String,
    pub branch: Option<String>,
    pub old_rev_tag: Option<String>,
    /// Revision prefix (e.g. `v` or `cargo-nextest-`) shared with the old version
    pub version_prefix: String,
    pub fetcher_args: FetcherArgs,
}

impl VersionFetchConfig {
    pub fn new(preference: VersionPreference, version_regex: impl Into<String>) -> Self {
        Self {
            preference,
            version_regex: version_regex.into(),
            branch: None,
            old_rev_tag: None,
            version_prefix: String::new(),
            fetcher_args: FetcherArgs::default(),
        }
    }
}
