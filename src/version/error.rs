use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error(
        "Please specify the version. We can only get the latest version from codeberg/crates.io/gitea/github/gitlab/pypi/savannah/sourcehut/rubygems/npm/bitbucket projects right now"
    )]
    NoFetcher,

    #[error("No version matched the regex. The following versions were found:\n{}", .found.join("\n"))]
    NoMatch { found: Vec<String> },

    #[error(
        "Found an unstable version {0}, which is being ignored. To update to unstable version, please use '--version=unstable'"
    )]
    OnlyUnstable(String),

    #[error("No git tags found")]
    NoTags,

    #[error("No release found: {0}")]
    NoRelease(String),

    #[error("Invalid version regex '{regex}': {source}")]
    InvalidRegex {
        regex: String,
        source: regex::Error,
    },

    #[error("Branch must be specified when using branch preference")]
    MissingBranch,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
