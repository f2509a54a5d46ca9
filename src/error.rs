use thiserror::Error;

use crate::command::CommandError;
use crate::version::error::VersionError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttributePathError {
    #[error("Attribute path cannot be empty")]
    Empty,

    #[error("Invalid attribute path: leading dot in '{0}'")]
    LeadingDot(String),

    #[error("Invalid attribute path: consecutive dots in '{0}'")]
    ConsecutiveDots(String),

    #[error("Invalid attribute path: trailing dot in '{0}'")]
    TrailingDot(String),

    #[error("Invalid attribute path: unclosed quote in '{0}'")]
    UnclosedQuote(String),

    #[error("Invalid attribute path: trailing escape in '{0}'")]
    TrailingEscape(String),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    AttributePath(#[from] AttributePathError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Could not find a url in the derivations src attribute")]
    NoUrl,

    #[error("Unexpected {provider} URL path structure: {path}")]
    UnexpectedUrl { provider: &'static str, path: String },

    #[error("failed to retrieve hash when trying to update {attribute}")]
    HashExtraction { attribute: String },

    #[error("Nix's builtins.parseDrvName could not parse the version from {0}")]
    UnparsableVersion(String),

    #[error("Invalid evaluation output: {0}")]
    Evaluation(#[from] serde_json::Error),

    #[error("Invalid Cargo.lock: {0}")]
    CargoLock(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
