//! Version resolution layer
//!
//! Turns a package's source URL into the newest upstream version by asking
//! one hosting provider after another.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│  Extractor  │────▶│  Tie-break  │
//! │ (fetchers)  │     │  (regex +   │     │  (revision  │
//! └─────────────┘     │  stability) │     │   prefix)   │
//!        │            └─────────────┘     └─────────────┘
//!        ▼
//! ┌─────────────┐
//! │  Fetchers   │
//! │(github, npm)│
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`fetcher`]: `Fetcher` and `SnapshotFetcher` traits
//! - [`fetchers`]: One implementation per hosting provider
//! - [`registry`]: Fixed-order provider list
//! - [`extract`]: Version regex and unstable-keyword classification
//! - [`tie_break`]: Revision prefix preference for monorepo feeds
//! - [`resolve`]: `fetch_latest_version`, tying the above together
//! - [`ordering`]: Package-manager style version comparison
//! - [`http`], [`feed`]: Shared HTTP client and Atom/RSS reader
//! - [`error`]: Error types for fetchers and resolution
//! - [`types`]: `Version` and resolution configuration

pub mod error;
pub mod extract;
pub mod feed;
pub mod fetcher;
pub mod fetchers;
pub mod http;
pub mod ordering;
pub mod registry;
pub mod resolve;
pub mod tie_break;
pub mod types;

pub use registry::FetcherRegistry;
pub use resolve::fetch_latest_version;
pub use types::{Version, VersionFetchConfig, VersionPreference};
