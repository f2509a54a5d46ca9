//! Keep Nix package manifests current.
//!
//! Given an attribute inside a Nix import root, `nix-bump` discovers the
//! newest upstream release of the package's source, rewrites the version,
//! revision and hash tokens of the manifest in place, and refreshes the
//! dependency hashes pinned alongside it.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Evaluator  │────▶│   Updater    │────▶│  Dependency  │
//! │  (Package)  │     │(orchestrator)│     │    hashes    │
//! └─────────────┘     └──────────────┘     └──────────────┘
//!                            │                     │
//!                            ▼                     ▼
//!                     ┌──────────────┐     ┌──────────────┐
//!                     │   Fetcher    │     │   Command    │
//!                     │   registry   │     │    runner    │
//!                     └──────────────┘     └──────────────┘
//! ```

pub mod attr_path;
pub mod command;
pub mod config;
pub mod deps;
pub mod diff_urls;
pub mod error;
pub mod eval;
pub mod git;
pub mod hashes;
pub mod lockfile;
pub mod update;
pub mod version;
