//! Ordered fetcher registry
//!
//! Providers are consulted in a fixed order; the first provider that yields a
//! usable version wins, so the order matters when URL patterns overlap
//! (GitHub archive URLs match on any host, for example).

use std::sync::Arc;

use crate::version::fetcher::{Fetcher, SnapshotFetcher};
use crate::version::fetchers::{
    BitbucketFetcher, CratesIoFetcher, GitHubFetcher, GitLabFetcher, GiteaFetcher, NpmFetcher,
    PypiFetcher, RubyGemsFetcher, SavannahFetcher, SourcehutFetcher, SparkleFetcher,
};
use crate::version::http::HttpClient;

/// Release and snapshot fetchers in resolution order
#[derive(Clone)]
pub struct FetcherRegistry {
    fetchers: Vec<Arc<dyn Fetcher>>,
    snapshot_fetchers: Vec<Arc<dyn SnapshotFetcher>>,
}

impl FetcherRegistry {
    /// Registry with every built-in provider talking to its public host
    pub fn new(http: &HttpClient) -> Self {
        let github = Arc::new(GitHubFetcher::new(http.clone()));
        let gitlab = Arc::new(GitLabFetcher::new(http.clone()));
        let sourcehut = Arc::new(SourcehutFetcher::new(http.clone()));
        let bitbucket = Arc::new(BitbucketFetcher::new(http.clone()));
        let gitea = Arc::new(GiteaFetcher::new(http.clone()));

        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            Arc::new(CratesIoFetcher::new(http.clone())),
            Arc::new(NpmFetcher::new(http.clone())),
            Arc::new(PypiFetcher::new(http.clone())),
            github.clone(),
            gitlab.clone(),
            Arc::new(RubyGemsFetcher::new(http.clone())),
            Arc::new(SavannahFetcher::new(http.clone())),
            sourcehut.clone(),
            Arc::new(SparkleFetcher::new(http.clone())),
            bitbucket.clone(),
            gitea.clone(),
        ];
        let snapshot_fetchers: Vec<Arc<dyn SnapshotFetcher>> =
            vec![github, gitlab, bitbucket, sourcehut, gitea];

        Self {
            fetchers,
            snapshot_fetchers,
        }
    }

    /// Registry with an explicit provider list, mainly for tests
    pub fn with_fetchers(
        fetchers: Vec<Arc<dyn Fetcher>>,
        snapshot_fetchers: Vec<Arc<dyn SnapshotFetcher>>,
    ) -> Self {
        Self {
            fetchers,
            snapshot_fetchers,
        }
    }

    pub fn fetchers(&self) -> &[Arc<dyn Fetcher>] {
        &self.fetchers
    }

    pub fn snapshot_fetchers(&self) -> &[Arc<dyn SnapshotFetcher>] {
        &self.snapshot_fetchers
    }
}

impl std::fmt::Debug for FetcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherRegistry")
            .field(
                "fetchers",
                &self.fetchers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "snapshot_fetchers",
                &self
                    .snapshot_fetchers
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;

    #[test]
    fn new_registers_providers_in_resolution_order() {
        let http = HttpClient::new(&HttpSettings::default()).unwrap();
        let registry = FetcherRegistry::new(&http);

        let names: Vec<_> = registry.fetchers().iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "crates.io",
                "npm",
                "pypi",
                "github",
                "gitlab",
                "rubygems",
                "savannah",
                "sourcehut",
                "sparkle",
                "bitbucket",
                "gitea",
            ]
        );

        let snapshot_names: Vec<_> = registry
            .snapshot_fetchers()
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(
            snapshot_names,
            vec!["github", "gitlab", "bitbucket", "sourcehut", "gitea"]
        );
    }
}
