//! Fetcher implementations, one per hosting provider

pub mod bitbucket;
pub mod crates_io;
pub mod gitea;
pub mod github;
pub mod gitlab;
pub mod npm;
pub mod pypi;
pub mod rubygems;
pub mod savannah;
pub mod sourcehut;
pub mod sparkle;

pub use bitbucket::BitbucketFetcher;
pub use crates_io::CratesIoFetcher;
pub use gitea::GiteaFetcher;
pub use github::GitHubFetcher;
pub use gitlab::GitLabFetcher;
pub use npm::NpmFetcher;
pub use pypi::PypiFetcher;
pub use rubygems::RubyGemsFetcher;
pub use savannah::SavannahFetcher;
pub use sourcehut::SourcehutFetcher;
pub use sparkle::SparkleFetcher;

use url::Url;

/// Path components of `url` including the leading empty one, so that
/// `/owner/repo` yields `["", "owner", "repo"]`.
pub(crate) fn path_parts(url: &Url) -> Vec<&str> {
    url.path().split('/').collect()
}

/// Owner and repository of `/<owner>/<repo>/...` paths
pub(crate) fn owner_and_repo(url: &Url) -> Option<(String, String)> {
    let parts = path_parts(url);
    match parts.as_slice() {
        [_, owner, repo, ..] if !owner.is_empty() && !repo.is_empty() => Some((
            owner.to_string(),
            repo.strip_suffix(".git").unwrap_or(repo).to_string(),
        )),
        _ => None,
    }
}

/// Last path segment of a link, percent-decoded
pub(crate) fn last_segment(link: &str) -> String {
    let path = Url::parse(link)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| link.to_string());
    let segment = path.rsplit('/').next().unwrap_or_default();
    percent_encoding::percent_decode_str(segment)
        .decode_utf8_lossy()
        .into_owned()
}

/// `https://<host>` unless a base URL override is set
pub(crate) fn base_for(base_url: &Option<String>, host: &str) -> String {
    base_url
        .clone()
        .unwrap_or_else(|| format!("https://{host}"))
}
