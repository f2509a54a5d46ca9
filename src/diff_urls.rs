//! Upstream compare URLs between the old and the new version

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::config::UpdateOptions;
use crate::error::UpdateError;
use crate::eval::{Evaluator, Package};
use crate::version::Version;

static GITLAB_API: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://(gitlab.com|([^/]+)/api/v4)/").unwrap());

static RELEASE_DOWNLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*/releases/download/(.*)/.*").unwrap());

fn unexpected(provider: &'static str, url: &Url) -> UpdateError {
    UpdateError::UnexpectedUrl {
        provider,
        path: url.path().to_string(),
    }
}

/// Owner and repository of a `/<owner>/<repo>/...` path
fn owner_repo<'a>(url: &'a Url, provider: &'static str) -> Result<(&'a str, &'a str), UpdateError> {
    let mut parts = url.path().split('/').skip(1);
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) => Ok((owner, repo)),
        _ => Err(unexpected(provider, url)),
    }
}

fn crates_io(url: &Url, old: &str, new: &str) -> Result<String, UpdateError> {
    let parts: Vec<&str> = url.path().split('/').collect();
    let krate = parts.get(4).ok_or_else(|| unexpected("crates.io", url))?;
    Ok(format!("https://diff.rs/{krate}/{old}/{new}"))
}

fn npm(url: &Url, old: &str, new: &str) -> Result<String, UpdateError> {
    let parts: Vec<&str> = url.path().split('/').collect();
    let name = parts.get(1).ok_or_else(|| unexpected("npm", url))?;
    let name = if name.starts_with('@') {
        let scoped = parts.get(2).ok_or_else(|| unexpected("scoped npm package", url))?;
        format!("{name}%2F{scoped}")
    } else {
        name.to_string()
    };
    Ok(format!("https://npmdiff.dev/{name}/{old}/{new}"))
}

fn release_tag(url: &Url) -> Option<String> {
    RELEASE_DOWNLOAD
        .captures(url.path())
        .map(|c| c[1].to_string())
}

async fn github(
    evaluator: &dyn Evaluator,
    opts: &UpdateOptions,
    package: &Package,
    url: &Url,
    new_version: &Version,
) -> Result<Option<String>, UpdateError> {
    let (owner, repo) = owner_repo(url, "GitHub")?;
    let old = package
        .tag
        .clone()
        .or_else(|| package.rev.clone())
        .or_else(|| release_tag(url));

    let mut new = new_version.tag.clone().or_else(|| new_version.rev.clone());
    if new.is_none() {
        let updated = evaluator.evaluate(opts).await?;
        new = updated
            .tag
            .clone()
            .or_else(|| updated.rev.clone())
            .or_else(|| updated.parsed_url().and_then(|u| release_tag(&u)));
    }

    Ok(old.zip(new).map(|(old, new)| {
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        format!("https://github.com/{owner}/{repo}/compare/{old}...{new}")
    }))
}

fn other(package: &Package, url: &Url, new_version: &Version) -> Result<Option<String>, UpdateError> {
    let (Some(old), Some(host)) = (
        package.tag.as_deref().or(package.rev.as_deref()),
        url.host_str(),
    ) else {
        return Ok(None);
    };
    let new = new_version.rev.as_deref().unwrap_or(&new_version.number);

    let diff_url = match host {
        "codeberg.org" | "gitea.com" => {
            let (owner, repo) = owner_repo(url, "Gitea")?;
            Some(format!("https://{host}/{owner}/{repo}/compare/{old}...{new}"))
        }
        "bitbucket.org" | "bitbucket.io" => {
            let (owner, repo) = owner_repo(url, "Bitbucket")?;
            Some(format!(
                "https://{host}/{owner}/{repo}/branches/compare/{new}%0D{old}"
            ))
        }
        _ => match package.src_homepage.as_deref() {
            Some(homepage) if GITLAB_API.is_match(url.as_str()) => {
                Some(format!("{homepage}-/compare/{old}...{new}"))
            }
            _ => None,
        },
    };
    Ok(diff_url)
}

/// Compare URL for the move from `package`'s version to `new_version`, if the
/// source host has one.
///
/// For GitHub sources whose new tag is unknown the package is re-evaluated,
/// so this must run after the manifest was rewritten.
pub async fn diff_url(
    evaluator: &dyn Evaluator,
    opts: &UpdateOptions,
    package: &Package,
    new_version: &Version,
) -> Result<Option<String>, UpdateError> {
    let Some(url) = package.parsed_url() else {
        return Ok(None);
    };
    let old = package.old_version.as_str();
    let new = new_version.number.as_str();

    match url.host_str() {
        Some("crates.io") => crates_io(&url, old, new).map(Some),
        Some("registry.npmjs.org") => npm(&url, old, new).map(Some),
        Some("github.com") => github(evaluator, opts, package, &url, new_version).await,
        _ => other(package, &url, new_version),
    }
}
