//! Content hash handling
//!
//! Hashes are always written to manifests in SRI form (`sha256-<base64>`).
//! The real hash of a fixed-output derivation is obtained by rebuilding it
//! with an empty hash and reading the "got:" line of the mismatch error.

use std::path::Path;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec, run_checked};
use crate::config::UpdateOptions;
use crate::error::UpdateError;
use crate::update::write_atomically;

static GOT_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\bgot:?\s+'?(",
        r"(?:md5|sha1|sha256|sha512)-[A-Za-z0-9+/]+=*",
        r"|(?:md5|sha1|sha256|sha512):[0-9a-zA-Z+/=]+",
        r"|[0-9a-f]{32,128}",
        r"|[0-9a-df-np-sv-z]{52}",
        r")'?\s*$",
    ))
    .unwrap()
});

/// Last hash reported on a "got" line of a build error.
///
/// Builders print progress lines mentioning "got" before the final
/// mismatch report, so the scan runs from the end.
pub fn extract_hash_from_nix_error(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .find_map(|line| GOT_HASH.captures(line).map(|c| c[1].to_string()))
}

fn algorithm_for_hex_len(len: usize) -> Option<&'static str> {
    match len {
        32 => Some("md5"),
        40 => Some("sha1"),
        64 => Some("sha256"),
        128 => Some("sha512"),
        _ => None,
    }
}

/// SRI form of SRI, hex and `<algo>:<hex>` hashes
fn sri_in_process(hash: &str) -> Option<String> {
    if hash.contains('-') {
        return Some(hash.to_string());
    }

    let (algorithm, digest) = match hash.split_once(':') {
        Some((algorithm, digest)) => (Some(algorithm), digest),
        None => (None, hash),
    };
    let expected = algorithm_for_hex_len(digest.len())?;
    if algorithm.is_some_and(|a| a != expected) {
        return None;
    }
    let bytes = hex::decode(digest).ok()?;
    Some(format!("{expected}-{}", STANDARD.encode(bytes)))
}

/// Normalize `hash` to SRI form.
///
/// Nix base-32 hashes are converted by `nix hash to-sri`.
pub async fn to_sri(runner: &dyn CommandRunner, hash: &str) -> Result<String, UpdateError> {
    if let Some(sri) = sri_in_process(hash) {
        return Ok(sri);
    }

    let typed = if hash.contains(':') {
        hash.to_string()
    } else {
        let prefix = match hash.len() {
            32 => "md5",
            40 => "sha1",
            _ => "sha256",
        };
        format!("{prefix}:{hash}")
    };
    let spec = CommandSpec::new("nix")
        .args(["--extra-experimental-features", "nix-command", "hash", "to-sri"])
        .arg(typed);
    let output = run_checked(runner, &spec).await?;
    Ok(output.stdout.trim_end().to_string())
}

/// Replace every occurrence of `current` in `filename` with the SRI form of
/// `target`, unless both already denote the same hash.
pub async fn replace_hash(
    runner: &dyn CommandRunner,
    filename: &Path,
    current: &str,
    target: &str,
) -> Result<(), UpdateError> {
    let normalized = to_sri(runner, target).await?;
    if to_sri(runner, current).await? == normalized {
        debug!("hash {} already up to date", current);
        return Ok(());
    }

    info!("Update hash {} -> {} in {}", current, normalized, filename.display());
    let contents = std::fs::read_to_string(filename)?;
    write_atomically(filename, &contents.replace(current, &normalized))?;
    Ok(())
}

/// Rebuild `<package>.<attr>` with a blanked output hash and return the hash
/// the build actually produced.
pub async fn nix_prefetch(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    attr: &str,
) -> Result<String, UpdateError> {
    let expr = format!(
        "let src = {}.{attr}; in (src.overrideAttrs or (f: src // f src)) (_: {{ outputHash = \"\"; outputHashAlgo = \"sha256\"; }})",
        opts.package_expr()
    );
    let runtime_dir = tempfile::tempdir()?;
    let spec = CommandSpec::new("nix-build")
        .arg("--expr")
        .arg(expr)
        .args(&opts.extra_flags)
        .env("XDG_RUNTIME_DIR", runtime_dir.path().to_string_lossy());

    // The build is expected to fail with a hash mismatch.
    let output = runner.run(&spec).await?;
    extract_hash_from_nix_error(&output.stderr).ok_or_else(|| {
        warn!("{}", output.stderr.trim());
        UpdateError::HashExtraction {
            attribute: format!("{}.{}", opts.attribute, attr),
        }
    })
}

/// Prefetch `attr` and write its hash over `current_hash` in `filename`.
pub async fn update_hash_with_prefetch(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    filename: &Path,
    attr: &str,
    current_hash: &str,
) -> Result<(), UpdateError> {
    let target = nix_prefetch(runner, opts, attr).await?;
    replace_hash(runner, filename, current_hash, &target).await
}

pub async fn update_src_hash(
    runner: &dyn CommandRunner,
    opts: &UpdateOptions,
    filename: &Path,
    current_hash: &str,
) -> Result<(), UpdateError> {
    update_hash_with_prefetch(runner, opts, filename, "src", current_hash).await
}
