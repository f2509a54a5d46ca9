//! Revision prefix tie-break
//!
//! Monorepo release feeds interleave tags of several sub-projects
//! (`cargo-nextest-0.9.70`, `cargo-nextest-macros-0.1.0`, ...) ordered by
//! date. When the current revision carries such a prefix, the newest entry
//! sharing it is preferred over the newest entry overall.

use crate::version::types::Version;

/// First candidate whose number starts with `prefix`, with the prefix
/// stripped and the original number kept as `rev`.
///
/// Returns `None` when `prefix` is empty, nothing matches, or the match is
/// the revision already in use; the caller then takes the newest candidate.
pub fn find_prefixed_version(
    candidates: &[Version],
    prefix: &str,
    old_rev_tag: Option<&str>,
) -> Option<Version> {
    if prefix.is_empty() {
        return None;
    }

    let candidate = candidates.iter().find(|v| v.number.starts_with(prefix))?;
    let stripped = Version {
        number: candidate.number[prefix.len()..].to_string(),
        rev: Some(
            candidate
                .rev
                .clone()
                .unwrap_or_else(|| candidate.number.clone()),
        ),
        ..candidate.clone()
    };

    if stripped.rev.as_deref() == old_rev_tag {
        None
    } else {
        Some(stripped)
    }
}
