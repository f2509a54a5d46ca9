//! Regex-based version extraction and stability classification

use std::sync::LazyLock;

use regex::Regex;

use crate::version::error::VersionError;
use crate::version::types::Version;

static UNSTABLE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)alpha|beta|canary|m[0-9]+|nightly|prerelease|preview|rc").unwrap()
});

/// A user-supplied version regex, anchored at the start of the number.
#[derive(Debug, Clone)]
pub struct VersionExtractor {
    regex: Regex,
}

impl VersionExtractor {
    pub fn new(version_regex: &str) -> Result<Self, VersionError> {
        let regex = Regex::new(&format!("^(?:{version_regex})")).map_err(|source| {
            VersionError::InvalidRegex {
                regex: version_regex.to_string(),
                source,
            }
        })?;
        Ok(Self { regex })
    }

    /// Canonical form of `version`, or `None` when the regex rejects it.
    ///
    /// Non-empty capture groups are joined with `.`; a regex without groups
    /// keeps the whole match. When the canonical number differs from the
    /// provider's number, the provider's number becomes the `rev` unless the
    /// fetcher already reported one.
    pub fn extract(&self, version: &Version) -> Option<Version> {
        let captures = self.regex.captures(&version.number)?;

        let number = if captures.len() > 1 {
            let groups: Vec<&str> = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .collect();
            if groups.is_empty() {
                return None;
            }
            groups.join(".")
        } else {
            captures.get(0)?.as_str().to_string()
        };

        let rev = match &version.rev {
            Some(rev) => Some(rev.clone()),
            None if number != version.number => Some(version.number.clone()),
            None => None,
        };

        Some(Version {
            number,
            rev,
            ..version.clone()
        })
    }
}

/// True when the provider flagged `version` as a prerelease or its number
/// contains one of the unstable keywords.
pub fn is_unstable(version: &Version) -> bool {
    version.prerelease == Some(true) || UNSTABLE_KEYWORDS.is_match(&version.number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("(.*)", "v8.5.2", Some("v8.5.2"), None)]
    #[case("v(.*)", "v8.5.2", Some("8.5.2"), Some("v8.5.2"))]
    #[case(r"cargo-nextest-(\d+)\.(\d+)\.(\d+)", "cargo-nextest-0.9.70", Some("0.9.70"), Some("cargo-nextest-0.9.70"))]
    #[case(r"INKSCAPE_(\d+)_(\d+)(?:_(\d+))?", "INKSCAPE_1_3", Some("1.3"), Some("INKSCAPE_1_3"))]
    #[case(r"\d+\.\d+", "2.31.0", Some("2.31"), Some("2.31.0"))]
    #[case(r"v(\d+)", "release-1", None, None)]
    fn extract_builds_canonical_number(
        #[case] regex: &str,
        #[case] number: &str,
        #[case] expected_number: Option<&str>,
        #[case] expected_rev: Option<&str>,
    ) {
        let extractor = VersionExtractor::new(regex).unwrap();
        let result = extractor.extract(&Version::new(number));

        assert_eq!(result.as_ref().map(|v| v.number.as_str()), expected_number);
        assert_eq!(result.as_ref().and_then(|v| v.rev.as_deref()), expected_rev);
    }

    #[test]
    fn extract_keeps_rev_reported_by_fetcher() {
        let extractor = VersionExtractor::new("v(.*)").unwrap();
        let version = Version::new("v1.0.0")
            .with_rev("abc123")
            .with_prerelease(false);

        let result = extractor.extract(&version).unwrap();

        assert_eq!(result.number, "1.0.0");
        assert_eq!(result.rev.as_deref(), Some("abc123"));
        assert_eq!(result.prerelease, Some(false));
    }

    #[test]
    fn extract_rejects_match_with_only_empty_groups() {
        let extractor = VersionExtractor::new("v?(\\d*)").unwrap();
        assert_eq!(extractor.extract(&Version::new("latest")), None);
    }

    #[test]
    fn new_rejects_invalid_regex() {
        let result = VersionExtractor::new("(unclosed");
        assert!(matches!(result, Err(VersionError::InvalidRegex { .. })));
    }

    #[rstest]
    #[case("1.0.0-alpha.1", true)]
    #[case("2.0.0-BETA", true)]
    #[case("3.0.0-rc1", true)]
    #[case("124.0.6367.60-canary", true)]
    #[case("1.0-M3", true)]
    #[case("nightly-2024-01-01", true)]
    #[case("5.0.0-preview.2", true)]
    #[case("1.2.3", false)]
    #[case("8.5.2", false)]
    fn is_unstable_matches_keywords(#[case] number: &str, #[case] expected: bool) {
        assert_eq!(is_unstable(&Version::new(number)), expected);
    }

    #[test]
    fn is_unstable_honors_prerelease_flag() {
        assert!(is_unstable(&Version::new("1.2.3").with_prerelease(true)));
        assert!(!is_unstable(&Version::new("1.2.3").with_prerelease(false)));
    }
}
