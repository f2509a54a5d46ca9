//! Attribute path parsing
//!
//! An attribute path is a dotted identifier such as `python3Packages.requests`.
//! Components may be quoted to carry dots (`foo."bar.baz"`) and a backslash
//! escapes the next character.

use crate::error::AttributePathError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Normal,
    Quoted,
    Escaped,
}

/// Split an attribute path into its components.
///
/// Examples:
/// - `foo.bar` -> `["foo", "bar"]`
/// - `foo."bar.baz"` -> `["foo", "bar.baz"]`
/// - `foo."bar\"baz"` -> `["foo", "bar\"baz"]`
pub fn parse_attribute_path(attribute: &str) -> Result<Vec<String>, AttributePathError> {
    if attribute.is_empty() {
        return Err(AttributePathError::Empty);
    }
    if attribute.starts_with('.') {
        return Err(AttributePathError::LeadingDot(attribute.to_string()));
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut state = ParseState::Normal;
    let mut prev_state = ParseState::Normal;

    for c in attribute.chars() {
        match (state, c) {
            (ParseState::Escaped, _) => {
                current.push(c);
                state = prev_state;
            }
            (_, '\\') => {
                prev_state = state;
                state = ParseState::Escaped;
            }
            (_, '"') => {
                current.push(c);
                state = if state == ParseState::Normal {
                    ParseState::Quoted
                } else {
                    ParseState::Normal
                };
            }
            (ParseState::Normal, '.') => {
                if current.is_empty() {
                    return Err(AttributePathError::ConsecutiveDots(attribute.to_string()));
                }
                parts.push(current.trim_matches('"').to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    match state {
        ParseState::Quoted => return Err(AttributePathError::UnclosedQuote(attribute.to_string())),
        ParseState::Escaped => {
            return Err(AttributePathError::TrailingEscape(attribute.to_string()));
        }
        ParseState::Normal => {}
    }
    if current.is_empty() {
        return Err(AttributePathError::TrailingDot(attribute.to_string()));
    }

    parts.push(current.trim_matches('"').to_string());
    Ok(parts)
}

/// Render components as a Nix attribute selector with every component quoted.
pub fn escape_attribute_path(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| serde_json::Value::String(p.clone()).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("foo", vec!["foo"])]
    #[case("foo.bar", vec!["foo", "bar"])]
    #[case(r#"foo."bar.baz""#, vec!["foo", "bar.baz"])]
    #[case(r#"foo."bar\"baz""#, vec!["foo", "bar\"baz"])]
    #[case("cargoLock.update", vec!["cargoLock", "update"])]
    fn parse_attribute_path_splits_components(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(parse_attribute_path(input).unwrap(), expected);
    }

    #[rstest]
    #[case("", AttributePathError::Empty)]
    #[case(".foo", AttributePathError::LeadingDot(".foo".to_string()))]
    #[case("foo..bar", AttributePathError::ConsecutiveDots("foo..bar".to_string()))]
    #[case("foo.", AttributePathError::TrailingDot("foo.".to_string()))]
    #[case(r#"foo."bar"#, AttributePathError::UnclosedQuote(r#"foo."bar"#.to_string()))]
    #[case(r"foo\", AttributePathError::TrailingEscape(r"foo\".to_string()))]
    fn parse_attribute_path_rejects_malformed_paths(
        #[case] input: &str,
        #[case] expected: AttributePathError,
    ) {
        assert_eq!(parse_attribute_path(input), Err(expected));
    }

    #[test]
    fn escape_attribute_path_quotes_every_component() {
        let parts = vec!["python3Packages".to_string(), "bar.baz".to_string()];
        assert_eq!(
            escape_attribute_path(&parts),
            r#""python3Packages"."bar.baz""#
        );
    }
}
