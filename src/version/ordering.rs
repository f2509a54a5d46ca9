//! Ordering of package version strings
//!
//! Versions have the shape `[epoch:]version[-release]`. Each component is
//! split into alternating numeric and alphabetic segments; numeric segments
//! sort above alphabetic ones, and the length of the separator before a
//! segment takes part in the comparison.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment<'a> {
    value: &'a str,
    numeric: bool,
    /// Number of separator characters before the segment
    separator_len: usize,
}

impl Segment<'_> {
    fn cmp_value(&self, other: &Self) -> Ordering {
        match (self.numeric, other.numeric) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => {
                let a = trim_zeros(self.value);
                let b = trim_zeros(other.value);
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (false, false) => self.value.cmp(other.value),
        }
    }
}

fn trim_zeros(digits: &str) -> &str {
    match digits.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    }
}

fn segments(component: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = component;

    loop {
        let trimmed = rest.trim_start_matches(|c: char| !c.is_alphanumeric());
        let separator_len = rest.len() - trimmed.len();
        let Some(first) = trimmed.chars().next() else {
            break;
        };

        let numeric = first.is_ascii_digit();
        let end = trimmed
            .find(|c: char| {
                if numeric {
                    !c.is_ascii_digit()
                } else {
                    !c.is_alphanumeric() || c.is_ascii_digit()
                }
            })
            .unwrap_or(trimmed.len());

        segments.push(Segment {
            value: &trimmed[..end],
            numeric,
            separator_len,
        });
        rest = &trimmed[end..];
    }

    segments
}

fn compare_segments(a: &[Segment<'_>], b: &[Segment<'_>]) -> Ordering {
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if i > 0 && x.separator_len != y.separator_len {
            return x.separator_len.cmp(&y.separator_len);
        }
        let ordering = x.cmp_value(y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    let (longer, shorter_len, newer_if_longer) = match a.len().cmp(&b.len()) {
        Ordering::Equal => return Ordering::Equal,
        Ordering::Greater => (a, b.len(), Ordering::Greater),
        Ordering::Less => (b, a.len(), Ordering::Less),
    };

    // A trailing alphabetic segment glued to the previous one ("1.0rc")
    // marks a pre-release; anything else extends the version.
    let next = &longer[shorter_len];
    if next.numeric || next.separator_len > 0 {
        newer_if_longer
    } else {
        newer_if_longer.reverse()
    }
}

fn compare_component(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    compare_segments(&segments(a), &segments(b))
}

/// `[epoch:]version[-release]` split into its three components
fn split_version(version: &str) -> (&str, &str, Option<&str>) {
    let (epoch, rest) = match version.find(':') {
        Some(0) => ("0", &version[1..]),
        Some(pos) if version[..pos].chars().all(|c| c.is_ascii_digit()) => {
            (&version[..pos], &version[pos + 1..])
        }
        _ => ("0", version),
    };

    match rest.rfind('-') {
        Some(pos) => (epoch, &rest[..pos], Some(&rest[pos + 1..])),
        None => (epoch, rest, None),
    }
}

/// Compares two version strings; `Greater` means `a` is newer than `b`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (epoch_a, version_a, release_a) = split_version(a);
    let (epoch_b, version_b, release_b) = split_version(b);

    compare_component(epoch_a, epoch_b)
        .then_with(|| compare_component(version_a, version_b))
        .then_with(|| match (release_a, release_b) {
            (Some(x), Some(y)) => compare_component(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        })
}
