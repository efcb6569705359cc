//! Version parsing and ordering for daemon releases.
//!
//! Accepted grammar: `MAJOR.MINOR.PATCH` optionally followed by
//! `-TAG` or `-TAG.NUM`, where `TAG` is ASCII letters. Known tags rank
//! `alpha < beta < rc`; any other tag ranks below `alpha`. A stable release
//! outranks every prerelease of the same numeric version.
//!
//! Strings outside the grammar are still comparable: [`compare`] falls back
//! to plain lexical ordering when either side fails to parse.

use std::cmp::Ordering;

/// A version string split into its numeric core and optional prerelease suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease_tag: Option<String>,
    pub prerelease_num: Option<u64>,
}

impl ParsedVersion {
    /// Parse `s`, returning `None` when it does not follow the grammar.
    pub fn parse(s: &str) -> Option<Self> {
        let (core, pre) = match s.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (s, None),
        };

        let mut numbers = core.split('.');
        let major = parse_number(numbers.next()?)?;
        let minor = parse_number(numbers.next()?)?;
        let patch = parse_number(numbers.next()?)?;
        if numbers.next().is_some() {
            return None;
        }

        let (prerelease_tag, prerelease_num) = match pre {
            None => (None, None),
            Some(pre) => {
                let (tag, num) = match pre.split_once('.') {
                    Some((tag, num)) => (tag, Some(parse_number(num)?)),
                    None => (pre, None),
                };
                if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_alphabetic()) {
                    return None;
                }
                (Some(tag.to_string()), num)
            }
        };

        Some(Self {
            major,
            minor,
            patch,
            prerelease_tag,
            prerelease_num,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease_tag.is_some()
    }

    /// Release precedence. Not an `Ord` impl: two different unknown tags rank
    /// equal, which would disagree with `Eq`.
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease_tag, &other.prerelease_tag) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => tag_rank(a).cmp(&tag_rank(b)).then(
                    self.prerelease_num
                        .unwrap_or(0)
                        .cmp(&other.prerelease_num.unwrap_or(0)),
                ),
            })
    }
}

fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn tag_rank(tag: &str) -> u8 {
    match tag {
        "alpha" => 1,
        "beta" => 2,
        "rc" => 3,
        _ => 0,
    }
}

/// Order two version strings. Falls back to lexical order if either side is
/// not a parseable version.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (ParsedVersion::parse(a), ParsedVersion::parse(b)) {
        (Some(a), Some(b)) => a.precedence(&b),
        _ => a.cmp(b),
    }
}

/// Whether `version` carries a prerelease suffix. Purely textual.
pub fn is_prerelease(version: &str) -> bool {
    version.contains('-')
}

/// Returns true if `candidate` ranks strictly above `current`.
pub fn is_newer_version(current: &str, candidate: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Strip the conventional `v` prefix from a release tag (`v1.2.3` -> `1.2.3`).
pub fn strip_tag_prefix(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// Turn a user-supplied version into a release tag (`1.2.3` -> `v1.2.3`).
pub fn to_tag(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "0.1.0",
        "0.2.0-alpha.1",
        "0.2.0-alpha.9",
        "0.2.0-alpha.10",
        "0.2.0-beta.1",
        "0.2.0-rc.1",
        "0.2.0-rc.2",
        "0.2.0",
        "0.2.0-nightly.5",
        "0.2.1",
        "1.0.0-alpha",
        "1.0.0-alpha.1",
        "1.0.0-beta.1",
        "1.0.0-rc.1",
        "1.0.0",
        "1.2.3",
        "2.0.0",
        "10.0.0",
    ];

    #[test]
    fn test_parse_stable() {
        let v = ParsedVersion::parse("1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert_eq!(v.prerelease_tag, None);
        assert_eq!(v.prerelease_num, None);
        assert!(!v.is_prerelease());
    }

    #[test]
    fn test_parse_prerelease() {
        let v = ParsedVersion::parse("0.2.0-alpha.10").unwrap();
        assert_eq!(v.prerelease_tag.as_deref(), Some("alpha"));
        assert_eq!(v.prerelease_num, Some(10));

        let v = ParsedVersion::parse("1.0.0-beta").unwrap();
        assert_eq!(v.prerelease_tag.as_deref(), Some("beta"));
        assert_eq!(v.prerelease_num, None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "1",
            "1.2",
            "1.2.3.4",
            "v1.2.3",
            "1.2.x",
            "1.2.3-",
            "1.2.3-alpha.",
            "1.2.3-alpha.x",
            "1.2.3-al9ha.1",
            "1.-2.3",
            "99999999999999999999.0.0",
        ] {
            assert!(ParsedVersion::parse(bad).is_none(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_compare_concrete_cases() {
        assert_eq!(compare("2.0.0", "1.0.0"), Ordering::Greater);
        assert_eq!(compare("1.0.0", "1.0.0-alpha.1"), Ordering::Greater);
        assert_eq!(compare("1.0.0-alpha.1", "1.0.0"), Ordering::Less);
        assert_eq!(compare("0.2.0-alpha.10", "0.2.0-alpha.9"), Ordering::Greater);
        assert_eq!(compare("1.0.0-beta.1", "1.0.0-alpha.1"), Ordering::Greater);
        assert_eq!(compare("1.0.0-rc.1", "1.0.0-beta.1"), Ordering::Greater);
        assert_eq!(compare("0.2.0-alpha.9", "0.2.0-alpha.9"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert_eq!(compare("10.0.0", "9.0.0"), Ordering::Greater);
        assert_eq!(compare("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare("1.0.10", "1.0.9"), Ordering::Greater);
    }

    #[test]
    fn test_unknown_tag_ranks_below_alpha() {
        assert_eq!(compare("1.0.0-nightly.99", "1.0.0-alpha.1"), Ordering::Less);
        assert_eq!(compare("1.0.0-dev.3", "1.0.0-nightly.3"), Ordering::Equal);
    }

    #[test]
    fn test_missing_prerelease_number_is_zero() {
        assert_eq!(compare("1.0.0-alpha", "1.0.0-alpha.0"), Ordering::Equal);
        assert_eq!(compare("1.0.0-alpha", "1.0.0-alpha.1"), Ordering::Less);
    }

    #[test]
    fn test_lexical_fallback() {
        assert_eq!(compare("banana", "apple"), Ordering::Greater);
        assert_eq!(compare("v1.0.0", "1.0.0"), "v1.0.0".cmp("1.0.0"));
        // Lexical, so the "wrong" answer is expected here.
        assert_eq!(compare("v10.0.0", "v9.0.0"), Ordering::Less);
    }

    #[test]
    fn test_compare_is_antisymmetric() {
        for a in SAMPLES {
            for b in SAMPLES {
                assert_eq!(compare(a, b), compare(b, a).reverse(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_compare_is_transitive() {
        for a in SAMPLES {
            for b in SAMPLES {
                for c in SAMPLES {
                    if compare(a, b) != Ordering::Greater && compare(b, c) != Ordering::Greater {
                        assert_ne!(compare(a, c), Ordering::Greater, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_is_prerelease_matches_dash() {
        for v in SAMPLES.iter().chain(["garbage-in", "plain"].iter()) {
            assert_eq!(is_prerelease(v), v.contains('-'));
        }
    }

    #[test]
    fn test_is_newer_version_agrees_with_compare() {
        for current in SAMPLES {
            for candidate in SAMPLES {
                assert_eq!(
                    is_newer_version(current, candidate),
                    compare(candidate, current) == Ordering::Greater
                );
            }
        }
        assert!(is_newer_version("0.2.0-alpha.9", "0.2.0-alpha.10"));
        assert!(!is_newer_version("0.2.0", "0.2.0-rc.1"));
    }

    #[test]
    fn test_tag_helpers() {
        assert_eq!(strip_tag_prefix("v1.2.3"), "1.2.3");
        assert_eq!(strip_tag_prefix("1.2.3"), "1.2.3");
        assert_eq!(to_tag("1.2.3"), "v1.2.3");
        assert_eq!(to_tag("v1.2.3"), "v1.2.3");
    }
}
