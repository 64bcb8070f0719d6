//! Version type with Python-style pre-release support.
//!
//! Versions are `major.minor.patch` with an optional pre-release tag. Both the
//! semver spelling (`1.2.3-rc.1`) and the attached Python spelling (`1.2.3rc1`)
//! are accepted and normalized to the same value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version (major.minor.patch-prerelease)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Normalized pre-release identifiers joined by `.` (e.g. `rc.1`)
    pub prerelease: Option<String>,
}

/// Parsing errors for versions, constraints and names
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid number in version: {component}")]
    InvalidNumber { component: String },

    #[error("Invalid prerelease identifier: {prerelease}")]
    InvalidPrerelease { prerelease: String },

    #[error("Invalid version requirement '{input}': {reason}")]
    InvalidRequirement { input: String, reason: String },

    #[error("Invalid package name: '{name}'")]
    InvalidName { name: String },
}

impl Version {
    /// Create a new release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Attach a pre-release tag, normalizing it
    pub fn with_prerelease(mut self, prerelease: &str) -> Result<Self, ParseError> {
        self.prerelease = Some(normalize_prerelease(prerelease)?);
        Ok(self)
    }

    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        input.parse()
    }

    /// Check if this version satisfies a version requirement
    pub fn satisfies(&self, req: &super::VersionReq) -> bool {
        req.matches(self)
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The numeric release triple
    pub fn core(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// This version without its pre-release tag
    pub fn release(&self) -> Version {
        Version::new(self.major, self.minor, self.patch)
    }
}

/// Split a version string into its numeric components and normalized pre-release.
///
/// Accepts one to three numeric components; callers decide how to treat the
/// missing ones.
pub(crate) fn parse_components(input: &str) -> Result<(Vec<u64>, Option<String>), ParseError> {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let split_at = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(body.len());
    let (core, rest) = body.split_at(split_at);

    // "1.0.dev3" leaves a trailing separator on the numeric part
    let core = if rest.is_empty() {
        core
    } else {
        core.strip_suffix('.').unwrap_or(core)
    };

    if core.is_empty() {
        return Err(ParseError::InvalidFormat {
            input: trimmed.to_string(),
        });
    }

    let components = core
        .split('.')
        .map(|part| {
            part.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
                component: part.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if components.len() > 3 {
        return Err(ParseError::InvalidFormat {
            input: trimmed.to_string(),
        });
    }

    let prerelease = if rest.is_empty() {
        None
    } else {
        let tag = rest.trim_start_matches(['-', '.', '_']);
        Some(normalize_prerelease(tag)?)
    };

    Ok((components, prerelease))
}

/// Normalize pre-release spellings: `rc1`, `RC.1` and `c1` all become `rc.1`
pub(crate) fn normalize_prerelease(raw: &str) -> Result<String, ParseError> {
    let invalid = || ParseError::InvalidPrerelease {
        prerelease: raw.to_string(),
    };

    let mut identifiers = Vec::new();
    for piece in raw.split(['.', '-', '_']) {
        if piece.is_empty() || !piece.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        // Split at letter/digit boundaries
        let bytes = piece.as_bytes();
        let mut start = 0;
        for i in 1..=bytes.len() {
            if i == bytes.len() || bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit() {
                identifiers.push(canonical_identifier(&piece[start..i]));
                start = i;
            }
        }
    }

    if identifiers.is_empty() {
        return Err(invalid());
    }
    Ok(identifiers.join("."))
}

fn canonical_identifier(ident: &str) -> String {
    if ident.bytes().all(|b| b.is_ascii_digit()) {
        let trimmed = ident.trim_start_matches('0');
        return if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        };
    }

    match ident.to_ascii_lowercase().as_str() {
        "a" | "alpha" => "alpha".to_string(),
        "b" | "beta" => "beta".to_string(),
        "c" | "rc" | "pre" | "preview" => "rc".to_string(),
        other => other.to_string(),
    }
}

fn tag_rank(tag: &str) -> Option<u8> {
    match tag {
        "dev" => Some(0),
        "alpha" => Some(1),
        "beta" => Some(2),
        "rc" => Some(3),
        _ => None,
    }
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    let a_numeric = a.bytes().all(|c| c.is_ascii_digit());
    let b_numeric = b.bytes().all(|c| c.is_ascii_digit());

    match (a_numeric, b_numeric) {
        // Leading zeros are stripped during parsing, so length decides first
        (true, true) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => match (tag_rank(a), tag_rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        },
    }
}

fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = compare_identifier(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            },
        }
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (components, prerelease) = parse_components(s)?;

        Ok(Version {
            major: components[0],
            minor: components.get(1).copied().unwrap_or(0),
            patch: components.get(2).copied().unwrap_or(0),
            prerelease,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }

        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.core().cmp(&other.core()) {
            Ordering::Equal => match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            },
            other => other,
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = Version::from_str("1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.prerelease, None);
    }

    #[test]
    fn test_partial_versions_are_zero_filled() {
        assert_eq!(Version::parse("3").unwrap(), Version::new(3, 0, 0));
        assert_eq!(Version::parse("3.9").unwrap(), Version::new(3, 9, 0));
        assert_eq!(Version::parse("v2.31.0").unwrap(), Version::new(2, 31, 0));
    }

    #[test]
    fn test_prerelease_spellings_normalize() {
        let semver = Version::parse("2.0.0-rc.1").unwrap();
        let python = Version::parse("2.0.0rc1").unwrap();
        let short = Version::parse("2.0c1").unwrap();
        assert_eq!(semver, python);
        assert_eq!(semver, short);
        assert_eq!(python.prerelease.as_deref(), Some("rc.1"));

        let dev = Version::parse("1.0.dev3").unwrap();
        assert_eq!(dev.prerelease.as_deref(), Some("dev.3"));
        assert_eq!(dev.core(), (1, 0, 0));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(Version::parse("1.2b2").unwrap().to_string(), "1.2.0-beta.2");
    }

    #[test]
    fn test_version_comparison() {
        let v1 = Version::new(1, 0, 0);
        let v2 = Version::new(2, 0, 0);
        let v3 = Version::new(1, 1, 0);

        assert!(v1 < v2);
        assert!(v1 < v3);
        assert!(v3 < v2);
    }

    #[test]
    fn test_prerelease_ordering() {
        let ordered = ["1.0.dev1", "1.0a1", "1.0a2", "1.0b1", "1.0rc1", "1.0rc10", "1.0"];
        let parsed: Vec<Version> = ordered.iter().map(|s| Version::parse(s).unwrap()).collect();
        for pair in parsed.windows(2) {
            assert!(pair[0] < pair[1], "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_invalid_versions() {
        assert!(matches!(Version::parse(""), Err(ParseError::InvalidFormat { .. })));
        assert!(matches!(Version::parse("1.2.3.4"), Err(ParseError::InvalidFormat { .. })));
        assert!(matches!(Version::parse("1..2"), Err(ParseError::InvalidNumber { .. })));
        assert!(matches!(Version::parse("1.2.3-"), Err(ParseError::InvalidPrerelease { .. })));
        assert!(matches!(Version::parse("1.2.3-r$c"), Err(ParseError::InvalidPrerelease { .. })));
    }

    #[test]
    fn test_serde_uses_string_form() {
        let v = Version::parse("2.32.3").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"2.32.3\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
