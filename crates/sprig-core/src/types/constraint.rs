//! Version constraints (`>=2.31, <3`, `^2.31`, `~=1.4`, `==2.*`).
//!
//! A `VersionReq` is a conjunction of comparators. Every comparator except
//! `!=` maps to a single interval, which is what the Python-range
//! intersection test works on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

use super::version::{parse_components, ParseError, Version};

/// Version requirement (conjunction of comparators)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionReq {
    pub comparators: Vec<Comparator>,
}

/// Individual version comparator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparator {
    pub op: Op,
    pub version: PartialVersion,
    /// Trailing `.*` on `==`/`!=`
    pub wildcard: bool,
}

/// Comparison operator for version requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Exact,      // ==1.0.0
    NotEqual,   // !=1.0.0
    Greater,    // >1.0.0
    GreaterEq,  // >=1.0.0
    Less,       // <1.0.0
    LessEq,     // <=1.0.0
    Tilde,      // ~1.0.0
    Caret,      // ^1.0.0
    Compatible, // ~=1.0
    Wildcard,   // *
}

/// Partial version for comparisons (may have missing components)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialVersion {
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub prerelease: Option<String>,
}

// Longer operators first so `>=` is not read as `>`
const OPERATORS: [(&str, Op); 11] = [
    ("==", Op::Exact),
    ("!=", Op::NotEqual),
    (">=", Op::GreaterEq),
    ("<=", Op::LessEq),
    ("~=", Op::Compatible),
    ("^=", Op::Caret),
    (">", Op::Greater),
    ("<", Op::Less),
    ("=", Op::Exact),
    ("^", Op::Caret),
    ("~", Op::Tilde),
];

impl VersionReq {
    /// Requirement matching every version
    pub fn any() -> Self {
        Self {
            comparators: vec![Comparator::wildcard()],
        }
    }

    /// Requirement matching exactly one version
    pub fn exact(version: &Version) -> Self {
        Self {
            comparators: vec![Comparator {
                op: Op::Exact,
                version: PartialVersion::from(version),
                wildcard: false,
            }],
        }
    }

    /// Requirement `>=version`
    pub fn at_least(version: &Version) -> Self {
        Self {
            comparators: vec![Comparator {
                op: Op::GreaterEq,
                version: PartialVersion::from(version),
                wildcard: false,
            }],
        }
    }

    /// Parse a version requirement string
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::InvalidRequirement {
                input: input.to_string(),
                reason: "empty requirement".to_string(),
            });
        }

        let comparators = input
            .split(',')
            .map(|part| Comparator::parse(part.trim(), input))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { comparators })
    }

    /// Check if a version matches this requirement
    pub fn matches(&self, version: &Version) -> bool {
        self.comparators.iter().all(|comp| comp.matches(version))
    }

    /// True when every version matches
    pub fn is_any(&self) -> bool {
        self.comparators.iter().all(|comp| comp.op == Op::Wildcard)
    }

    /// True when any comparator names a pre-release explicitly
    pub fn mentions_prerelease(&self) -> bool {
        self.comparators
            .iter()
            .any(|comp| comp.version.prerelease.is_some())
    }

    /// Interval covered by this requirement, ignoring `!=` exclusions
    pub fn bounds(&self) -> (Bound<Version>, Bound<Version>) {
        self.comparators.iter().fold(
            (Bound::Unbounded, Bound::Unbounded),
            |(lower, upper), comp| {
                let (comp_lower, comp_upper) = comp.bounds();
                (tighter_lower(lower, comp_lower), tighter_upper(upper, comp_upper))
            },
        )
    }

    /// Whether the two requirements' intervals overlap
    pub fn intersects(&self, other: &VersionReq) -> bool {
        let (self_lower, self_upper) = self.bounds();
        let (other_lower, other_upper) = other.bounds();
        let lower = tighter_lower(self_lower, other_lower);
        let upper = tighter_upper(self_upper, other_upper);
        !interval_is_empty(&lower, &upper)
    }
}

impl Comparator {
    fn wildcard() -> Self {
        Self {
            op: Op::Wildcard,
            version: PartialVersion {
                major: 0,
                minor: None,
                patch: None,
                prerelease: None,
            },
            wildcard: false,
        }
    }

    fn parse(part: &str, whole: &str) -> Result<Self, ParseError> {
        let invalid = |reason: String| ParseError::InvalidRequirement {
            input: whole.to_string(),
            reason,
        };

        if part.is_empty() {
            return Err(invalid("empty comparator".to_string()));
        }
        if part == "*" {
            return Ok(Self::wildcard());
        }

        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(symbol, op)| part.strip_prefix(symbol).map(|rest| (*op, rest)))
            .unwrap_or((Op::Exact, part));
        let mut version_str = rest.trim();

        let mut wildcard = false;
        if matches!(op, Op::Exact | Op::NotEqual) {
            if let Some(stripped) = version_str.strip_suffix(".*") {
                wildcard = true;
                version_str = stripped;
            }
        }
        if version_str.contains('*') {
            return Err(invalid(format!("unexpected wildcard in '{}'", part)));
        }

        let (components, prerelease) =
            parse_components(version_str).map_err(|e| invalid(e.to_string()))?;

        if wildcard && prerelease.is_some() {
            return Err(invalid("wildcards cannot carry a pre-release".to_string()));
        }
        if op == Op::Compatible && components.len() < 2 {
            return Err(invalid(
                "'~=' needs at least two release components".to_string(),
            ));
        }

        Ok(Self {
            op,
            version: PartialVersion {
                major: components[0],
                minor: components.get(1).copied(),
                patch: components.get(2).copied(),
                prerelease,
            },
            wildcard,
        })
    }

    /// Check if a version matches this comparator
    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Wildcard => true,
            Op::NotEqual => {
                let (lower, upper) = self.interval(Op::Exact);
                !within(&lower, &upper, version)
            },
            op => {
                let (lower, upper) = self.interval(op);
                within(&lower, &upper, version)
            },
        }
    }

    /// Interval of this comparator; `!=` is treated as unbounded
    pub fn bounds(&self) -> (Bound<Version>, Bound<Version>) {
        match self.op {
            Op::NotEqual => (Bound::Unbounded, Bound::Unbounded),
            op => self.interval(op),
        }
    }

    fn interval(&self, op: Op) -> (Bound<Version>, Bound<Version>) {
        let base = self.version.to_version();
        match op {
            Op::Wildcard | Op::NotEqual => (Bound::Unbounded, Bound::Unbounded),
            Op::Exact if self.wildcard => (
                Bound::Included(base.release()),
                excluded_upper(self.version.bump_last()),
            ),
            Op::Exact => (Bound::Included(base.clone()), Bound::Included(base)),
            Op::Greater => (Bound::Excluded(base), Bound::Unbounded),
            Op::GreaterEq => (Bound::Included(base), Bound::Unbounded),
            Op::Less => (Bound::Unbounded, Bound::Excluded(base)),
            Op::LessEq => (Bound::Unbounded, Bound::Included(base)),
            Op::Tilde => (
                Bound::Included(base),
                excluded_upper(self.version.tilde_upper()),
            ),
            Op::Caret => (
                Bound::Included(base),
                excluded_upper(self.version.caret_upper()),
            ),
            Op::Compatible => (
                Bound::Included(base),
                excluded_upper(self.version.compatible_upper()),
            ),
        }
    }
}

impl PartialVersion {
    /// Convert to a full version (filling missing parts with 0)
    pub fn to_version(&self) -> Version {
        Version {
            major: self.major,
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            prerelease: self.prerelease.clone(),
        }
    }

    // Upper bounds are `None` when a component would pass u64::MAX

    /// Increment the last component that was written (`2.31` -> `2.32.0`)
    fn bump_last(&self) -> Option<Version> {
        match (self.minor, self.patch) {
            (Some(minor), Some(patch)) => Some(Version::new(self.major, minor, patch.checked_add(1)?)),
            (Some(minor), None) => Some(Version::new(self.major, minor.checked_add(1)?, 0)),
            _ => Some(Version::new(self.major.checked_add(1)?, 0, 0)),
        }
    }

    /// ~1.2.3 allows >=1.2.3 <1.3.0, ~1 allows >=1.0.0 <2.0.0
    fn tilde_upper(&self) -> Option<Version> {
        match self.minor {
            Some(minor) => Some(Version::new(self.major, minor.checked_add(1)?, 0)),
            None => Some(Version::new(self.major.checked_add(1)?, 0, 0)),
        }
    }

    /// ^1.2.3 allows <2.0.0, ^0.2.3 allows <0.3.0, ^0.0.3 allows <0.0.4
    fn caret_upper(&self) -> Option<Version> {
        if self.major > 0 {
            return Some(Version::new(self.major.checked_add(1)?, 0, 0));
        }
        match (self.minor, self.patch) {
            (None, _) => Some(Version::new(1, 0, 0)),
            (Some(minor), _) if minor > 0 => Some(Version::new(0, minor.checked_add(1)?, 0)),
            (Some(_), None) => Some(Version::new(0, 1, 0)),
            (Some(_), Some(patch)) => Some(Version::new(0, 0, patch.checked_add(1)?)),
        }
    }

    /// ~=2.31 allows <3.0.0, ~=2.31.4 allows <2.32.0
    fn compatible_upper(&self) -> Option<Version> {
        match (self.minor, self.patch) {
            (Some(minor), Some(_)) => Some(Version::new(self.major, minor.checked_add(1)?, 0)),
            _ => Some(Version::new(self.major.checked_add(1)?, 0, 0)),
        }
    }
}

fn excluded_upper(upper: Option<Version>) -> Bound<Version> {
    upper.map_or(Bound::Unbounded, Bound::Excluded)
}

impl From<&Version> for PartialVersion {
    fn from(version: &Version) -> Self {
        Self {
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            prerelease: version.prerelease.clone(),
        }
    }
}

fn within(lower: &Bound<Version>, upper: &Bound<Version>, version: &Version) -> bool {
    let above = match lower {
        Bound::Unbounded => true,
        Bound::Included(l) => version >= l,
        Bound::Excluded(l) => version > l,
    };
    // `<3.0` must not admit 3.0.0rc1 unless the bound itself is a pre-release
    let below = match upper {
        Bound::Unbounded => true,
        Bound::Included(u) => version <= u,
        Bound::Excluded(u) => {
            version < u
                && !(version.is_prerelease() && !u.is_prerelease() && version.core() == u.core())
        },
    };
    above && below
}

fn tighter_lower(a: Bound<Version>, b: Bound<Version>) -> Bound<Version> {
    let keep_a = match (&a, &b) {
        (Bound::Unbounded, _) => false,
        (_, Bound::Unbounded) => true,
        (
            Bound::Included(x) | Bound::Excluded(x),
            Bound::Included(y) | Bound::Excluded(y),
        ) => match x.cmp(y) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
        },
    };
    if keep_a {
        a
    } else {
        b
    }
}

fn tighter_upper(a: Bound<Version>, b: Bound<Version>) -> Bound<Version> {
    let keep_a = match (&a, &b) {
        (Bound::Unbounded, _) => false,
        (_, Bound::Unbounded) => true,
        (
            Bound::Included(x) | Bound::Excluded(x),
            Bound::Included(y) | Bound::Excluded(y),
        ) => match x.cmp(y) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => matches!(a, Bound::Excluded(_)),
        },
    };
    if keep_a {
        a
    } else {
        b
    }
}

fn interval_is_empty(lower: &Bound<Version>, upper: &Bound<Version>) -> bool {
    match (lower, upper) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (
            Bound::Included(l) | Bound::Excluded(l),
            Bound::Included(u) | Bound::Excluded(u),
        ) => l >= u,
    }
}

impl Op {
    fn symbol(&self) -> &'static str {
        match self {
            Op::Exact => "==",
            Op::NotEqual => "!=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Tilde => "~",
            Op::Caret => "^",
            Op::Compatible => "~=",
            Op::Wildcard => "*",
        }
    }
}

impl fmt::Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
        }
        if let Some(patch) = self.patch {
            write!(f, ".{}", patch)?;
        }
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == Op::Wildcard {
            return f.write_str("*");
        }
        write!(f, "{}{}", self.op.symbol(), self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, comp) in self.comparators.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", comp)?;
        }
        Ok(())
    }
}

// Ordered by canonical text so conflict reports sort stably
impl PartialOrd for VersionReq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionReq {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl FromStr for VersionReq {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionReq {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionReq {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_req_exact() {
        let req = VersionReq::parse("1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(!req.matches(&v("1.2.4")));

        let padded = VersionReq::parse("==2.31").unwrap();
        assert!(padded.matches(&v("2.31.0")));
        assert!(!padded.matches(&v("2.31.1")));
    }

    #[test]
    fn test_version_req_wildcard() {
        let req = VersionReq::parse("*").unwrap();
        assert!(req.is_any());
        assert!(req.matches(&v("1.2.3")));
        assert!(req.matches(&v("999.999.999")));

        let prefix = VersionReq::parse("==2.*").unwrap();
        assert!(prefix.matches(&v("2.0.0")));
        assert!(prefix.matches(&v("2.99.1")));
        assert!(!prefix.matches(&v("3.0.0")));
        assert!(!prefix.matches(&v("1.9.9")));
    }

    #[test]
    fn test_version_req_caret() {
        let req = VersionReq::parse("^1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(req.matches(&v("1.2.4")));
        assert!(req.matches(&v("1.3.0")));
        assert!(!req.matches(&v("2.0.0")));
        assert!(!req.matches(&v("0.9.9")));

        let zero = VersionReq::parse("^0.2.3").unwrap();
        assert!(zero.matches(&v("0.2.9")));
        assert!(!zero.matches(&v("0.3.0")));

        let alias = VersionReq::parse("^=2.31").unwrap();
        assert_eq!(alias, VersionReq::parse("^2.31").unwrap());
        assert!(alias.matches(&v("2.32.3")));
        assert!(!alias.matches(&v("3.0.0")));
    }

    #[test]
    fn test_version_req_tilde_and_compatible() {
        let tilde = VersionReq::parse("~1.2").unwrap();
        assert!(tilde.matches(&v("1.2.9")));
        assert!(!tilde.matches(&v("1.3.0")));

        let compatible = VersionReq::parse("~=2.31").unwrap();
        assert!(compatible.matches(&v("2.99.0")));
        assert!(!compatible.matches(&v("3.0.0")));

        let patch_level = VersionReq::parse("~=2.31.4").unwrap();
        assert!(patch_level.matches(&v("2.31.9")));
        assert!(!patch_level.matches(&v("2.32.0")));
        assert!(!patch_level.matches(&v("2.31.3")));
    }

    #[test]
    fn test_version_req_operators() {
        let req = VersionReq::parse(">1.2.3").unwrap();
        assert!(!req.matches(&v("1.2.3")));
        assert!(req.matches(&v("1.2.4")));

        let req = VersionReq::parse(">=1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(req.matches(&v("1.3.0")));

        let req = VersionReq::parse("<1.2.4").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(!req.matches(&v("1.2.4")));

        let req = VersionReq::parse("!=1.2.4").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(!req.matches(&v("1.2.4")));
    }

    #[test]
    fn test_conjunction() {
        let req = VersionReq::parse(">=2.31, <3.0").unwrap();
        assert_eq!(req.comparators.len(), 2);
        assert!(req.matches(&v("2.32.3")));
        assert!(!req.matches(&v("3.0.0")));
        assert!(!req.matches(&v("2.30.0")));
        assert_eq!(req.to_string(), ">=2.31, <3.0");
    }

    #[test]
    fn test_exclusive_upper_bound_skips_its_prereleases() {
        let req = VersionReq::parse("<3.0").unwrap();
        assert!(req.matches(&v("2.9.9")));
        assert!(!req.matches(&v("3.0.0rc1")));

        let explicit = VersionReq::parse("<3.0.0rc2").unwrap();
        assert!(explicit.matches(&v("3.0.0rc1")));
        assert!(explicit.mentions_prerelease());
    }

    #[test]
    fn test_upper_bound_at_component_limit_is_open() {
        let max = u64::MAX;
        let top = Version::new(max, 0, 0);
        for input in [
            format!("^{max}"),
            format!("~{max}"),
            format!("~={max}.0"),
            format!("=={max}.*"),
        ] {
            let req = VersionReq::parse(&input).unwrap();
            assert!(req.matches(&top), "{input}");
            assert!(!req.matches(&v("1.0.0")), "{input}");
            assert_eq!(req.comparators[0].bounds().1, Bound::Unbounded, "{input}");
        }

        let req = VersionReq::parse(&format!("~1.{max}")).unwrap();
        assert!(req.matches(&Version::new(1, max, 7)));
        assert_eq!(req.comparators[0].bounds().1, Bound::Unbounded);
    }

    #[test]
    fn test_intersects() {
        let project = VersionReq::parse(">=3.9").unwrap();
        assert!(project.intersects(&VersionReq::parse(">=3.8").unwrap()));
        assert!(project.intersects(&VersionReq::parse("==3.12").unwrap()));
        assert!(!project.intersects(&VersionReq::parse("<3.8").unwrap()));
        assert!(!project.intersects(&VersionReq::parse("<3.9").unwrap()));
        assert!(project.intersects(&VersionReq::parse("<=3.9").unwrap()));
        assert!(!project.intersects(&VersionReq::parse("~=2.7").unwrap()));
    }

    #[test]
    fn test_invalid_requirements() {
        for input in ["", ">=", "~=2", "==2.*-rc1", "foo", ">=1.0,", "1.*.2"] {
            assert!(
                matches!(VersionReq::parse(input), Err(ParseError::InvalidRequirement { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["^2.31", "~=1.4.2", "==2.*", "!=1.0.0", ">=3.9, <4", "*"] {
            let req = VersionReq::parse(input).unwrap();
            assert_eq!(VersionReq::parse(&req.to_string()).unwrap(), req);
        }
    }
}
