//! Requirement declarations (`requests>=2.31,<3`, `click`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::{PackageName, ParseError, VersionReq};

/// A package name plus the versions it may take
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: PackageName,
    pub version_req: VersionReq,
}

impl Requirement {
    pub fn new(name: PackageName, version_req: VersionReq) -> Self {
        Self { name, version_req }
    }

    /// Requirement on any version of `name`
    pub fn any(name: PackageName) -> Self {
        Self::new(name, VersionReq::any())
    }

    /// Parse `name` followed by an optional constraint
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let (raw_name, raw_req) = Self::split(input);

        let name = PackageName::new(raw_name)?;
        let version_req = if raw_req.is_empty() {
            VersionReq::any()
        } else {
            VersionReq::parse(raw_req)?
        };

        Ok(Self { name, version_req })
    }

    /// Split requirement text into its name and (possibly empty) constraint text
    pub fn split(input: &str) -> (&str, &str) {
        let input = input.trim();
        let split = input
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(input.len());
        let (raw_name, raw_req) = input.split_at(split);
        (raw_name, raw_req.trim())
    }

    /// True when the requirement was written without a constraint
    pub fn is_unconstrained(&self) -> bool {
        self.version_req.is_any()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version_req.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}", self.name, self.version_req)
        }
    }
}

impl FromStr for Requirement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
