//! Package and dependency-group names.
//!
//! Both are compared case-insensitively: `Requests`, `requests` and
//! `REQUESTS` are the same package, and so are `zope.interface` and
//! `zope-interface`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::version::ParseError;

/// Normalized package name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

/// Normalized dependency group name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl PackageName {
    /// Validate and normalize a package name
    pub fn new(raw: &str) -> Result<Self, ParseError> {
        normalize(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl GroupName {
    /// The group holding `[project] dependencies`
    pub const DEFAULT: &'static str = "default";

    pub fn new(raw: &str) -> Result<Self, ParseError> {
        normalize(raw).map(Self)
    }

    pub fn default_group() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercase and collapse every run of `-`, `_`, `.` into one `-`
fn normalize(raw: &str) -> Result<String, ParseError> {
    let trimmed = raw.trim();
    let invalid = || ParseError::InvalidName {
        name: raw.to_string(),
    };

    let first = trimmed.chars().next().ok_or_else(invalid)?;
    let last = trimmed.chars().last().ok_or_else(invalid)?;
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid());
    }

    let mut normalized = String::with_capacity(trimmed.len());
    let mut in_separator = false;
    for c in trimmed.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => {
                if in_separator {
                    normalized.push('-');
                    in_separator = false;
                }
                normalized.push(c.to_ascii_lowercase());
            },
            '-' | '_' | '.' => in_separator = true,
            _ => return Err(invalid()),
        }
    }

    Ok(normalized)
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for GroupName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PackageName {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl TryFrom<String> for GroupName {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
