//! Format-preserving sprig.toml edits for `sprig add` and `sprig remove`

use std::fmt;

use toml_edit::{Array, DocumentMut, Item, Table, TableLike, Value};

use sprig_core::error::SprigError;
use sprig_core::types::{GroupName, PackageName, Requirement};

use crate::manifest::located;
use crate::ConfigResult;

/// Editable view of a manifest document
#[derive(Debug, Clone)]
pub struct ManifestEditor {
    doc: DocumentMut,
}

impl ManifestEditor {
    /// Parse manifest text, keeping comments and layout
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let doc = content
            .parse::<DocumentMut>()
            .map_err(|e| located(content, e.message(), e.span()))?;
        Ok(Self { doc })
    }

    /// Add `requirement` to `group`, replacing an entry for the same package
    pub fn add_requirement(&mut self, group: &GroupName, requirement: &Requirement) -> ConfigResult<()> {
        let array = self.group_array(group, true)?.ok_or_else(|| {
            SprigError::malformed(format!("cannot create dependency group '{}'", group))
        })?;

        let rendered = requirement.to_string();
        match position_of(array, &requirement.name) {
            Some(index) => {
                array.replace(index, rendered);
            },
            None => array.push(rendered),
        }
        Ok(())
    }

    /// Remove the entry for `name` from `group`; false when absent
    pub fn remove_requirement(&mut self, group: &GroupName, name: &PackageName) -> ConfigResult<bool> {
        let Some(array) = self.group_array(group, false)? else {
            return Ok(false);
        };

        match position_of(array, name) {
            Some(index) => {
                array.remove(index);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    fn group_array(&mut self, group: &GroupName, create: bool) -> ConfigResult<Option<&mut Array>> {
        if group.is_default() {
            let project = self
                .doc
                .get_mut("project")
                .and_then(Item::as_table_like_mut)
                .ok_or_else(|| SprigError::malformed("missing [project] table"))?;
            if project.get("dependencies").is_none() {
                if !create {
                    return Ok(None);
                }
                project.insert("dependencies", Item::Value(Value::Array(Array::new())));
            }
            return project
                .get_mut("dependencies")
                .and_then(Item::as_array_mut)
                .map(Some)
                .ok_or_else(|| SprigError::malformed("[project] dependencies must be an array"));
        }

        if self.doc.get("dependency-groups").is_none() {
            if !create {
                return Ok(None);
            }
            self.doc
                .insert("dependency-groups", Item::Table(Table::new()));
        }
        let groups = self
            .doc
            .get_mut("dependency-groups")
            .and_then(Item::as_table_like_mut)
            .ok_or_else(|| SprigError::malformed("[dependency-groups] must be a table"))?;

        // Keys may be spelled differently from the normalized group name
        let existing = groups
            .iter()
            .map(|(key, _)| key.to_string())
            .find(|key| GroupName::new(key).map_or(false, |g| &g == group));
        let key = match existing {
            Some(key) => key,
            None => {
                if !create {
                    return Ok(None);
                }
                groups.insert(group.as_str(), Item::Value(Value::Array(Array::new())));
                group.as_str().to_string()
            },
        };

        groups
            .get_mut(&key)
            .and_then(Item::as_array_mut)
            .map(Some)
            .ok_or_else(|| {
                SprigError::malformed(format!("dependency group '{}' must be an array", key))
            })
    }
}

/// Index of the string entry naming `name`; include tables are skipped
fn position_of(array: &Array, name: &PackageName) -> Option<usize> {
    array.iter().position(|value| {
        value
            .as_str()
            .map(|text| Requirement::split(text).0)
            .and_then(|raw| PackageName::new(raw).ok())
            .map_or(false, |existing| &existing == name)
    })
}

impl fmt::Display for ManifestEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc)
    }
}
