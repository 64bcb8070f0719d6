//! Candidate versions for a package under the current constraints
//!
//! Python compatibility is a property of the project, not of the search, so
//! incompatible versions are dropped once per package and memoized. Version
//! constraints and the pre-release rule are applied on every query.

use std::collections::BTreeMap;

use sprig_core::types::{PackageName, Version, VersionReq};
use sprig_registry::PackageIndex;

/// Picks and orders candidate versions
pub struct CandidateSelector<'a, I: PackageIndex + ?Sized> {
    index: &'a I,
    /// The project's supported Python range
    python: Option<&'a VersionReq>,
    allow_prereleases: bool,
    /// Versions to try first, usually from an existing lock
    preferences: &'a BTreeMap<PackageName, Version>,
    /// Python-compatible versions, newest first
    available: BTreeMap<PackageName, Vec<Version>>,
}

impl<'a, I: PackageIndex + ?Sized> CandidateSelector<'a, I> {
    pub fn new(
        index: &'a I,
        python: Option<&'a VersionReq>,
        allow_prereleases: bool,
        preferences: &'a BTreeMap<PackageName, Version>,
    ) -> Self {
        Self {
            index,
            python,
            allow_prereleases,
            preferences,
            available: BTreeMap::new(),
        }
    }

    /// Versions with metadata whose `requires-python` overlaps the project's
    pub fn available(&mut self, name: &PackageName) -> &[Version] {
        let index = self.index;
        let python = self.python;
        self.available.entry(name.clone()).or_insert_with(|| {
            index
                .versions(name)
                .into_iter()
                .rev()
                .filter(|version| {
                    index
                        .metadata(name, version)
                        .is_some_and(|metadata| metadata.supports_python(python))
                })
                .collect()
        })
    }

    /// Candidates satisfying every constraint, in the order to try them.
    ///
    /// Pre-releases only qualify when allowed globally or when one of the
    /// constraints names a pre-release. A preferred version that qualifies
    /// is moved to the front; the rest stay newest first.
    pub fn candidates(&mut self, name: &PackageName, constraints: &[&VersionReq]) -> Vec<Version> {
        let prereleases = self.allow_prereleases
            || constraints.iter().any(|req| req.mentions_prerelease());
        let preferred = self.preferences.get(name);

        let mut candidates: Vec<Version> = self
            .available(name)
            .iter()
            .filter(|version| prereleases || !version.is_prerelease())
            .filter(|version| constraints.iter().all(|req| req.matches(version)))
            .cloned()
            .collect();

        if let Some(position) = preferred.and_then(|p| candidates.iter().position(|v| v == p)) {
            let version = candidates.remove(position);
            candidates.insert(0, version);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_registry::MemoryIndex;

    const INDEX: &str = r#"{
        "packages": {
            "urllib3": {
                "1.26.18": {},
                "2.0.0": { "requires-python": ">=3.7" },
                "2.2.1": { "requires-python": ">=3.8" },
                "2.3.0": { "requires-python": ">=3.6,<3.9" },
                "3.0.0-alpha.1": { "requires-python": ">=3.8" }
            }
        }
    }"#;

    fn urllib3() -> PackageName {
        PackageName::new("urllib3").unwrap()
    }

    fn req(s: &str) -> VersionReq {
        VersionReq::parse(s).unwrap()
    }

    fn versions(list: &[&str]) -> Vec<Version> {
        list.iter().map(|v| Version::parse(v).unwrap()).collect()
    }

    #[test]
    fn test_python_filter_and_descending_order() {
        let index = MemoryIndex::from_json(INDEX).unwrap();
        let python = req(">=3.9");
        let preferences = BTreeMap::new();
        let mut selector = CandidateSelector::new(&index, Some(&python), false, &preferences);

        assert_eq!(
            selector.available(&urllib3()),
            versions(&["3.0.0-alpha.1", "2.2.1", "2.0.0", "1.26.18"]).as_slice()
        );
        assert_eq!(
            selector.candidates(&urllib3(), &[]),
            versions(&["2.2.1", "2.0.0", "1.26.18"])
        );
    }

    #[test]
    fn test_no_python_range_keeps_everything() {
        let index = MemoryIndex::from_json(INDEX).unwrap();
        let preferences = BTreeMap::new();
        let mut selector = CandidateSelector::new(&index, None, false, &preferences);
        assert_eq!(selector.available(&urllib3()).len(), 5);
        assert_eq!(selector.candidates(&urllib3(), &[])[0], Version::new(2, 3, 0));
    }

    #[test]
    fn test_prereleases_need_opt_in() {
        let index = MemoryIndex::from_json(INDEX).unwrap();
        let python = req(">=3.9");
        let preferences = BTreeMap::new();

        let mentioned = req(">=3.0.0-alpha.1");
        let mut selector = CandidateSelector::new(&index, Some(&python), false, &preferences);
        assert_eq!(
            selector.candidates(&urllib3(), &[&mentioned]),
            versions(&["3.0.0-alpha.1"])
        );

        let mut allowing = CandidateSelector::new(&index, Some(&python), true, &preferences);
        assert_eq!(
            allowing.candidates(&urllib3(), &[&req(">=2")])[0],
            Version::parse("3.0.0-alpha.1").unwrap()
        );
    }

    #[test]
    fn test_preference_goes_first() {
        let index = MemoryIndex::from_json(INDEX).unwrap();
        let preferences: BTreeMap<_, _> = [(urllib3(), Version::new(2, 0, 0))].into_iter().collect();
        let mut selector = CandidateSelector::new(&index, None, false, &preferences);

        assert_eq!(
            selector.candidates(&urllib3(), &[]),
            versions(&["2.0.0", "2.3.0", "2.2.1", "1.26.18"])
        );
        // A preference the constraints exclude is ignored
        assert_eq!(
            selector.candidates(&urllib3(), &[&req(">=2.1")]),
            versions(&["2.3.0", "2.2.1"])
        );
    }

    #[test]
    fn test_unknown_package_has_no_candidates() {
        let index = MemoryIndex::new();
        let preferences = BTreeMap::new();
        let mut selector = CandidateSelector::new(&index, None, false, &preferences);
        assert!(selector
            .candidates(&PackageName::new("ghost").unwrap(), &[])
            .is_empty());
    }
}
