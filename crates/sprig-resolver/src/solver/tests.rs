//! Unit tests for the resolver

use super::*;

use proptest::prelude::*;
use sprig_config::parse_manifest;
use sprig_core::types::{PackageMetadata, Requirement};
use sprig_registry::MemoryIndex;

const REQUESTS_INDEX: &str = r#"{
    "packages": {
        "requests": {
            "2.30.0": { "requires-python": ">=3.7", "dependencies": ["urllib3>=1.21.1,<3", "idna>=2.5,<4"] },
            "2.31.0": { "requires-python": ">=3.7", "dependencies": ["urllib3>=1.21.1,<3", "idna>=2.5,<4"] },
            "2.32.3": { "requires-python": ">=3.8", "dependencies": ["urllib3>=2.0", "idna>=2.5,<4"] }
        },
        "urllib3": {
            "1.26.18": {},
            "2.0.7": { "requires-python": ">=3.7" },
            "2.2.1": { "requires-python": ">=3.8" },
            "2.3.0": { "requires-python": ">=3.7,<3.9" },
            "3.0.0a1": { "requires-python": ">=3.9" }
        },
        "idna": {
            "3.6": {},
            "3.7": { "requires-python": ">=3.5" }
        }
    }
}"#;

fn name(s: &str) -> PackageName {
    PackageName::new(s).unwrap()
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn manifest(python: Option<&str>, dependencies: &[&str]) -> Manifest {
    let mut content = String::from("[project]\nname = \"demo\"\nversion = \"0.1.0\"\n");
    if let Some(python) = python {
        content.push_str(&format!("requires-python = \"{}\"\n", python));
    }
    let quoted: Vec<String> = dependencies.iter().map(|d| format!("\"{}\"", d)).collect();
    content.push_str(&format!("dependencies = [{}]\n", quoted.join(", ")));
    parse_manifest(&content).unwrap()
}

fn default_groups() -> Vec<GroupName> {
    vec![GroupName::default_group()]
}

fn resolve_default(manifest: &Manifest, index: &MemoryIndex) -> ResolverResult<Resolution> {
    resolve(manifest, &default_groups(), index, &ResolveOptions::default())
}

fn failure(result: ResolverResult<Resolution>) -> ResolutionFailure {
    match result {
        Err(SprigError::ResolutionFailure(failure)) => failure,
        other => panic!("Expected ResolutionFailure, got {other:?}"),
    }
}

#[test]
fn test_requests_scenario() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest = manifest(Some(">=3.9"), &["requests^=2.31"]);

    let resolution = resolve_default(&manifest, &index).unwrap();

    let names: Vec<&str> = resolution.packages.keys().map(PackageName::as_str).collect();
    assert_eq!(names, vec!["idna", "requests", "urllib3"]);
    assert_eq!(resolution.version(&name("requests")), Some(&v("2.32.3")));
    // 2.3.0 does not support Python 3.9+, 3.0.0a1 is a pre-release
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.2.1")));
    assert_eq!(resolution.version(&name("idna")), Some(&v("3.7")));

    let requests = &resolution.packages[&name("requests")];
    assert_eq!(
        requests.dependencies.iter().map(PackageName::as_str).collect::<Vec<_>>(),
        vec!["idna", "urllib3"]
    );
    assert!(requests.groups.contains(&GroupName::default_group()));

    let urllib3 = &resolution.packages[&name("urllib3")];
    assert_eq!(urllib3.constraints.len(), 1);
    let imposed = urllib3.constraints.iter().next().unwrap();
    assert_eq!(imposed.source.to_string(), "requests==2.32.3");
    assert_eq!(imposed.constraint.to_string(), ">=2.0");
}

#[test]
fn test_unsatisfiable_names_both_packages() {
    let index = MemoryIndex::from_json(
        r#"{
            "packages": {
                "pkgA": { "1.0.0": {}, "2.0.0": {}, "2.1.0": {} },
                "pkgB": {
                    "1.0.0": { "dependencies": ["pkgA<2.0"] },
                    "1.1.0": { "dependencies": ["pkgA<2.0"] }
                }
            }
        }"#,
    )
    .unwrap();
    let manifest = manifest(None, &["pkgA>=2.0", "pkgB"]);

    let failure = failure(resolve_default(&manifest, &index));
    assert_eq!(failure.packages, vec![name("pkga"), name("pkgb")]);

    let rendered = failure.to_string();
    assert!(rendered.contains("pkga>=2.0 (from root (default))"), "{rendered}");
    assert!(rendered.contains("pkga<2.0 (from pkgb==1.0.0)"), "{rendered}");
}

#[test]
fn test_exact_pin_is_the_only_candidate() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest = manifest(Some(">=3.9"), &["requests==2.31.0"]);

    let resolution = resolve_default(&manifest, &index).unwrap();
    assert_eq!(resolution.version(&name("requests")), Some(&v("2.31.0")));
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.2.1")));
}

#[test]
fn test_python_range_filters_candidates() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();

    // 2.3.0 only supports Python below 3.9
    let old_python = manifest(Some(">=3.7,<3.9"), &["urllib3"]);
    let resolution = resolve_default(&old_python, &index).unwrap();
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.3.0")));

    // No declared range means no filtering at all
    let unrestricted = manifest(None, &["urllib3"]);
    let resolution = resolve_default(&unrestricted, &index).unwrap();
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.3.0")));

    let modern = manifest(Some(">=3.9"), &["urllib3"]);
    let resolution = resolve_default(&modern, &index).unwrap();
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.2.1")));
}

#[test]
fn test_prereleases_need_opt_in() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest_plain = manifest(Some(">=3.9"), &["urllib3"]);

    let resolution = resolve_default(&manifest_plain, &index).unwrap();
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.2.1")));

    let options = ResolveOptions::default().with_prereleases(true);
    let resolution = resolve(&manifest_plain, &default_groups(), &index, &options).unwrap();
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("3.0.0a1")));

    let mentioned = manifest(Some(">=3.9"), &["urllib3>=3.0.0a1"]);
    let resolution = resolve_default(&mentioned, &index).unwrap();
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("3.0.0a1")));
}

#[test]
fn test_preferences_keep_locked_versions() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest = manifest(Some(">=3.9"), &["requests^=2.31"]);

    let preferences: BTreeMap<_, _> = [
        (name("requests"), v("2.31.0")),
        (name("urllib3"), v("1.26.18")),
        // No longer a candidate; ignored
        (name("idna"), v("9.9.9")),
    ]
    .into_iter()
    .collect();
    let options = ResolveOptions::default().with_preferences(preferences);
    let resolution = resolve(&manifest, &default_groups(), &index, &options).unwrap();

    assert_eq!(resolution.version(&name("requests")), Some(&v("2.31.0")));
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("1.26.18")));
    assert_eq!(resolution.version(&name("idna")), Some(&v("3.7")));
}

#[test]
fn test_preference_yields_to_new_constraints() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest = manifest(Some(">=3.9"), &["requests^=2.31", "urllib3>=2"]);

    let preferences: BTreeMap<_, _> = [
        (name("requests"), v("2.31.0")),
        (name("urllib3"), v("1.26.18")),
    ]
    .into_iter()
    .collect();
    let options = ResolveOptions::default().with_preferences(preferences);
    let resolution = resolve(&manifest, &default_groups(), &index, &options).unwrap();

    assert_eq!(resolution.version(&name("requests")), Some(&v("2.31.0")));
    assert_eq!(resolution.version(&name("urllib3")), Some(&v("2.2.1")));
}

#[test]
fn test_backjump_skips_unrelated_decisions() {
    // p 2.0.0 pulls in r, and every r rejects p 2.0.0. x is unrelated and
    // sits between p and r on the decision stack.
    let index = MemoryIndex::from_json(
        r#"{
            "packages": {
                "p": { "1.0.0": {}, "2.0.0": { "dependencies": ["r"] } },
                "x": { "1.0.0": {}, "2.0.0": {} },
                "r": {
                    "1.0.0": { "dependencies": ["p<2"] },
                    "1.1.0": { "dependencies": ["p<2"] },
                    "1.2.0": { "dependencies": ["p<2"] }
                }
            }
        }"#,
    )
    .unwrap();
    let manifest = manifest(None, &["p", "x"]);

    let (resolution, stats) = Resolver::new(&index)
        .resolve_with_stats(&manifest, &default_groups())
        .unwrap();

    assert_eq!(resolution.version(&name("p")), Some(&v("1.0.0")));
    assert_eq!(resolution.version(&name("x")), Some(&v("2.0.0")));
    assert!(resolution.get(&name("r")).is_none());
    // Three failed r versions plus one jump straight back to p
    assert_eq!(stats.backtracks, 4);
}

#[test]
fn test_shared_dependency_forces_older_parent() {
    let index = MemoryIndex::from_json(
        r#"{
            "packages": {
                "web": {
                    "1.0.0": { "dependencies": ["http<2"] },
                    "2.0.0": { "dependencies": ["http>=2"] }
                },
                "client": { "1.0.0": { "dependencies": ["http>=1,<2"] } },
                "http": { "1.0.0": {}, "1.5.0": {}, "2.0.0": {} }
            }
        }"#,
    )
    .unwrap();
    let manifest = manifest(None, &["web", "client"]);

    let resolution = resolve_default(&manifest, &index).unwrap();
    assert_eq!(resolution.version(&name("web")), Some(&v("1.0.0")));
    assert_eq!(resolution.version(&name("http")), Some(&v("1.5.0")));
    assert!(resolution.unsatisfied().is_empty());
}

#[test]
fn test_unknown_package_fails_resolution() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest = manifest(None, &["ghost>=1"]);

    let failure = failure(resolve_default(&manifest, &index));
    assert_eq!(failure.packages, vec![name("ghost")]);
    assert_eq!(failure.constraints.len(), 1);
}

#[test]
fn test_groups_are_resolved_together() {
    let index = MemoryIndex::from_json(REQUESTS_INDEX).unwrap();
    let manifest = parse_manifest(
        r#"
[project]
name = "demo"
version = "0.1.0"
requires-python = ">=3.9"
dependencies = ["requests"]

[dependency-groups]
legacy = ["urllib3<2"]
"#,
    )
    .unwrap();

    let default_only = resolve_default(&manifest, &index).unwrap();
    assert_eq!(default_only.version(&name("requests")), Some(&v("2.32.3")));
    assert_eq!(default_only.groups, default_groups());

    // urllib3<2 rules out requests 2.32.3 once both groups are requested
    let both = resolve(&manifest, &manifest.all_groups(), &index, &ResolveOptions::default())
        .unwrap();
    assert_eq!(both.version(&name("requests")), Some(&v("2.31.0")));
    assert_eq!(both.version(&name("urllib3")), Some(&v("1.26.18")));

    let urllib3 = &both.packages[&name("urllib3")];
    let groups: Vec<&str> = urllib3.groups.iter().map(GroupName::as_str).collect();
    assert_eq!(groups, vec!["default", "legacy"]);
    assert_eq!(both.packages[&name("idna")].groups.len(), 1);
}

#[test]
fn test_dependency_cycle_resolves() {
    let index = MemoryIndex::from_json(
        r#"{
            "packages": {
                "sphinx": { "7.0.0": { "dependencies": ["sphinxcontrib-applehelp"] } },
                "sphinxcontrib-applehelp": { "1.0.0": { "dependencies": ["sphinx>=5"] } }
            }
        }"#,
    )
    .unwrap();
    let manifest = manifest(None, &["sphinx"]);

    let resolution = resolve_default(&manifest, &index).unwrap();
    assert_eq!(resolution.len(), 2);
    assert!(resolution.unsatisfied().is_empty());
}

#[test]
fn test_empty_manifest_resolves_to_nothing() {
    let index = MemoryIndex::new();
    let manifest = manifest(None, &[]);
    assert!(resolve_default(&manifest, &index).unwrap().is_empty());
}

// Random small universes: four packages, three versions each, a few
// dependencies per version.

const UNIVERSE: [&str; 4] = ["a", "b", "c", "d"];

fn constraint_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        (1u64..=3).prop_map(|k| format!(">={}", k)),
        (2u64..=3).prop_map(|k| format!("<{}", k)),
        (1u64..=3).prop_map(|k| format!("=={}.0.0", k)),
    ]
}

/// `[package][version] -> [(dependency, constraint)]`
type Universe = Vec<Vec<Vec<(usize, String)>>>;

fn universe_strategy() -> impl Strategy<Value = Universe> {
    prop::collection::vec(
        prop::collection::vec(
            prop::collection::vec((0usize..UNIVERSE.len(), constraint_strategy()), 0..=2),
            3,
        ),
        UNIVERSE.len(),
    )
}

fn roots_strategy() -> impl Strategy<Value = Vec<(usize, String)>> {
    prop::collection::vec((0usize..UNIVERSE.len(), constraint_strategy()), 1..=3)
}

fn build_index(universe: &Universe) -> MemoryIndex {
    let mut index = MemoryIndex::new();
    for (package, versions) in universe.iter().enumerate() {
        for (i, dependencies) in versions.iter().enumerate() {
            let mut metadata = PackageMetadata::new(name(UNIVERSE[package]), Version::new(i as u64 + 1, 0, 0));
            for (dependency, constraint) in dependencies {
                if *dependency == package {
                    continue;
                }
                let text = format!("{}{}", UNIVERSE[*dependency], constraint);
                metadata = metadata.with_dependency(Requirement::parse(&text).unwrap());
            }
            index.insert(metadata);
        }
    }
    index
}

fn build_manifest(roots: &[(usize, String)]) -> Manifest {
    let mut seen = BTreeSet::new();
    let dependencies: Vec<String> = roots
        .iter()
        .filter(|(package, _)| seen.insert(*package))
        .map(|(package, constraint)| format!("{}{}", UNIVERSE[*package], constraint))
        .collect();
    let refs: Vec<&str> = dependencies.iter().map(String::as_str).collect();
    manifest(None, &refs)
}

/// Exhaustively decide whether any assignment satisfies the manifest
fn solution_exists(manifest: &Manifest, index: &MemoryIndex) -> bool {
    let roots: Vec<Requirement> = manifest
        .requirements_for(&default_groups())
        .into_iter()
        .map(|sourced| sourced.requirement)
        .collect();
    let choices = 4usize.pow(UNIVERSE.len() as u32);

    (0..choices).any(|code| {
        // Digit 0 leaves the package out, 1..=3 picks that major version
        let assignment: BTreeMap<PackageName, Version> = (0..UNIVERSE.len())
            .filter_map(|i| {
                let digit = (code / 4usize.pow(i as u32)) % 4;
                (digit > 0).then(|| (name(UNIVERSE[i]), Version::new(digit as u64, 0, 0)))
            })
            .collect();
        let satisfied = |requirement: &Requirement| {
            assignment
                .get(&requirement.name)
                .is_some_and(|version| requirement.version_req.matches(version))
        };

        roots.iter().all(satisfied)
            && assignment.iter().all(|(package, version)| {
                index
                    .metadata(package, version)
                    .is_some_and(|metadata| metadata.dependencies.iter().all(satisfied))
            })
    })
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(universe in universe_strategy(), roots in roots_strategy()) {
        let index = build_index(&universe);
        let manifest = build_manifest(&roots);

        let first = resolve_default(&manifest, &index);
        let second = resolve_default(&manifest, &index);
        prop_assert_eq!(format!("{:?}", first), format!("{:?}", second));
    }

    #[test]
    fn prop_resolution_is_sound_and_complete(universe in universe_strategy(), roots in roots_strategy()) {
        let index = build_index(&universe);
        let manifest = build_manifest(&roots);
        let exists = solution_exists(&manifest, &index);

        match resolve_default(&manifest, &index) {
            Ok(resolution) => {
                prop_assert!(exists);
                for sourced in manifest.requirements_for(&default_groups()) {
                    let chosen = resolution.version(&sourced.requirement.name);
                    prop_assert!(chosen.is_some_and(|v| sourced.requirement.version_req.matches(v)));
                }
                for (package, resolved) in &resolution.packages {
                    let metadata = index.metadata(package, &resolved.version).unwrap();
                    for dependency in &metadata.dependencies {
                        let chosen = resolution.version(&dependency.name);
                        prop_assert!(chosen.is_some_and(|v| dependency.version_req.matches(v)));
                    }
                }
                prop_assert!(resolution.unsatisfied().is_empty());
                prop_assert!(resolution.dangling().is_empty());
            },
            Err(SprigError::ResolutionFailure(failure)) => {
                prop_assert!(!exists);
                prop_assert!(!failure.packages.is_empty());
            },
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}
