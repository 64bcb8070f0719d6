//! Common utilities for benchmarks

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};

use sprig_config::{parse_manifest, Manifest};
use sprig_core::types::{PackageMetadata, PackageName, Requirement, Version};
use sprig_registry::MemoryIndex;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(50)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

fn package(name: &str, version: &str, dependencies: &[String]) -> PackageMetadata {
    let mut metadata = PackageMetadata::new(
        PackageName::new(name).expect("valid benchmark package name"),
        Version::parse(version).expect("valid benchmark version"),
    );
    metadata.dependencies = dependencies
        .iter()
        .map(|d| Requirement::parse(d).expect("valid benchmark requirement"))
        .collect();
    metadata
}

/// Manifest depending on `dependencies` in its default group
pub fn manifest(dependencies: &[String]) -> Manifest {
    let quoted: Vec<String> = dependencies.iter().map(|d| format!("\"{}\"", d)).collect();
    let content = format!(
        "[project]\nname = \"bench\"\nversion = \"0.1.0\"\nrequires-python = \">=3.9\"\ndependencies = [{}]\n",
        quoted.join(", ")
    );
    parse_manifest(&content).expect("valid benchmark manifest")
}

/// `packages` packages named `pkg-N` with `versions` releases each.
///
/// Every release of `pkg-N` depends on the next two packages with a lower
/// bound, so each package is solvable on its newest version.
pub fn layered_index(packages: usize, versions: usize) -> MemoryIndex {
    let mut index = MemoryIndex::new();
    for i in 0..packages {
        for major in 1..=versions {
            let dependencies: Vec<String> = (i + 1..packages.min(i + 3))
                .map(|dep| format!("pkg-{}>=1.0", dep))
                .collect();
            index.insert(package(
                &format!("pkg-{}", i),
                &format!("{}.0.0", major),
                &dependencies,
            ));
        }
    }
    index
}

/// Index where only the oldest release of `top` is usable.
///
/// `top N.0.0` reaches `leaf>=N.0` through a chain of `depth` packages
/// while `pin` requires `leaf<2`, so every newer `top` fails deep in the
/// search.
pub fn backjump_index(versions: usize, depth: usize) -> MemoryIndex {
    let mut index = MemoryIndex::new();
    for major in 1..=versions {
        let version = format!("{}.0.0", major);
        index.insert(package("top", &version, &[format!("mid-0=={}", version)]));
        for level in 0..depth {
            let next = if level + 1 == depth {
                format!("leaf>={}.0", major)
            } else {
                format!("mid-{}=={}", level + 1, version)
            };
            index.insert(package(&format!("mid-{}", level), &version, &[next]));
        }
        index.insert(package("leaf", &version, &[]));
    }
    index.insert(package("pin", "1.0.0", &["leaf<2".to_string()]));
    index
}

/// Version strings of increasing shape variety
pub fn version_strings(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 4 {
            0 => format!("{}.{}", i % 50, i % 7),
            1 => format!("{}.{}.{}", i % 50, i % 7, i % 13),
            2 => format!("{}.{}.{}rc{}", i % 50, i % 7, i % 13, i % 3 + 1),
            _ => format!("{}", i % 50 + 1),
        })
        .collect()
}

/// Constraint strings mixing every operator
pub fn constraint_strings(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 5 {
            0 => format!(">={}.{}", i % 20, i % 5),
            1 => format!(">={}.0,<{}.0", i % 20, i % 20 + 1),
            2 => format!("^={}.{}", i % 20 + 1, i % 5),
            3 => format!("=={}.{}.{}", i % 20, i % 5, i % 9),
            _ => format!("~={}.{},!={}.{}.1", i % 20, i % 5, i % 20, i % 5),
        })
        .collect()
}
