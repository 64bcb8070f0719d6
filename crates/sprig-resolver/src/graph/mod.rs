//! Dependency graph of a resolution using petgraph
//!
//! Nodes are resolved packages and edges run from a dependent to its
//! dependency. Cycles are legal here (Python packages do depend on each
//! other); installation order treats each strongly connected component as
//! one unit and orders its members by name.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::collections::{BTreeMap, BTreeSet};

use sprig_config::Manifest;
use sprig_core::types::PackageName;

use crate::resolution::Resolution;

/// Graph view over a [`Resolution`]
#[derive(Debug, Clone, Default)]
pub struct ResolutionGraph {
    graph: DiGraph<PackageName, ()>,
    /// Map from package name to NodeIndex for fast lookups
    node_map: BTreeMap<PackageName, NodeIndex>,
}

impl ResolutionGraph {
    /// Build the graph; dependencies missing from the resolution are skipped
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let mut graph = DiGraph::with_capacity(resolution.len(), resolution.len());
        let mut node_map = BTreeMap::new();

        for name in resolution.packages.keys() {
            node_map.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (name, package) in &resolution.packages {
            for dependency in &package.dependencies {
                if let (Some(&from), Some(&to)) = (node_map.get(name), node_map.get(dependency)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self { graph, node_map }
    }

    /// Get number of packages in the graph
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get number of dependency edges in the graph
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Packages that directly depend on `name`, sorted
    pub fn dependents(&self, name: &PackageName) -> Vec<PackageName> {
        let Some(&index) = self.node_map.get(name) else {
            return Vec::new();
        };
        let mut dependents: Vec<_> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .map(|node| self.graph[node].clone())
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// Every package reachable from `roots`, roots included
    pub fn reachable_from<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a PackageName>,
    ) -> BTreeSet<PackageName> {
        let mut reached = BTreeSet::new();
        let mut dfs = Dfs::empty(&self.graph);
        for root in roots {
            let Some(&start) = self.node_map.get(root) else {
                continue;
            };
            dfs.move_to(start);
            while let Some(node) = dfs.next(&self.graph) {
                reached.insert(self.graph[node].clone());
            }
        }
        reached
    }

    /// Record on each package which requested groups reach it
    pub fn tag_groups(&self, manifest: &Manifest, resolution: &mut Resolution) {
        for group in resolution.groups.clone() {
            let roots: Vec<PackageName> = manifest
                .requirements_for(std::slice::from_ref(&group))
                .into_iter()
                .map(|sourced| sourced.requirement.name)
                .collect();
            for name in self.reachable_from(&roots) {
                if let Some(package) = resolution.packages.get_mut(&name) {
                    package.groups.insert(group.clone());
                }
            }
        }
    }

    /// Groups of mutually dependent packages, each sorted, in name order
    pub fn cycles(&self) -> Vec<Vec<PackageName>> {
        let mut cycles: Vec<Vec<PackageName>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0])
            })
            .map(|scc| self.sorted_names(&scc))
            .collect();
        cycles.sort();
        cycles
    }

    /// Dependencies before dependents.
    ///
    /// Each cycle is emitted as a block sorted by name; among packages whose
    /// dependencies are all emitted, the smallest name goes first.
    pub fn install_order(&self) -> Vec<PackageName> {
        let components = tarjan_scc(&self.graph);
        let mut component_of = vec![0; self.graph.node_count()];
        for (id, scc) in components.iter().enumerate() {
            for node in scc {
                component_of[node.index()] = id;
            }
        }

        let members: Vec<Vec<PackageName>> = components
            .iter()
            .map(|scc| self.sorted_names(scc))
            .collect();
        let mut waiting_on = vec![BTreeSet::new(); components.len()];
        let mut dependents = vec![BTreeSet::new(); components.len()];
        for edge in self.graph.edge_references() {
            let from = component_of[edge.source().index()];
            let to = component_of[edge.target().index()];
            if from != to {
                waiting_on[from].insert(to);
                dependents[to].insert(from);
            }
        }

        let mut ready: BTreeSet<(&PackageName, usize)> = members
            .iter()
            .enumerate()
            .filter(|(id, _)| waiting_on[*id].is_empty())
            .filter_map(|(id, names)| names.first().map(|first| (first, id)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((_, id)) = ready.pop_first() {
            order.extend(members[id].iter().cloned());
            for &dependent in &dependents[id] {
                waiting_on[dependent].remove(&id);
                if waiting_on[dependent].is_empty() {
                    if let Some(first) = members[dependent].first() {
                        ready.insert((first, dependent));
                    }
                }
            }
        }
        order
    }

    fn sorted_names(&self, nodes: &[NodeIndex]) -> Vec<PackageName> {
        let mut names: Vec<_> = nodes.iter().map(|node| self.graph[*node].clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::ResolvedPackage;
    use sprig_config::parse_manifest;
    use sprig_core::types::{GroupName, Version};

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    fn resolution(edges: &[(&str, &[&str])]) -> Resolution {
        let mut resolution = Resolution {
            groups: vec![GroupName::default_group()],
            ..Default::default()
        };
        for (package, dependencies) in edges {
            resolution.packages.insert(
                name(package),
                ResolvedPackage {
                    version: Version::new(1, 0, 0),
                    dependencies: dependencies.iter().map(|d| name(d)).collect(),
                    constraints: BTreeSet::new(),
                    groups: BTreeSet::new(),
                },
            );
        }
        resolution
    }

    fn names(list: &[&str]) -> Vec<PackageName> {
        list.iter().map(|n| name(n)).collect()
    }

    #[test]
    fn test_graph_creation() {
        let graph = ResolutionGraph::from_resolution(&resolution(&[
            ("requests", &["urllib3", "idna", "missing"]),
            ("urllib3", &[]),
            ("idna", &[]),
        ]));
        assert_eq!(graph.package_count(), 3);
        assert_eq!(graph.dependency_count(), 2);
        assert_eq!(graph.dependents(&name("idna")), names(&["requests"]));
    }

    #[test]
    fn test_install_order_puts_dependencies_first() {
        let graph = ResolutionGraph::from_resolution(&resolution(&[
            ("app-tools", &["requests", "click"]),
            ("requests", &["urllib3", "idna"]),
            ("urllib3", &[]),
            ("idna", &[]),
            ("click", &[]),
        ]));
        assert_eq!(
            graph.install_order(),
            names(&["click", "idna", "urllib3", "requests", "app-tools"])
        );
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_cycles_are_broken_by_name() {
        let graph = ResolutionGraph::from_resolution(&resolution(&[
            ("sphinx", &["sphinxcontrib-applehelp", "docutils"]),
            ("sphinxcontrib-applehelp", &["sphinx"]),
            ("docutils", &[]),
        ]));
        assert_eq!(
            graph.cycles(),
            vec![names(&["sphinx", "sphinxcontrib-applehelp"])]
        );
        assert_eq!(
            graph.install_order(),
            names(&["docutils", "sphinx", "sphinxcontrib-applehelp"])
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = ResolutionGraph::from_resolution(&resolution(&[("ouroboros", &["ouroboros"])]));
        assert_eq!(graph.cycles(), vec![names(&["ouroboros"])]);
        assert_eq!(graph.install_order(), names(&["ouroboros"]));
    }

    #[test]
    fn test_tag_groups_follows_includes() {
        let manifest = parse_manifest(
            r#"
[project]
name = "demo"
version = "0.1.0"
dependencies = ["requests"]

[dependency-groups]
lint = ["ruff"]
dev = ["pytest", { include-group = "lint" }]
"#,
        )
        .unwrap();

        let mut resolution = resolution(&[
            ("requests", &["urllib3"]),
            ("urllib3", &[]),
            ("pytest", &["pluggy"]),
            ("pluggy", &[]),
            ("ruff", &[]),
        ]);
        resolution.groups = manifest.all_groups();

        ResolutionGraph::from_resolution(&resolution).tag_groups(&manifest, &mut resolution);

        let groups_of = |n: &str| -> Vec<String> {
            resolution.packages[&name(n)]
                .groups
                .iter()
                .map(|g| g.to_string())
                .collect()
        };
        assert_eq!(groups_of("urllib3"), vec!["default"]);
        assert_eq!(groups_of("pluggy"), vec!["dev"]);
        assert_eq!(groups_of("ruff"), vec!["dev", "lint"]);
    }
}
