use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::lifecycle::LIFECYCLE_NAME;

/// Graph of every registered provider and the names it directly depends on
///
/// Edges are recorded at `provide` time. The graph is only walked when the container
/// starts, stops or is validated, so it may be temporarily incomplete while registering.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    map: BTreeMap<String, DependencyGraphEntry>,
}

#[derive(Debug, Clone)]
struct DependencyGraphEntry {
    dependencies: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the edges of `name`
    ///
    /// Returns the replaced edges, if any
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Option<Vec<String>> {
        self.map
            .insert(name.into(), DependencyGraphEntry { dependencies })
            .map(|previous| previous.dependencies)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.map.get(name).map(|entry| entry.dependencies.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Orders all registered providers so that every provider comes after its dependencies
    ///
    /// Names without a registered provider and the reserved lifecycle name are not part of
    /// the order. Fails on the first cycle found.
    pub fn topological_order(&self) -> Result<Vec<String>, DependencyGraphError> {
        let mut states = HashMap::new();
        let mut chain = Vec::new();
        let mut order = Vec::with_capacity(self.map.len());

        for name in self.map.keys() {
            visit(self, name, &mut states, &mut chain, &mut order)?;
        }

        return Ok(order);

        fn visit<'a>(
            graph: &'a DependencyGraph,
            name: &'a str,
            states: &mut HashMap<&'a str, Visit>,
            chain: &mut Vec<&'a str>,
            order: &mut Vec<String>,
        ) -> Result<(), DependencyGraphError> {
            match states.get(name) {
                Some(Visit::Done) => return Ok(()),
                Some(Visit::InProgress) => {
                    return Err(DependencyGraphError::CircularDependency {
                        name: name.to_string(),
                        chain: cycle_of(chain, name),
                    });
                }
                None => {}
            }

            let Some(entry) = graph.map.get(name) else {
                return Ok(());
            };

            states.insert(name, Visit::InProgress);
            chain.push(name);

            for dependency in &entry.dependencies {
                if dependency == LIFECYCLE_NAME {
                    continue;
                }
                visit(graph, dependency, states, chain, order)?;
            }

            chain.pop();
            states.insert(name, Visit::Done);
            order.push(name.to_string());
            Ok(())
        }
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();
        for name in self.map.keys() {
            let mut dependency_chain = Vec::new();
            check_recurse(self, &mut checked, &mut errors, &mut dependency_chain, name);
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse<'a>(
            graph: &'a DependencyGraph,
            checked: &mut HashSet<&'a str>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<&'a str>,
            name: &'a str,
        ) {
            // Circular Dependency Check
            if dependency_chain.contains(&name) {
                errors.push(DependencyGraphError::CircularDependency {
                    name: name.to_string(),
                    chain: cycle_of(dependency_chain, name),
                });
                return;
            }

            // Skip other checks if already checked
            if !checked.insert(name) {
                return;
            }

            let Some(entry) = graph.map.get(name) else {
                return;
            };

            dependency_chain.push(name);

            for dependency in &entry.dependencies {
                if dependency == LIFECYCLE_NAME {
                    continue;
                }

                if !graph.map.contains_key(dependency) {
                    errors.push(DependencyGraphError::MissingDependency {
                        dependency: dependency.clone(),
                        required_by: name.to_string(),
                    });
                    continue;
                }

                check_recurse(graph, checked, errors, dependency_chain, dependency);
            }

            dependency_chain.pop();
        }
    }
}

/// The part of `chain` that loops back to `name`, closed with `name` again
pub(crate) fn cycle_of(chain: &[&str], name: &str) -> Vec<String> {
    let start = chain.iter().position(|entry| *entry == name).unwrap_or(0);
    chain[start..]
        .iter()
        .chain(std::iter::once(&name))
        .map(|entry| entry.to_string())
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency {
        dependency: String,
        required_by: String,
    },
    #[error("Circular dependency detected involving '{name}' through {}", .chain.join(" -> "))]
    CircularDependency { name: String, chain: Vec<String> },
}
impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
