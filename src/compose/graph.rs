//! Service dependency ordering
//!
//! Startup order is computed with Kahn's algorithm. Whenever several services
//! are ready at once the one with the smallest name goes first, so the same
//! set of services always yields the same order no matter how the input map
//! iterates. Start/stop sequencing and rollback rely on that.

use super::model::ServiceSpec;
use crate::error::{ComposeError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Services and the services each one waits on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build a graph from `(service, dependencies)` pairs
    ///
    /// Fails with [`ComposeError::UndefinedDependency`] if a dependency is not
    /// itself one of the services.
    pub fn new<I, N, D, S>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, deps) in nodes {
            dependencies
                .entry(name.into())
                .or_default()
                .extend(deps.into_iter().map(Into::into));
        }

        for (name, deps) in &dependencies {
            if let Some(missing) = deps.iter().find(|dep| !dependencies.contains_key(*dep)) {
                return Err(ComposeError::UndefinedDependency {
                    service: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        Ok(Self { dependencies })
    }

    /// Build the graph of a normalized service map
    pub fn from_services<'a, I>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a ServiceSpec)>,
    {
        Self::new(services.into_iter().map(|(name, service)| {
            let deps: Vec<String> = service.dependencies().map(str::to_string).collect();
            (name.clone(), deps)
        }))
    }

    /// Number of services in the graph
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Every service once, each after all of its dependencies
    pub fn startup_order(&self) -> Result<Vec<String>> {
        // Remaining number of unplaced dependencies per service
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
        // Reverse edges: dependency -> services waiting on it
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (name, deps) in &self.dependencies {
            pending.insert(name, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(name);
            }
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.dependencies.len());
        while let Some(current) = ready.pop_first() {
            order.push(current.to_string());

            for &dependent in dependents.get(current).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < self.dependencies.len() {
            let services: Vec<String> = pending
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(ComposeError::Cycle { services });
        }

        tracing::debug!(order = ?order, "Resolved service startup order");
        Ok(order)
    }

    /// Reverse of [`Self::startup_order`], for stopping or rolling back
    pub fn shutdown_order(&self) -> Result<Vec<String>> {
        let mut order = self.startup_order()?;
        order.reverse();
        Ok(order)
    }
}

/// Startup order of a normalized service map
pub fn resolve_order(services: &BTreeMap<String, ServiceSpec>) -> Result<Vec<String>> {
    DependencyGraph::from_services(services)?.startup_order()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn graph(nodes: &[(&str, &[&str])]) -> Result<DependencyGraph> {
        DependencyGraph::new(nodes.iter().map(|(name, deps)| (*name, deps.iter().copied())))
    }

    fn order(nodes: &[(&str, &[&str])]) -> Result<Vec<String>> {
        graph(nodes)?.startup_order()
    }

    #[test]
    fn test_no_dependencies_sorted_by_name() {
        let result = order(&[("c", &[]), ("a", &[]), ("b", &[])]).unwrap();
        assert_eq!(result, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_linear_chain() {
        let result = order(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]).unwrap();
        assert_eq!(result, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_diamond() {
        let result = order(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
            ("d", &[]),
        ])
        .unwrap();
        assert_eq!(result, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_newly_ready_service_sorted_among_queued() {
        // Once `a` is placed, `b` becomes ready and must go before `z`, which
        // has been ready from the start.
        let result = order(&[("a", &[]), ("b", &["a"]), ("z", &[])]).unwrap();
        assert_eq!(result, vec!["a", "b", "z"]);
    }

    #[test]
    fn test_every_dependency_precedes_dependent() {
        let nodes: &[(&str, &[&str])] = &[
            ("web", &["api", "cache"]),
            ("api", &["db", "queue"]),
            ("worker", &["queue", "db"]),
            ("cache", &[]),
            ("db", &[]),
            ("queue", &[]),
            ("proxy", &["web"]),
        ];
        let result = order(nodes).unwrap();
        assert_eq!(result.len(), nodes.len());

        let position = |name: &str| result.iter().position(|s| s == name).unwrap();
        for &(name, deps) in nodes {
            for &dep in deps {
                assert!(position(dep) < position(name), "{dep} should start before {name}");
            }
        }
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let forward: &[(&str, &[&str])] = &[
            ("web", &["api"]),
            ("api", &["db", "cache"]),
            ("db", &[]),
            ("cache", &[]),
            ("admin", &["db"]),
        ];
        let mut reversed = forward.to_vec();
        reversed.reverse();

        let hashed: HashMap<&str, Vec<&str>> =
            forward.iter().map(|(n, d)| (*n, d.to_vec())).collect();
        let from_hash = DependencyGraph::new(hashed).unwrap().startup_order().unwrap();

        let expected = order(forward).unwrap();
        assert_eq!(order(&reversed).unwrap(), expected);
        assert_eq!(from_hash, expected);
        assert_eq!(expected, vec!["cache", "db", "admin", "api", "web"]);
    }

    #[test]
    fn test_mutual_dependency_is_cycle() {
        let err = order(&[("a", &["b"]), ("b", &["a"])]).unwrap_err();
        match err {
            ComposeError::Cycle { services } => assert_eq!(services, vec!["a", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = order(&[("a", &["a"]), ("b", &[])]).unwrap_err();
        match err {
            ComposeError::Cycle { services } => assert_eq!(services, vec!["a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_reports_blocked_services_sorted() {
        // `d` is not part of the cycle but can never become ready
        let err = order(&[
            ("c", &["b"]),
            ("b", &["c"]),
            ("d", &["b"]),
            ("a", &[]),
        ])
        .unwrap_err();
        match err {
            ComposeError::Cycle { services } => assert_eq!(services, vec!["b", "c", "d"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_undefined_dependency() {
        let err = graph(&[("web", &["api"])]).unwrap_err();
        match err {
            ComposeError::UndefinedDependency { service, dependency } => {
                assert_eq!(service, "web");
                assert_eq!(dependency, "api");
            }
            other => panic!("expected undefined dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_shutdown_order_is_reverse() {
        let g = graph(&[("web", &["db"]), ("db", &[]), ("cache", &[])]).unwrap();
        let mut startup = g.startup_order().unwrap();
        startup.reverse();
        assert_eq!(g.shutdown_order().unwrap(), startup);
    }

    #[test]
    fn test_resolve_order_from_services() {
        let mut services = BTreeMap::new();
        let mut web = ServiceSpec::default();
        web.depends_on.insert("db".to_string(), Default::default());
        services.insert("web".to_string(), web);
        services.insert("db".to_string(), ServiceSpec::default());

        assert_eq!(resolve_order(&services).unwrap(), vec!["db", "web"]);
    }

    #[test]
    fn test_empty_graph() {
        let g = graph(&[]).unwrap();
        assert!(g.is_empty());
        assert!(g.startup_order().unwrap().is_empty());
    }
}
