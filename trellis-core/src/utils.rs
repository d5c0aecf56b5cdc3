//! Utility functions shared by the bean factory.

/// Dependency bookkeeping for bean creation
pub mod dependency {
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// Tracks the chain of beans currently being created.
    ///
    /// The chain is kept in creation order so that circular dependency
    /// errors can report the full path.
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        creating: Mutex<Vec<String>>,
    }

    impl CreationTracker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_creating(&self, name: &str) -> bool {
            self.creating.lock().iter().any(|n| n == name)
        }

        /// Marks a bean as being created.
        ///
        /// Returns `false` if the bean is already in the chain.
        pub fn start_creating(&self, name: &str) -> bool {
            let mut creating = self.creating.lock();
            if creating.iter().any(|n| n == name) {
                return false;
            }
            creating.push(name.to_string());
            true
        }

        pub fn finish_creating(&self, name: &str) {
            let mut creating = self.creating.lock();
            if let Some(pos) = creating.iter().rposition(|n| n == name) {
                creating.remove(pos);
            }
        }

        /// Snapshot of the current creation chain, outermost first.
        pub fn current_chain(&self) -> Vec<String> {
            self.creating.lock().clone()
        }

        /// Renders `a -> b -> name` for error messages.
        pub fn describe_cycle(&self, name: &str) -> String {
            let mut chain = self.current_chain();
            chain.push(name.to_string());
            chain.join(" -> ")
        }
    }

    /// Problems found by [`validate_dependency_graph`].
    #[derive(Debug, PartialEq, Eq)]
    pub enum DependencyValidationError {
        CircularDependency { cycle: Vec<String> },
        MissingDependency { bean: String, missing: String },
    }

    impl std::fmt::Display for DependencyValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::CircularDependency { cycle } => {
                    write!(f, "Circular depends-on relationship: {}", cycle.join(" -> "))
                }
                Self::MissingDependency { bean, missing } => {
                    write!(f, "Bean '{}' depends on '{}' which is not registered", bean, missing)
                }
            }
        }
    }

    /// Checks explicit depends-on declarations for missing beans and cycles.
    ///
    /// `known` holds names that exist without being part of the graph,
    /// such as manually registered singletons.
    pub fn validate_dependency_graph(
        dependencies: &HashMap<String, Vec<String>>,
        known: &HashSet<String>,
    ) -> Result<(), DependencyValidationError> {
        let mut names: Vec<&String> = dependencies.keys().collect();
        names.sort();

        for bean in &names {
            for dep in &dependencies[*bean] {
                if !dependencies.contains_key(dep) && !known.contains(dep) {
                    return Err(DependencyValidationError::MissingDependency {
                        bean: (*bean).clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for bean in names {
            if !visited.contains(bean.as_str()) {
                if let Some(cycle) = find_cycle(bean, dependencies, &mut visited, &mut stack) {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }

        Ok(())
    }

    fn find_cycle(
        node: &str,
        graph: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        for dep in graph.get(node).into_iter().flatten() {
            if let Some(start) = stack.iter().position(|n| n == dep) {
                let mut cycle = stack[start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = find_cycle(dep, graph, visited, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    mod dependency_tests {
        use super::super::dependency::*;
        use std::collections::{HashMap, HashSet};

        #[test]
        fn test_creation_tracker_chain() {
            let tracker = CreationTracker::new();
            assert!(tracker.start_creating("a"));
            assert!(tracker.start_creating("b"));
            assert!(!tracker.start_creating("a"));
            assert_eq!(tracker.describe_cycle("a"), "a -> b -> a");

            tracker.finish_creating("b");
            assert!(!tracker.is_creating("b"));
            assert!(tracker.is_creating("a"));
        }

        #[test]
        fn test_missing_dependency_respects_known_names() {
            let mut deps = HashMap::new();
            deps.insert("service".to_string(), vec!["environment".to_string()]);

            let err = validate_dependency_graph(&deps, &HashSet::new()).unwrap_err();
            assert_eq!(
                err,
                DependencyValidationError::MissingDependency {
                    bean: "service".into(),
                    missing: "environment".into()
                }
            );

            let known: HashSet<String> = ["environment".to_string()].into_iter().collect();
            assert!(validate_dependency_graph(&deps, &known).is_ok());
        }

        #[test]
        fn test_cycle_is_reported() {
            let mut deps = HashMap::new();
            deps.insert("a".to_string(), vec!["b".to_string()]);
            deps.insert("b".to_string(), vec!["a".to_string()]);

            match validate_dependency_graph(&deps, &HashSet::new()) {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle, vec!["a", "b", "a"]);
                }
                other => panic!("expected cycle, got {:?}", other),
            }
        }
    }
}
