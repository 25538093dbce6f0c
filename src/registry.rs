//! Name-keyed registry of managed checkers.
//!
//! The registry is the state shared across concurrent workflow runs, so all
//! access goes through one lock. `list` preserves insertion order; replacing
//! a checker keeps its slot.

use crate::checkers::{default_checkers, Checker};
use crate::executor::ManagedChecker;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct CheckerRegistry {
    entries: RwLock<Vec<Arc<ManagedChecker>>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the seven built-in checkers.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for checker in default_checkers() {
            registry.register(checker);
        }
        registry
    }

    /// Register a checker under its name, replacing any previous one.
    ///
    /// Registering the instance already held is a no-op that returns the
    /// existing wrapper; a different instance starts from fresh statistics.
    pub fn register(&self, checker: Arc<dyn Checker>) -> Arc<ManagedChecker> {
        let name = checker.name().to_string();

        let mut entries = self.entries.write();
        if let Some(existing) = entries
            .iter()
            .find(|e| e.name() == name && same_instance(e.checker(), &checker))
        {
            debug!("Checker {} already registered", name);
            return Arc::clone(existing);
        }

        let managed = Arc::new(ManagedChecker::new(checker));
        match entries.iter_mut().find(|e| e.name() == name) {
            Some(slot) => {
                warn!("Replacing registered checker: {}", name);
                *slot = Arc::clone(&managed);
            }
            None => {
                info!("Registered checker: {}", name);
                entries.push(Arc::clone(&managed));
            }
        }

        managed
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagedChecker>> {
        self.entries.read().iter().find(|e| e.name() == name).cloned()
    }

    /// Registered names in insertion order.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Snapshot of all registered checkers.
    pub fn all(&self) -> Vec<Arc<ManagedChecker>> {
        self.entries.read().clone()
    }

    /// Returns `true` if a checker was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.name() != name);
        let removed = entries.len() < before;
        if removed {
            info!("Unregistered checker: {}", name);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Compares data pointers only; vtable addresses are not unique per type.
fn same_instance(a: &Arc<dyn Checker>, b: &Arc<dyn Checker>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::{AreaChecker, WallChecker, AREA, WALL};
    use serde_json::json;

    #[test]
    fn test_with_defaults_lists_in_order() {
        let registry = CheckerRegistry::with_defaults();
        let names = registry.list();
        assert_eq!(names.len(), 7);
        assert_eq!(names[0], WALL);
        assert_eq!(names[6], "compliance_formatter_agent");
    }

    #[tokio::test]
    async fn test_register_is_an_upsert() {
        let registry = CheckerRegistry::new();
        let first = registry.register(Arc::new(WallChecker::new()));
        registry.register(Arc::new(AreaChecker::new()));
        first.run(&json!({}), "s1", None).await;

        registry.register(Arc::new(WallChecker::new()));
        assert_eq!(registry.list(), vec![WALL.to_string(), AREA.to_string()]);
        assert_eq!(registry.get(WALL).unwrap().stats().run_count, 0);
    }

    #[tokio::test]
    async fn test_reregistering_same_instance_keeps_stats() {
        let registry = CheckerRegistry::new();
        let wall: Arc<dyn Checker> = Arc::new(WallChecker::new());
        let first = registry.register(Arc::clone(&wall));
        first.run(&json!({}), "s1", None).await;

        let second = registry.register(Arc::clone(&wall));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        let stats = registry.get(WALL).unwrap().stats();
        assert_eq!(stats.run_count, 1);
        assert_eq!(stats.success_count, 1);
        assert!(stats.last_run.is_some());
        assert!(!registry.get(WALL).unwrap().execution_log(Some("s1")).is_empty());
    }

    #[test]
    fn test_unregister_and_clear() {
        let registry = CheckerRegistry::with_defaults();
        assert!(registry.unregister(AREA));
        assert!(!registry.unregister(AREA));
        assert!(registry.get(AREA).is_none());
        assert_eq!(registry.len(), 6);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(CheckerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        registry.register(Arc::new(WallChecker::new()));
                    } else {
                        registry.register(Arc::new(AreaChecker::new()));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 2);
    }
}
