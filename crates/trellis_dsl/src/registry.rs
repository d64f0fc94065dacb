//! Per-kind name registry.

use crate::node::Node;
use indexmap::IndexMap;
use std::cell::RefCell;

/// Instances of one kind, keyed by name
///
/// Registering a name that is already present replaces the stored instance
/// and keeps the original position. There is no removal.
#[derive(Debug, Default)]
pub struct Registry {
    instances: RefCell<IndexMap<String, Node>>,
}

impl Registry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an instance by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Node> {
        self.instances.borrow().get(name).cloned()
    }

    /// Register an instance, returning the one it replaced
    pub fn put(&self, name: impl Into<String>, node: Node) -> Option<Node> {
        self.instances.borrow_mut().insert(name.into(), node)
    }

    /// Check if a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.borrow().contains_key(name)
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.instances.borrow().keys().cloned().collect()
    }

    /// Copy of the name to instance mapping
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Node> {
        self.instances.borrow().clone()
    }

    /// Number of registered names
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.borrow().len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.borrow().is_empty()
    }

    /// Drop every instance. Used when the owning schema goes away.
    pub(crate) fn clear(&self) {
        let drained: Vec<Node> = self.instances.borrow_mut().drain(..).map(|(_, n)| n).collect();
        drop(drained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::schema::Schema;

    #[test]
    fn test_registry_new() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("anything").is_none());
    }

    #[test]
    fn test_registry_put_get() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        let pacific = ocean.create(attrs! { "name" => "Pacific" }).unwrap();

        let registry = Registry::new();
        assert!(registry.put("Pacific", pacific.clone()).is_none());
        assert!(registry.contains("Pacific"));
        assert_eq!(registry.get("Pacific"), Some(pacific));
    }

    #[test]
    fn test_registry_overwrite_keeps_position() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        let first = ocean.create(attrs! { "name" => "a" }).unwrap();
        let second = ocean.create(attrs! { "name" => "b" }).unwrap();
        let third = ocean.create(attrs! { "name" => "c" }).unwrap();

        let registry = Registry::new();
        registry.put("x", first.clone());
        registry.put("y", second);
        let replaced = registry.put("x", third.clone());

        assert_eq!(replaced, Some(first));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(registry.get("x"), Some(third));
    }

    #[test]
    fn test_registry_clear() {
        let schema = Schema::new();
        let ocean = schema.define_kind("Ocean").unwrap();
        let registry = Registry::new();
        registry.put("Arctic", ocean.create(attrs! {}).unwrap());
        registry.clear();
        assert!(registry.is_empty());
    }
}
