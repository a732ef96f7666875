//! Registry of externally implemented components addressed by mount points.
//!
//! The patch engine only needs to know *whether* a key is registered; the
//! host keeps whatever it renders a mount point with behind the generic
//! parameter of [`ComponentRegistry`].

use std::collections::HashMap;

use crate::binding::MissingRegistryEntry;

/// Narrow lookup contract consulted when a mount point is hydrated.
#[cfg_attr(test, mockall::automock)]
pub trait ComponentLookup: Send + Sync {
    fn has_component(&self, key: &str) -> bool;
}

/// Map-backed component registry.
#[derive(Debug, Clone)]
pub struct ComponentRegistry<C> {
    components: HashMap<String, C>,
}

impl<C> Default for ComponentRegistry<C> {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
        }
    }
}

impl<C> ComponentRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `component` under `key`, returning the previous entry.
    pub fn register(&mut self, key: impl Into<String>, component: C) -> Option<C> {
        self.components.insert(key.into(), component)
    }

    pub fn lookup(&self, key: &str) -> Result<&C, MissingRegistryEntry> {
        self.components
            .get(key)
            .ok_or_else(|| MissingRegistryEntry::Component {
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

impl<C: Send + Sync> ComponentLookup for ComponentRegistry<C> {
    fn has_component(&self, key: &str) -> bool {
        self.components.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_registered_component() {
        let mut reg = ComponentRegistry::new();
        reg.register("Chart", 7_u32);

        assert_eq!(reg.lookup("Chart"), Ok(&7));
        assert!(reg.has_component("Chart"));
    }

    #[test]
    fn test_lookup_of_unknown_key_fails() {
        let reg: ComponentRegistry<()> = ComponentRegistry::new();
        assert_eq!(
            reg.lookup("Map").unwrap_err(),
            MissingRegistryEntry::Component { key: "Map".into() }
        );
        assert!(!reg.has_component("Map"));
    }

    #[test]
    fn test_register_replaces_previous_entry() {
        let mut reg = ComponentRegistry::new();
        assert_eq!(reg.register("A", "first"), None);
        assert_eq!(reg.register("A", "second"), Some("first"));
        assert_eq!(reg.len(), 1);
    }
}
