//! The binding registry.
//!
//! # What the registry tracks (for beginners)
//!
//! Wire props are plain JSON, so the server separately tells the client which
//! prop *slots* need special treatment.  A slot is written as
//! `<element path>.<prop name>` (just `<prop name>` at the root):
//!
//! | Set            | Meaning of a slot in the set                                 |
//! |----------------|--------------------------------------------------------------|
//! | `callbacks`    | the prop holds the `"$cb"` placeholder for a callable        |
//! | `render_props` | the prop holds a wire node to hydrate as a sub-tree          |
//! | `css_refs`     | the prop holds `moduleId:className` tokens to resolve        |
//!
//! The registry also caches the [`BoundCallback`] created for each callback
//! slot, so that hydrating the same slot twice yields the same callable.  The
//! cache never outlives its slot: removing a callback path prunes the cached
//! callable immediately.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::components::ComponentLookup;
use crate::binding::path_set::PathSet;
use crate::binding::style::StyleTable;
use crate::binding::MissingRegistryEntry;
use crate::domain::callback::{BoundCallback, CallbackSink};
use crate::domain::path::Path;

/// Which of the three path sets an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Callbacks,
    RenderProps,
    CssRefs,
}

/// Initial registry contents, taken from a `tree_init` snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSeed {
    #[serde(default)]
    pub callbacks: Vec<String>,
    #[serde(default)]
    pub render_props: Vec<String>,
    #[serde(default)]
    pub css_refs: Vec<String>,
}

/// Path sets, callable cache, and lookup tables for one mounted view.
pub struct BindingRegistry {
    callbacks: PathSet,
    render_props: PathSet,
    css_refs: PathSet,
    cache: HashMap<String, BoundCallback>,
    sink: Arc<dyn CallbackSink>,
    styles: StyleTable,
    components: Option<Arc<dyn ComponentLookup>>,
}

impl BindingRegistry {
    /// Creates an empty registry whose callables forward to `sink`.
    pub fn new(sink: Arc<dyn CallbackSink>) -> Self {
        Self {
            callbacks: PathSet::new(),
            render_props: PathSet::new(),
            css_refs: PathSet::new(),
            cache: HashMap::new(),
            sink,
            styles: StyleTable::new(),
            components: None,
        }
    }

    pub fn with_styles(mut self, styles: StyleTable) -> Self {
        self.styles = styles;
        self
    }

    /// Enables mount-point checking against `components`.
    pub fn with_components(mut self, components: Arc<dyn ComponentLookup>) -> Self {
        self.components = Some(components);
        self
    }

    /// Replaces all three path sets and drops every cached callable.
    pub fn seed(&mut self, seed: BindingSeed) {
        self.callbacks = seed.callbacks.into_iter().collect();
        self.render_props = seed.render_props.into_iter().collect();
        self.css_refs = seed.css_refs.into_iter().collect();
        self.cache.clear();
        debug!(
            callbacks = self.callbacks.len(),
            render_props = self.render_props.len(),
            css_refs = self.css_refs.len(),
            "binding registry seeded"
        );
    }

    // ── Callables ─────────────────────────────────────────────────────────────

    /// Returns the callable for slot `key` on the element at `path`.
    ///
    /// The first call for a slot creates and caches the callable; later calls
    /// return the same instance.  Returns `None` when the slot is not a
    /// callback path.
    pub fn resolve(&mut self, path: &Path, key: &str) -> Option<BoundCallback> {
        let slot = path.slot(key);
        if !self.callbacks.contains(&slot) {
            return None;
        }
        let sink = &self.sink;
        let callback = self
            .cache
            .entry(slot)
            .or_insert_with(|| BoundCallback::new(path.clone(), key, Arc::clone(sink)));
        Some(callback.clone())
    }

    /// Creates a fresh callable for the slot, replacing any cached one.
    ///
    /// Used after structural moves, where the element now lives at `path` and
    /// the cached callable (if any) forwards a stale path.
    pub(crate) fn rebind(&mut self, path: &Path, key: &str) -> Option<BoundCallback> {
        let slot = path.slot(key);
        if !self.callbacks.contains(&slot) {
            return None;
        }
        let callback = BoundCallback::new(path.clone(), key, Arc::clone(&self.sink));
        self.cache.insert(slot, callback.clone());
        Some(callback)
    }

    /// Number of cached callables.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` when a callable for `slot` is cached.
    pub fn is_cached(&self, slot: &str) -> bool {
        self.cache.contains_key(slot)
    }

    // ── Predicates ────────────────────────────────────────────────────────────

    pub fn is_callback_path(&self, slot: &str) -> bool {
        self.callbacks.contains(slot)
    }

    pub fn is_render_prop_path(&self, slot: &str) -> bool {
        self.render_props.contains(slot)
    }

    pub fn is_style_token_path(&self, slot: &str) -> bool {
        self.css_refs.contains(slot)
    }

    /// Returns `true` when any callback path equals `prefix` or lies below it.
    pub fn has_any_under(&self, prefix: &str) -> bool {
        self.callbacks.has_any_under(prefix)
    }

    pub fn paths(&self, kind: BindingKind) -> &PathSet {
        match kind {
            BindingKind::Callbacks => &self.callbacks,
            BindingKind::RenderProps => &self.render_props,
            BindingKind::CssRefs => &self.css_refs,
        }
    }

    // ── Deltas ────────────────────────────────────────────────────────────────

    /// Applies one registry-delta instruction.
    ///
    /// Entries are relative to `base`; removals run before additions.
    /// Removing a callback path also drops its cached callable.
    pub fn apply_delta(&mut self, kind: BindingKind, base: &Path, add: &[String], remove: &[String]) {
        for entry in remove {
            let slot = absolute_slot(base, entry);
            let removed = match kind {
                BindingKind::Callbacks => {
                    self.cache.remove(&slot);
                    self.callbacks.remove(&slot)
                }
                BindingKind::RenderProps => self.render_props.remove(&slot),
                BindingKind::CssRefs => self.css_refs.remove(&slot),
            };
            if !removed {
                debug!(?kind, %slot, "removed binding path was not registered");
            }
        }
        for entry in add {
            let slot = absolute_slot(base, entry);
            match kind {
                BindingKind::Callbacks => self.callbacks.insert(slot),
                BindingKind::RenderProps => self.render_props.insert(slot),
                BindingKind::CssRefs => self.css_refs.insert(slot),
            };
        }
    }

    // ── Lookup tables ─────────────────────────────────────────────────────────

    /// Resolves whitespace-separated `moduleId:className` tokens.
    pub fn resolve_style(&self, tokens: &str) -> Result<String, MissingRegistryEntry> {
        self.styles.resolve(tokens)
    }

    /// Fails when a component lookup is configured and does not know `key`.
    pub fn check_component(&self, key: &str) -> Result<(), MissingRegistryEntry> {
        match &self.components {
            Some(lookup) if !lookup.has_component(key) => Err(MissingRegistryEntry::Component {
                key: key.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("callbacks", &self.callbacks)
            .field("render_props", &self.render_props)
            .field("css_refs", &self.css_refs)
            .field("cached", &self.cache.len())
            .field("components", &self.components.is_some())
            .finish()
    }
}

fn absolute_slot(base: &Path, entry: &str) -> String {
    if entry.is_empty() {
        base.to_string()
    } else {
        base.slot(entry)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::components::MockComponentLookup;
    use crate::domain::callback::MockCallbackSink;

    fn registry(callbacks: &[&str]) -> BindingRegistry {
        let mut reg = BindingRegistry::new(Arc::new(MockCallbackSink::new()));
        reg.seed(BindingSeed {
            callbacks: callbacks.iter().map(|s| s.to_string()).collect(),
            ..BindingSeed::default()
        });
        reg
    }

    #[test]
    fn test_resolve_caches_callable_per_slot() {
        // Arrange
        let mut reg = registry(&["0.onClick"]);
        let path: Path = "0".parse().unwrap();

        // Act
        let first = reg.resolve(&path, "onClick").unwrap();
        let second = reg.resolve(&path, "onClick").unwrap();

        // Assert
        assert!(first.ptr_eq(&second));
        assert_eq!(reg.cached_len(), 1);
    }

    #[test]
    fn test_resolve_outside_callback_set_returns_none() {
        let mut reg = registry(&["0.onClick"]);
        assert!(reg.resolve(&Path::root(), "onClick").is_none());
        assert_eq!(reg.cached_len(), 0);
    }

    #[test]
    fn test_rebind_replaces_cached_callable() {
        let mut reg = registry(&["1.onClick"]);
        let path: Path = "1".parse().unwrap();
        let old = reg.resolve(&path, "onClick").unwrap();

        let fresh = reg.rebind(&path, "onClick").unwrap();

        assert!(!old.ptr_eq(&fresh));
        assert!(reg.resolve(&path, "onClick").unwrap().ptr_eq(&fresh));
    }

    #[test]
    fn test_removing_callback_path_prunes_cache() {
        // Arrange
        let mut reg = registry(&["0.onClick"]);
        reg.resolve(&"0".parse().unwrap(), "onClick");
        assert!(reg.is_cached("0.onClick"));

        // Act
        reg.apply_delta(BindingKind::Callbacks, &Path::root(), &[], &["0.onClick".into()]);

        // Assert
        assert!(!reg.is_cached("0.onClick"));
        assert!(!reg.is_callback_path("0.onClick"));
    }

    #[test]
    fn test_delta_entries_are_relative_to_base() {
        let mut reg = registry(&[]);
        let base: Path = "2".parse().unwrap();

        reg.apply_delta(BindingKind::RenderProps, &base, &["header".into()], &[]);
        reg.apply_delta(BindingKind::CssRefs, &base, &["0.className".into()], &[]);

        assert!(reg.is_render_prop_path("2.header"));
        assert!(reg.is_style_token_path("2.0.className"));
    }

    #[test]
    fn test_seed_clears_cache() {
        let mut reg = registry(&["onClick"]);
        reg.resolve(&Path::root(), "onClick");

        reg.seed(BindingSeed::default());

        assert_eq!(reg.cached_len(), 0);
        assert!(!reg.has_any_under(""));
    }

    #[test]
    fn test_check_component_without_lookup_accepts_everything() {
        let reg = registry(&[]);
        assert!(reg.check_component("Anything").is_ok());
    }

    #[test]
    fn test_check_component_consults_lookup() {
        let mut lookup = MockComponentLookup::new();
        lookup.expect_has_component().returning(|key| key == "Chart");
        let reg = registry(&[]).with_components(Arc::new(lookup));

        assert!(reg.check_component("Chart").is_ok());
        assert_eq!(
            reg.check_component("Map").unwrap_err(),
            MissingRegistryEntry::Component { key: "Map".into() }
        );
    }

    #[test]
    fn test_resolve_style_uses_configured_table() {
        let reg = registry(&[]).with_styles(StyleTable::new().with("m", "c", "m_c__1"));
        assert_eq!(reg.resolve_style("m:c").unwrap(), "m_c__1");
    }
}
