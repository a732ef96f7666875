//! Sorted set of slot paths with prefix queries.
//!
//! The registry asks one question far more often than any other: "does any
//! callback live at or below this subtree?"  Keeping the entries sorted turns
//! that into two binary searches: one for the prefix itself and one for the
//! first entry at or after `prefix.`, which is the only candidate that can
//! lie strictly below it.  Both answers cost O(log n).

use crate::domain::path::PATH_SEPARATOR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSet {
    entries: Vec<String>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `path`; returns `false` when it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        match self.entries.binary_search(&path) {
            Ok(_) => false,
            Err(pos) => {
                self.entries.insert(pos, path);
                true
            }
        }
    }

    /// Removes `path`; returns `false` when it was not present.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.entries.binary_search_by(|e| e.as_str().cmp(path)) {
            Ok(pos) => {
                self.entries.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries
            .binary_search_by(|e| e.as_str().cmp(path))
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Returns `true` when some entry equals `prefix` or starts with
    /// `prefix` followed by the path separator.  The empty prefix is the
    /// root and matches any entry.
    ///
    /// ```rust
    /// use viewsync_core::binding::path_set::PathSet;
    ///
    /// let mut set = PathSet::new();
    /// set.insert("0.1.onClick");
    /// assert!(set.has_any_under("0"));
    /// assert!(set.has_any_under("0.1"));
    /// assert!(!set.has_any_under("0.10"));
    /// assert!(!set.has_any_under("1"));
    /// ```
    pub fn has_any_under(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return !self.entries.is_empty();
        }
        if self.contains(prefix) {
            return true;
        }
        // Entries below `prefix` are contiguous and start at the lower bound
        // of `prefix.`.
        let below = format!("{prefix}{PATH_SEPARATOR}");
        let start = self.entries.partition_point(|e| e.as_str() < below.as_str());
        self.entries
            .get(start)
            .is_some_and(|e| e.starts_with(below.as_str()))
    }
}

impl<S: Into<String>> FromIterator<S> for PathSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut entries: Vec<String> = iter.into_iter().map(Into::into).collect();
        entries.sort();
        entries.dedup();
        Self { entries }
    }
}
