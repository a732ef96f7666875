//! Style-token resolution.
//!
//! The server refers to styles by `moduleId:className` tokens.  The host
//! supplies a [`StyleTable`] mapping each module to its resolved class names,
//! for example from a TOML file:
//!
//! ```toml
//! [card]
//! title = "card_title__x81f"
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::binding::MissingRegistryEntry;

/// Separator between module and class inside one token.
pub const STYLE_TOKEN_SEPARATOR: char = ':';

/// `module -> class -> resolved name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleTable {
    modules: HashMap<String, HashMap<String, String>>,
}

impl StyleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one class mapping.
    pub fn insert(
        &mut self,
        module: impl Into<String>,
        class: impl Into<String>,
        resolved: impl Into<String>,
    ) {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(class.into(), resolved.into());
    }

    pub fn with(
        mut self,
        module: impl Into<String>,
        class: impl Into<String>,
        resolved: impl Into<String>,
    ) -> Self {
        self.insert(module, class, resolved);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Resolves one token.
    ///
    /// A token without a separator, or with an empty module or class half,
    /// is returned unchanged.
    pub fn resolve_token<'a>(&'a self, token: &'a str) -> Result<&'a str, MissingRegistryEntry> {
        let Some((module, class)) = token.split_once(STYLE_TOKEN_SEPARATOR) else {
            return Ok(token);
        };
        if module.is_empty() || class.is_empty() {
            return Ok(token);
        }
        let classes = self
            .modules
            .get(module)
            .ok_or_else(|| MissingRegistryEntry::StyleModule {
                module: module.to_string(),
            })?;
        classes
            .get(class)
            .map(String::as_str)
            .ok_or_else(|| MissingRegistryEntry::StyleClass {
                module: module.to_string(),
                class: class.to_string(),
            })
    }

    /// Resolves a whitespace-separated list of tokens, joining the results
    /// with single spaces.
    pub fn resolve(&self, tokens: &str) -> Result<String, MissingRegistryEntry> {
        let resolved = tokens
            .split_whitespace()
            .map(|token| self.resolve_token(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(resolved.join(" "))
    }
}
