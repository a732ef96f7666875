//! Client configuration types.
//!
//! [`ClientConfig`] is the single source of truth for all runtime settings.
//! It can be constructed from CLI arguments (preferred for production) or from
//! sensible defaults (useful for local development and tests).
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads here) makes a session easy to embed in tests.  `main.rs`
//! populates the struct from CLI args and environment variables.

use std::path::{Path, PathBuf};

use thiserror::Error;
use viewsync_core::{RouteContext, StyleTable};

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse style table: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All runtime configuration for one client connection.
///
/// # Example
///
/// ```rust
/// use viewsync_client::domain::ClientConfig;
///
/// let cfg = ClientConfig::default();
/// assert_eq!(cfg.route.path, "/");
/// assert!(cfg.server_url.starts_with("ws://"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket URL of the view server.
    pub server_url: String,

    /// The route mounted right after connecting.
    pub route: RouteContext,

    /// Optional TOML file mapping `moduleId:className` tokens to class names.
    pub styles_path: Option<PathBuf>,

    /// Component keys the host can render at mount points.
    ///
    /// When empty, mount points are not checked.
    pub components: Vec<String>,
}

impl Default for ClientConfig {
    /// | Field         | Default                      |
    /// |---------------|------------------------------|
    /// | server_url    | `ws://127.0.0.1:8765/view`   |
    /// | route         | `/`                          |
    /// | styles_path   | none                         |
    /// | components    | none (mount points unchecked)|
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8765/view".to_string(),
            route: RouteContext::new("/"),
            styles_path: None,
            components: Vec::new(),
        }
    }
}

/// Loads a style table from a TOML file of the form
///
/// ```toml
/// [card]
/// title = "card_title__a1"
/// ```
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read and
/// [`ConfigError::Parse`] when it is not a table of string tables.
pub fn load_style_table(path: &Path) -> Result<StyleTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("viewsync-styles-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_mounts_root_route() {
        // Arrange / Act
        let cfg = ClientConfig::default();
        // Assert
        assert_eq!(cfg.route, RouteContext::new("/"));
        assert!(cfg.styles_path.is_none());
        assert!(cfg.components.is_empty());
    }

    #[test]
    fn test_load_style_table_parses_nested_tables() {
        // Arrange
        let path = temp_file("[card]\ntitle = \"card_title__a1\"\n");

        // Act
        let table = load_style_table(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // Assert
        assert_eq!(table.resolve("card:title").unwrap(), "card_title__a1");
    }

    #[test]
    fn test_load_style_table_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("viewsync-does-not-exist.toml");
        let err = load_style_table(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_style_table_rejects_non_string_values() {
        let path = temp_file("[card]\ntitle = 3\n");

        let err = load_style_table(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
