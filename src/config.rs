//! TOML configuration for the graph store.
//!
//! ```toml
//! [db]
//! path = "./data/docgraph.sqlite"
//! wal = true
//! busy_timeout_ms = 5000
//!
//! [ids]
//! short_id_len = 8
//!
//! [search]
//! default_limit = 20
//! ```
//!
//! Only `db.path` is required. A path of `:memory:` selects a private
//! in-memory database.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Path value that selects an in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_wal")]
    pub wal: bool,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_wal() -> bool {
    true
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdConfig {
    /// Number of hex characters in a node's `short_id`.
    #[serde(default = "default_short_id_len")]
    pub short_id_len: usize,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            short_id_len: default_short_id_len(),
        }
    }
}

fn default_short_id_len() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> i64 {
    20
}

impl StoreConfig {
    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::at_path(MEMORY_PATH)
    }

    /// Configuration for a database file with all other settings defaulted.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: path.into(),
                wal: default_wal(),
                busy_timeout_ms: default_busy_timeout_ms(),
            },
            ids: IdConfig::default(),
            search: SearchConfig::default(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.db.path.as_os_str() == MEMORY_PATH
    }

    fn validate(&self) -> Result<()> {
        if self.db.path.as_os_str().is_empty() {
            anyhow::bail!("db.path must not be empty");
        }
        if self.db.busy_timeout_ms == 0 {
            anyhow::bail!("db.busy_timeout_ms must be > 0");
        }
        if !(6..=32).contains(&self.ids.short_id_len) {
            anyhow::bail!("ids.short_id_len must be in [6, 32]");
        }
        if self.search.default_limit < 1 {
            anyhow::bail!("search.default_limit must be >= 1");
        }
        Ok(())
    }
}

/// Parse and validate a configuration from TOML text.
pub fn parse_config(content: &str) -> Result<StoreConfig> {
    let config: StoreConfig =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<StoreConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"graph.sqlite\"\n").unwrap();
        assert_eq!(config.db.path, PathBuf::from("graph.sqlite"));
        assert!(config.db.wal);
        assert_eq!(config.db.busy_timeout_ms, 5000);
        assert_eq!(config.ids.short_id_len, 8);
        assert_eq!(config.search.default_limit, 20);
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[db]
path = ":memory:"
wal = false
busy_timeout_ms = 250

[ids]
short_id_len = 12

[search]
default_limit = 5
"#,
        )
        .unwrap();
        assert!(config.is_in_memory());
        assert!(!config.db.wal);
        assert_eq!(config.ids.short_id_len, 12);
        assert_eq!(config.search.default_limit, 5);
    }

    #[test]
    fn test_rejects_out_of_range_short_id_len() {
        let err = parse_config("[db]\npath = \"x\"\n[ids]\nshort_id_len = 40\n").unwrap_err();
        assert!(err.to_string().contains("short_id_len"));
    }

    #[test]
    fn test_rejects_zero_limit() {
        let err = parse_config("[db]\npath = \"x\"\n[search]\ndefault_limit = 0\n").unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }

    #[test]
    fn test_missing_db_section_fails() {
        assert!(parse_config("[ids]\nshort_id_len = 8\n").is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/docgraph.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/docgraph.toml"));
    }
}
