// ⚙️ Configuration
//
// JSON file with per-field defaults, then environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DATABASE: &str = "LOGIN_COUNTER_DB";
pub const ENV_BIND_ADDR: &str = "LOGIN_COUNTER_ADDR";

/// Capability required to see a feature when nothing else is configured
pub const DEFAULT_CAPABILITY: &str = "administrator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding options and memberships
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Listen address of the HTTP server
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// feature id -> capability required to see it
    #[serde(default)]
    pub feature_capabilities: HashMap<String, String>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("login_counter.db")
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            bind_addr: default_bind_addr(),
            feature_capabilities: HashMap::new(),
        }
    }
}

impl Config {
    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// File config when a path is given, defaults otherwise. Env wins in both cases.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var(ENV_DATABASE) {
            if !db.trim().is_empty() {
                self.database_path = PathBuf::from(db);
            }
        }
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            if !addr.trim().is_empty() {
                self.bind_addr = addr;
            }
        }
    }

    /// Capability gating `feature_id`, falling back to [`DEFAULT_CAPABILITY`]
    pub fn capability_for(&self, feature_id: &str) -> &str {
        self.feature_capabilities
            .get(feature_id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_CAPABILITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("login_counter.db"));
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.capability_for("login_counter"), "administrator");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"feature_capabilities": {"login_counter": "manage_options"}}"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.capability_for("login_counter"), "manage_options");
        assert_eq!(config.capability_for("other"), "administrator");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("login_counter_config_{}.json", std::process::id()));
        fs::write(&path, r#"{"database_path": "/tmp/counts.db", "bind_addr": "0.0.0.0:8080"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.database_path, PathBuf::from("/tmp/counts.db"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Config::load("/nonexistent/login_counter.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
