//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,

    /// How long a blocked writer waits before failing with a "locked" error.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Session-log source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root directory containing per-project session log directories.
    #[serde(default = "default_source_root")]
    pub root: String,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Cap on total rendered result text per search, in characters.
    #[serde(default = "default_result_budget_chars")]
    pub result_budget_chars: usize,

    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/recollect/recollect.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_source_root() -> String {
    "~/.claude/projects".to_string()
}

fn default_result_budget_chars() -> usize {
    50_000
}

fn default_limit() -> usize {
    20
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_budget_chars: default_result_budget_chars(),
            default_limit: default_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            source: SourceConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./recollect.yaml (current directory)
    /// 3. ~/.config/recollect/recollect.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "recollect.yaml".to_string(),
            shellexpand::tilde("~/.config/recollect/recollect.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    /// Get the session source root, expanding ~ to home directory
    pub fn source_root(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.source.root).to_string();
        PathBuf::from(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.search.result_budget_chars, 50_000);
        assert_eq!(config.search.default_limit, 20);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: ~/.local/share/recollect/test.db
  busy_timeout_ms: 2500

source:
  root: /tmp/sessions

search:
  result_budget_chars: 10000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.path, "~/.local/share/recollect/test.db");
        assert_eq!(config.database.busy_timeout_ms, 2500);
        assert_eq!(config.source.root, "/tmp/sessions");
        assert_eq!(config.search.result_budget_chars, 10_000);
        // Missing sections fall back to defaults
        assert_eq!(config.search.default_limit, 20);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/recollect.yaml").unwrap();
        assert_eq!(config.database.path, default_database_path());
    }
}
