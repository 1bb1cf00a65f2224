use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATABASE_FILE_NAME: &str = "workbench.db";
pub const LOG_FILE_NAME: &str = "workbench.log";

/// Top-level `config.toml`. Every field is optional on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub log_level: String,
    /// Overrides `<data_dir>/workbench.db` when set.
    pub database: Option<PathBuf>,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_steps: u32,
    pub default_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub claude_binary: String,
    pub claude_timeout_secs: u64,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            database: None,
            agent: AgentSettings::default(),
            tools: ToolSettings::default(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 20,
            default_model: "deepseek-chat".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            request_timeout_secs: 120,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            claude_binary: "claude".to_string(),
            claude_timeout_secs: 600,
        }
    }
}

impl AgentSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ToolSettings {
    pub fn claude_timeout(&self) -> Duration {
        Duration::from_secs(self.claude_timeout_secs)
    }
}

impl WorkbenchConfig {
    /// Load `config.toml` from `data_dir`. A missing file yields defaults.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Write the current settings as a fresh `config.toml` unless one exists.
    pub fn write_default_if_missing(&self, data_dir: &Path) -> Result<bool> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| data_dir.join(DATABASE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = WorkbenchConfig::parse("").unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.agent.max_steps, 20);
        assert_eq!(cfg.agent.default_model, "deepseek-chat");
        assert_eq!(cfg.agent.max_tokens, 2000);
        assert_eq!(cfg.agent.request_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.tools.claude_binary, "claude");
        assert_eq!(cfg.tools.claude_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = WorkbenchConfig::parse(
            "log_level = \"debug\"\n[agent]\nmax_steps = 5\n[tools]\nclaude_binary = \"/opt/claude\"\n",
        )
        .unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.agent.max_steps, 5);
        assert!((cfg.agent.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.tools.claude_binary, "/opt/claude");
        assert_eq!(cfg.tools.claude_timeout_secs, 600);
    }

    #[test]
    fn malformed_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "agent = [").unwrap();
        let err = WorkbenchConfig::load(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn missing_file_yields_defaults_and_default_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = WorkbenchConfig::load(dir.path()).unwrap();
        assert_eq!(
            cfg.database_path(dir.path()),
            dir.path().join(DATABASE_FILE_NAME)
        );
    }

    #[test]
    fn default_file_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = WorkbenchConfig::default();
        assert!(cfg.write_default_if_missing(dir.path()).unwrap());
        assert!(!cfg.write_default_if_missing(dir.path()).unwrap());
        let reloaded = WorkbenchConfig::load(dir.path()).unwrap();
        assert_eq!(reloaded.agent.max_steps, 20);
    }
}
