use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::agents::AgentLogRoots;

/// Application configuration, loadable from a TOML file with every field
/// optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP server binds, `host:port`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log level when `RUST_LOG` is not set: debug|info|warn|error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dashboard aggregation interval in milliseconds.
    #[serde(default = "default_tick_sessions_ms")]
    pub tick_sessions_ms: u64,

    /// Pane stream capture interval in milliseconds.
    #[serde(default = "default_tick_pane_ms")]
    pub tick_pane_ms: u64,

    /// How long a pane's agent classification stays cached.
    #[serde(default = "default_cache_agent_ttl_ms")]
    pub cache_agent_ttl_ms: u64,

    /// History lines captured when scoring candidate panes.
    #[serde(default = "default_score_capture_lines")]
    pub score_capture_lines: u32,

    /// History lines captured for chosen panes and streams.
    #[serde(default = "default_capture_lines")]
    pub capture_lines: u32,

    /// Preview lines per window card.
    #[serde(default = "default_preview_lines")]
    pub preview_lines: usize,

    /// Preview lines when the window needs attention.
    #[serde(default = "default_preview_lines_attention")]
    pub preview_lines_attention: usize,

    /// Override for Claude Code's per-project log root
    /// (default `~/.claude/projects`).
    #[serde(default)]
    pub claude_log_root: Option<PathBuf>,

    /// Override for Amp's thread directory
    /// (default `~/.local/share/amp/threads`).
    #[serde(default)]
    pub amp_threads_dir: Option<PathBuf>,

    /// Override for Amp's state directory holding `last-thread-id`
    /// (default `~/.local/state/amp`).
    #[serde(default)]
    pub amp_state_dir: Option<PathBuf>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8800".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_sessions_ms() -> u64 {
    3000
}
fn default_tick_pane_ms() -> u64 {
    200
}
fn default_cache_agent_ttl_ms() -> u64 {
    20_000
}
fn default_score_capture_lines() -> u32 {
    100
}
fn default_capture_lines() -> u32 {
    500
}
fn default_preview_lines() -> usize {
    15
}
fn default_preview_lines_attention() -> usize {
    25
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            tick_sessions_ms: default_tick_sessions_ms(),
            tick_pane_ms: default_tick_pane_ms(),
            cache_agent_ttl_ms: default_cache_agent_ttl_ms(),
            score_capture_lines: default_score_capture_lines(),
            capture_lines: default_capture_lines(),
            preview_lines: default_preview_lines(),
            preview_lines_attention: default_preview_lines_attention(),
            claude_log_root: None,
            amp_threads_dir: None,
            amp_state_dir: None,
        }
    }
}

impl Config {
    /// Default config file location under the user config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("agentdeck").join("config.toml"))
    }

    /// Loads the default config file, falling back to defaults when it does
    /// not exist or cannot be read.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("failed to load config {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Writes the current config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().context("no config directory available")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn agent_log_roots(&self) -> AgentLogRoots {
        AgentLogRoots {
            claude_projects: self.claude_log_root.clone(),
            amp_threads: self.amp_threads_dir.clone(),
            amp_state: self.amp_state_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8800");
        assert_eq!(config.tick_sessions_ms, 3000);
        assert_eq!(config.tick_pane_ms, 200);
        assert_eq!(config.preview_lines, 15);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("listen_addr = \"0.0.0.0:9000\"").unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.cache_agent_ttl_ms, 20_000);
        assert!(config.claude_log_root.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<Config>("no_such_option = 1").is_err());
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&toml).unwrap();
        assert_eq!(back.listen_addr, config.listen_addr);
    }
}
