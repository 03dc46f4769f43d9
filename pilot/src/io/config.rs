//! Agent configuration stored under `.pilot/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// agent was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Persisted goal/memory document.
    pub state_path: PathBuf,

    /// Append-only JSONL telemetry, one line per step. Empty disables it.
    pub telemetry_path: PathBuf,

    /// Save persisted state every N steps (and always on exit).
    pub save_every_steps: u32,

    pub dialogue: DialogueConfig,
    pub navigation: NavigationConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DialogueConfig {
    /// Consecutive dialogue steps after which B is pressed instead of A.
    pub b_threshold: u32,
    /// Consecutive dialogue steps after which START is pressed.
    pub start_threshold: u32,
    /// A presses queued when a dialogue starts.
    pub entry_burst: usize,
    /// A presses queued the first time the title screen is seen.
    pub title_burst: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            b_threshold: 40,
            start_threshold: 60,
            entry_burst: 4,
            title_burst: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Upper bound on actions taken from a single oracle reply.
    pub max_actions_per_reply: usize,
    /// Reuse the last oracle reply when the decision context is unchanged.
    pub cache_decisions: bool,
    /// Discard queued moves that are blocked on the current tile.
    pub validate_queued_moves: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_actions_per_reply: 3,
            cache_decisions: true,
            validate_queued_moves: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Model wrapper command (e.g. `["llm", "-m", "vision"]`). Empty means
    /// heuristics only.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".pilot/state.json"),
            telemetry_path: PathBuf::from(".pilot/telemetry.jsonl"),
            save_every_steps: 5,
            dialogue: DialogueConfig::default(),
            navigation: NavigationConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.state_path.as_os_str().is_empty() {
            return Err(anyhow!("state_path must be non-empty"));
        }
        if self.save_every_steps == 0 {
            return Err(anyhow!("save_every_steps must be > 0"));
        }
        if self.dialogue.b_threshold == 0 {
            return Err(anyhow!("dialogue.b_threshold must be > 0"));
        }
        if self.dialogue.start_threshold <= self.dialogue.b_threshold {
            return Err(anyhow!(
                "dialogue.start_threshold ({}) must be greater than dialogue.b_threshold ({})",
                self.dialogue.start_threshold,
                self.dialogue.b_threshold
            ));
        }
        if self.navigation.max_actions_per_reply == 0 {
            return Err(anyhow!("navigation.max_actions_per_reply must be > 0"));
        }
        if !self.oracle.command.is_empty() && self.oracle.command[0].trim().is_empty() {
            return Err(anyhow!("oracle.command must start with a program name"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Resolves relative paths against `root`.
    pub fn resolve(mut self, root: &Path) -> Self {
        if self.state_path.is_relative() {
            self.state_path = root.join(&self.state_path);
        }
        if !self.telemetry_path.as_os_str().is_empty() && self.telemetry_path.is_relative() {
            self.telemetry_path = root.join(&self.telemetry_path);
        }
        self
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = AgentConfig::default();
        cfg.oracle.command = vec!["llm".to_string(), "-m".to_string(), "vision".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[dialogue]\nb_threshold = 5\nstart_threshold = 9\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.dialogue.b_threshold, 5);
        assert_eq!(cfg.dialogue.start_threshold, 9);
        assert_eq!(cfg.dialogue.entry_burst, 4);
        assert_eq!(cfg.navigation, NavigationConfig::default());
    }

    #[test]
    fn escalation_thresholds_must_increase() {
        let mut cfg = AgentConfig::default();
        cfg.dialogue.start_threshold = cfg.dialogue.b_threshold;
        let err = cfg.validate().expect_err("invalid");
        assert!(err.to_string().contains("start_threshold"));
    }

    #[test]
    fn resolve_anchors_relative_paths() {
        let cfg = AgentConfig::default().resolve(Path::new("/tmp/run"));
        assert_eq!(cfg.state_path, PathBuf::from("/tmp/run/.pilot/state.json"));
        assert_eq!(
            cfg.telemetry_path,
            PathBuf::from("/tmp/run/.pilot/telemetry.jsonl")
        );
    }
}
