//! `.pilot/` scaffolding: default config, persisted state and a gitignore.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{AgentConfig, write_config};
use super::state_store::{PersistedState, save_state};

/// Canonical paths within `.pilot/` for a project root.
#[derive(Debug, Clone)]
pub struct PilotPaths {
    pub root: PathBuf,
    pub pilot_dir: PathBuf,
    pub config_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl PilotPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let pilot_dir = root.join(".pilot");
        Self {
            root: root.clone(),
            config_path: pilot_dir.join("config.toml"),
            gitignore_path: pilot_dir.join(".gitignore"),
            pilot_dir,
        }
    }

    /// Loads the config (defaults when missing) with paths anchored at the root.
    pub fn load_config(&self) -> Result<AgentConfig> {
        Ok(super::config::load_config(&self.config_path)?.resolve(&self.root))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite existing files.
    pub force: bool,
}

/// Creates `.pilot/` in `root`.
///
/// Fails if `.pilot/` already exists unless `options.force` is set.
pub fn init_pilot(root: &Path, options: &InitOptions) -> Result<PilotPaths> {
    let paths = PilotPaths::new(root);
    if paths.pilot_dir.exists() && !paths.pilot_dir.is_dir() {
        return Err(anyhow!("pilot init: .pilot exists but is not a directory"));
    }
    if paths.pilot_dir.exists() && !options.force {
        return Err(anyhow!(
            "pilot init: .pilot already exists (use --force to overwrite)"
        ));
    }

    fs::create_dir_all(&paths.pilot_dir)
        .with_context(|| format!("create directory {}", paths.pilot_dir.display()))?;
    let config = AgentConfig::default();
    write_config(&paths.config_path, &config)?;
    save_state(&config.resolve(root).state_path, &PersistedState::default())?;
    fs::write(&paths.gitignore_path, PILOT_GITIGNORE)
        .with_context(|| format!("write file {}", paths.gitignore_path.display()))?;
    Ok(paths)
}

const PILOT_GITIGNORE: &str = "telemetry.jsonl\nframes/\n";
