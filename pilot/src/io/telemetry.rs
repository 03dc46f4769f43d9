//! Append-only per-step telemetry (JSONL).
//!
//! Writing is best-effort: failures are logged at debug and never reach the
//! control loop.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::observation::Observation;
use crate::core::types::{KeyElements, Position, SceneResult};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MapMeta {
    pub name: Option<String>,
    pub width: usize,
    pub height: usize,
}

/// One telemetry line.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub ts: String,
    pub step: u64,
    pub scene_type: &'static str,
    pub summary: String,
    pub key_elements: KeyElements,
    pub map: MapMeta,
    pub location: Option<String>,
    pub player: Option<Position>,
    pub action: &'static str,
    pub reason: &'static str,
    pub active_goal: Option<String>,
}

impl StepRecord {
    pub fn new(
        step: u64,
        scene: &SceneResult,
        obs: &Observation,
        action: &'static str,
        reason: &'static str,
        active_goal: Option<&str>,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            step,
            scene_type: scene.scene_type.as_str(),
            summary: scene.summary.clone(),
            key_elements: scene.key_elements.clone(),
            map: MapMeta {
                name: obs.map_name().map(str::to_string),
                width: obs.state.map.width,
                height: obs.state.map.height,
            },
            location: obs.location().map(str::to_string),
            player: obs.position(),
            action,
            reason,
            active_goal: active_goal.map(str::to_string),
        }
    }
}

/// Telemetry destination; `None` path disables writing.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    path: Option<PathBuf>,
}

impl Telemetry {
    pub fn new(path: &Path) -> Self {
        let path = (!path.as_os_str().is_empty()).then(|| path.to_path_buf());
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn record(&self, record: &StepRecord) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = append_line(path, record) {
            debug!(err = %format!("{err:#}"), path = %path.display(), "telemetry write failed");
        }
    }
}

fn append_line(path: &Path, record: &StepRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(record).context("serialize telemetry")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))?;
    Ok(())
}
