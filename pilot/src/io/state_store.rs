//! Persisted goal/memory document with schema validation.
//!
//! Loading is best-effort: a missing, unreadable or invalid document yields
//! the default plan with empty memory, logged at warn. Saving is atomic.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::goals::{Goal, GoalTracker, validate_goals};
use crate::core::memory::{AgentMemory, ExploredMap, MovementMemory};
use crate::core::plan::default_plan;

pub const STATE_VERSION: u32 = 1;

const STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/agent_state/v1.schema.json"
));

/// On-disk document. Runtime flags are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub active_goal_id: Option<String>,
    #[serde(default)]
    pub explored_maps: BTreeMap<String, ExploredMap>,
    #[serde(default)]
    pub movement_failures: MovementMemory,
    #[serde(default)]
    pub naming_handled: bool,
    #[serde(default)]
    pub last_location: Option<String>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            goals: default_plan(),
            active_goal_id: None,
            explored_maps: BTreeMap::new(),
            movement_failures: MovementMemory::default(),
            naming_handled: false,
            last_location: None,
        }
    }
}

impl PersistedState {
    /// Snapshot of the tracker and memory.
    pub fn capture(tracker: &GoalTracker, memory: &AgentMemory) -> Self {
        Self {
            version: STATE_VERSION,
            goals: tracker.goals().to_vec(),
            active_goal_id: tracker.current_id().map(str::to_string),
            explored_maps: memory.explored.clone(),
            movement_failures: memory.movement.clone(),
            naming_handled: memory.naming_handled,
            last_location: memory.location.clone(),
        }
    }

    /// Rebuilds the tracker and memory. Stored goals are only used when they
    /// form a valid, non-empty plan.
    pub fn into_parts(self) -> (GoalTracker, AgentMemory) {
        let errors = validate_goals(&self.goals);
        let goals = if self.goals.is_empty() {
            default_plan()
        } else if !errors.is_empty() {
            warn!(errors = %errors.join("; "), "stored goals invalid, using default plan");
            default_plan()
        } else {
            self.goals
        };
        let tracker = GoalTracker::restore(goals, self.active_goal_id.as_deref());
        let memory = AgentMemory {
            location: self.last_location,
            explored: self.explored_maps,
            movement: self.movement_failures,
            naming_handled: self.naming_handled,
            ..AgentMemory::default()
        };
        (tracker, memory)
    }
}

/// Loads persisted state, falling back to defaults on any failure.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_state(path: &Path) -> PersistedState {
    match read_state(path) {
        Ok(Some(state)) => {
            debug!(goals = state.goals.len(), "loaded persisted state");
            state
        }
        Ok(None) => {
            info!("no persisted state, using defaults");
            PersistedState::default()
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "persisted state unusable, using defaults");
            PersistedState::default()
        }
    }
}

fn read_state(path: &Path) -> Result<Option<PersistedState>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    validate_schema(&value)?;
    let state: PersistedState = serde_json::from_value(value)
        .with_context(|| format!("deserialize state {}", path.display()))?;
    Ok(Some(state))
}

/// Writes state atomically as pretty JSON.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(state).context("serialize state")?;
    buf.push('\n');
    super::write_atomic(path, &buf)?;
    debug!(active_goal = ?state.active_goal_id, "saved state");
    Ok(())
}

fn validate_schema(state: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(STATE_SCHEMA).context("parse state schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages: Vec<String> = compiled
        .iter_errors(state)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
