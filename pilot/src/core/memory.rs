//! What the agent remembers between steps: explored tiles, failed moves,
//! map entry points and the last known location.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::action_queue::ActionQueue;
use super::observation::Observation;
use super::types::{Action, Direction, Position};
use super::walkability::classify_tile;

/// Tiles seen on one map, keyed by `x_y`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploredMap {
    pub tiles: BTreeMap<String, String>,
    pub width: usize,
    pub height: usize,
}

impl ExploredMap {
    /// Merges newly seen tiles; existing entries are overwritten, never removed.
    pub fn merge(&mut self, tiles: impl IntoIterator<Item = (Position, char)>, width: usize, height: usize) {
        for (pos, symbol) in tiles {
            self.tiles.insert(pos.key(), symbol.to_string());
        }
        self.width = self.width.max(width);
        self.height = self.height.max(height);
    }

    /// Positions whose symbol is one of `symbols`, row-major.
    pub fn find(&self, symbols: &[char]) -> Vec<Position> {
        let mut found: Vec<Position> = self
            .tiles
            .iter()
            .filter(|(_, s)| s.chars().next().is_some_and(|c| symbols.contains(&c)))
            .filter_map(|(key, _)| Position::from_key(key))
            .collect();
        found.sort_by_key(|p| (p.y, p.x));
        found
    }
}

/// Directions found blocked per coordinate. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementMemory {
    failures: BTreeMap<String, Vec<Direction>>,
}

impl MovementMemory {
    pub fn record_failure(&mut self, at: Position, direction: Direction) {
        let entry = self.failures.entry(at.key()).or_default();
        if !entry.contains(&direction) {
            entry.push(direction);
        }
    }

    pub fn failures_at(&self, at: Position) -> &[Direction] {
        self.failures.get(&at.key()).map_or(&[], Vec::as_slice)
    }

    /// One-line note for prompts, `None` when nothing failed here.
    pub fn describe(&self, at: Position) -> Option<String> {
        let failed = self.failures_at(at);
        if failed.is_empty() {
            return None;
        }
        let list: Vec<_> = failed.iter().map(|d| d.as_str()).collect();
        Some(format!(
            "MOVEMENT MEMORY: At {at} previously failed: {}",
            list.join(", ")
        ))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.failures.keys().map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<Direction>> {
        &self.failures
    }

    pub fn from_entries(failures: BTreeMap<String, Vec<Direction>>) -> Self {
        Self { failures }
    }
}

/// What changed during [`AgentMemory::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryUpdate {
    /// `(from, to)` when the reported location changed.
    pub location_changed: Option<(Option<String>, String)>,
    pub queue_cleared: usize,
    pub movement_failure: Option<(Position, Direction)>,
    pub tiles_merged: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentMemory {
    pub location: Option<String>,
    pub explored: BTreeMap<String, ExploredMap>,
    pub movement: MovementMemory,
    pub naming_handled: bool,
    /// Coordinate where each map was entered. Not persisted.
    pub entry_points: HashMap<String, Position>,
    pub last_position: Option<Position>,
}

impl AgentMemory {
    /// Folds one observation into memory.
    ///
    /// A location change clears `queue` and records the entry coordinate; a
    /// directional `last_action` that left the player in place on the same
    /// map is recorded as a movement failure.
    pub fn update(
        &mut self,
        obs: &Observation,
        last_action: Option<Action>,
        queue: &mut ActionQueue,
    ) -> MemoryUpdate {
        let mut update = MemoryUpdate::default();
        let position = obs.position();
        let location = obs.location().map(str::to_string);

        let mut same_map = true;
        if let Some(current) = location {
            if self.location.as_deref() != Some(current.as_str()) {
                same_map = self.location.is_none();
                if self.location.is_some() {
                    update.queue_cleared = queue.len();
                    queue.clear();
                }
                if let Some(pos) = position {
                    self.entry_points.insert(current.clone(), pos);
                }
                update.location_changed = Some((self.location.take(), current.clone()));
                self.location = Some(current);
            }
        }

        if same_map
            && let (Some(direction), Some(previous), Some(current)) = (
                last_action.and_then(Action::direction),
                self.last_position,
                position,
            )
            && previous == current
        {
            self.movement.record_failure(current, direction);
            update.movement_failure = Some((current, direction));
        }
        if position.is_some() {
            self.last_position = position;
        }

        update.tiles_merged = self.merge_tiles(obs);
        update
    }

    fn merge_tiles(&mut self, obs: &Observation) -> usize {
        let map = &obs.state.map;
        let Some(name) = obs.map_name().or(obs.location()) else {
            return 0;
        };
        if !map.has_tiles() {
            return 0;
        }
        let tiles: Vec<_> = map
            .positioned_tiles()
            .map(|(pos, tile)| (pos, classify_tile(tile).symbol()))
            .collect();
        let count = tiles.len();
        self.explored
            .entry(name.to_string())
            .or_default()
            .merge(tiles, map.width, map.height);
        count
    }

    pub fn entry_point(&self, map: &str) -> Option<Position> {
        self.entry_points.get(map).copied()
    }

    pub fn explored_map(&self, map: &str) -> Option<&ExploredMap> {
        self.explored.get(map)
    }

    /// Sorted keys describing the remembered state, used for cache keys.
    pub fn signature_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .explored
            .keys()
            .map(|name| format!("map:{name}"))
            .chain(self.movement.entries().iter().map(|(pos, dirs)| {
                let dirs: Vec<_> = dirs.iter().map(|d| d.as_str()).collect();
                format!("fail:{pos}:{}", dirs.join("+"))
            }))
            .collect();
        keys.sort();
        keys
    }
}
