//! Test-only helpers: a scripted oracle and observation builders.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::observation::{Frame, Observation, Tile, WalkableEntry};
use crate::core::types::{Action, Direction, Position};
use crate::io::observations::{InputSink, ObservationSource};
use crate::io::oracle::Oracle;

/// One recorded oracle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCall {
    pub module: String,
    pub prompt: String,
    pub with_image: bool,
}

/// Oracle that replays canned replies in order and records every prompt.
///
/// Once the script is exhausted every call fails.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.borrow().clone()
    }

    fn answer(&self, prompt: &str, module: &str, with_image: bool) -> Result<String> {
        self.calls.borrow_mut().push(OracleCall {
            module: module.to_string(),
            prompt: prompt.to_string(),
            with_image,
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted oracle exhausted"))
    }
}

impl Oracle for ScriptedOracle {
    fn text_query(&self, prompt: &str, module: &str) -> Result<String> {
        self.answer(prompt, module, false)
    }

    fn image_query(&self, _frame: &Frame, prompt: &str, module: &str) -> Result<String> {
        self.answer(prompt, module, true)
    }
}

/// Observation of the player standing on a named map.
pub fn map_obs(location: &str, x: i64, y: i64) -> Observation {
    let mut obs = Observation::default();
    obs.state.map.name = Some(location.to_string());
    obs.state.player.location = Some(location.to_string());
    obs.state.player.position = Some(Position::new(x, y));
    obs
}

/// Sets an explicit walkable dict: listed directions open, the rest blocked.
pub fn with_walkable(mut obs: Observation, open: &[Direction]) -> Observation {
    obs.state.walkable = Direction::ALL
        .iter()
        .map(|d| (d.as_str().to_string(), WalkableEntry::Flag(open.contains(d))))
        .collect();
    obs
}

/// Fills the map with a symbol grid, one string per row.
pub fn with_tiles(mut obs: Observation, rows: &[&str]) -> Observation {
    let height = rows.len();
    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    obs.state.map.width = width;
    obs.state.map.height = height;
    obs.state.map.tiles = rows
        .iter()
        .flat_map(|row| {
            let mut cells: Vec<Tile> = row.chars().map(|c| Tile::Symbol(c.to_string())).collect();
            cells.resize(width, Tile::Symbol("#".to_string()));
            cells
        })
        .collect();
    obs
}

pub fn dialogue_obs(text: &str) -> Observation {
    let mut obs = Observation::default();
    obs.flags.dialogue = true;
    obs.visual.dialogue_text = Some(text.to_string());
    obs
}

/// In-memory observation source.
#[derive(Debug, Default)]
pub struct VecSource {
    items: VecDeque<Observation>,
}

impl VecSource {
    pub fn new(items: impl IntoIterator<Item = Observation>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl ObservationSource for VecSource {
    fn next_observation(&mut self) -> Result<Option<Observation>> {
        Ok(self.items.pop_front())
    }
}

/// Sink that records every pressed action.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub pressed: Vec<Action>,
}

impl InputSink for RecordingSink {
    fn press(&mut self, action: Action) -> Result<()> {
        self.pressed.push(action);
        Ok(())
    }
}
