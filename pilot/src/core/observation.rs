//! Typed observation supplied by the game-state source each step.
//!
//! Every field is optional with an explicit default so that partial or
//! malformed producer output deserializes to neutral values instead of
//! failing the step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Direction, Position};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    pub flags: SceneFlags,
    pub state: GameState,
    pub visual: VisualSignals,
    pub frame: Option<Frame>,
}

/// Structured scene booleans reported by the game-state source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFlags {
    #[serde(alias = "title_screen", alias = "is_title")]
    pub title: bool,
    #[serde(alias = "in_battle")]
    pub battle: bool,
    #[serde(alias = "dialogue_open", alias = "textbox_open")]
    pub dialogue: bool,
    #[serde(alias = "menu_open", alias = "in_menu")]
    pub menu: bool,
    #[serde(alias = "script_active")]
    pub cutscene: bool,
    pub opponent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub map: MapInfo,
    pub player: PlayerInfo,
    /// Explicit walkable-direction dictionary keyed by direction name.
    pub walkable: BTreeMap<String, WalkableEntry>,
    /// Dialogue flag as reported by memory reads.
    pub dialogue: Option<DialogueSignal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapInfo {
    pub name: Option<String>,
    pub width: usize,
    pub height: usize,
    /// Row-major tile grid of `width * height` entries.
    pub tiles: Vec<Tile>,
    /// Textual rendering of the local area with a `P` player marker.
    pub ascii: Option<String>,
}

impl MapInfo {
    pub fn has_tiles(&self) -> bool {
        !self.tiles.is_empty()
    }

    /// Tile at `pos`, `None` when outside the grid.
    pub fn tile_at(&self, pos: Position) -> Option<&Tile> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        let (x, y) = (pos.x as usize, pos.y as usize);
        let width = self.effective_width();
        if width == 0 || x >= width || y >= self.effective_height() {
            return None;
        }
        let idx = y.checked_mul(width)?.checked_add(x)?;
        self.tiles.get(idx)
    }

    fn effective_width(&self) -> usize {
        if self.width > 0 {
            self.width
        } else {
            // Square grid assumed when dimensions are missing.
            (self.tiles.len() as f64).sqrt() as usize
        }
    }

    fn effective_height(&self) -> usize {
        if self.height > 0 {
            self.height
        } else {
            let width = self.effective_width();
            if width == 0 { 0 } else { self.tiles.len() / width }
        }
    }

    /// Every tile with its coordinate, row-major.
    pub fn positioned_tiles(&self) -> impl Iterator<Item = (Position, &Tile)> {
        let width = self.effective_width().max(1);
        self.tiles.iter().enumerate().map(move |(idx, tile)| {
            (
                Position::new((idx % width) as i64, (idx / width) as i64),
                tile,
            )
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    #[serde(alias = "coords")]
    pub position: Option<Position>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub party: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueSignal {
    #[serde(alias = "has_dialogue")]
    pub active: bool,
    pub confidence: f64,
}

/// Signals derived from the rendered screen by the producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSignals {
    /// OCR'd dialogue text, if any was read.
    #[serde(alias = "ocr_text")]
    pub dialogue_text: Option<String>,
    /// Generic variance-based dialogue confidence computed upstream.
    pub frame_dialogue_confidence: Option<f64>,
}

/// One entry of the explicit walkable-direction dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WalkableEntry {
    Flag(bool),
    Tile {
        #[serde(default)]
        behavior: Option<String>,
        #[serde(default)]
        walkable: Option<bool>,
    },
}

impl WalkableEntry {
    pub fn is_walkable(&self) -> bool {
        match self {
            WalkableEntry::Flag(flag) => *flag,
            WalkableEntry::Tile { walkable, .. } => walkable.unwrap_or(true),
        }
    }

    pub fn behavior(&self) -> Option<&str> {
        match self {
            WalkableEntry::Flag(_) => None,
            WalkableEntry::Tile { behavior, .. } => behavior.as_deref(),
        }
    }
}

/// A map tile in any of the shapes producers emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tile {
    /// Legend symbol such as `.`, `#`, `D`, `S`.
    Symbol(String),
    Tagged {
        #[serde(default)]
        behavior: Option<String>,
        #[serde(default)]
        collision: i64,
    },
    /// `[id, behavior, collision, elevation]`.
    Row(Vec<Value>),
}

impl Tile {
    pub fn behavior(&self) -> Option<String> {
        match self {
            Tile::Symbol(_) => None,
            Tile::Tagged { behavior, .. } => behavior.clone(),
            Tile::Row(values) => values.get(1).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
        }
    }

    pub fn collision(&self) -> i64 {
        match self {
            Tile::Symbol(_) => 0,
            Tile::Tagged { collision, .. } => *collision,
            Tile::Row(values) => values.get(2).and_then(Value::as_i64).unwrap_or(0),
        }
    }
}

impl Observation {
    pub fn position(&self) -> Option<Position> {
        self.state.player.position
    }

    pub fn map_name(&self) -> Option<&str> {
        self.state
            .map
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Location string, preferring the player's reported location over the map name.
    pub fn location(&self) -> Option<&str> {
        self.state
            .player
            .location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.map_name())
    }

    pub fn party_size(&self) -> usize {
        self.state.player.party.len()
    }

    pub fn dialogue_text(&self) -> Option<&str> {
        self.visual
            .dialogue_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Directions listed in the explicit walkable dictionary, with parsed keys.
    pub fn walkable_entries(&self) -> Vec<(Direction, &WalkableEntry)> {
        let mut entries: Vec<_> = self
            .state
            .walkable
            .iter()
            .filter_map(|(key, entry)| key.parse::<Direction>().ok().map(|d| (d, entry)))
            .collect();
        entries.sort_by_key(|(d, _)| *d);
        entries
    }
}

/// Raw RGB frame, row-major, three bytes per pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A frame filled with one color.
    pub fn solid(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let pixels = rgb.repeat(width * height);
        Self::new(width, height, pixels)
    }

    /// Non-empty and the pixel buffer holds exactly `width * height` RGB triples.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self
                .width
                .checked_mul(self.height)
                .and_then(|n| n.checked_mul(3))
                .is_some_and(|len| len == self.pixels.len())
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width {
            return None;
        }
        y.checked_mul(self.width)?.checked_add(x)?.checked_mul(3)
    }

    /// Pixel at `(x, y)`, black when outside the buffer.
    pub fn rgb(&self, x: usize, y: usize) -> [u8; 3] {
        self.offset(x, y)
            .and_then(|idx| self.pixels.get(idx..idx + 3))
            .map_or([0, 0, 0], |px| [px[0], px[1], px[2]])
    }

    /// Sets the pixel at `(x, y)`; ignored outside the buffer.
    pub fn set_rgb(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if let Some(px) = self
            .offset(x, y)
            .and_then(|idx| self.pixels.get_mut(idx..idx + 3))
        {
            px.copy_from_slice(&rgb);
        }
    }

    pub fn luma(&self, x: usize, y: usize) -> f64 {
        let [r, g, b] = self.rgb(x, y);
        0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
    }

    /// Keeps every `stride`-th pixel on both axes.
    pub fn downsample(&self, stride: usize) -> Frame {
        if stride <= 1 || !self.is_well_formed() {
            return self.clone();
        }
        let width = self.width.div_ceil(stride);
        let height = self.height.div_ceil(stride);
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in (0..self.height).step_by(stride) {
            for x in (0..self.width).step_by(stride) {
                pixels.extend_from_slice(&self.rgb(x, y));
            }
        }
        Frame::new(width, height, pixels)
    }

    /// Binary PPM (P6) encoding, used to hand frames to external tools.
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.pixels);
        out
    }
}
