//! Shared vocabulary for the decision layer: buttons, scenes, positions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primitive button accepted by the input executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
            Button::A => "A",
            Button::B => "B",
            Button::Start => "START",
            Button::Select => "SELECT",
        }
    }

    /// Cardinal direction for d-pad buttons, `None` for the rest.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Button::Up => Some(Direction::Up),
            Button::Down => Some(Direction::Down),
            Button::Left => Some(Direction::Left),
            Button::Right => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn is_direction(self) -> bool {
        self.direction().is_some()
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = String;

    /// Case-insensitive; surrounding whitespace and quotes are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
        Button::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| format!("unknown button token: {token:?}"))
    }
}

/// One of the four cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(self) -> &'static str {
        self.button().as_str()
    }

    pub fn button(self) -> Button {
        match self {
            Direction::Up => Button::Up,
            Direction::Down => Button::Down,
            Direction::Left => Button::Left,
            Direction::Right => Button::Right,
        }
    }

    /// Grid offset with y growing downward.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let button: Button = s.parse()?;
        button
            .direction()
            .ok_or_else(|| format!("not a direction: {}", button))
    }
}

/// Committed output of one step: a button press or the `WAIT` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Action {
    Press(Button),
    Wait,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Press(button) => button.as_str(),
            Action::Wait => "WAIT",
        }
    }

    pub fn button(self) -> Option<Button> {
        match self {
            Action::Press(button) => Some(button),
            Action::Wait => None,
        }
    }

    pub fn direction(self) -> Option<Direction> {
        self.button().and_then(Button::direction)
    }
}

impl From<Button> for Action {
    fn from(button: Button) -> Self {
        Action::Press(button)
    }
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        Action::Press(direction.button())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("WAIT") {
            return Ok(Action::Wait);
        }
        value.parse::<Button>().map(Action::Press)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse label for what the game is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SceneType {
    Map,
    Battle,
    Menu,
    Dialogue,
    Cutscene,
    Title,
    Unknown,
}

impl SceneType {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneType::Map => "MAP",
            SceneType::Battle => "BATTLE",
            SceneType::Menu => "MENU",
            SceneType::Dialogue => "DIALOGUE",
            SceneType::Cutscene => "CUTSCENE",
            SceneType::Title => "TITLE",
            SceneType::Unknown => "UNKNOWN",
        }
    }

    /// Dialogue and cutscenes share the A-mashing path.
    pub fn is_dialogue_like(self) -> bool {
        matches!(self, SceneType::Dialogue | SceneType::Cutscene)
    }

    /// Parses one of the six labels the oracle may return. `UNKNOWN` is not accepted.
    pub fn parse_label(label: &str) -> Option<SceneType> {
        match label.trim().to_ascii_uppercase().as_str() {
            "MAP" => Some(SceneType::Map),
            "BATTLE" => Some(SceneType::Battle),
            "MENU" => Some(SceneType::Menu),
            "DIALOGUE" => Some(SceneType::Dialogue),
            "CUTSCENE" => Some(SceneType::Cutscene),
            "TITLE" => Some(SceneType::Title),
            _ => None,
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tile coordinate on the current map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    /// Key used by explored-map and movement-memory dictionaries.
    pub fn key(self) -> String {
        format!("{}_{}", self.x, self.y)
    }

    pub fn from_key(key: &str) -> Option<Position> {
        let (x, y) = key.split_once('_')?;
        Some(Position::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Value stored under a key element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Flag(bool),
    Number(i64),
    Float(f64),
    Text(String),
}

impl KeyValue {
    /// Interprets a raw `key=value` right-hand side.
    pub fn parse(raw: &str) -> KeyValue {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            KeyValue::Flag(true)
        } else if raw.eq_ignore_ascii_case("false") {
            KeyValue::Flag(false)
        } else if let Ok(n) = raw.parse::<i64>() {
            KeyValue::Number(n)
        } else {
            KeyValue::Text(raw.to_string())
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Flag(b) => write!(f, "{b}"),
            KeyValue::Number(n) => write!(f, "{n}"),
            KeyValue::Float(n) => write!(f, "{n}"),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

pub type KeyElements = BTreeMap<String, KeyValue>;

/// Structured output of scene classification. Built once per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneResult {
    pub scene_type: SceneType,
    pub summary: String,
    pub key_elements: KeyElements,
}

impl SceneResult {
    pub fn new(scene_type: SceneType, summary: impl Into<String>) -> Self {
        Self {
            scene_type,
            summary: summary.into(),
            key_elements: KeyElements::new(),
        }
    }

    /// Lowercased summary plus every key element, used for cue matching.
    pub fn searchable_text(&self) -> String {
        let mut text = self.summary.to_lowercase();
        for (key, value) in &self.key_elements {
            text.push(' ');
            text.push_str(&key.to_lowercase());
            text.push('=');
            text.push_str(&value.to_string().to_lowercase());
        }
        text
    }
}
