//! Walkability of the four tiles around the player.
//!
//! Sources are tried in a fixed order ([`RULES`]); the first one that finds a
//! walkable direction wins. When none does, the first source that classified
//! anything is kept so blocked directions are still known.

use std::collections::BTreeMap;

use serde::Serialize;

use super::observation::{Observation, Tile};
use super::types::{Direction, Position};

/// Tile kinds worth steering toward or reporting to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialTile {
    Stairs,
    Door,
    Grass,
    Water,
}

impl SpecialTile {
    pub fn symbol(self) -> char {
        match self {
            SpecialTile::Stairs => 'S',
            SpecialTile::Door => 'D',
            SpecialTile::Grass => 'G',
            SpecialTile::Water => 'W',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpecialTile::Stairs => "stairs",
            SpecialTile::Door => "door",
            SpecialTile::Grass => "grass",
            SpecialTile::Water => "water",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileClass {
    Walkable(Option<SpecialTile>),
    Blocked,
}

impl TileClass {
    pub fn is_walkable(self) -> bool {
        matches!(self, TileClass::Walkable(_))
    }

    /// Legend symbol stored in the explored map.
    pub fn symbol(self) -> char {
        match self {
            TileClass::Walkable(Some(special)) => special.symbol(),
            TileClass::Walkable(None) => '.',
            TileClass::Blocked => '#',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkSource {
    Explicit,
    TileGrid,
    Ascii,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Walkability {
    pub source: WalkSource,
    pub walkable: Vec<Direction>,
    pub blocked: Vec<Direction>,
    pub special: BTreeMap<Direction, SpecialTile>,
}

impl Walkability {
    pub fn unknown() -> Self {
        Self {
            source: WalkSource::Unknown,
            walkable: Vec::new(),
            blocked: Vec::new(),
            special: BTreeMap::new(),
        }
    }

    pub fn is_walkable(&self, direction: Direction) -> bool {
        self.walkable.contains(&direction)
    }

    pub fn first_walkable(&self) -> Option<Direction> {
        self.walkable.first().copied()
    }

    fn from_classes(source: WalkSource, classes: &[(Direction, TileClass)]) -> Self {
        let mut result = Self {
            source,
            ..Self::unknown()
        };
        for (direction, class) in classes {
            match class {
                TileClass::Walkable(special) => {
                    result.walkable.push(*direction);
                    if let Some(special) = special {
                        result.special.insert(*direction, *special);
                    }
                }
                TileClass::Blocked => result.blocked.push(*direction),
            }
        }
        result
    }

    fn classified_anything(&self) -> bool {
        !self.walkable.is_empty() || !self.blocked.is_empty()
    }
}

pub struct WalkRule {
    pub name: &'static str,
    pub derive: fn(&Observation) -> Option<Walkability>,
}

pub const RULES: &[WalkRule] = &[
    WalkRule {
        name: "explicit_dict",
        derive: from_explicit,
    },
    WalkRule {
        name: "tile_grid",
        derive: from_tile_grid,
    },
    WalkRule {
        name: "ascii_map",
        derive: from_ascii,
    },
];

pub fn analyze(obs: &Observation) -> Walkability {
    let mut fallback = None;
    for rule in RULES {
        let Some(result) = (rule.derive)(obs) else {
            continue;
        };
        if !result.walkable.is_empty() {
            return result;
        }
        if fallback.is_none() && result.classified_anything() {
            fallback = Some(result);
        }
    }
    fallback.unwrap_or_else(Walkability::unknown)
}

const WALKABLE_BEHAVIORS: &[&str] = &[
    "NORMAL", "DOOR", "STAIRS", "WARP", "LEDGE", "GRASS", "WATER", "ICE", "SAND",
];
const BLOCKED_BEHAVIORS: &[&str] = &["WALL", "BARRIER", "IMPASSABLE"];

/// Classifies a behavior tag, falling back to the collision flag.
pub fn classify_behavior(behavior: Option<&str>, collision: i64) -> TileClass {
    let tag = behavior.unwrap_or_default().to_ascii_uppercase();
    if WALKABLE_BEHAVIORS.iter().any(|b| tag.contains(b)) {
        return TileClass::Walkable(special_for(&tag));
    }
    if BLOCKED_BEHAVIORS.iter().any(|b| tag.contains(b)) {
        return TileClass::Blocked;
    }
    if collision == 0 {
        TileClass::Walkable(None)
    } else {
        TileClass::Blocked
    }
}

fn special_for(tag: &str) -> Option<SpecialTile> {
    if tag.contains("STAIRS") || tag.contains("WARP") {
        Some(SpecialTile::Stairs)
    } else if tag.contains("DOOR") {
        Some(SpecialTile::Door)
    } else if tag.contains("GRASS") {
        Some(SpecialTile::Grass)
    } else if tag.contains("WATER") {
        Some(SpecialTile::Water)
    } else {
        None
    }
}

/// Classifies one cell of the symbol legend. Unknown symbols are blocked.
pub fn classify_symbol(symbol: char) -> TileClass {
    match symbol {
        '.' | 'P' => TileClass::Walkable(None),
        'D' => TileClass::Walkable(Some(SpecialTile::Door)),
        'S' => TileClass::Walkable(Some(SpecialTile::Stairs)),
        'G' => TileClass::Walkable(Some(SpecialTile::Grass)),
        'W' | '~' => TileClass::Walkable(Some(SpecialTile::Water)),
        _ => TileClass::Blocked,
    }
}

pub fn classify_tile(tile: &Tile) -> TileClass {
    match tile {
        Tile::Symbol(symbol) => symbol
            .trim()
            .chars()
            .next()
            .map_or(TileClass::Blocked, classify_symbol),
        other => classify_behavior(other.behavior().as_deref(), other.collision()),
    }
}

fn from_explicit(obs: &Observation) -> Option<Walkability> {
    let entries = obs.walkable_entries();
    if entries.is_empty() {
        return None;
    }
    let classes: Vec<_> = entries
        .into_iter()
        .map(|(direction, entry)| {
            let class = if entry.is_walkable() {
                TileClass::Walkable(entry.behavior().and_then(|b| special_for(&b.to_ascii_uppercase())))
            } else {
                TileClass::Blocked
            };
            (direction, class)
        })
        .collect();
    Some(Walkability::from_classes(WalkSource::Explicit, &classes))
}

fn from_tile_grid(obs: &Observation) -> Option<Walkability> {
    let map = &obs.state.map;
    let player = obs.position()?;
    if !map.has_tiles() {
        return None;
    }
    let classes: Vec<_> = Direction::ALL
        .into_iter()
        .map(|direction| {
            let class = map
                .tile_at(player.step(direction))
                .map_or(TileClass::Blocked, classify_tile);
            (direction, class)
        })
        .collect();
    Some(Walkability::from_classes(WalkSource::TileGrid, &classes))
}

fn from_ascii(obs: &Observation) -> Option<Walkability> {
    let grid = AsciiGrid::parse(obs.state.map.ascii.as_deref()?);
    let player = grid.find('P')?;
    let classes: Vec<_> = Direction::ALL
        .into_iter()
        .map(|direction| {
            let class = grid
                .get(player.step(direction))
                .map_or(TileClass::Blocked, classify_symbol);
            (direction, class)
        })
        .collect();
    Some(Walkability::from_classes(WalkSource::Ascii, &classes))
}

/// Character grid parsed from a textual map rendering.
///
/// Rows with whitespace-separated tokens use each token's first character;
/// otherwise every character is a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiGrid {
    rows: Vec<Vec<char>>,
}

impl AsciiGrid {
    pub fn parse(text: &str) -> Self {
        let rows = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                if line.trim().contains(char::is_whitespace) {
                    line.split_whitespace()
                        .filter_map(|token| token.chars().next())
                        .collect()
                } else {
                    line.trim().chars().collect()
                }
            })
            .collect();
        Self { rows }
    }

    pub fn get(&self, pos: Position) -> Option<char> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        self.rows
            .get(pos.y as usize)
            .and_then(|row| row.get(pos.x as usize))
            .copied()
    }

    pub fn find(&self, symbol: char) -> Option<Position> {
        self.cells().find(|(_, c)| *c == symbol).map(|(pos, _)| pos)
    }

    /// All cells, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (Position, char)> + '_ {
        self.rows.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(move |(x, c)| (Position::new(x as i64, y as i64), *c))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::{MapInfo, WalkableEntry};

    fn grid_obs(tiles: Vec<Tile>, width: usize, height: usize, player: Position) -> Observation {
        let mut obs = Observation::default();
        obs.state.map = MapInfo {
            width,
            height,
            tiles,
            ..MapInfo::default()
        };
        obs.state.player.position = Some(player);
        obs
    }

    fn tagged(behavior: &str, collision: i64) -> Tile {
        Tile::Tagged {
            behavior: Some(behavior.to_string()),
            collision,
        }
    }

    #[test]
    fn explicit_dict_wins_over_grid() {
        let mut obs = grid_obs(vec![tagged("NORMAL", 0); 9], 3, 3, Position::new(1, 1));
        obs.state
            .walkable
            .insert("right".into(), WalkableEntry::Flag(true));
        obs.state.walkable.insert(
            "UP".into(),
            WalkableEntry::Tile {
                behavior: Some("STAIRS".into()),
                walkable: None,
            },
        );
        obs.state
            .walkable
            .insert("down".into(), WalkableEntry::Flag(false));
        let result = analyze(&obs);
        assert_eq!(result.source, WalkSource::Explicit);
        assert_eq!(result.walkable, vec![Direction::Up, Direction::Right]);
        assert_eq!(result.blocked, vec![Direction::Down]);
        assert_eq!(result.special.get(&Direction::Up), Some(&SpecialTile::Stairs));
    }

    #[test]
    fn tile_grid_classifies_neighbors_and_bounds() {
        // . W .
        // D P #
        // . S .
        let tiles = vec![
            tagged("NORMAL", 0),
            tagged("WALL", 1),
            tagged("NORMAL", 0),
            tagged("DOOR", 0),
            tagged("NORMAL", 0),
            tagged("IMPASSABLE", 0),
            tagged("NORMAL", 0),
            tagged("STAIRS", 0),
            tagged("NORMAL", 0),
        ];
        let result = analyze(&grid_obs(tiles, 3, 3, Position::new(1, 1)));
        assert_eq!(result.source, WalkSource::TileGrid);
        assert_eq!(result.walkable, vec![Direction::Down, Direction::Left]);
        assert_eq!(result.blocked, vec![Direction::Up, Direction::Right]);
        assert_eq!(result.special.get(&Direction::Left), Some(&SpecialTile::Door));

        let edge = analyze(&grid_obs(vec![tagged("NORMAL", 0); 4], 2, 2, Position::new(0, 0)));
        assert_eq!(edge.walkable, vec![Direction::Down, Direction::Right]);
        assert_eq!(edge.blocked, vec![Direction::Up, Direction::Left]);
    }

    #[test]
    fn unknown_behavior_uses_collision_flag() {
        assert_eq!(classify_behavior(Some("MYSTERY"), 0), TileClass::Walkable(None));
        assert_eq!(classify_behavior(Some("MYSTERY"), 1), TileClass::Blocked);
        assert_eq!(classify_behavior(None, 0), TileClass::Walkable(None));
        assert_eq!(
            classify_behavior(Some("tall_grass"), 1),
            TileClass::Walkable(Some(SpecialTile::Grass))
        );
    }

    #[test]
    fn ascii_map_reads_neighbors_of_player_marker() {
        let mut obs = Observation::default();
        obs.state.map.ascii = Some("# # #\n. P D\n# N #\n".to_string());
        let result = analyze(&obs);
        assert_eq!(result.source, WalkSource::Ascii);
        assert_eq!(result.walkable, vec![Direction::Left, Direction::Right]);
        assert_eq!(result.blocked, vec![Direction::Up, Direction::Down]);
        assert_eq!(result.special.get(&Direction::Right), Some(&SpecialTile::Door));
    }

    #[test]
    fn all_blocked_grid_is_kept_when_nothing_else_walks() {
        let result = analyze(&grid_obs(vec![tagged("WALL", 1); 9], 3, 3, Position::new(1, 1)));
        assert_eq!(result.source, WalkSource::TileGrid);
        assert!(result.walkable.is_empty());
        assert_eq!(result.blocked.len(), 4);
    }

    #[test]
    fn empty_observation_is_unknown() {
        assert_eq!(analyze(&Observation::default()), Walkability::unknown());
    }

    #[test]
    fn compact_ascii_rows_are_split_per_character() {
        let grid = AsciiGrid::parse("#.#\n.P.\n");
        assert_eq!(grid.find('P'), Some(Position::new(1, 1)));
        assert_eq!(grid.get(Position::new(0, 0)), Some('#'));
        assert_eq!(grid.get(Position::new(5, 0)), None);
    }
}
