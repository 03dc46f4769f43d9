//! Target selection for navigation-flavored goals.

use super::memory::ExploredMap;
use super::types::{Direction, Position};
use super::walkability::{AsciiGrid, SpecialTile};

const NAVIGATION_KEYWORDS: &[&str] = &[
    "go",
    "upstairs",
    "downstairs",
    "exit",
    "leave",
    "enter",
    "find",
    "reach",
];

/// Keyword heuristic over a goal description.
pub fn is_navigation_goal(description: &str) -> bool {
    let lower = description.to_lowercase();
    NAVIGATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Tile kinds to look for, most preferred first.
pub fn target_kinds(description: &str) -> &'static [SpecialTile] {
    let lower = description.to_lowercase();
    if lower.contains("upstairs") || lower.contains("downstairs") || lower.contains("stairs") {
        &[SpecialTile::Stairs, SpecialTile::Door]
    } else if lower.contains("exit") || lower.contains("leave") {
        &[SpecialTile::Door]
    } else {
        &[SpecialTile::Door, SpecialTile::Stairs]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub position: Position,
    pub kind: SpecialTile,
    pub distance: i64,
    pub direction: Direction,
}

/// Single cardinal step toward `to`; horizontal only when `|dx| > |dy|`.
pub fn direction_toward(from: Position, to: Position) -> Option<Direction> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0 && dy == 0 {
        return None;
    }
    Some(if dx.abs() > dy.abs() {
        if dx > 0 { Direction::Right } else { Direction::Left }
    } else if dy > 0 {
        Direction::Down
    } else {
        Direction::Up
    })
}

/// Inputs for [`find_target`].
#[derive(Debug, Clone, Copy)]
pub struct TargetQuery<'a> {
    pub goal_description: &'a str,
    pub player: Position,
    pub explored: Option<&'a ExploredMap>,
    /// Where the current map was entered; tiles within 1 of it are skipped.
    pub entry: Option<Position>,
    pub ascii: Option<&'a AsciiGrid>,
}

/// Nearest preferred special tile, from explored memory first, then the ASCII view.
pub fn find_target(query: &TargetQuery<'_>) -> Option<Target> {
    if !is_navigation_goal(query.goal_description) {
        return None;
    }
    for kind in target_kinds(query.goal_description) {
        let from_memory = query
            .explored
            .map(|map| map.find(&[kind.symbol()]))
            .unwrap_or_default();
        if let Some(target) = nearest(query, *kind, from_memory) {
            return Some(target);
        }
    }
    let grid = query.ascii?;
    let marker = grid.find('P')?;
    for kind in target_kinds(query.goal_description) {
        let candidates = grid
            .cells()
            .filter(|(_, c)| *c == kind.symbol())
            .map(|(cell, _)| {
                Position::new(
                    query.player.x + cell.x - marker.x,
                    query.player.y + cell.y - marker.y,
                )
            })
            .collect();
        if let Some(target) = nearest(query, *kind, candidates) {
            return Some(target);
        }
    }
    None
}

fn nearest(query: &TargetQuery<'_>, kind: SpecialTile, candidates: Vec<Position>) -> Option<Target> {
    candidates
        .into_iter()
        .filter(|pos| *pos != query.player)
        .filter(|pos| query.entry.is_none_or(|entry| pos.manhattan(entry) > 1))
        .filter_map(|pos| {
            direction_toward(query.player, pos).map(|direction| Target {
                position: pos,
                kind,
                distance: pos.manhattan(query.player),
                direction,
            })
        })
        .min_by_key(|t| t.distance)
}
