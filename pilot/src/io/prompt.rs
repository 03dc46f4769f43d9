//! Oracle prompt rendering.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::navigation::Target;
use crate::core::types::{Direction, Position};
use crate::core::walkability::Walkability;

const PERCEPTION_TEMPLATE: &str = include_str!("prompts/perception.md");
const NAVIGATION_TEMPLATE: &str = include_str!("prompts/navigation.md");

/// Inputs for the navigation prompt.
#[derive(Debug, Clone)]
pub struct NavigationInputs<'a> {
    pub goal: &'a str,
    pub summary: &'a str,
    pub location: Option<&'a str>,
    pub position: Option<Position>,
    pub walkability: &'a Walkability,
    pub movement_memory: Option<String>,
    pub target: Option<&'a Target>,
    pub allow_multi: bool,
    pub max_actions: usize,
}

#[derive(Debug, Serialize)]
struct TargetContext {
    direction: &'static str,
    kind: &'static str,
    position: String,
    distance: i64,
}

impl TargetContext {
    fn from_target(target: &Target) -> Self {
        Self {
            direction: target.direction.as_str(),
            kind: target.kind.as_str(),
            position: target.position.to_string(),
            distance: target.distance,
        }
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("perception", PERCEPTION_TEMPLATE)
            .context("load perception template")?;
        env.add_template("navigation", NAVIGATION_TEMPLATE)
            .context("load navigation template")?;
        Ok(Self { env })
    }

    /// Fixed-format scene classification prompt.
    pub fn render_perception(&self) -> Result<String> {
        let template = self.env.get_template("perception")?;
        Ok(template.render(context! {})?)
    }

    pub fn render_navigation(&self, input: &NavigationInputs<'_>) -> Result<String> {
        let names = |dirs: &[Direction]| dirs.iter().map(|d| d.as_str()).collect::<Vec<_>>();
        let special: Vec<String> = input
            .walkability
            .special
            .iter()
            .map(|(dir, kind)| format!("{} {}", kind.as_str(), dir.as_str()))
            .collect();
        let template = self.env.get_template("navigation")?;
        let rendered = template.render(context! {
            goal => input.goal.trim(),
            summary => input.summary.trim(),
            location => input.location,
            position => input.position.map(|p| p.to_string()),
            walkable => names(&input.walkability.walkable),
            blocked => names(&input.walkability.blocked),
            special => special,
            movement_memory => input.movement_memory.as_deref(),
            target => input.target.map(TargetContext::from_target),
            allow_multi => input.allow_multi,
            max_actions => input.max_actions,
        })?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::walkability::{SpecialTile, WalkSource};

    fn walkability() -> Walkability {
        let mut walk = Walkability::unknown();
        walk.source = WalkSource::TileGrid;
        walk.walkable = vec![Direction::Up, Direction::Right];
        walk.blocked = vec![Direction::Left];
        walk.special.insert(Direction::Up, SpecialTile::Stairs);
        walk
    }

    #[test]
    fn perception_prompt_asks_for_three_lines() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine.render_perception().expect("render");
        assert!(prompt.contains("SceneType: <MAP|BATTLE|MENU|DIALOGUE|CUTSCENE|TITLE>"));
        assert!(prompt.contains("KeyElements:"));
    }

    #[test]
    fn navigation_prompt_lists_walkability_memory_and_target() {
        let engine = PromptEngine::new().expect("engine");
        let walk = walkability();
        let target = Target {
            position: Position::new(4, 1),
            kind: SpecialTile::Stairs,
            distance: 3,
            direction: Direction::Up,
        };
        let prompt = engine
            .render_navigation(&NavigationInputs {
                goal: "Go upstairs to the bedroom",
                summary: "HOUSE 1F (4,4)",
                location: Some("HOUSE 1F"),
                position: Some(Position::new(4, 4)),
                walkability: &walk,
                movement_memory: Some("MOVEMENT MEMORY: At (4,4) previously failed: LEFT".into()),
                target: Some(&target),
                allow_multi: true,
                max_actions: 3,
            })
            .expect("render");
        assert!(prompt.contains("Goal: Go upstairs to the bedroom"));
        assert!(prompt.contains("Location: HOUSE 1F (4,4)"));
        assert!(prompt.contains("Walkable: UP, RIGHT"));
        assert!(prompt.contains("Blocked: LEFT"));
        assert!(prompt.contains("Special tiles: stairs UP"));
        assert!(prompt.contains("previously failed: LEFT"));
        assert!(prompt.contains("Recommended: move UP toward the stairs at (4,1)"));
        assert!(prompt.contains("up to 3 actions"));
    }

    #[test]
    fn single_action_prompt_without_optional_sections() {
        let engine = PromptEngine::new().expect("engine");
        let walk = Walkability::unknown();
        let prompt = engine
            .render_navigation(&NavigationInputs {
                goal: "Leave the truck",
                summary: "Overworld",
                location: None,
                position: None,
                walkability: &walk,
                movement_memory: None,
                target: None,
                allow_multi: false,
                max_actions: 3,
            })
            .expect("render");
        assert!(prompt.contains("Walkable: none known"));
        assert!(prompt.contains("exactly one action"));
        assert!(!prompt.contains("Recommended"));
        assert!(!prompt.contains("Location:"));
    }
}
