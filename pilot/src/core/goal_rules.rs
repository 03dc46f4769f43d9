//! Declarative per-goal rules and the interpreters that apply them.
//!
//! Each entry in [`GOAL_RULES`] may carry:
//! - completion predicates, evaluated before the generic cue fallback,
//! - a scripted burst queued once when the player stands on a trigger tile,
//! - navigation directives consumed by the decision engine.
//!
//! Goals without an entry complete on their `completion_cues` alone.

use std::collections::BTreeSet;

use super::action_queue::ActionQueue;
use super::goals::{CompletionOutcome, GoalTracker};
use super::types::{Button, Direction, KeyValue, Position, SceneResult, SceneType};

/// A single condition over the facts visible this step.
#[derive(Debug, Clone, Copy)]
pub enum Check {
    Scene(SceneType),
    /// Summary or key elements contain any of the phrases.
    TextAny(&'static [&'static str]),
    /// Reported location contains any of the tokens.
    LocationAny(&'static [&'static str]),
    /// Reported location contains none of the tokens.
    LocationNone(&'static [&'static str]),
    PartyAtLeast(usize),
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptedBurst {
    /// Trigger tile; `None` fires on any MAP step.
    pub at: Option<Position>,
    pub buttons: &'static [Button],
}

/// Fixed move taken when the scene summary contains every word of any group.
#[derive(Debug, Clone, Copy)]
pub struct SummaryDirective {
    pub keywords: &'static [&'static [&'static str]],
    pub direction: Direction,
}

impl SummaryDirective {
    /// `summary` must already be lowercase.
    pub fn matches(&self, summary: &str) -> bool {
        self.keywords
            .iter()
            .any(|group| group.iter().all(|k| summary.contains(k)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GoalRules {
    pub goal_id: &'static str,
    /// Any inner list whose checks all hold completes the goal.
    pub completes_when: &'static [&'static [Check]],
    /// Whether generic cue matching runs when no predicate fired.
    pub cue_fallback: bool,
    pub burst: Option<ScriptedBurst>,
    /// The only direction allowed while this goal is active.
    pub forced_direction: Option<Direction>,
    pub summary_directive: Option<SummaryDirective>,
    /// Oracle replies are cut to one action.
    pub single_action: bool,
}

const BASE: GoalRules = GoalRules {
    goal_id: "",
    completes_when: &[],
    cue_fallback: true,
    burst: None,
    forced_direction: None,
    summary_directive: None,
    single_action: false,
};

const TRUCK_EXIT: SummaryDirective = SummaryDirective {
    keywords: &[&["truck"], &["box", "storage"]],
    direction: Direction::Right,
};

pub static GOAL_RULES: &[GoalRules] = &[
    GoalRules {
        goal_id: "start_game",
        completes_when: &[
            &[
                Check::Scene(SceneType::Map),
                Check::TextAny(&["truck", "moving box"]),
            ],
            &[
                Check::Scene(SceneType::Map),
                Check::TextAny(&["your very own adventure", "well, i'll be expecting you"]),
            ],
        ],
        cue_fallback: false,
        summary_directive: Some(TRUCK_EXIT),
        single_action: true,
        ..BASE
    },
    GoalRules {
        goal_id: "leave_the_truck",
        completes_when: &[&[
            Check::LocationAny(&["house"]),
            Check::LocationNone(&["truck"]),
        ]],
        summary_directive: Some(TRUCK_EXIT),
        single_action: true,
        ..BASE
    },
    GoalRules {
        goal_id: "go_upstairs",
        completes_when: &[&[Check::LocationAny(&["2f"])]],
        cue_fallback: false,
        forced_direction: Some(Direction::Up),
        ..BASE
    },
    GoalRules {
        goal_id: "player_bedroom_entered",
        completes_when: &[&[
            Check::LocationAny(&["2f"]),
            Check::TextAny(&["this is your room", "your bedroom", "nintendo gamecube"]),
        ]],
        cue_fallback: false,
        burst: Some(ScriptedBurst {
            at: Some(Position::new(7, 2)),
            buttons: &[Button::Left, Button::Left, Button::Up, Button::A, Button::A],
        }),
        single_action: true,
        ..BASE
    },
    GoalRules {
        goal_id: "set_bedroom_clock",
        completes_when: &[&[Check::TextAny(&["clock is set", "set the time", "better set it"])]],
        burst: Some(ScriptedBurst {
            at: Some(Position::new(5, 2)),
            buttons: &[
                Button::A,
                Button::Up,
                Button::A,
                Button::Up,
                Button::A,
                Button::Up,
                Button::A,
                Button::Up,
            ],
        }),
        single_action: true,
        ..BASE
    },
    GoalRules {
        goal_id: "return_downstairs",
        completes_when: &[&[Check::LocationAny(&["1f"])]],
        burst: Some(ScriptedBurst {
            at: None,
            buttons: &[
                Button::Right,
                Button::Down,
                Button::Down,
                Button::Down,
                Button::Down,
            ],
        }),
        ..BASE
    },
    GoalRules {
        goal_id: "exit_player_house",
        completes_when: &[&[
            Check::LocationAny(&["littleroot town"]),
            Check::LocationNone(&["house"]),
        ]],
        cue_fallback: false,
        ..BASE
    },
    GoalRules {
        goal_id: "go_to_birch_lab",
        completes_when: &[&[Check::LocationAny(&["lab"]), Check::LocationAny(&["birch"])]],
        cue_fallback: false,
        ..BASE
    },
    GoalRules {
        goal_id: "find_route_101",
        completes_when: &[&[Check::LocationAny(&["route 101", "route101"])]],
        ..BASE
    },
    GoalRules {
        goal_id: "find_professor_birch",
        completes_when: &[&[
            Check::TextAny(&["professor"]),
            Check::TextAny(&["help", "pokemon", "birch"]),
        ]],
        cue_fallback: false,
        ..BASE
    },
    GoalRules {
        goal_id: "choose_starter",
        completes_when: &[&[Check::PartyAtLeast(1)]],
        ..BASE
    },
];

pub fn rules_for(goal_id: &str) -> Option<&'static GoalRules> {
    GOAL_RULES.iter().find(|r| r.goal_id == goal_id)
}

/// Facts the predicates are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct GoalContext<'a> {
    pub scene: &'a SceneResult,
    pub location: Option<&'a str>,
    pub position: Option<Position>,
    pub party_size: usize,
}

impl GoalContext<'_> {
    fn location_lower(&self) -> String {
        let from_scene = self.scene.key_elements.get("location").and_then(|v| match v {
            KeyValue::Text(s) => Some(s.as_str()),
            _ => None,
        });
        self.location
            .or(from_scene)
            .unwrap_or_default()
            .to_lowercase()
    }
}

struct Facts {
    scene: SceneType,
    text: String,
    location: String,
    party_size: usize,
}

impl Check {
    fn holds(&self, facts: &Facts) -> bool {
        match self {
            Check::Scene(scene) => facts.scene == *scene,
            Check::TextAny(phrases) => phrases.iter().any(|p| facts.text.contains(p)),
            Check::LocationAny(tokens) => tokens.iter().any(|t| facts.location.contains(t)),
            Check::LocationNone(tokens) => !tokens.iter().any(|t| facts.location.contains(t)),
            Check::PartyAtLeast(n) => facts.party_size >= *n,
        }
    }
}

/// Completes the active goal when its predicate or cue fallback is satisfied.
///
/// Returns `None` when nothing fired.
pub fn update_goal_status(
    tracker: &mut GoalTracker,
    ctx: &GoalContext<'_>,
) -> Option<CompletionOutcome> {
    let goal = tracker.get_active_goal()?.clone();
    let facts = Facts {
        scene: ctx.scene.scene_type,
        text: ctx.scene.searchable_text(),
        location: ctx.location_lower(),
        party_size: ctx.party_size,
    };

    if let Some(rules) = rules_for(&goal.id) {
        let fired = rules
            .completes_when
            .iter()
            .any(|all| all.iter().all(|check| check.holds(&facts)));
        if fired {
            return Some(tracker.complete_current_goal(&goal.id));
        }
        if !rules.cue_fallback {
            return None;
        }
    }

    let cue_hit = goal.completion_cues.iter().any(|cue| {
        let cue = cue.trim().to_lowercase();
        !cue.is_empty() && facts.text.contains(&cue)
    });
    cue_hit.then(|| tracker.complete_current_goal(&goal.id))
}

/// A burst that was queued this step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstFired {
    pub goal_id: String,
    pub buttons: Vec<Button>,
    pub completion: CompletionOutcome,
}

/// Queues the active goal's scripted burst once, when its trigger matches.
///
/// `fired` holds the goal ids whose bursts already ran in this process.
pub fn run_scripted_burst(
    tracker: &mut GoalTracker,
    ctx: &GoalContext<'_>,
    fired: &mut BTreeSet<String>,
    queue: &mut ActionQueue,
) -> Option<BurstFired> {
    if ctx.scene.scene_type != SceneType::Map {
        return None;
    }
    let goal_id = tracker.get_active_goal()?.id.clone();
    let burst = rules_for(&goal_id)?.burst?;
    if fired.contains(&goal_id) {
        return None;
    }
    if let Some(at) = burst.at
        && ctx.position != Some(at)
    {
        return None;
    }

    queue.enqueue_buttons(burst.buttons);
    fired.insert(goal_id.clone());
    let completion = tracker.complete_current_goal(&goal_id);
    Some(BurstFired {
        goal_id,
        buttons: burst.buttons.to_vec(),
        completion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::goals::Goal;
    use crate::core::plan::default_plan;

    fn tracker_at(goal_id: &str) -> GoalTracker {
        let mut tracker = GoalTracker::new(default_plan());
        while tracker.get_active_goal().map(|g| g.id.as_str()) != Some(goal_id) {
            let id = tracker.current_id().map(str::to_string).expect("active goal");
            assert!(tracker.complete_current_goal(&id).is_completed());
        }
        tracker
    }

    fn ctx<'a>(scene: &'a SceneResult, location: Option<&'a str>) -> GoalContext<'a> {
        GoalContext {
            scene,
            location,
            position: None,
            party_size: 0,
        }
    }

    /// Verifies dialogue mentioning "upstairs" cannot complete a floor-gated goal.
    #[test]
    fn floor_goal_ignores_incidental_keywords() {
        let mut tracker = tracker_at("go_upstairs");
        let scene = SceneResult::new(
            SceneType::Dialogue,
            "MOM: Your room is upstairs, on the second floor!",
        );
        assert_eq!(
            update_goal_status(&mut tracker, &ctx(&scene, Some("BRENDANS HOUSE 1F"))),
            None
        );
        assert_eq!(tracker.current_id(), Some("go_upstairs"));

        let map = SceneResult::new(SceneType::Map, "BRENDANS HOUSE 2F (7,1)");
        let outcome = update_goal_status(&mut tracker, &ctx(&map, Some("BRENDANS HOUSE 2F")));
        assert!(outcome.is_some_and(|o| o.is_completed()));
        assert_eq!(tracker.current_id(), Some("player_bedroom_entered"));
    }

    #[test]
    fn start_game_requires_map_scene() {
        let mut tracker = tracker_at("start_game");
        let dialogue = SceneResult::new(SceneType::Dialogue, "Inside the moving truck");
        assert_eq!(update_goal_status(&mut tracker, &ctx(&dialogue, None)), None);
        let map = SceneResult::new(SceneType::Map, "INSIDE OF TRUCK (1,1)");
        assert!(update_goal_status(&mut tracker, &ctx(&map, None)).is_some());
        assert_eq!(tracker.current_id(), Some("leave_the_truck"));
    }

    #[test]
    fn generic_cues_apply_to_goals_without_rules() {
        let mut tracker = GoalTracker::new(vec![Goal::new("visit", "Visit", &["Oldale Town"])]);
        let scene = SceneResult::new(SceneType::Map, "Welcome to OLDALE TOWN");
        assert!(update_goal_status(&mut tracker, &ctx(&scene, None)).is_some());
        assert!(tracker.is_finished());
    }

    #[test]
    fn exit_house_requires_town_outside_house() {
        let mut tracker = tracker_at("exit_player_house");
        let scene = SceneResult::new(SceneType::Map, "somewhere");
        assert_eq!(
            update_goal_status(&mut tracker, &ctx(&scene, Some("LITTLEROOT TOWN BRENDANS HOUSE 1F"))),
            None
        );
        assert!(
            update_goal_status(&mut tracker, &ctx(&scene, Some("LITTLEROOT TOWN")))
                .is_some_and(|o| o.is_completed())
        );
    }

    #[test]
    fn party_threshold_completes_starter_goal() {
        let mut tracker = tracker_at("choose_starter");
        let scene = SceneResult::new(SceneType::Map, "ROUTE 101 (7,12)");
        let mut context = ctx(&scene, None);
        assert_eq!(update_goal_status(&mut tracker, &context), None);
        context.party_size = 1;
        assert!(update_goal_status(&mut tracker, &context).is_some());
    }

    /// Verifies a burst fires once on its trigger tile and completes the goal.
    #[test]
    fn burst_fires_once_on_trigger_tile() {
        let mut tracker = tracker_at("player_bedroom_entered");
        let mut fired = BTreeSet::new();
        let mut queue = ActionQueue::new();
        let scene = SceneResult::new(SceneType::Map, "BRENDANS HOUSE 2F (6,2)");
        let mut context = ctx(&scene, Some("BRENDANS HOUSE 2F"));
        context.position = Some(Position::new(6, 2));

        assert_eq!(
            run_scripted_burst(&mut tracker, &context, &mut fired, &mut queue),
            None
        );
        assert!(queue.is_empty());

        context.position = Some(Position::new(7, 2));
        let burst = run_scripted_burst(&mut tracker, &context, &mut fired, &mut queue)
            .expect("burst fires");
        assert_eq!(burst.goal_id, "player_bedroom_entered");
        assert!(burst.completion.is_completed());
        assert_eq!(
            queue.iter().collect::<Vec<_>>(),
            vec![Button::Left, Button::Left, Button::Up, Button::A, Button::A]
        );
        assert_eq!(tracker.current_id(), Some("set_bedroom_clock"));
        assert!(fired.contains("player_bedroom_entered"));
    }

    #[test]
    fn unguarded_burst_fires_on_any_map_step_but_not_in_dialogue() {
        let mut tracker = tracker_at("return_downstairs");
        let mut fired = BTreeSet::new();
        let mut queue = ActionQueue::new();
        let dialogue = SceneResult::new(SceneType::Dialogue, "The clock is set.");
        assert_eq!(
            run_scripted_burst(&mut tracker, &ctx(&dialogue, None), &mut fired, &mut queue),
            None
        );
        let map = SceneResult::new(SceneType::Map, "BRENDANS HOUSE 2F (5,2)");
        assert!(run_scripted_burst(&mut tracker, &ctx(&map, None), &mut fired, &mut queue).is_some());
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn truck_directive_needs_truck_or_storage_box() {
        let directive = rules_for("leave_the_truck")
            .and_then(|r| r.summary_directive)
            .expect("directive");
        assert!(directive.matches("inside of truck"));
        assert!(directive.matches("dark room full of storage boxes"));
        assert!(!directive.matches("a box of items on the table"));
        assert!(!directive.matches("storage room"));
        assert_eq!(directive.direction, Direction::Right);
    }

    #[test]
    fn every_rule_names_a_default_goal() {
        let plan = default_plan();
        for rule in GOAL_RULES {
            assert!(
                plan.iter().any(|g| g.id == rule.goal_id),
                "rule for unknown goal {}",
                rule.goal_id
            );
        }
    }
}
