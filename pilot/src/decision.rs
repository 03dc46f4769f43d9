//! Per-step arbiter that turns a classified scene into one committed action.
//!
//! Paths are evaluated in a fixed order and the first match wins:
//! battle, title, dialogue/cutscene (with escalation), post-dialogue escape,
//! queued actions, ambiguous scenes, naming screen, map navigation. Only the
//! navigation path may consult the oracle.

use std::collections::BTreeSet;
use std::ops::Range;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::core::action_queue::ActionQueue;
use crate::core::goal_rules::{GoalRules, rules_for};
use crate::core::goals::{Goal, GoalTracker};
use crate::core::memory::AgentMemory;
use crate::core::navigation::{Target, TargetQuery, find_target};
use crate::core::observation::Observation;
use crate::core::reply::parse_action_reply;
use crate::core::types::{Action, Button, Direction, SceneResult, SceneType};
use crate::core::walkability::{AsciiGrid, WalkSource, Walkability, analyze};
use crate::io::config::{DialogueConfig, NavigationConfig};
use crate::io::oracle::Oracle;
use crate::io::prompt::{NavigationInputs, PromptEngine};

pub const NAVIGATION_MODULE: &str = "navigation";

/// Order tried when stepping away from a just-dismissed dialogue.
pub const ESCAPE_ORDER: [Direction; 4] = [
    Direction::Right,
    Direction::Down,
    Direction::Left,
    Direction::Up,
];

const TITLE_KEYWORDS: &[&str] = &["press start", "main menu", "new game", "continue"];
const NAMING_KEYWORDS: &[&str] = &[
    "name",
    "naming",
    "nickname",
    "keyboard",
    "character",
    "enter",
    "input",
];
const NAMING_BURST: &[Button] = &[Button::A, Button::A, Button::A, Button::Start];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Battle,
    Title,
    TitleFallback,
    Dialogue,
    DialogueQueue,
    DialogueEscalationB,
    DialogueEscalationStart,
    Queued,
    Naming,
    TruckExit,
    ValidatedNavigation,
    OracleUnavailable,
    Ambiguous,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Battle => "battle",
            Reason::Title => "title",
            Reason::TitleFallback => "title_fallback",
            Reason::Dialogue => "dialogue",
            Reason::DialogueQueue => "dialogue_queue",
            Reason::DialogueEscalationB => "dialogue_escalation_b",
            Reason::DialogueEscalationStart => "dialogue_escalation_start",
            Reason::Queued => "queued",
            Reason::Naming => "naming",
            Reason::TruckExit => "truck_exit",
            Reason::ValidatedNavigation => "validated_navigation",
            Reason::OracleUnavailable => "oracle_unavailable",
            Reason::Ambiguous => "ambiguous",
        }
    }
}

/// The committed action for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub reason: Reason,
    /// Tokens queued by this decision for later steps.
    pub followups: Vec<Button>,
    pub oracle_called: bool,
}

impl Decision {
    fn new(action: impl Into<Action>, reason: Reason) -> Self {
        Self {
            action: action.into(),
            reason,
            followups: Vec::new(),
            oracle_called: false,
        }
    }

    fn with_followups(mut self, followups: Vec<Button>) -> Self {
        self.followups = followups;
        self
    }
}

/// Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeFlags {
    /// Consecutive dialogue-like steps, reset on any other scene.
    pub dialogue_streak: u32,
    pub last_scene: Option<SceneType>,
    pub post_dialogue_escape_done: bool,
    /// Queue batch of the A presses queued on entering the current dialogue.
    pub dialogue_burst: Option<Range<u64>>,
    pub title_burst_done: bool,
    /// Goals whose scripted burst already ran.
    pub bursts_fired: BTreeSet<String>,
}

/// Single-entry memo of the last oracle-driven move.
#[derive(Debug, Clone, Default)]
pub struct DecisionCache {
    entry: Option<(String, Vec<Button>)>,
}

impl DecisionCache {
    pub fn get(&self, key: &str) -> Option<&[Button]> {
        self.entry
            .as_ref()
            .filter(|(stored, _)| stored == key)
            .map(|(_, actions)| actions.as_slice())
    }

    pub fn store(&mut self, key: String, actions: Vec<Button>) {
        self.entry = Some((key, actions));
    }
}

/// Cache key over scene, summary, active goal and remembered-state keys.
pub fn decision_key(scene: &SceneResult, goal_id: Option<&str>, memory_keys: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scene.scene_type.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(scene.summary.as_bytes());
    hasher.update(b"|");
    hasher.update(goal_id.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(memory_keys.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

/// Everything the engine mutates across steps.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub tracker: GoalTracker,
    pub queue: ActionQueue,
    pub memory: AgentMemory,
    pub flags: RuntimeFlags,
    pub cache: DecisionCache,
}

impl EngineState {
    pub fn new(tracker: GoalTracker, memory: AgentMemory) -> Self {
        Self {
            tracker,
            queue: ActionQueue::new(),
            memory,
            flags: RuntimeFlags::default(),
            cache: DecisionCache::default(),
        }
    }
}

/// Read-only inputs for one decision.
pub struct DecisionInputs<'a> {
    pub obs: &'a Observation,
    pub scene: &'a SceneResult,
    pub dialogue: &'a DialogueConfig,
    pub navigation: &'a NavigationConfig,
    pub oracle: &'a dyn Oracle,
    pub prompts: &'a PromptEngine,
}

pub fn decide(input: &DecisionInputs<'_>, state: &mut EngineState) -> Decision {
    let scene = input.scene.scene_type;
    let previous = state.flags.last_scene.replace(scene);
    let was_dialogue = previous.is_some_and(SceneType::is_dialogue_like);
    if scene.is_dialogue_like() {
        state.flags.dialogue_streak = state.flags.dialogue_streak.saturating_add(1);
    } else {
        state.flags.dialogue_streak = 0;
    }

    match scene {
        SceneType::Battle => return Decision::new(Button::A, Reason::Battle),
        SceneType::Title => return title(input, state),
        SceneType::Dialogue | SceneType::Cutscene => return dialogue(input, state, was_dialogue),
        _ => {}
    }

    let walk = analyze(input.obs);
    let mut followups = Vec::new();
    if scene == SceneType::Map && was_dialogue && !state.flags.post_dialogue_escape_done {
        state.flags.post_dialogue_escape_done = true;
        if let Some(batch) = state.flags.dialogue_burst.take() {
            let dropped = state.queue.discard(&batch);
            if dropped > 0 {
                debug!(dropped, "dropped leftover dialogue presses");
            }
        }
        if let Some(escape) = ESCAPE_ORDER.into_iter().find(|d| walk.is_walkable(*d)) {
            debug!(direction = escape.as_str(), "queued post-dialogue escape");
            state.queue.enqueue_buttons(&[escape.button()]);
            followups.push(escape.button());
        }
    }

    if let Some(button) = next_queued(input, state, &walk) {
        return Decision::new(button, Reason::Queued).with_followups(followups);
    }

    if scene == SceneType::Unknown {
        let summary = input.scene.summary.to_lowercase();
        let reason = if TITLE_KEYWORDS.iter().any(|k| summary.contains(k)) {
            Reason::TitleFallback
        } else {
            Reason::Ambiguous
        };
        return Decision::new(Button::A, reason);
    }

    if scene == SceneType::Menu && !state.memory.naming_handled && is_naming_screen(input.scene) {
        info!("naming screen detected");
        state.memory.naming_handled = true;
        state.queue.enqueue_buttons(NAMING_BURST);
        return Decision::new(Button::Start, Reason::Naming).with_followups(NAMING_BURST.to_vec());
    }

    navigate(input, state, &walk)
}

fn title(input: &DecisionInputs<'_>, state: &mut EngineState) -> Decision {
    if state.flags.title_burst_done {
        return Decision::new(Button::A, Reason::Title);
    }
    state.flags.title_burst_done = true;
    let burst = vec![Button::A; input.dialogue.title_burst];
    state.queue.enqueue_buttons(&burst);
    Decision::new(Button::A, Reason::Title).with_followups(burst)
}

fn dialogue(input: &DecisionInputs<'_>, state: &mut EngineState, was_dialogue: bool) -> Decision {
    let streak = state.flags.dialogue_streak;
    let mut followups = Vec::new();
    if !was_dialogue {
        state.flags.post_dialogue_escape_done = false;
        followups = vec![Button::A; input.dialogue.entry_burst];
        state.flags.dialogue_burst = Some(state.queue.enqueue_buttons(&followups));
    }

    if streak > input.dialogue.start_threshold {
        warn!(streak, "dialogue stuck, pressing START");
        return Decision::new(Button::Start, Reason::DialogueEscalationStart)
            .with_followups(followups);
    }
    if streak > input.dialogue.b_threshold {
        debug!(streak, "dialogue persisting, pressing B");
        return Decision::new(Button::B, Reason::DialogueEscalationB).with_followups(followups);
    }
    match state.queue.pop() {
        Some(button) => Decision::new(button, Reason::DialogueQueue).with_followups(followups),
        None => Decision::new(Button::A, Reason::Dialogue).with_followups(followups),
    }
}

/// Pops the next queued button, discarding blocked moves when configured.
fn next_queued(input: &DecisionInputs<'_>, state: &mut EngineState, walk: &Walkability) -> Option<Button> {
    if input.navigation.validate_queued_moves && walk.source != WalkSource::Unknown {
        while let Some(head) = state.queue.peek() {
            match head.direction() {
                Some(direction) if !walk.is_walkable(direction) => {
                    debug!(direction = direction.as_str(), "skipping blocked queued move");
                    state.queue.skip();
                }
                _ => break,
            }
        }
    }
    state.queue.pop()
}

fn is_naming_screen(scene: &SceneResult) -> bool {
    let text = scene.searchable_text();
    NAMING_KEYWORDS.iter().any(|k| text.contains(k))
}

fn navigate(input: &DecisionInputs<'_>, state: &mut EngineState, walk: &Walkability) -> Decision {
    let goal = state.tracker.get_active_goal().cloned();
    let rules = goal.as_ref().and_then(|g| rules_for(&g.id));
    let movement_only = goal.as_ref().is_some_and(|g| g.movement_only);
    let failed = input
        .obs
        .position()
        .map(|pos| state.memory.movement.failures_at(pos).to_vec())
        .unwrap_or_default();
    let fallback_move = preferred_walkable(walk, &failed);

    if let Some(directive) = rules.and_then(|r| r.summary_directive) {
        let summary = input.scene.summary.to_lowercase();
        if directive.matches(&summary) {
            let action = final_check(directive.direction.into(), walk, fallback_move, movement_only);
            return Decision::new(action, Reason::TruckExit);
        }
    }

    let target = goal.as_ref().and_then(|g| locate_target(input.obs, &state.memory, g));
    let key = decision_key(
        input.scene,
        goal.as_ref().map(|g| g.id.as_str()),
        &state.memory.signature_keys(),
    );
    let cached = input
        .navigation
        .cache_decisions
        .then(|| state.cache.get(&key).map(<[Button]>::to_vec))
        .flatten();
    let oracle_called = cached.is_none();
    let actions = match cached {
        Some(actions) => {
            debug!("reusing cached navigation decision");
            actions
        }
        None => match ask_oracle(input, state, walk, goal.as_ref(), rules, target.as_ref()) {
            Some(actions) => {
                if input.navigation.cache_decisions {
                    state.cache.store(key, actions.clone());
                }
                actions
            }
            None => {
                let action = match fallback_move {
                    Some(direction) => Action::from(direction),
                    None if movement_only => Action::Wait,
                    None => Action::Press(Button::A),
                };
                let mut decision = Decision::new(action, Reason::OracleUnavailable);
                decision.oracle_called = true;
                return decision;
            }
        },
    };

    let Some((&first, rest)) = actions.split_first() else {
        let mut decision = Decision::new(Button::A, Reason::ValidatedNavigation);
        decision.oracle_called = oracle_called;
        return decision;
    };
    state.queue.enqueue_buttons(rest);

    let mut action = Action::Press(first);
    if movement_only && !first.is_direction() {
        match fallback_move {
            Some(direction) => action = direction.into(),
            None => {
                let mut decision = Decision::new(Action::Wait, Reason::ValidatedNavigation)
                    .with_followups(rest.to_vec());
                decision.oracle_called = oracle_called;
                return decision;
            }
        }
    }
    if let Some(forced) = rules.and_then(|r| r.forced_direction) {
        if action.direction() != Some(forced) {
            debug!(forced = forced.as_str(), proposed = action.as_str(), "forced direction");
        }
        action = forced.into();
    } else if let Some(target) = &target {
        let proposed = action.direction();
        let soft = proposed != Some(target.direction)
            && proposed.is_none_or(|d| walk.is_walkable(d))
            && walk.is_walkable(target.direction);
        if soft {
            debug!(target = target.direction.as_str(), proposed = action.as_str(), "steering toward target");
            action = target.direction.into();
        }
    }
    let action = final_check(action, walk, fallback_move, movement_only);

    let mut decision = Decision::new(action, Reason::ValidatedNavigation).with_followups(rest.to_vec());
    decision.oracle_called = oracle_called;
    decision
}

fn ask_oracle(
    input: &DecisionInputs<'_>,
    state: &EngineState,
    walk: &Walkability,
    goal: Option<&Goal>,
    rules: Option<&GoalRules>,
    target: Option<&Target>,
) -> Option<Vec<Button>> {
    let allow_multi = !rules.is_some_and(|r| r.single_action);
    let position = input.obs.position();
    let prompt = input.prompts.render_navigation(&NavigationInputs {
        goal: goal.map_or("Explore", |g| g.description.as_str()),
        summary: &input.scene.summary,
        location: input.obs.location(),
        position,
        walkability: walk,
        movement_memory: position.and_then(|pos| state.memory.movement.describe(pos)),
        target,
        allow_multi,
        max_actions: input.navigation.max_actions_per_reply,
    });
    let reply = prompt.and_then(|prompt| input.oracle.text_query(&prompt, NAVIGATION_MODULE));
    match reply {
        Ok(reply) => Some(parse_action_reply(
            &reply,
            allow_multi,
            input.navigation.max_actions_per_reply,
        )),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "navigation oracle failed");
            None
        }
    }
}

fn locate_target(obs: &Observation, memory: &AgentMemory, goal: &Goal) -> Option<Target> {
    let player = obs.position()?;
    let ascii = obs.state.map.ascii.as_deref().map(AsciiGrid::parse);
    let explored = obs
        .map_name()
        .or(obs.location())
        .and_then(|name| memory.explored_map(name));
    find_target(&TargetQuery {
        goal_description: &goal.description,
        player,
        explored,
        entry: obs.location().and_then(|loc| memory.entry_point(loc)),
        ascii: ascii.as_ref(),
    })
}

/// First walkable direction that has not failed here before, else the first walkable.
fn preferred_walkable(walk: &Walkability, failed: &[Direction]) -> Option<Direction> {
    walk.walkable
        .iter()
        .copied()
        .find(|d| !failed.contains(d))
        .or_else(|| walk.first_walkable())
}

/// Replaces a blocked move. Walkability that classified nothing is not
/// grounds for rejecting a move.
fn final_check(
    action: Action,
    walk: &Walkability,
    fallback: Option<Direction>,
    movement_only: bool,
) -> Action {
    let Some(direction) = action.direction() else {
        return action;
    };
    if walk.source == WalkSource::Unknown || walk.is_walkable(direction) {
        return action;
    }
    match fallback {
        Some(other) => other.into(),
        None if movement_only => Action::Wait,
        None => Action::Press(Button::A),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::goals::GoalStatus;
    use crate::core::observation::WalkableEntry;
    use crate::core::plan::default_plan;
    use crate::core::types::Position;
    use crate::io::config::AgentConfig;
    use crate::io::oracle::NoOracle;
    use crate::test_support::ScriptedOracle;

    fn state_at(goal_id: &str) -> EngineState {
        let mut tracker = GoalTracker::new(default_plan());
        while tracker.get_active_goal().map(|g| g.id.as_str()) != Some(goal_id) {
            let id = tracker.current_id().map(str::to_string).expect("active goal");
            tracker.complete_current_goal(&id);
        }
        EngineState::new(tracker, AgentMemory::default())
    }

    fn walkable_obs(dirs: &[Direction]) -> Observation {
        let mut obs = Observation::default();
        obs.state.player.position = Some(Position::new(4, 4));
        obs.state.player.location = Some("HOUSE 1F".into());
        for dir in Direction::ALL {
            obs.state
                .walkable
                .insert(dir.as_str().to_string(), WalkableEntry::Flag(dirs.contains(&dir)));
        }
        obs
    }

    fn run(
        obs: &Observation,
        scene: &SceneResult,
        oracle: &dyn Oracle,
        config: &AgentConfig,
        state: &mut EngineState,
    ) -> Decision {
        let prompts = PromptEngine::new().expect("prompts");
        decide(
            &DecisionInputs {
                obs,
                scene,
                dialogue: &config.dialogue,
                navigation: &config.navigation,
                oracle,
                prompts: &prompts,
            },
            state,
        )
    }

    #[test]
    fn battle_bypasses_queue() {
        let mut state = state_at("start_game");
        state.queue.enqueue_buttons(&[Button::Up]);
        let scene = SceneResult::new(SceneType::Battle, "Battle in progress");
        let decision = run(&Observation::default(), &scene, &NoOracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::A));
        assert_eq!(decision.reason, Reason::Battle);
        assert_eq!(state.queue.len(), 1);
    }

    #[test]
    fn title_burst_is_queued_once() {
        let mut state = state_at("start_game");
        let config = AgentConfig::default();
        let scene = SceneResult::new(SceneType::Title, "Main menu visible.");
        let first = run(&Observation::default(), &scene, &NoOracle, &config, &mut state);
        assert_eq!(first.reason, Reason::Title);
        assert_eq!(first.followups, vec![Button::A; 3]);
        let second = run(&Observation::default(), &scene, &NoOracle, &config, &mut state);
        assert!(second.followups.is_empty());
        assert_eq!(state.queue.len(), 3);
    }

    #[test]
    fn dialogue_entry_queues_a_burst_and_drains_it() {
        let mut state = state_at("start_game");
        let config = AgentConfig::default();
        let scene = SceneResult::new(SceneType::Dialogue, "Dialogue textbox visible.");
        let first = run(&Observation::default(), &scene, &NoOracle, &config, &mut state);
        assert_eq!(first.reason, Reason::DialogueQueue);
        assert_eq!(first.followups.len(), 4);
        assert_eq!(state.queue.len(), 3);
    }

    /// Verifies the post-dialogue escape follows the preferred order among walkable moves.
    #[test]
    fn leaving_dialogue_queues_one_escape_step() {
        let mut state = state_at("go_upstairs");
        let config = AgentConfig::default();
        let dialogue = SceneResult::new(SceneType::Dialogue, "Dialogue textbox visible.");
        run(&Observation::default(), &dialogue, &NoOracle, &config, &mut state);
        assert_eq!(state.queue.len(), config.dialogue.entry_burst - 1);

        let obs = walkable_obs(&[Direction::Up, Direction::Left]);
        let map = SceneResult::new(SceneType::Map, "HOUSE 1F (4,4)");
        let decision = run(&obs, &map, &NoOracle, &config, &mut state);
        assert_eq!(decision.action, Action::Press(Button::Left));
        assert_eq!(decision.reason, Reason::Queued);
        assert!(state.flags.post_dialogue_escape_done);
        assert!(state.queue.is_empty());
    }

    /// Verifies presses queued before the dialogue survive while the unused
    /// entry burst is dropped on exit.
    #[test]
    fn leaving_dialogue_keeps_earlier_queued_moves() {
        let mut state = state_at("go_upstairs");
        let config = AgentConfig::default();
        state.queue.enqueue_buttons(&[Button::Up, Button::Left]);
        let dialogue = SceneResult::new(SceneType::Dialogue, "Dialogue textbox visible.");
        let first = run(&Observation::default(), &dialogue, &NoOracle, &config, &mut state);
        assert_eq!(first.action, Action::Press(Button::Up));

        let obs = walkable_obs(&[Direction::Down]);
        let map = SceneResult::new(SceneType::Map, "HOUSE 1F (4,4)");
        let decision = run(&obs, &map, &NoOracle, &config, &mut state);
        assert_eq!(decision.action, Action::Press(Button::Left));
        assert_eq!(decision.reason, Reason::Queued);
        assert_eq!(state.queue.iter().collect::<Vec<_>>(), vec![Button::Down]);
        assert_eq!(state.flags.dialogue_burst, None);
    }

    #[test]
    fn unknown_scene_presses_a() {
        let mut state = state_at("start_game");
        let config = AgentConfig::default();
        let title_like = SceneResult::new(SceneType::Unknown, "PRESS START to begin");
        let decision = run(&Observation::default(), &title_like, &NoOracle, &config, &mut state);
        assert_eq!(decision.reason, Reason::TitleFallback);
        let other = SceneResult::new(SceneType::Unknown, "");
        let decision = run(&Observation::default(), &other, &NoOracle, &config, &mut state);
        assert_eq!(decision.action, Action::Press(Button::A));
        assert_eq!(decision.reason, Reason::Ambiguous);
    }

    #[test]
    fn naming_screen_is_handled_once() {
        let mut state = state_at("start_game");
        let config = AgentConfig::default();
        let scene = SceneResult::new(SceneType::Menu, "Keyboard to enter your name.");
        let decision = run(&Observation::default(), &scene, &NoOracle, &config, &mut state);
        assert_eq!(decision.action, Action::Press(Button::Start));
        assert_eq!(decision.reason, Reason::Naming);
        assert!(state.memory.naming_handled);
        assert_eq!(state.queue.iter().collect::<Vec<_>>(), NAMING_BURST);

        state.queue.clear();
        let again = run(&Observation::default(), &scene, &NoOracle, &config, &mut state);
        assert_ne!(again.reason, Reason::Naming);
    }

    #[test]
    fn oracle_failure_on_map_takes_first_walkable() {
        let mut state = state_at("find_route_101");
        let obs = walkable_obs(&[Direction::Down, Direction::Left]);
        let scene = SceneResult::new(SceneType::Map, "LITTLEROOT TOWN (4,4)");
        let decision = run(&obs, &scene, &NoOracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Down));
        assert_eq!(decision.reason, Reason::OracleUnavailable);
    }

    #[test]
    fn failed_moves_are_avoided_in_fallback() {
        let mut state = state_at("find_route_101");
        state
            .memory
            .movement
            .record_failure(Position::new(4, 4), Direction::Down);
        let obs = walkable_obs(&[Direction::Down, Direction::Left]);
        let scene = SceneResult::new(SceneType::Map, "LITTLEROOT TOWN (4,4)");
        let decision = run(&obs, &scene, &NoOracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Left));
    }

    #[test]
    fn extra_oracle_actions_are_queued() {
        let mut state = state_at("find_route_101");
        let obs = walkable_obs(&[Direction::Up, Direction::Right]);
        let scene = SceneResult::new(SceneType::Map, "LITTLEROOT TOWN (4,4)");
        let oracle = ScriptedOracle::new(["[\"RIGHT\", \"RIGHT\", \"UP\"]"]);
        let decision = run(&obs, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Right));
        assert_eq!(decision.followups, vec![Button::Right, Button::Up]);
        assert_eq!(state.queue.len(), 2);
        assert!(decision.oracle_called);
    }

    #[test]
    fn movement_only_goal_replaces_interaction() {
        let mut state = state_at("exit_player_house");
        assert!(state.tracker.current().is_some_and(|g| g.movement_only));
        let obs = walkable_obs(&[Direction::Left]);
        let scene = SceneResult::new(SceneType::Map, "HOUSE 1F (4,4)");
        let oracle = ScriptedOracle::new(["A"]);
        let decision = run(&obs, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Left));

        let mut state = state_at("exit_player_house");
        let boxed_in = walkable_obs(&[]);
        let oracle = ScriptedOracle::new(["A"]);
        let decision = run(&boxed_in, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Wait);
    }

    /// Verifies a loose box mention leaves the decision to the oracle.
    #[test]
    fn bare_box_mention_is_not_a_truck_exit() {
        let mut state = state_at("leave_the_truck");
        let obs = walkable_obs(&[Direction::Up, Direction::Right]);
        let scene = SceneResult::new(SceneType::Map, "A box of items on the floor.");
        let oracle = ScriptedOracle::new(["UP"]);
        let decision = run(&obs, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_ne!(decision.reason, Reason::TruckExit);
        assert!(decision.oracle_called);
        assert_eq!(decision.action, Action::Press(Button::Up));

        let mut state = state_at("leave_the_truck");
        let scene = SceneResult::new(SceneType::Map, "Storage boxes stacked high.");
        let decision = run(&obs, &scene, &NoOracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.reason, Reason::TruckExit);
        assert_eq!(decision.action, Action::Press(Button::Right));
    }

    #[test]
    fn blocked_move_is_never_returned() {
        let mut state = state_at("find_route_101");
        let obs = walkable_obs(&[Direction::Right]);
        let scene = SceneResult::new(SceneType::Map, "LITTLEROOT TOWN (4,4)");
        let oracle = ScriptedOracle::new(["LEFT"]);
        let decision = run(&obs, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Right));

        let mut state = state_at("find_route_101");
        let walled = walkable_obs(&[]);
        let oracle = ScriptedOracle::new(["LEFT"]);
        let decision = run(&walled, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::A));
    }

    /// Verifies an unchanged context reuses the cached reply instead of asking again.
    #[test]
    fn identical_context_hits_the_cache() {
        let mut state = state_at("find_route_101");
        let obs = walkable_obs(&[Direction::Up, Direction::Right]);
        let scene = SceneResult::new(SceneType::Map, "LITTLEROOT TOWN (4,4)");
        let oracle = ScriptedOracle::new(["RIGHT", "UP"]);
        let config = AgentConfig::default();
        let first = run(&obs, &scene, &oracle, &config, &mut state);
        let second = run(&obs, &scene, &oracle, &config, &mut state);
        assert_eq!(first.action, Action::Press(Button::Right));
        assert_eq!(second.action, Action::Press(Button::Right));
        assert!(!second.oracle_called);
        assert_eq!(oracle.calls().len(), 1);
    }

    #[test]
    fn soft_override_steers_toward_target() {
        let mut state = state_at("find_route_101");
        state
            .memory
            .explored
            .entry("HOUSE 1F".into())
            .or_default()
            .merge([(Position::new(8, 4), 'D')], 10, 10);
        let obs = walkable_obs(&[Direction::Up, Direction::Right]);
        let scene = SceneResult::new(SceneType::Map, "HOUSE 1F (4,4)");
        let oracle = ScriptedOracle::new(["A"]);
        let decision = run(&obs, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Right));
        assert_eq!(decision.reason, Reason::ValidatedNavigation);
    }

    #[test]
    fn forced_direction_overrides_oracle() {
        let mut state = state_at("go_upstairs");
        let obs = walkable_obs(&[Direction::Up, Direction::Down]);
        let scene = SceneResult::new(SceneType::Map, "HOUSE 1F (4,4)");
        let oracle = ScriptedOracle::new(["DOWN"]);
        let decision = run(&obs, &scene, &oracle, &AgentConfig::default(), &mut state);
        assert_eq!(decision.action, Action::Press(Button::Up));
        assert_eq!(state.tracker.goals()[0].status, GoalStatus::Completed);
    }

    #[test]
    fn validated_queue_skips_blocked_moves() {
        let mut state = state_at("find_route_101");
        state.queue.enqueue_buttons(&[Button::Left, Button::Up]);
        let mut config = AgentConfig::default();
        config.navigation.validate_queued_moves = true;
        let obs = walkable_obs(&[Direction::Up]);
        let scene = SceneResult::new(SceneType::Map, "HOUSE 1F (4,4)");
        let decision = run(&obs, &scene, &NoOracle, &config, &mut state);
        assert_eq!(decision.action, Action::Press(Button::Up));
        assert_eq!(decision.reason, Reason::Queued);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn decision_key_depends_on_memory() {
        let scene = SceneResult::new(SceneType::Map, "ROUTE 101 (1,1)");
        let a = decision_key(&scene, Some("find_route_101"), &[]);
        let b = decision_key(&scene, Some("find_route_101"), &["fail:1_1:UP".into()]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
