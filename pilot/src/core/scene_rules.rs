//! Ordered heuristic rules for scene classification.
//!
//! [`SCENE_RULES`] is evaluated top to bottom and the first rule that returns
//! a result wins. When none fires the scene is UNKNOWN and the caller may
//! escalate to the oracle. [`finalize`] applies the map-over-dialogue
//! override and enriches key elements; it runs on every result, heuristic or
//! oracle-derived.

use std::cell::OnceCell;

use super::frame_dialogue::dialogue_confidence;
use super::observation::Observation;
use super::types::{KeyValue, SceneResult, SceneType};

/// Memory-reported dialogue must be at least this confident to count.
pub const MEMORY_DIALOGUE_MIN_CONFIDENCE: f64 = 0.7;
/// Frame evidence below this contradicts a memory-reported dialogue.
pub const FRAME_CONTRADICTS_BELOW: f64 = 0.2;
/// Border/keyboard detector threshold.
pub const FRAME_DIALOGUE_THRESHOLD: f64 = 0.8;
/// Upstream variance heuristic threshold.
pub const GENERIC_DIALOGUE_THRESHOLD: f64 = 0.6;

pub const TITLE_SUMMARY: &str = "Main menu visible.";
pub const DIALOGUE_SUMMARY: &str = "Dialogue textbox visible.";
pub const MENU_SUMMARY: &str = "Menu open.";
pub const CUTSCENE_SUMMARY: &str = "Scripted scene.";
const DEFAULT_LOCATION: &str = "Overworld";

/// Observation plus lazily computed frame evidence.
pub struct Signals<'a> {
    pub obs: &'a Observation,
    frame_score: OnceCell<f64>,
}

impl<'a> Signals<'a> {
    pub fn new(obs: &'a Observation) -> Self {
        Self {
            obs,
            frame_score: OnceCell::new(),
        }
    }

    /// Border/keyboard detector score; 0 without a frame.
    pub fn frame_confidence(&self) -> f64 {
        *self.frame_score.get_or_init(|| {
            self.obs.frame.as_ref().map_or(0.0, |frame| {
                dialogue_confidence(frame, self.obs.state.player.name.as_deref())
            })
        })
    }

    pub fn generic_confidence(&self) -> f64 {
        self.obs
            .visual
            .frame_dialogue_confidence
            .filter(|c| c.is_finite())
            .unwrap_or(0.0)
    }
}

pub struct SceneRule {
    pub name: &'static str,
    pub apply: fn(&Signals<'_>) -> Option<SceneResult>,
}

pub const SCENE_RULES: &[SceneRule] = &[
    SceneRule {
        name: "structured_flags",
        apply: from_flags,
    },
    SceneRule {
        name: "memory_dialogue",
        apply: from_memory_dialogue,
    },
    SceneRule {
        name: "ocr_text",
        apply: from_ocr_text,
    },
    SceneRule {
        name: "frame_detector",
        apply: from_frame,
    },
    SceneRule {
        name: "map_evidence",
        apply: from_map_evidence,
    },
];

/// First firing rule and its result, or `None` when the scene is unknown.
pub fn classify_heuristic(signals: &Signals<'_>) -> Option<(&'static str, SceneResult)> {
    SCENE_RULES
        .iter()
        .find_map(|rule| (rule.apply)(signals).map(|result| (rule.name, result)))
}

fn from_flags(signals: &Signals<'_>) -> Option<SceneResult> {
    let obs = signals.obs;
    let flags = &obs.flags;
    if flags.title {
        Some(SceneResult::new(SceneType::Title, TITLE_SUMMARY))
    } else if flags.battle {
        Some(SceneResult::new(SceneType::Battle, battle_summary(obs)))
    } else if flags.dialogue {
        Some(SceneResult::new(SceneType::Dialogue, dialogue_summary(obs)))
    } else if flags.menu {
        Some(SceneResult::new(SceneType::Menu, MENU_SUMMARY))
    } else if flags.cutscene {
        Some(SceneResult::new(SceneType::Cutscene, CUTSCENE_SUMMARY))
    } else {
        None
    }
}

fn from_memory_dialogue(signals: &Signals<'_>) -> Option<SceneResult> {
    let obs = signals.obs;
    let reported = obs.state.dialogue?;
    if !reported.active || reported.confidence < MEMORY_DIALOGUE_MIN_CONFIDENCE {
        return None;
    }
    let frame_low = signals.frame_confidence() < FRAME_CONTRADICTS_BELOW
        && signals.generic_confidence() < FRAME_CONTRADICTS_BELOW;
    let has_map = obs.map_name().is_some() || obs.position().is_some();
    if frame_low && has_map {
        Some(SceneResult::new(SceneType::Map, map_summary(obs)))
    } else {
        Some(SceneResult::new(SceneType::Dialogue, dialogue_summary(obs)))
    }
}

fn from_ocr_text(signals: &Signals<'_>) -> Option<SceneResult> {
    signals
        .obs
        .dialogue_text()
        .map(|_| SceneResult::new(SceneType::Dialogue, dialogue_summary(signals.obs)))
}

fn from_frame(signals: &Signals<'_>) -> Option<SceneResult> {
    let fired = signals.frame_confidence() >= FRAME_DIALOGUE_THRESHOLD
        || signals.generic_confidence() >= GENERIC_DIALOGUE_THRESHOLD;
    fired.then(|| SceneResult::new(SceneType::Dialogue, dialogue_summary(signals.obs)))
}

fn from_map_evidence(signals: &Signals<'_>) -> Option<SceneResult> {
    let obs = signals.obs;
    let evidence = obs.state.map.has_tiles() || obs.position().is_some();
    evidence.then(|| SceneResult::new(SceneType::Map, map_summary(obs)))
}

pub fn battle_summary(obs: &Observation) -> String {
    match obs.flags.opponent.as_deref().map(str::trim) {
        Some(opponent) if !opponent.is_empty() => format!("Battle in progress vs {opponent}"),
        _ => "Battle in progress".to_string(),
    }
}

pub fn dialogue_summary(obs: &Observation) -> String {
    match obs.dialogue_text() {
        Some(text) => format!("{}: {}", DIALOGUE_SUMMARY.trim_end_matches('.'), text),
        None => DIALOGUE_SUMMARY.to_string(),
    }
}

pub fn map_summary(obs: &Observation) -> String {
    let location = obs.location().unwrap_or(DEFAULT_LOCATION);
    match obs.position() {
        Some(pos) => format!("{location} {pos}"),
        None => location.to_string(),
    }
}

/// Applies the map-over-dialogue override and enriches key elements.
pub fn finalize(mut result: SceneResult, obs: &Observation) -> SceneResult {
    if result.scene_type == SceneType::Dialogue
        && obs.state.map.has_tiles()
        && obs.position().is_some()
    {
        result.scene_type = SceneType::Map;
        result.summary = map_summary(obs);
    }
    enrich(&mut result, obs);
    result
}

fn enrich(result: &mut SceneResult, obs: &Observation) {
    let elements = &mut result.key_elements;
    elements.insert(
        "party".to_string(),
        KeyValue::Number(obs.party_size() as i64),
    );
    if let Some(pos) = obs.position() {
        elements.insert("player_x".to_string(), KeyValue::Number(pos.x));
        elements.insert("player_y".to_string(), KeyValue::Number(pos.y));
    }
    if let Some(location) = obs.location() {
        elements.insert("location".to_string(), KeyValue::Text(location.to_string()));
    }
    if let Some(text) = obs.dialogue_text() {
        elements
            .entry("dialogue_text".to_string())
            .or_insert_with(|| KeyValue::Text(text.to_string()));
    }
    if result.summary.to_lowercase().contains("clock") {
        elements.insert("clock".to_string(), KeyValue::Flag(true));
    }
}
