//! Scene classification: heuristic rules first, the oracle only when none
//! fires.

use tracing::{debug, warn};

use crate::core::observation::Observation;
use crate::core::reply::{FALLBACK_SUMMARY, parse_scene_reply};
use crate::core::scene_rules::{Signals, classify_heuristic, finalize};
use crate::core::types::{SceneResult, SceneType};
use crate::io::oracle::Oracle;
use crate::io::prompt::PromptEngine;

pub const PERCEPTION_MODULE: &str = "perception";

/// Classified scene plus how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: SceneResult,
    /// Heuristic rule that fired, or `"oracle"` / `"fallback"`.
    pub rule: &'static str,
    pub oracle_called: bool,
}

/// Classifies `obs`, escalating to the oracle's vision query when no
/// heuristic fires. Oracle failures degrade to a CUTSCENE; the oracle is not
/// consulted without a frame.
pub fn classify(obs: &Observation, oracle: &dyn Oracle, prompts: &PromptEngine) -> Classification {
    let signals = Signals::new(obs);
    if let Some((rule, result)) = classify_heuristic(&signals) {
        debug!(rule, scene = %result.scene_type, "heuristic classification");
        return Classification {
            result: finalize(result, obs),
            rule,
            oracle_called: false,
        };
    }

    let Some(frame) = obs.frame.as_ref() else {
        debug!("no heuristic fired and no frame to escalate");
        return Classification {
            result: finalize(fallback(), obs),
            rule: "fallback",
            oracle_called: false,
        };
    };

    let reply = prompts
        .render_perception()
        .and_then(|prompt| oracle.image_query(frame, &prompt, PERCEPTION_MODULE));
    let result = match reply {
        Ok(reply) => parse_scene_reply(&reply),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "perception oracle failed");
            fallback()
        }
    };
    debug!(scene = %result.scene_type, "oracle classification");
    Classification {
        result: finalize(result, obs),
        rule: "oracle",
        oracle_called: true,
    }
}

fn fallback() -> SceneResult {
    SceneResult::new(SceneType::Cutscene, FALLBACK_SUMMARY)
}
