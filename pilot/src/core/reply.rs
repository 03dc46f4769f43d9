//! Tolerant parsing of free-form oracle replies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::types::{Button, KeyElements, KeyValue, SceneResult, SceneType};

/// Summary used whenever a scene reply cannot be trusted.
pub const FALLBACK_SUMMARY: &str = "Scripted scene.";

static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bMOVE\s+(UP|DOWN|LEFT|RIGHT)(?:\s+(\d+))?\b").expect("valid move regex")
});
static REPEAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\W*(UP|DOWN|LEFT|RIGHT)\s*[x×]?\s*(\d+)\b").expect("valid repeat regex")
});
static PRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bPRESS\s+(UP|DOWN|LEFT|RIGHT|A|B|START|SELECT)\b").expect("valid press regex")
});

/// Parses a three-line `SceneType/Summary/KeyElements` reply (or a JSON object).
///
/// Labels outside the fixed scene set, and replies without any label, become
/// a CUTSCENE with [`FALLBACK_SUMMARY`].
pub fn parse_scene_reply(reply: &str) -> SceneResult {
    let cleaned = strip_code_fences(reply);
    let (label, summary, key_elements) = parse_scene_json(&cleaned)
        .filter(|(label, ..)| label.is_some())
        .unwrap_or_else(|| parse_scene_lines(&cleaned));

    match label.as_deref().and_then(SceneType::parse_label) {
        Some(scene_type) => SceneResult {
            scene_type,
            summary: summary.unwrap_or_default(),
            key_elements,
        },
        None => SceneResult {
            scene_type: SceneType::Cutscene,
            summary: FALLBACK_SUMMARY.to_string(),
            key_elements,
        },
    }
}

type SceneFields = (Option<String>, Option<String>, KeyElements);

fn parse_scene_lines(text: &str) -> SceneFields {
    let mut label = None;
    let mut summary = None;
    let mut key_elements = KeyElements::new();
    for line in text.lines() {
        let line = line.replace('*', "");
        let line = line.trim().trim_start_matches(['-', '#', ' ']);
        if let Some(rest) = strip_prefix_ci(line, "scenetype:").or_else(|| strip_prefix_ci(line, "scene type:")) {
            label = Some(rest.trim().to_string());
        } else if let Some(rest) = strip_prefix_ci(line, "summary:") {
            summary = Some(rest.trim().to_string());
        } else if let Some(rest) = strip_prefix_ci(line, "keyelements:").or_else(|| strip_prefix_ci(line, "key elements:")) {
            key_elements = parse_key_elements(rest);
        }
    }
    (label, summary, key_elements)
}

fn parse_scene_json(text: &str) -> Option<SceneFields> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let value: Value = serde_json::from_str(text.get(start..=end)?).ok()?;
    let object = value.as_object()?;
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| object.get(*n))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let label = field(&["scene_type", "SceneType", "sceneType"]);
    let summary = field(&["summary", "Summary"]);
    let key_elements = match object
        .get("key_elements")
        .or_else(|| object.get("KeyElements"))
    {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| {
                serde_json::from_value::<KeyValue>(v.clone())
                    .ok()
                    .map(|v| (k.clone(), v))
            })
            .collect(),
        Some(Value::String(raw)) => parse_key_elements(raw),
        _ => KeyElements::new(),
    };
    Some((label, summary, key_elements))
}

/// Parses `a=1, b=2; flag` into a mapping. Bare tokens become `true`.
pub fn parse_key_elements(raw: &str) -> KeyElements {
    raw.replace(';', ",")
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), KeyValue::parse(value)),
            None => (part.to_string(), KeyValue::Flag(true)),
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Parses an action reply into at most `max_actions` buttons.
///
/// Accepted shapes, in order: a JSON array, `MOVE DIR [N]`,
/// `DIR N`, `PRESS X`, a bare token on the first line. Anything else is `A`.
/// When `allow_multi` is false only the first action is kept.
pub fn parse_action_reply(reply: &str, allow_multi: bool, max_actions: usize) -> Vec<Button> {
    let max_actions = if allow_multi { max_actions.max(1) } else { 1 };
    let cleaned = strip_code_fences(reply);
    if cleaned.trim().is_empty() {
        return vec![Button::A];
    }

    let mut actions = parse_json_array(&cleaned);
    if actions.is_empty() {
        actions = parse_move(&cleaned)
            .or_else(|| parse_repeat(&cleaned))
            .or_else(|| parse_press(&cleaned))
            .or_else(|| parse_bare(&cleaned))
            .unwrap_or_else(|| vec![Button::A]);
    }
    actions.truncate(max_actions);
    actions
}

fn parse_json_array(text: &str) -> Vec<Button> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Vec::new();
    };
    let Some(slice) = text.get(start..=end) else {
        return Vec::new();
    };
    serde_json::from_str::<Vec<Value>>(slice)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| s.parse::<Button>().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn repeated(token: &str, count: Option<&str>) -> Option<Vec<Button>> {
    let button: Button = token.parse().ok()?;
    let count = count
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, 3);
    Some(vec![button; count])
}

fn parse_move(text: &str) -> Option<Vec<Button>> {
    let caps = MOVE_RE.captures(text)?;
    repeated(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))
}

fn parse_repeat(text: &str) -> Option<Vec<Button>> {
    let caps = REPEAT_RE.captures(text)?;
    repeated(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))
}

fn parse_press(text: &str) -> Option<Vec<Button>> {
    let caps = PRESS_RE.captures(text)?;
    caps.get(1)?.as_str().parse().ok().map(|b| vec![b])
}

fn parse_bare(text: &str) -> Option<Vec<Button>> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let token = line.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    token.parse().ok().map(|b| vec![b])
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_reply_parses_three_lines_case_insensitively() {
        let reply = "sceneType: map\nSUMMARY: Standing outside the lab.\nkeyelements: location=Littleroot Town; npc=2, sign";
        let scene = parse_scene_reply(reply);
        assert_eq!(scene.scene_type, SceneType::Map);
        assert_eq!(scene.summary, "Standing outside the lab.");
        assert_eq!(
            scene.key_elements.get("location"),
            Some(&KeyValue::Text("Littleroot Town".into()))
        );
        assert_eq!(scene.key_elements.get("npc"), Some(&KeyValue::Number(2)));
        assert_eq!(scene.key_elements.get("sign"), Some(&KeyValue::Flag(true)));
    }

    #[test]
    fn markdown_decorations_are_tolerated() {
        let scene = parse_scene_reply("- **SceneType:** BATTLE\n- **Summary:** Wild Poochyena!");
        assert_eq!(scene.scene_type, SceneType::Battle);
        assert_eq!(scene.summary, "Wild Poochyena!");
    }

    #[test]
    fn unknown_label_is_coerced_to_cutscene() {
        let scene = parse_scene_reply("SceneType: OVERWORLD\nSummary: walking");
        assert_eq!(scene.scene_type, SceneType::Cutscene);
        assert_eq!(scene.summary, FALLBACK_SUMMARY);

        let empty = parse_scene_reply("");
        assert_eq!(empty.scene_type, SceneType::Cutscene);
        assert_eq!(empty.summary, FALLBACK_SUMMARY);
    }

    #[test]
    fn json_scene_reply_is_accepted() {
        let scene = parse_scene_reply(
            "```json\n{\"scene_type\":\"MENU\",\"summary\":\"Bag open\",\"key_elements\":{\"items\":3}}\n```",
        );
        assert_eq!(scene.scene_type, SceneType::Menu);
        assert_eq!(scene.key_elements.get("items"), Some(&KeyValue::Number(3)));
    }

    #[test]
    fn action_reply_shapes() {
        assert_eq!(parse_action_reply("RIGHT", true, 3), vec![Button::Right]);
        assert_eq!(parse_action_reply("left.", true, 3), vec![Button::Left]);
        assert_eq!(
            parse_action_reply("UP 5", true, 3),
            vec![Button::Up, Button::Up, Button::Up]
        );
        assert_eq!(
            parse_action_reply("I will MOVE down 2 to reach the door", true, 3),
            vec![Button::Down, Button::Down]
        );
        assert_eq!(
            parse_action_reply("Best to press start now", true, 3),
            vec![Button::Start]
        );
        assert_eq!(
            parse_action_reply("```json\n[\"UP\", \"jump\", \"A\", \"LEFT\", \"B\"]\n```", true, 3),
            vec![Button::Up, Button::A, Button::Left]
        );
    }

    #[test]
    fn unparseable_or_empty_reply_defaults_to_a() {
        assert_eq!(parse_action_reply("", true, 3), vec![Button::A]);
        assert_eq!(parse_action_reply("hmm, not sure", true, 3), vec![Button::A]);
    }

    #[test]
    fn single_action_goals_keep_first_only() {
        assert_eq!(parse_action_reply("RIGHT 3", false, 3), vec![Button::Right]);
        assert_eq!(
            parse_action_reply("[\"DOWN\", \"DOWN\"]", false, 3),
            vec![Button::Down]
        );
    }
}
