//! Oracle reply parsing
//!
//! The oracle is contractually required to return a single JSON object.
//! Two dialects exist: the current four-section form
//! (`reflect` / `strategize` / `state` / `act`) and the legacy two-section
//! form (`thought` / `action`). Which one wins when a reply carries both is
//! an explicit engine configuration, not a guess.
//!
//! Parse failures are data (`ParseOutcome::Invalid`), handled by the engine
//! as a soft retry.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{ActionCall, AgentState, ReflectSection, StrategizeSection};

/// Which reply dialect takes precedence when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplySchema {
    /// Prefer `reflect`/`strategize`/`state`/`act`.
    #[default]
    PreferCurrent,
    /// Prefer `thought`/`action`.
    PreferLegacy,
}

impl ReplySchema {
    /// Map a prompt version string to the schema it requests.
    pub fn from_prompt_version(version: &str) -> Self {
        match version {
            "v1" | "v2" | "legacy" => ReplySchema::PreferLegacy,
            _ => ReplySchema::PreferCurrent,
        }
    }
}

/// A successfully parsed oracle reply.
#[derive(Debug, Clone)]
pub struct ParsedReply {
    /// Combined reasoning text for the thought event.
    pub thought: String,
    pub reflect: Option<ReflectSection>,
    pub strategize: Option<StrategizeSection>,
    /// The oracle's proposed new state, if echoed.
    pub proposed_state: Option<AgentState>,
    pub act: ActionCall,
}

/// Outcome of one parse attempt.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(Box<ParsedReply>),
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct CurrentReply {
    #[serde(default)]
    reflect: Option<ReflectSection>,
    #[serde(default)]
    strategize: Option<StrategizeSection>,
    #[serde(default)]
    state: Option<AgentState>,
    act: ActionCall,
}

#[derive(Debug, Deserialize)]
struct LegacyReply {
    thought: String,
    action: ActionCall,
}

/// Parse one raw oracle reply.
pub fn parse_reply(raw: &str, schema: ReplySchema) -> ParseOutcome {
    let json = match extract_json_object(raw) {
        Some(json) => json,
        None => return ParseOutcome::Invalid("reply contains no JSON object".to_string()),
    };

    let value: Value = match serde_json::from_str(&json) {
        Ok(value) => value,
        Err(e) => return ParseOutcome::Invalid(format!("reply is not valid JSON: {}", e)),
    };

    let has_current = value.get("act").is_some();
    let has_legacy = value.get("action").is_some();

    let use_current = match (has_current, has_legacy) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => schema == ReplySchema::PreferCurrent,
        (false, false) => {
            return ParseOutcome::Invalid(
                "reply has neither an 'act' nor an 'action' section".to_string(),
            )
        }
    };

    if use_current {
        parse_current(value)
    } else {
        parse_legacy(value)
    }
}

fn parse_current(value: Value) -> ParseOutcome {
    let reply: CurrentReply = match serde_json::from_value(value) {
        Ok(reply) => reply,
        Err(e) => return ParseOutcome::Invalid(format!("malformed current-schema reply: {}", e)),
    };

    if reply.act.tool.trim().is_empty() {
        return ParseOutcome::Invalid("act.tool is empty".to_string());
    }

    let mut thought_parts = Vec::new();
    if let Some(reflect) = &reply.reflect {
        if !reflect.insight.is_empty() {
            thought_parts.push(reflect.insight.clone());
        }
    }
    if let Some(strategize) = &reply.strategize {
        if !strategize.reasoning.is_empty() {
            thought_parts.push(strategize.reasoning.clone());
        }
        if let Some(hypothesis) = &strategize.hypothesis {
            if !hypothesis.claim.is_empty() {
                thought_parts.push(format!("Hypothesis: {}", hypothesis.claim));
            }
        }
    }

    ParseOutcome::Parsed(Box::new(ParsedReply {
        thought: thought_parts.join(" "),
        reflect: reply.reflect,
        strategize: reply.strategize,
        proposed_state: reply.state,
        act: reply.act,
    }))
}

fn parse_legacy(value: Value) -> ParseOutcome {
    let reply: LegacyReply = match serde_json::from_value(value) {
        Ok(reply) => reply,
        Err(e) => return ParseOutcome::Invalid(format!("malformed legacy-schema reply: {}", e)),
    };

    if reply.thought.trim().is_empty() {
        return ParseOutcome::Invalid("thought is empty".to_string());
    }
    if reply.action.tool.trim().is_empty() {
        return ParseOutcome::Invalid("action.tool_name is empty".to_string());
    }

    ParseOutcome::Parsed(Box::new(ParsedReply {
        thought: reply.thought,
        reflect: None,
        strategize: None,
        proposed_state: None,
        act: reply.action,
    }))
}

/// Pull the JSON object out of a raw reply.
///
/// Models wrap replies in markdown fences or prose; accept a fenced block
/// first, then fall back to the first balanced top-level object.
fn extract_json_object(raw: &str) -> Option<String> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*\n?(\{.*?\})\s*```").expect("static regex");
    if let Some(cap) = fence.captures(raw) {
        return Some(cap[1].to_string());
    }

    let start = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn current_reply() -> String {
        json!({
            "reflect": {"outcome": "SUCCESS", "insight": "nginx pods are healthy"},
            "strategize": {
                "reasoning": "check the upstream service next",
                "hypothesis": {"claim": "upstream is refusing connections", "test": "curl it", "signal": "non-200"}
            },
            "state": {
                "goal": "api 502s",
                "tasks": [{"id": 1, "desc": "triage", "status": "active"}],
                "active": {"id": 1, "archetype": "Investigate", "phase": "Test"},
                "facts": ["nginx healthy"],
                "ruled_out": [],
                "unknowns": []
            },
            "act": {"tool": "execute_shell", "params": {"command": "curl -s upstream:8080/health"}}
        })
        .to_string()
    }

    #[test]
    fn test_parse_current_schema() {
        let outcome = parse_reply(&current_reply(), ReplySchema::PreferCurrent);
        let reply = match outcome {
            ParseOutcome::Parsed(reply) => reply,
            ParseOutcome::Invalid(e) => panic!("expected parse, got: {}", e),
        };

        assert_eq!(reply.act.tool, "execute_shell");
        assert!(reply.thought.contains("upstream"));
        assert!(reply.thought.contains("Hypothesis:"));
        let state = reply.proposed_state.unwrap();
        assert_eq!(state.facts, vec!["nginx healthy"]);
    }

    #[test]
    fn test_parse_legacy_schema() {
        let raw = json!({
            "thought": "I should look at the error log",
            "action": {"tool_name": "read_file", "parameters": {"filename": "error.log"}}
        })
        .to_string();

        let outcome = parse_reply(&raw, ReplySchema::PreferCurrent);
        let reply = match outcome {
            ParseOutcome::Parsed(reply) => reply,
            ParseOutcome::Invalid(e) => panic!("expected parse, got: {}", e),
        };
        assert_eq!(reply.act.tool, "read_file");
        assert_eq!(reply.thought, "I should look at the error log");
        assert!(reply.proposed_state.is_none());
    }

    #[test]
    fn test_precedence_when_both_sections_present() {
        let raw = json!({
            "thought": "legacy thought",
            "action": {"tool_name": "legacy_tool"},
            "act": {"tool": "current_tool"}
        })
        .to_string();

        match parse_reply(&raw, ReplySchema::PreferCurrent) {
            ParseOutcome::Parsed(reply) => assert_eq!(reply.act.tool, "current_tool"),
            ParseOutcome::Invalid(e) => panic!("unexpected: {}", e),
        }
        match parse_reply(&raw, ReplySchema::PreferLegacy) {
            ParseOutcome::Parsed(reply) => assert_eq!(reply.act.tool, "legacy_tool"),
            ParseOutcome::Invalid(e) => panic!("unexpected: {}", e),
        }
    }

    #[test]
    fn test_fenced_reply_is_accepted() {
        let raw = format!("Here is my reply:\n```json\n{}\n```\nDone.", current_reply());
        assert!(matches!(
            parse_reply(&raw, ReplySchema::PreferCurrent),
            ParseOutcome::Parsed(_)
        ));
    }

    #[test]
    fn test_prose_wrapped_reply_is_accepted() {
        let raw = format!("Sure! {} hope that helps", current_reply());
        assert!(matches!(
            parse_reply(&raw, ReplySchema::PreferCurrent),
            ParseOutcome::Parsed(_)
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            parse_reply("I could not decide on an action.", ReplySchema::PreferCurrent),
            ParseOutcome::Invalid(_)
        ));
        assert!(matches!(
            parse_reply("{\"unrelated\": true}", ReplySchema::PreferCurrent),
            ParseOutcome::Invalid(_)
        ));
    }

    #[test]
    fn test_empty_tool_is_invalid() {
        let raw = json!({"act": {"tool": ""}}).to_string();
        assert!(matches!(
            parse_reply(&raw, ReplySchema::PreferCurrent),
            ParseOutcome::Invalid(_)
        ));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let raw = json!({
            "thought": "run { brace } heavy command",
            "action": {"tool_name": "execute_shell", "parameters": {"command": "awk '{print $1}' f"}}
        })
        .to_string();
        assert!(matches!(
            parse_reply(&raw, ReplySchema::PreferCurrent),
            ParseOutcome::Parsed(_)
        ));
    }
}
