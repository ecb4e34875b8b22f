//! Prompt composition
//!
//! A pure function from `(preamble, goal, state, transcript, tools, turn)`
//! to the system prompt for one oracle call. No I/O, no clock, no
//! randomness, so it is unit-testable in isolation.
//!
//! The transcript is tail-trimmed to a character budget: oldest turns drop
//! first, and oversized observations are clamped head-and-tail before
//! inclusion.

use crate::models::{AgentState, TranscriptEntry};
use crate::parser::ReplySchema;
use oats_tools::ToolDescriptor;

/// Approximate context budget for the whole prompt, in characters.
const MAX_PROMPT_CHARS: usize = 48_000;
/// Per-observation clamp inside the transcript section.
const MAX_OBSERVATION_CHARS: usize = 1_200;

/// Fixed system preamble: agent protocol, tool contract, funnel guidance,
/// safety rules.
const SYSTEM_PREAMBLE: &str = r#"You are an autonomous SRE investigation agent. You diagnose infrastructure problems by forming falsifiable hypotheses and testing them with tools, one action per turn.

PROTOCOL
- Each turn you receive your goal, your current state, the transcript so far, and the tool catalog.
- Decompose the goal into tasks. Keep exactly one task active at a time.
- Record observable truths in `facts`, invalidated explanations in `ruled_out`, and open questions in `unknowns`. Never delete a fact.
- Classify the active task with an archetype (Investigate, Create, Modify, Provision, Unorthodox) and track its phase.
- When the goal is achieved, call the `finish` tool with a `result` parameter summarizing the root cause and evidence.

TOOL CONTRACT
- Invoke exactly one tool per turn with parameters matching its schema.
- A failed tool call is information, not a dead end: read the error, adapt, continue.

LARGE OUTPUT HANDLING
- When a tool result begins with LARGE OUTPUT DETECTED, the full payload has been saved to the file path shown and you only see a head/tail preview.
- Do not re-run the command hoping for shorter output. Stream the saved file instead (head, tail, grep, read_file with line ranges), or redirect future large outputs to files (> results.txt).

SAFETY RULES
- Prefer read-only diagnostics. Any mutating action must be justified in your reasoning.
- Never invent tool output. Only facts observed in real observations may enter `facts`."#;

/// Reply-format instructions for the current four-section schema.
const FORMAT_CURRENT: &str = r#"RESPONSE FORMAT
Reply with a single JSON object and nothing else:
{
  "reflect": {"outcome": "SUCCESS|FAILURE|FIRST_TURN", "insight": "<key learning from the last observation>"},
  "strategize": {"reasoning": "<why this is the best next step>", "hypothesis": {"claim": "...", "test": "...", "signal": "..."}, "if_invalidated": "<contingency>"},
  "state": {"goal": "...", "tasks": [{"id": 1, "desc": "...", "status": "active|done|blocked"}], "active": {"id": 1, "archetype": "Investigate", "phase": "Gather"}, "facts": ["..."], "ruled_out": ["..."], "unknowns": ["..."]},
  "act": {"tool": "<tool name>", "params": {...}}
}"#;

/// Reply-format instructions for the legacy two-section schema.
const FORMAT_LEGACY: &str = r#"RESPONSE FORMAT
Reply with a single JSON object and nothing else:
{
  "thought": "<your reasoning for this turn>",
  "action": {"tool_name": "<tool name>", "parameters": {...}}
}"#;

/// Injected after a malformed reply; the turn does not advance.
pub const CORRECTIVE_DIRECTIVE: &str = "CORRECTION REQUIRED: your previous reply was not a single valid JSON object in the required format. Reply again for the same turn, emitting only the JSON object.";

/// One-shot directive injected when the agent is stuck on a task.
pub const FORCED_REFLECTION_DIRECTIVE: &str = "FORCED REFLECTION: you have spent many turns on the current task without new facts or ruled-out hypotheses. Stop and question your base assumptions: is the symptom correctly characterized? Is the failing layer the one you think it is? Consider marking this task blocked and attacking the problem from a different layer.";

/// Everything that varies per turn.
pub struct PromptContext<'a> {
    pub goal: &'a str,
    pub state: &'a AgentState,
    pub transcript: &'a [TranscriptEntry],
    pub tools: &'a [ToolDescriptor],
    /// 1-based turn number being executed.
    pub turn_number: u32,
    pub turn_budget: u32,
    pub schema: ReplySchema,
    pub corrective: bool,
    pub forced_reflection: bool,
}

/// Compose the full system prompt for one turn.
pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let format_block = match ctx.schema {
        ReplySchema::PreferCurrent => FORMAT_CURRENT,
        ReplySchema::PreferLegacy => FORMAT_LEGACY,
    };

    let state_json = serde_json::to_string_pretty(ctx.state)
        .unwrap_or_else(|_| "{}".to_string());

    let mut head = format!(
        "{preamble}\n\n{format}\n\nAVAILABLE TOOLS:\n{tools}\n- finish: Conclude the investigation. Parameters: result (string, required): final summary with root cause and evidence.\n\nGOAL: {goal}\n\nSTATE:\n{state}\n\nTURN: {turn} of {budget}\n",
        preamble = SYSTEM_PREAMBLE,
        format = format_block,
        tools = format_tool_catalog(ctx.tools),
        goal = ctx.goal,
        state = state_json,
        turn = ctx.turn_number,
        budget = ctx.turn_budget,
    );

    if ctx.forced_reflection {
        head.push('\n');
        head.push_str(FORCED_REFLECTION_DIRECTIVE);
        head.push('\n');
    }
    if ctx.corrective {
        head.push('\n');
        head.push_str(CORRECTIVE_DIRECTIVE);
        head.push('\n');
    }

    let remaining = MAX_PROMPT_CHARS.saturating_sub(head.len());
    let history = format_transcript_tail(ctx.transcript, remaining);
    if !history.is_empty() {
        head.push_str("\nTRANSCRIPT:\n");
        head.push_str(&history);
    }

    head
}

/// Tool catalog with parameter schemas flattened for the prompt.
fn format_tool_catalog(tools: &[ToolDescriptor]) -> String {
    let mut out = String::new();
    for tool in tools {
        out.push_str(&format!("- {}:{}: {}\n", tool.name, tool.version, tool.description));

        let properties = tool.input_schema.get("properties").and_then(|p| p.as_object());
        let required: Vec<&str> = tool
            .input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        if let Some(properties) = properties {
            for (name, schema) in properties {
                let kind = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                let description = schema.get("description").and_then(|d| d.as_str()).unwrap_or("");
                let marker = if required.contains(&name.as_str()) { "required" } else { "optional" };
                out.push_str(&format!("    {} ({}, {}): {}\n", name, kind, marker, description));
            }
        }
    }
    out
}

/// Newest-first packing of transcript entries into a character budget, then
/// re-ordered oldest-first for the prompt.
fn format_transcript_tail(transcript: &[TranscriptEntry], budget: usize) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0usize;

    for entry in transcript.iter().rev() {
        let block = format_entry(entry);
        if used + block.len() > budget {
            break;
        }
        used += block.len();
        kept.push(block);
    }

    kept.reverse();
    kept.join("\n")
}

fn format_entry(entry: &TranscriptEntry) -> String {
    format!(
        "Turn {turn}:\nThought: {thought}\nAction: {action}\nObservation: {observation}\n",
        turn = entry.turn,
        thought = entry.thought,
        action = serde_json::to_string(&entry.action).unwrap_or_default(),
        observation = clamp_observation(&entry.observation),
    )
}

/// Head-and-tail clamp for oversized observations in the transcript.
fn clamp_observation(observation: &str) -> String {
    if observation.len() <= MAX_OBSERVATION_CHARS {
        return observation.to_string();
    }

    let head: String = observation.chars().take(800).collect();
    let tail: String = {
        let chars: Vec<char> = observation.chars().collect();
        chars[chars.len().saturating_sub(300)..].iter().collect()
    };
    let omitted = observation.chars().count().saturating_sub(1100);
    format!("{}\n... [{} chars omitted] ...\n{}", head, omitted, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionCall;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: format!("{} tool", name),
            input_schema: json!({
                "type": "object",
                "properties": {"target": {"type": "string", "description": "what to hit"}},
                "required": ["target"]
            }),
        }
    }

    fn entry(turn: u32, observation: &str) -> TranscriptEntry {
        TranscriptEntry {
            turn,
            thought: format!("thinking about turn {}", turn),
            action: ActionCall {
                tool: "execute_shell".to_string(),
                params: json!({"command": "uptime"}),
                reason: None,
            },
            observation: observation.to_string(),
            duration_ms: 5,
        }
    }

    fn base_context<'a>(
        state: &'a AgentState,
        transcript: &'a [TranscriptEntry],
        tools: &'a [ToolDescriptor],
    ) -> PromptContext<'a> {
        PromptContext {
            goal: "why is checkout latency elevated",
            state,
            transcript,
            tools,
            turn_number: 3,
            turn_budget: 15,
            schema: ReplySchema::PreferCurrent,
            corrective: false,
            forced_reflection: false,
        }
    }

    #[test]
    fn test_prompt_contains_goal_tools_and_turn() {
        let state = AgentState::new("why is checkout latency elevated");
        let tools = vec![descriptor("execute_shell"), descriptor("log_search")];
        let prompt = build_prompt(&base_context(&state, &[], &tools));

        assert!(prompt.contains("GOAL: why is checkout latency elevated"));
        assert!(prompt.contains("- execute_shell:1.0.0"));
        assert!(prompt.contains("- log_search:1.0.0"));
        assert!(prompt.contains("target (string, required)"));
        assert!(prompt.contains("TURN: 3 of 15"));
        // finish is always in the catalog even though it never hits the registry
        assert!(prompt.contains("- finish:"));
    }

    #[test]
    fn test_directives_are_absent_by_default() {
        let state = AgentState::new("goal");
        let prompt = build_prompt(&base_context(&state, &[], &[]));
        assert!(!prompt.contains("CORRECTION REQUIRED"));
        assert!(!prompt.contains("FORCED REFLECTION"));
    }

    #[test]
    fn test_directives_appear_when_requested() {
        let state = AgentState::new("goal");
        let mut ctx = base_context(&state, &[], &[]);
        ctx.corrective = true;
        ctx.forced_reflection = true;
        let prompt = build_prompt(&ctx);

        assert_eq!(prompt.matches("CORRECTION REQUIRED").count(), 1);
        assert_eq!(prompt.matches("FORCED REFLECTION").count(), 1);
    }

    #[test]
    fn test_schema_selects_format_block() {
        let state = AgentState::new("goal");
        let mut ctx = base_context(&state, &[], &[]);

        let current = build_prompt(&ctx);
        assert!(current.contains("\"strategize\""));

        ctx.schema = ReplySchema::PreferLegacy;
        let legacy = build_prompt(&ctx);
        assert!(legacy.contains("\"tool_name\""));
        assert!(!legacy.contains("\"strategize\""));
    }

    #[test]
    fn test_transcript_drops_oldest_first() {
        let state = AgentState::new("goal");
        // Clamped observations still cost ~1.2k chars each; 50 of them
        // cannot all fit under the prompt budget.
        let big = "x".repeat(20_000);
        let transcript: Vec<TranscriptEntry> =
            (1..=50).map(|i| entry(i, &big)).collect();

        let prompt = build_prompt(&base_context(&state, &transcript, &[]));

        // The newest turn always survives; the oldest goes first.
        assert!(prompt.contains("Turn 50:"));
        assert!(!prompt.contains("Turn 1:\n"));
        assert!(prompt.len() <= MAX_PROMPT_CHARS + 4_000);
    }

    #[test]
    fn test_oversized_observation_is_clamped() {
        let long = "y".repeat(10_000);
        let formatted = format_entry(&entry(1, &long));
        assert!(formatted.len() < 3_000);
        assert!(formatted.contains("chars omitted"));
    }

    #[test]
    fn test_state_is_serialized_into_prompt() {
        let mut state = AgentState::new("goal");
        state.facts.push("replica count dropped at 09:12".to_string());
        let prompt = build_prompt(&base_context(&state, &[], &[]));
        assert!(prompt.contains("replica count dropped at 09:12"));
    }
}
