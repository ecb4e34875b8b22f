//! Worker Event Protocol
//!
//! The worker emits one JSON-encoded event per stdout line. The control
//! plane forwards these frames to streaming clients without interpreting
//! the payload; it only shape-validates. Anything on the stream that does
//! not carry a recognized `type` tag is an ordinary log line and is
//! filtered, not an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structured event from a worker.
///
/// These six variants are the entire protocol. Adding a variant is a
/// breaking change for every attached client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The agent's reasoning for the current turn.
    Thought {
        turn: u32,
        text: String,
    },
    /// A tool the agent decided to invoke.
    Action {
        turn: u32,
        tool: String,
        params: Value,
    },
    /// The outcome of a tool invocation.
    Observation {
        turn: u32,
        status: String,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Lifecycle or advisory notice (e.g. state-merge warnings).
    Status {
        message: String,
    },
    /// A terminal error. The investigation fails after this.
    Error {
        message: String,
    },
    /// Successful completion via the finish tool.
    Finish {
        turn: u32,
        result: String,
    },
}

impl AgentEvent {
    /// Serialize to the single-line wire form.
    pub fn to_line(&self) -> String {
        // Events never contain raw newlines after JSON encoding.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"event serialization failed"}"#.to_string()
        })
    }

    /// Event type tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Thought { .. } => "thought",
            AgentEvent::Action { .. } => "action",
            AgentEvent::Observation { .. } => "observation",
            AgentEvent::Status { .. } => "status",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Finish { .. } => "finish",
        }
    }
}

/// Parse one stream line into an event.
///
/// Returns `None` for interleaved non-event log lines.
pub fn parse_event_line(line: &str) -> Option<AgentEvent> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_round_trip() {
        let event = AgentEvent::Action {
            turn: 3,
            tool: "execute_shell".to_string(),
            params: json!({"command": "kubectl get pods"}),
        };
        let line = event.to_line();
        assert!(!line.contains('\n'));
        let parsed = parse_event_line(&line).expect("line should parse");
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_non_event_lines_are_filtered() {
        assert!(parse_event_line("2024-01-01T00:00:00Z INFO starting agent").is_none());
        assert!(parse_event_line("").is_none());
        // JSON, but not an event shape
        assert!(parse_event_line(r#"{"level":"info","msg":"hello"}"#).is_none());
    }

    #[test]
    fn test_unknown_type_is_filtered() {
        assert!(parse_event_line(r#"{"type":"telemetry","cpu":0.3}"#).is_none());
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let event = AgentEvent::Finish {
            turn: 1,
            result: "root cause found".to_string(),
        };
        let value: Value = serde_json::from_str(&event.to_line()).unwrap();
        assert_eq!(value["type"], event.kind());
    }
}
