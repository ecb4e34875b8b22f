//! WebSocket streaming channel
//!
//! One logical session per investigation: the client opens the socket and
//! sends `start_investigation {goal}`; the server materializes the worker
//! and forwards its event stream as `agent_message` frames until the
//! worker terminates. Client disconnection detaches silently; the worker
//! runs to completion and its events stay replayable via the logs
//! endpoint.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use oats_core::{event, AgentEvent};

use crate::state::AppState;

/// Client -> server messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    StartInvestigation {
        goal: String,
        #[serde(default)]
        target_namespace: Option<String>,
        #[serde(default)]
        turn_budget: Option<u32>,
    },
}

/// Server -> client frames.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    InvestigationStarted {
        investigation_id: String,
        job_name: String,
    },
    AgentMessage {
        event: AgentEvent,
    },
    Error {
        message: String,
    },
}

impl WsServerMessage {
    fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"frame serialization failed"}"#.to_string()
        })
    }
}

/// WebSocket upgrade handler for GET /ws.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // The first client message opens the investigation.
    let request = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsClientMessage>(&text) {
                Ok(message) => break message,
                Err(e) => {
                    let frame = WsServerMessage::Error {
                        message: format!("malformed message: {}", e),
                    };
                    let _ = socket.send(Message::Text(frame.to_text())).await;
                    return;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!("WebSocket receive error before start: {}", e);
                return;
            }
        }
    };

    let WsClientMessage::StartInvestigation {
        goal,
        target_namespace,
        turn_budget,
    } = request;

    if goal.trim().is_empty() {
        let frame = WsServerMessage::Error {
            message: "goal must not be empty".to_string(),
        };
        let _ = socket.send(Message::Text(frame.to_text())).await;
        return;
    }

    let namespace = target_namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| state.config.default_namespace.clone());
    let turn_budget = turn_budget.unwrap_or(state.config.default_turn_budget);

    let investigation = match state.create_investigation(goal, namespace, turn_budget).await {
        Ok(investigation) => investigation,
        Err(e) => {
            let frame = WsServerMessage::Error {
                message: format!("investigation not created: {}", e),
            };
            let _ = socket.send(Message::Text(frame.to_text())).await;
            return;
        }
    };

    info!("Streaming investigation {} over WebSocket", investigation.id);

    let started = WsServerMessage::InvestigationStarted {
        investigation_id: investigation.id.clone(),
        job_name: investigation.job_name.clone(),
    };
    if socket.send(Message::Text(started.to_text())).await.is_err() {
        return;
    }

    let mut lines = match state
        .orchestrator
        .follow_logs(&investigation.job_name, &investigation.namespace)
        .await
    {
        Ok(rx) => rx,
        Err(e) => {
            warn!("Log attach failed for {}: {}", investigation.id, e);
            let frame = WsServerMessage::Error {
                message: format!("log stream unavailable: {}", e),
            };
            let _ = socket.send(Message::Text(frame.to_text())).await;
            return;
        }
    };

    loop {
        tokio::select! {
            line = lines.recv() => {
                match line {
                    Some(line) => {
                        // Shape-validate only; interleaved log noise is
                        // filtered, never an error.
                        if let Some(agent_event) = event::parse_event_line(&line) {
                            let frame = WsServerMessage::AgentMessage { event: agent_event };
                            if socket.send(Message::Text(frame.to_text())).await.is_err() {
                                // Client detached; the worker continues.
                                debug!("Client detached from {}", investigation.id);
                                return;
                            }
                        }
                    }
                    None => {
                        // Worker terminal: close the stream.
                        debug!("Log stream for {} ended", investigation.id);
                        break;
                    }
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        debug!("Client closed stream for {}", investigation.id);
                        return;
                    }
                    // Ignore anything else mid-stream.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_shape() {
        let message: WsClientMessage = serde_json::from_str(
            r#"{"type":"start_investigation","goal":"why is dns flaky","turn_budget":5}"#,
        )
        .unwrap();
        let WsClientMessage::StartInvestigation { goal, turn_budget, target_namespace } = message;
        assert_eq!(goal, "why is dns flaky");
        assert_eq!(turn_budget, Some(5));
        assert_eq!(target_namespace, None);
    }

    #[test]
    fn test_agent_message_frame_shape() {
        let frame = WsServerMessage::AgentMessage {
            event: AgentEvent::Thought {
                turn: 1,
                text: "checking resolv.conf".to_string(),
            },
        };
        let value: serde_json::Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(value["type"], "agent_message");
        assert_eq!(value["event"]["type"], "thought");
        assert_eq!(value["event"]["turn"], 1);
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        let result = serde_json::from_str::<WsClientMessage>(r#"{"type":"subscribe"}"#);
        assert!(result.is_err());
    }
}
