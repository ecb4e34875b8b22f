//! The Reflect-Strategize-Act loop
//!
//! Single-threaded and cooperative: one oracle call at a time, one tool
//! execution at a time, strict `prompt -> oracle -> parse -> dispatch ->
//! merge` order. Tool failures are observations; only oracle failures,
//! repeated parse failures, and budget exhaustion terminate the run.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use oats_core::AgentEvent;
use oats_llm::Oracle;
use oats_tools::{ToolExecutor, ToolRegistry, ToolResult};

use crate::models::{AgentState, EngineReport, TaskStatus, TranscriptEntry, FINISH_TOOL};
use crate::parser::{parse_reply, ParseOutcome, ReplySchema};
use crate::prompt::{build_prompt, PromptContext};

/// Receiver for streamed agent events.
///
/// The worker wires this to stdout; tests collect into a vec.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub turn_budget: u32,
    pub reply_schema: ReplySchema,
    /// Turns on one task before the stuck check can trigger.
    pub stuck_task_turns: u32,
    /// Consecutive no-delta turns required to trigger forced reflection.
    pub stuck_delta_window: u32,
    /// Consecutive parse failures tolerated before terminating.
    pub max_parse_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            turn_budget: oats_core::config::DEFAULT_MAX_TURNS,
            reply_schema: ReplySchema::default(),
            stuck_task_turns: 8,
            stuck_delta_window: 2,
            max_parse_failures: 2,
        }
    }
}

/// One reasoning engine instance drives exactly one investigation.
pub struct ReasoningEngine {
    oracle: Arc<dyn Oracle>,
    executor: ToolExecutor,
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl ReasoningEngine {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        executor: ToolExecutor,
        registry: Arc<ToolRegistry>,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            executor,
            registry,
            sink,
            config,
        }
    }

    /// Run the loop to completion.
    pub async fn run(&self, goal: &str) -> EngineReport {
        let tools = self.registry.list();
        let mut state = AgentState::new(goal);
        let mut transcript: Vec<TranscriptEntry> = Vec::new();
        let mut turn_count = 0u32;
        let mut is_complete = false;
        let mut final_result: Option<String> = None;
        let mut fatal: Option<String> = None;

        let mut parse_failures = 0u32;
        let mut corrective = false;
        let mut no_delta_streak = 0u32;
        let mut reflection_armed = true;
        let mut pending_reflection = false;

        info!("Starting investigation: '{}' (budget {} turns)", goal, self.config.turn_budget);

        while !is_complete && turn_count < self.config.turn_budget {
            let turn_number = turn_count + 1;
            let turn_start = Instant::now();

            let prompt = build_prompt(&PromptContext {
                goal,
                state: &state,
                transcript: &transcript,
                tools: &tools,
                turn_number,
                turn_budget: self.config.turn_budget,
                schema: self.config.reply_schema,
                corrective,
                forced_reflection: pending_reflection,
            });
            // One-shot directives are consumed by being built into a prompt.
            corrective = false;
            pending_reflection = false;

            let raw = match self.oracle.complete(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    fatal = Some(format!("oracle failure: {}", e));
                    break;
                }
            };

            let reply = match parse_reply(&raw, self.config.reply_schema) {
                ParseOutcome::Parsed(reply) => {
                    parse_failures = 0;
                    reply
                }
                ParseOutcome::Invalid(message) => {
                    parse_failures += 1;
                    warn!("Oracle reply parse failure {}/{}: {}", parse_failures, self.config.max_parse_failures, message);
                    if parse_failures >= self.config.max_parse_failures {
                        fatal = Some(format!("oracle reply unparseable after {} attempts: {}", parse_failures, message));
                        break;
                    }
                    self.sink.emit(AgentEvent::Status {
                        message: format!("malformed oracle reply ({}); requesting correction", message),
                    });
                    corrective = true;
                    // The turn does not advance on a soft retry.
                    continue;
                }
            };

            self.sink.emit(AgentEvent::Thought {
                turn: turn_number,
                text: reply.thought.clone(),
            });
            self.sink.emit(AgentEvent::Action {
                turn: turn_number,
                tool: reply.act.tool.clone(),
                params: reply.act.params.clone(),
            });

            let mut warnings = Vec::new();

            if reply.act.tool == FINISH_TOOL {
                let result = reply.act.finish_result();
                if let Some(proposed) = reply.proposed_state.clone() {
                    merge_state(&mut state, proposed, &mut warnings);
                }
                for warning in warnings.drain(..) {
                    self.sink.emit(AgentEvent::Status { message: warning });
                }

                transcript.push(TranscriptEntry {
                    turn: turn_number,
                    thought: reply.thought.clone(),
                    action: reply.act.clone(),
                    observation: format!("FINISH: {}", result),
                    duration_ms: turn_start.elapsed().as_millis() as u64,
                });
                turn_count += 1;
                is_complete = true;
                final_result = Some(result.clone());

                self.sink.emit(AgentEvent::Finish {
                    turn: turn_number,
                    result,
                });
                break;
            }

            let result = self.executor.execute(&reply.act.tool, reply.act.params.clone()).await;
            let observation = render_observation(&reply.act.tool, &result);

            self.sink.emit(AgentEvent::Observation {
                turn: turn_number,
                status: result.status.as_str().to_string(),
                output: result.output.clone(),
                error: result.error.clone(),
            });

            transcript.push(TranscriptEntry {
                turn: turn_number,
                thought: reply.thought.clone(),
                action: reply.act.clone(),
                observation,
                duration_ms: turn_start.elapsed().as_millis() as u64,
            });
            turn_count += 1;

            let delta = match reply.proposed_state.clone() {
                Some(proposed) => merge_state(&mut state, proposed, &mut warnings),
                None => false,
            };
            for warning in warnings.drain(..) {
                self.sink.emit(AgentEvent::Status { message: warning });
            }

            if delta {
                no_delta_streak = 0;
                reflection_armed = true;
            } else {
                no_delta_streak += 1;
            }

            let stuck_on_task = state
                .active
                .as_ref()
                .map(|a| a.turns_on_task >= self.config.stuck_task_turns)
                .unwrap_or(false);
            if reflection_armed && stuck_on_task && no_delta_streak >= self.config.stuck_delta_window {
                info!("Stuck window detected at turn {}; scheduling forced reflection", turn_number);
                pending_reflection = true;
                reflection_armed = false;
            }
        }

        if !is_complete {
            let reason = fatal.unwrap_or_else(|| "budget exhausted".to_string());
            self.sink.emit(AgentEvent::Error { message: reason.clone() });
            let summary = build_summary(false, turn_count, self.config.turn_budget, Some(&reason), &transcript);
            info!("Investigation ended without completion: {}", reason);
            return EngineReport {
                success: false,
                state,
                transcript,
                turns_used: turn_count,
                final_result: None,
                summary,
            };
        }

        let summary = build_summary(true, turn_count, self.config.turn_budget, final_result.as_deref(), &transcript);
        info!("Investigation completed in {} turns", turn_count);
        EngineReport {
            success: true,
            state,
            transcript,
            turns_used: turn_count,
            final_result,
            summary,
        }
    }
}

/// Merge the oracle's proposed state into the authoritative state.
///
/// Returns whether the merge produced a state delta (new facts or newly
/// ruled-out hypotheses), which feeds the stuck detector.
pub fn merge_state(state: &mut AgentState, mut proposed: AgentState, warnings: &mut Vec<String>) -> bool {
    // facts / ruled_out: union, textual dedup; an oracle echoing a smaller
    // set must never lose established knowledge.
    let facts_before = state.facts.len();
    let ruled_out_before = state.ruled_out.len();
    for fact in proposed.facts {
        if !state.facts.contains(&fact) {
            state.facts.push(fact);
        }
    }
    for hypothesis in proposed.ruled_out {
        if !state.ruled_out.contains(&hypothesis) {
            state.ruled_out.push(hypothesis);
        }
    }

    // unknowns: open questions may be resolved, so the proposal wins.
    state.unknowns = proposed.unknowns;

    // tasks: replaced, with the at-most-one-active invariant enforced by
    // downgrading extras.
    let mut seen_active = false;
    for task in proposed.tasks.iter_mut() {
        if task.status == TaskStatus::Active {
            if seen_active {
                warnings.push(format!(
                    "task {} demoted to blocked: only one task may be active",
                    task.id
                ));
                task.status = TaskStatus::Blocked;
            } else {
                seen_active = true;
            }
        }
    }
    if !seen_active && !proposed.tasks.is_empty() && !proposed.tasks.iter().all(|t| t.status == TaskStatus::Done) {
        warnings.push("no task is active and not all tasks are done".to_string());
    }
    state.tasks = proposed.tasks;

    // active task: accept the proposal, but the turn counter is
    // engine-controlled.
    let previous = state.active.take();
    state.active = proposed.active.map(|mut active| {
        active.turns_on_task = match &previous {
            Some(prev) if prev.id == active.id => prev.turns_on_task + 1,
            _ => 1,
        };
        if !active.archetype.is_valid_phase(&active.phase) {
            warnings.push(format!(
                "phase '{}' is not canonical for archetype {:?}",
                active.phase, active.archetype
            ));
        }
        active
    });

    state.facts.len() > facts_before || state.ruled_out.len() > ruled_out_before
}

/// Format a tool result into the transcript observation.
fn render_observation(tool: &str, result: &ToolResult) -> String {
    if result.is_success() {
        format!("SUCCESS ({}): {} ({}ms)", tool, result.output, result.duration_ms)
    } else {
        format!(
            "ERROR ({}): {}",
            tool,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

fn build_summary(
    success: bool,
    turns: u32,
    budget: u32,
    detail: Option<&str>,
    transcript: &[TranscriptEntry],
) -> String {
    let mut summary = if success {
        match detail {
            Some(result) => format!("Goal achieved in {} turns: {}", turns, result),
            None => format!("Goal achieved in {} turns", turns),
        }
    } else if turns >= budget {
        format!("Reached maximum turns ({}) without completing goal", budget)
    } else {
        format!("Execution stopped after {} turns: {}", turns, detail.unwrap_or("unknown error"))
    };

    if !transcript.is_empty() {
        let mut tools_used: Vec<&str> = transcript.iter().map(|e| e.action.tool.as_str()).collect();
        tools_used.sort();
        tools_used.dedup();
        summary.push_str(&format!("\nActions used: {}", tools_used.join(", ")));
    }
    summary
}

/// Sink that drops everything; useful when replaying state without clients.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}
