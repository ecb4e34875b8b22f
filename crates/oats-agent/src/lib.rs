//! oats-agent: the Reflect-Strategize-Act reasoning engine
//!
//! One engine instance drives one investigation inside one worker process.
//! Each turn is strictly serialized: build prompt, call the oracle, parse
//! the structured reply, emit events, dispatch the action, merge the
//! proposed state, check termination.

pub mod engine;
pub mod models;
pub mod parser;
pub mod prompt;

pub use engine::{EngineConfig, EventSink, NullSink, ReasoningEngine};
pub use models::{
    ActionCall, ActiveTask, AgentState, Archetype, EngineReport, Task, TaskStatus, TranscriptEntry,
};
pub use parser::{ParseOutcome, ParsedReply, ReplySchema};
