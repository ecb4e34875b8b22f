//! oats-worker: containerized agent entrypoint
//!
//! Runs exactly one investigation: goal in via `OATS_GOAL`, structured
//! events out via stdout (one JSON object per line), diagnostics to
//! stderr, final result artifact to the results directory, exit code 0 on
//! success and 1 on every other terminal condition. The orchestrator
//! tracks nothing but that exit code.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oats_agent::{EngineConfig, EventSink, ReasoningEngine, ReplySchema};
use oats_core::config::{self, WorkerConfig};
use oats_core::AgentEvent;
use oats_llm::{Oracle, OracleClient};
use oats_tools::{discovery, register_builtin_tools, ToolExecutor, ToolRegistry};

/// Sink that writes one event per stdout line.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: AgentEvent) {
        println!("{}", event.to_line());
    }
}

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    // Events own stdout; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config::get_config(config::ENV_LOG_LEVEL, config::DEFAULT_LOG_LEVEL))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();

    let sink = Arc::new(StdoutSink);

    let worker_config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Worker misconfigured: {}", e);
            sink.emit(AgentEvent::Error { message: e.to_string() });
            return 1;
        }
    };

    info!("Starting OATS worker");
    info!("Goal: {}", worker_config.goal);
    info!("Max turns: {}", worker_config.max_turns);

    let oracle: Arc<dyn Oracle> = match OracleClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Oracle unavailable: {}", e);
            sink.emit(AgentEvent::Error { message: format!("oracle unavailable: {}", e) });
            return 1;
        }
    };

    let mut registry = ToolRegistry::new();
    if let Err(e) = register_builtin_tools(&mut registry) {
        error!("Builtin tool registration failed: {}", e);
        sink.emit(AgentEvent::Error { message: format!("tool registration failed: {}", e) });
        return 1;
    }
    if let Err(e) = discovery::register_discovered(&mut registry, Path::new(&worker_config.tools_dir)) {
        error!("Tool discovery failed: {}", e);
        sink.emit(AgentEvent::Error { message: format!("tool discovery failed: {}", e) });
        return 1;
    }
    let registry = registry.into_shared();

    let scratch_dir = scratch_dir_for_run();
    if let Err(e) = std::fs::create_dir_all(&scratch_dir) {
        error!("Cannot create scratch directory {}: {}", scratch_dir.display(), e);
        sink.emit(AgentEvent::Error { message: format!("scratch directory unavailable: {}", e) });
        return 1;
    }

    let executor = ToolExecutor::with_defaults(registry.clone(), &scratch_dir);
    let engine = ReasoningEngine::new(
        oracle,
        executor,
        registry,
        sink,
        EngineConfig {
            turn_budget: worker_config.max_turns,
            reply_schema: ReplySchema::from_prompt_version(&worker_config.prompt_version),
            ..Default::default()
        },
    );

    let report = engine.run(&worker_config.goal).await;

    if report.success {
        if let Some(result) = report.final_result.as_deref() {
            match write_final_result(Path::new(&worker_config.results_dir), result) {
                Ok(path) => info!("Final result saved to {}", path.display()),
                Err(e) => error!("Failed to save final result: {}", e),
            }
        }
    }

    // Human-readable trailer; the control plane filters non-event lines.
    println!("--- investigation summary ---");
    println!("{}", report.summary);

    purge_scratch(&scratch_dir);

    if report.success {
        0
    } else {
        1
    }
}

/// Per-run scratch directory, exclusively owned by this worker.
fn scratch_dir_for_run() -> PathBuf {
    std::env::temp_dir().join(format!(
        "oats-scratch-{}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    ))
}

/// Persist the final result artifact.
fn write_final_result(results_dir: &Path, result: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(results_dir)?;
    let path = results_dir.join(artifact_filename(chrono::Utc::now()));
    std::fs::write(&path, result)?;
    Ok(path)
}

fn artifact_filename(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("final_result_{}.txt", now.format("%Y%m%d_%H%M%S"))
}

/// Best-effort cleanup; the container filesystem dies with the job anyway.
fn purge_scratch(scratch_dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(scratch_dir) {
        info!("Scratch cleanup skipped: {}", e);
    }
}
