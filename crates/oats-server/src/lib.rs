//! oats-server: the investigation control plane
//!
//! A stateless axum server that accepts investigation requests,
//! materializes each one as an ephemeral orchestrator job running the
//! worker image, tracks its lifecycle, and multiplexes the worker's event
//! stream to attached clients. The plane itself holds no durable state:
//! crash-restart drops in-flight stream attachments, but workers continue
//! and their events remain replayable from orchestrator log retention.

pub mod config;
pub mod handlers;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ServerConfig;
pub use routes::create_router;
pub use state::AppState;
