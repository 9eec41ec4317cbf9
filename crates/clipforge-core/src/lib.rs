//! ClipForge Core — transport-agnostic logic for the AI video workflow
//! orchestrator.
//!
//! A prompt and a set of target platforms become ten agent tasks (content,
//! video, music, image, voice, editing, optimization, analytics, safety,
//! social), run in sequential, parallel or hybrid stages through the
//! [`Orchestrator`], and aggregate into one `WorkflowResult`.
//!
//! The crate has **no HTTP framework dependency** by default, so it serves:
//!
//! - the HTTP server (via `clipforge-server`)
//! - the CLI (`clipforge`), which runs workflows in-process
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod orchestration;
pub mod providers;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::AppConfig;
pub use db::Database;
pub use error::{EngineError, ServerError};
pub use orchestration::{DispatchPolicy, Orchestrator};
pub use state::{AppState, AppStateInner};
pub use workflow::{WorkflowEngine, WorkflowTracker};
