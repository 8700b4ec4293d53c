//! Core logic of the agent router: the tool-calling loop, the tool registry,
//! the model client and per-request tracing.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod error;
pub mod model_client;
mod orchestrator;
mod task;
pub mod tool;
pub mod trace;

pub use error::{RunError, RunErrorKind, RunFailure, RunResult, RunSuccess};
pub use orchestrator::{
    DEFAULT_LANGUAGE, DEFAULT_MAX_ITERATIONS, Orchestrator, OrchestratorBuilder,
    OrchestratorConfig, OrchestratorConfigBuilder,
};
pub use task::Task;
