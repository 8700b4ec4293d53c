//! The bounded tool-calling loop.

mod builder;
mod config;
mod prompt;
mod state;

use std::sync::Arc;

use agent_router_model::ModelTool;
use tracing::Instrument;

use crate::error::RunResult;
use crate::model_client::ModelClient;
use crate::task::Task;
use crate::tool::ToolRegistry;
pub use builder::OrchestratorBuilder;
pub use config::{
    DEFAULT_LANGUAGE, DEFAULT_MAX_ITERATIONS, OrchestratorConfig,
    OrchestratorConfigBuilder,
};
use state::Run;

/// Runs tasks through the model and the tools until the model answers.
///
/// An orchestrator is a cheap handle: clone it freely. Each call to
/// [`Orchestrator::run`] owns its own conversation and tracer, and only the
/// model client and the tool registry are shared.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    model_client: ModelClient,
    registry: Arc<ToolRegistry>,
    tool_definitions: Vec<ModelTool>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Returns the identifier of the model in use.
    #[inline]
    pub fn model(&self) -> &str {
        self.inner.model_client.model()
    }

    /// Returns the loop settings.
    #[inline]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Runs `task` to completion.
    ///
    /// Every model call and every tool dispatch has its own deadline, so this
    /// always terminates. On failure the trace gathered so far is returned
    /// along with the error.
    pub async fn run(&self, task: Task) -> RunResult {
        let run = Run::new(Arc::clone(&self.inner), task);
        let span = info_span!("agent run", trace_id = %run.trace_id());
        run.drive().instrument(span).await
    }
}
