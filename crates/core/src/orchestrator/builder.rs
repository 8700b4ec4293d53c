use std::sync::Arc;

use agent_router_model::ModelProvider;

use super::{Inner, Orchestrator, OrchestratorConfig};
use crate::model_client::ModelClient;
use crate::tool::ToolRegistry;

/// [`Orchestrator`] builder.
pub struct OrchestratorBuilder {
    model_client: ModelClient,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the specified model provider and the tools
    /// it may call.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            registry,
            config: Default::default(),
        }
    }

    /// Replaces the default loop settings.
    #[inline]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Orchestrator {
        let Self {
            model_client,
            registry,
            config,
        } = self;

        let tool_definitions = registry.definitions();
        let inner = Inner {
            model_client: model_client.with_deadline(config.model_timeout()),
            registry,
            tool_definitions,
            config,
        };
        Orchestrator {
            inner: Arc::new(inner),
        }
    }
}
