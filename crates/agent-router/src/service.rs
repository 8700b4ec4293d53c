use std::sync::Arc;
use std::time::Duration;

use agent_router_core::tool::{
    DEFAULT_TOOL_TIMEOUT, RegistryError, ToolRegistryBuilder,
};
use agent_router_core::{
    Orchestrator, OrchestratorBuilder, OrchestratorConfig, RunResult, Task,
};
use agent_router_model::ModelProvider;

use crate::config::DEFAULT_KB_PATH;
use crate::kb::{JsonKnowledgeBase, SearchIndex};
use crate::storage::{MemoryStore, RecordStore};
use crate::tools::*;

/// A service builder.
///
/// See [`Service`].
pub struct ServiceBuilder<M> {
    provider: M,
    store: Option<Arc<dyn RecordStore>>,
    index: Option<Arc<dyn SearchIndex>>,
    config: OrchestratorConfig,
    tool_timeout: Duration,
}

impl<M: ModelProvider + 'static> ServiceBuilder<M> {
    /// Creates a service builder with a specified model provider.
    pub fn with_model_provider(provider: M) -> Self {
        Self {
            provider,
            store: None,
            index: None,
            config: Default::default(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Sets where tickets and follow-ups are kept. Defaults to memory.
    #[inline]
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the knowledge base. Defaults to the JSON file at
    /// [`DEFAULT_KB_PATH`].
    #[inline]
    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the loop settings.
    #[inline]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the deadline applied to each tool dispatch.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Builds a new service with every tool registered.
    pub fn build(self) -> Result<Service, RegistryError> {
        let store: Arc<dyn RecordStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let index: Arc<dyn SearchIndex> = match self.index {
            Some(index) => index,
            None => Arc::new(JsonKnowledgeBase::new(DEFAULT_KB_PATH)),
        };

        let registry = ToolRegistryBuilder::default()
            .with_tool(SearchKbTool::new(index))
            .with_tool(CreateTicketTool::new(Arc::clone(&store)))
            .with_tool(ScheduleFollowupTool::new(Arc::clone(&store)))
            .with_timeout(self.tool_timeout)
            .build()?;

        let tool_timeout = registry.timeout();
        let orchestrator = OrchestratorBuilder::with_model_provider(
            self.provider,
            Arc::new(registry),
        )
        .with_config(self.config)
        .build();
        info!(
            model = orchestrator.model(),
            max_iterations = orchestrator.config().max_iterations(),
            ?tool_timeout,
            "service ready"
        );

        Ok(Service {
            orchestrator,
            store,
        })
    }
}

/// The fully assembled agent: the loop, its tools and their storage.
///
/// It is basically a wrapper around [`Orchestrator`], and as cheap to clone.
#[derive(Clone)]
pub struct Service {
    orchestrator: Orchestrator,
    store: Arc<dyn RecordStore>,
}

impl Service {
    /// Runs a task to completion.
    #[inline]
    pub async fn run(&self, task: Task) -> RunResult {
        self.orchestrator.run(task).await
    }

    /// Returns the identifier of the model in use.
    #[inline]
    pub fn model(&self) -> &str {
        self.orchestrator.model()
    }

    /// Returns the store the tools write to.
    #[inline]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}
