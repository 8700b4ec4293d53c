use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use agent_router_model::ModelTool;
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::Instrument;

use super::schema::validate_arguments;
use super::{Error, Tool, ToolName, ToolObject, ToolObjectImpl, ToolResult};

/// Deadline for one tool dispatch unless configured otherwise.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A registry could not be built.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A declared tool has no handler.
    #[error("no handler registered for tool `{0}`")]
    MissingHandler(ToolName),
    /// A tool has more than one handler.
    #[error("more than one handler registered for tool `{0}`")]
    DuplicateHandler(ToolName),
}

/// [`ToolRegistry`] builder.
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn ToolObject>>,
    timeout: Duration,
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self {
            tools: vec![],
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl ToolRegistryBuilder {
    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(ToolObjectImpl(tool)));
        self
    }

    /// Sets the deadline applied to each dispatch.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the registry.
    ///
    /// Fails unless every [`ToolName`] has exactly one handler.
    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut tools = BTreeMap::new();
        for tool in self.tools {
            let name = tool.name();
            if tools.insert(name, tool).is_some() {
                return Err(RegistryError::DuplicateHandler(name));
            }
        }
        if let Some(missing) =
            ToolName::ALL.into_iter().find(|name| !tools.contains_key(name))
        {
            return Err(RegistryError::MissingHandler(missing));
        }
        Ok(ToolRegistry {
            tools,
            timeout: self.timeout,
        })
    }
}

/// An object that owns the toolset and handles requests from the model.
///
/// The registry is read-only once built and is meant to be shared across
/// requests behind an [`Arc`].
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn ToolObject>>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Returns the deadline applied to each dispatch.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the schemas of all tools, in declaration order.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().as_str().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Returns `true` if `tool` declares a parameter called `param`.
    pub fn declares_parameter(&self, tool: ToolName, param: &str) -> bool {
        self.tools
            .get(&tool)
            .and_then(|tool| tool.parameter_schema().get("properties"))
            .and_then(Value::as_object)
            .is_some_and(|properties| properties.contains_key(param))
    }

    /// Validates a tool request and runs its handler.
    ///
    /// Name and argument problems fail with a `Validation` error without
    /// touching the handler. The handler itself runs on its own task, so
    /// several dispatches can make progress at once. A handler that fails,
    /// panics or outlives the deadline yields an `Execution` error.
    ///
    /// The returned future does not borrow the registry.
    pub fn dispatch(
        &self,
        name: &str,
        arguments: Value,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let span = debug_span!("tool registry", tool = name);
        let checked = span.in_scope(|| self.check(name, &arguments));
        let deadline = self.timeout;
        async move {
            let tool = match checked {
                Ok(tool) => tool,
                Err(err) => {
                    debug!("rejected tool request: {err}");
                    return Err(err);
                }
            };
            let name = tool.name();

            trace!("spawning {name} with args: {arguments:?}");
            let mut handle = tokio::spawn(tool.execute(arguments));
            match timeout(deadline, &mut handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => {
                    error!("{name} handler crashed: {join_err}");
                    Err(Error::execution()
                        .with_reason(format!("{name} handler crashed")))
                }
                Err(_) => {
                    // The side effects in flight are not rolled back.
                    handle.abort();
                    warn!("{name} exceeded {deadline:?}");
                    Err(Error::execution().with_reason(format!(
                        "{name} timed out after {}s",
                        deadline.as_secs_f64()
                    )))
                }
            }
        }
        .instrument(span)
    }

    fn check(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<Arc<dyn ToolObject>, Error> {
        let tool_name = name.parse::<ToolName>().map_err(|err| {
            warn!("tool not found: {name}");
            Error::validation().with_reason(format!("{err}")).with_field("name")
        })?;
        let tool = self
            .tools
            .get(&tool_name)
            .ok_or_else(|| {
                Error::validation()
                    .with_reason(format!("tool `{tool_name}` is unavailable"))
                    .with_field("name")
            })?;
        validate_arguments(tool.parameter_schema(), arguments)?;
        Ok(Arc::clone(tool))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::tool::ErrorKind;

    static SCHEMA: LazyLock<Value> = LazyLock::new(|| {
        json!({
            "type": "object",
            "properties": {
                "customer_id": { "type": "string" },
                "delay_ms": { "type": "integer", "minimum": 0 }
            },
            "required": ["customer_id"]
        })
    });

    #[derive(Deserialize)]
    struct Input {
        customer_id: String,
        #[serde(default)]
        delay_ms: u64,
    }

    struct TestTool {
        name: ToolName,
        calls: Arc<AtomicUsize>,
    }

    impl TestTool {
        fn new(name: ToolName) -> Self {
            Self {
                name,
                calls: Default::default(),
            }
        }
    }

    impl Tool for TestTool {
        type Input = Input;

        fn name(&self) -> ToolName {
            self.name
        }

        fn description(&self) -> &str {
            "A test tool"
        }

        fn parameter_schema(&self) -> &Value {
            &SCHEMA
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if input.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(input.delay_ms))
                        .await;
                }
                if input.customer_id == "boom" {
                    panic!("handler blew up");
                }
                if input.customer_id.is_empty() {
                    return Err(Error::execution().with_reason("empty id"));
                }
                Ok(json!({ "echo": input.customer_id }))
            }
        }
    }

    fn registry() -> (ToolRegistry, Arc<AtomicUsize>) {
        let search = TestTool::new(ToolName::SearchKb);
        let calls = Arc::clone(&search.calls);
        let registry = ToolRegistryBuilder::default()
            .with_tool(search)
            .with_tool(TestTool::new(ToolName::CreateTicket))
            .with_tool(TestTool::new(ToolName::ScheduleFollowup))
            .with_timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        (registry, calls)
    }

    #[test]
    fn test_build() {
        let err = ToolRegistryBuilder::default()
            .with_tool(TestTool::new(ToolName::SearchKb))
            .build()
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::MissingHandler(ToolName::CreateTicket));

        let err = ToolRegistryBuilder::default()
            .with_tool(TestTool::new(ToolName::SearchKb))
            .with_tool(TestTool::new(ToolName::SearchKb))
            .build()
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateHandler(ToolName::SearchKb));

        let (registry, _) = registry();
        let names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, ["search_kb", "create_ticket", "schedule_followup"]);
        assert!(registry.declares_parameter(ToolName::SearchKb, "customer_id"));
        assert!(!registry.declares_parameter(ToolName::SearchKb, "query"));
    }

    #[tokio::test]
    async fn test_dispatch() {
        let (registry, calls) = registry();
        let result = registry
            .dispatch("search_kb", json!({ "customer_id": "c_1" }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "echo": "c_1" }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = registry
            .dispatch("create_ticket", json!({ "customer_id": "" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.reason(), "empty id");
    }

    #[tokio::test]
    async fn test_validation_skips_handler() {
        let (registry, calls) = registry();

        let err = registry.dispatch("drop_tables", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.fields(), ["name"]);

        let err = registry.dispatch("search_kb", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.fields(), ["customer_id"]);

        let err = registry
            .dispatch("search_kb", json!("not an object"))
            .await
            .unwrap_err();
        assert_eq!(err.fields(), ["arguments"]);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_and_panic() {
        let (registry, _) = registry();
        let err = registry
            .dispatch(
                "search_kb",
                json!({ "customer_id": "slow", "delay_ms": 5_000 }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.reason().contains("timed out"));

        let err = registry
            .dispatch("search_kb", json!({ "customer_id": "boom" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.reason().contains("crashed"));
    }

    /// Remembers the spans every warning was logged in.
    #[derive(Clone, Default)]
    struct WarningSpans(Arc<std::sync::Mutex<Vec<Vec<&'static str>>>>);

    impl<S> tracing_subscriber::Layer<S> for WarningSpans
    where
        S: tracing::Subscriber
            + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() != tracing::Level::WARN {
                return;
            }
            let spans = ctx
                .event_scope(event)
                .map(|scope| scope.map(|span| span.name()).collect())
                .unwrap_or_default();
            self.0.lock().unwrap().push(spans);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_logged_in_span() {
        use tracing_subscriber::layer::SubscriberExt as _;

        let warnings = WarningSpans::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(warnings.clone()),
        );

        let (registry, _) = registry();
        registry
            .dispatch(
                "search_kb",
                json!({ "customer_id": "slow", "delay_ms": 5_000 }),
            )
            .await
            .unwrap_err();
        registry.dispatch("drop_tables", json!({})).await.unwrap_err();

        let warnings = warnings.0.lock().unwrap();
        assert_eq!(warnings.len(), 2);
        for spans in warnings.iter() {
            assert_eq!(spans.as_slice(), ["tool registry"]);
        }
    }

    #[tokio::test]
    async fn test_dispatch_future_outlives_registry() {
        let (registry, _) = registry();
        let fut = registry.dispatch("search_kb", json!({ "customer_id": "c" }));
        drop(registry);
        assert!(fut.await.is_ok());
    }
}
