use std::sync::Arc;
use std::time::Instant;

use agent_router_model::{ModelMessage, ToolCallRequest, ToolCallResult};
use futures_util::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use super::Inner;
use super::prompt::system_directive;
use crate::conversation::Conversation;
use crate::error::{RunError, RunErrorKind, RunFailure, RunResult, RunSuccess};
use crate::model_client::ModelReply;
use crate::task::Task;
use crate::tool::ToolName;
use crate::trace::{ToolCallRecord, ToolOutcome, Tracer, duration_ms};

/// Stands in for a final answer the model left empty.
pub(crate) const EMPTY_ANSWER_FALLBACK: &str =
    "I apologize, but I couldn't generate a response.";

const CUSTOMER_ID_PARAM: &str = "customer_id";

// Task texts are cut to this many characters in logs.
const TASK_PREVIEW_CHARS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Init,
    CallingModel,
    DispatchingTools,
    Done,
    Failed(RunErrorKind),
}

impl Stage {
    #[inline]
    fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }
}

/// The state of one run. Owned by the task driving it.
pub(super) struct Run {
    inner: Arc<Inner>,
    task: Task,
    conversation: Conversation,
    tracer: Tracer,
    stage: Stage,
}

impl Run {
    pub(super) fn new(inner: Arc<Inner>, task: Task) -> Self {
        let tracer = Tracer::new(inner.model_client.model());
        Self {
            inner,
            task,
            conversation: Default::default(),
            tracer,
            stage: Stage::Init,
        }
    }

    #[inline]
    pub(super) fn trace_id(&self) -> Uuid {
        self.tracer.trace_id()
    }

    fn enter(&mut self, stage: Stage) {
        debug_assert!(!self.stage.is_terminal(), "run already ended");
        trace!("stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    pub(super) async fn drive(mut self) -> RunResult {
        info!(
            customer_id = self.task.customer_id.as_deref(),
            "run started: {}",
            preview(&self.task.text)
        );
        self.seed_conversation();

        let max = self.inner.config.max_iterations();
        for _ in 0..max {
            let iteration = self.tracer.begin_iteration();
            self.enter(Stage::CallingModel);

            // Failed calls count as round trips too.
            self.tracer.count_round_trip();
            let reply = match self
                .inner
                .model_client
                .complete(&self.conversation, &self.inner.tool_definitions)
                .await
            {
                Ok(reply) => reply,
                Err(err) => return self.fail(err.into()),
            };
            self.conversation
                .push(reply.to_message(), assistant_transcript(&reply));

            if reply.tool_calls.is_empty() {
                return self.succeed(reply.content);
            }

            self.enter(Stage::DispatchingTools);
            self.dispatch_tools(iteration, reply.tool_calls).await;
        }

        warn!("no final answer after {max} iterations");
        self.fail(RunError::IterationLimitExceeded { max })
    }

    fn seed_conversation(&mut self) {
        let language = self
            .task
            .language
            .as_deref()
            .filter(|language| !language.trim().is_empty())
            .unwrap_or(self.inner.config.default_language());
        let directive =
            system_directive(language, chrono::Utc::now().date_naive());
        self.conversation
            .push(ModelMessage::System(directive.clone()), directive);
        self.conversation.push(
            ModelMessage::User(self.task.text.clone()),
            self.task.text.clone(),
        );
    }

    /// Dispatches every request of one iteration concurrently, then appends
    /// the results in request order.
    async fn dispatch_tools(
        &mut self,
        iteration: u32,
        requests: Vec<ToolCallRequest>,
    ) {
        debug!("dispatching {} tool call(s)", requests.len());
        let dispatches = requests.iter().map(|req| {
            let arguments = self.fill_customer_id(&req.name, req.arguments.clone());
            let fut = self.inner.registry.dispatch(&req.name, arguments.clone());
            async move {
                let started_at = Instant::now();
                let outcome = ToolOutcome::from(fut.await);
                (arguments, outcome, started_at.elapsed())
            }
        });
        let finished = join_all(dispatches).await;

        for (req, (arguments, outcome, elapsed)) in
            requests.into_iter().zip(finished)
        {
            let content = outcome.to_payload().to_string();
            self.conversation.push(
                ModelMessage::Tool(ToolCallResult {
                    id: req.id.clone(),
                    content: content.clone(),
                }),
                content,
            );
            self.tracer.record(ToolCallRecord {
                call_id: req.id,
                name: req.name,
                arguments,
                outcome,
                iteration,
                duration_ms: duration_ms(elapsed),
            });
        }
    }

    /// Fills in the task's customer id when the tool declares the parameter
    /// and the model left it out.
    fn fill_customer_id(&self, name: &str, mut arguments: Value) -> Value {
        let Some(customer_id) = &self.task.customer_id else {
            return arguments;
        };
        let Ok(tool) = name.parse::<ToolName>() else {
            return arguments;
        };
        if !self.inner.registry.declares_parameter(tool, CUSTOMER_ID_PARAM) {
            return arguments;
        }
        if let Value::Object(map) = &mut arguments {
            if map.get(CUSTOMER_ID_PARAM).is_none_or(Value::is_null) {
                debug!("filling in customer id for {tool}");
                map.insert(
                    CUSTOMER_ID_PARAM.to_owned(),
                    Value::String(customer_id.clone()),
                );
            }
        }
        arguments
    }

    fn succeed(mut self, content: String) -> RunResult {
        self.enter(Stage::Done);
        let final_answer = if content.trim().is_empty() {
            warn!("model returned an empty answer");
            EMPTY_ANSWER_FALLBACK.to_owned()
        } else {
            content
        };
        let trace = self.tracer.finish();
        info!(
            latency_ms = trace.latency_ms,
            round_trips = trace.round_trips,
            tool_calls = trace.tool_calls.len(),
            model = %trace.model,
            "run finished"
        );
        Ok(RunSuccess {
            final_answer,
            trace,
        })
    }

    fn fail(mut self, error: RunError) -> RunResult {
        self.enter(Stage::Failed(error.kind()));
        let trace = self.tracer.finish();
        error!(
            kind = ?error.kind(),
            latency_ms = trace.latency_ms,
            round_trips = trace.round_trips,
            "run failed: {error}"
        );
        Err(RunFailure { error, trace })
    }
}

fn assistant_transcript(reply: &ModelReply) -> String {
    if reply.tool_calls.is_empty() || !reply.content.is_empty() {
        return reply.content.clone();
    }
    let names: Vec<_> =
        reply.tool_calls.iter().map(|call| call.name.as_str()).collect();
    format!("[tool calls: {}]", names.join(", "))
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(TASK_PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
