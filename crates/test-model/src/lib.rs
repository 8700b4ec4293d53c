//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use agent_router_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    OpaqueMessage,
};
use tokio::time::sleep;

pub use preset::*;

/// Model name reported by [`TestModelProvider`] unless overridden.
pub const TEST_MODEL_NAME: &str = "test-model";

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    step_idx: usize,
    events: VecDeque<PresetEvent>,
    finish_reason: Option<ModelFinishReason>,
    all_events: Vec<PresetEvent>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(event) = this.events.pop_front() {
            let event = match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg)
                }
                PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
            };
            return Poll::Ready(Ok(Some(event)));
        }
        // Keeps returning `None` after completion.
        Poll::Ready(Ok(this.finish_reason.take().map(ModelResponseEvent::Completed)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        Some(OpaqueMessage::new(
            format!("msg:{}", self.step_idx),
            self.all_events.clone(),
        ))
    }
}

/// A local fake model for testing purpose.
///
/// Before sending requests, set up the script of how the model should
/// respond. Each request is answered by the step matching the number of
/// model turns already present in its history, so a fresh conversation gets
/// the first step, the follow-up after a tool round gets the second, and so
/// on. Requests past the end of the script fail.
///
/// Every request is recorded and can be inspected with
/// [`TestModelProvider::requests`].
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    model: Option<String>,
    script: Vec<PresetResponse>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    /// Creates a provider answering with the given steps in order.
    #[inline]
    pub fn with_script(script: impl Into<Vec<PresetResponse>>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn add_response_step(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Overrides the reported model name.
    #[inline]
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// Returns every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn model_turns(req: &ModelRequest) -> usize {
    req.messages
        .iter()
        .filter(|msg| {
            matches!(msg, ModelMessage::Assistant(_) | ModelMessage::Opaque(_))
        })
        .count()
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    #[inline]
    fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(TEST_MODEL_NAME)
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());

        let step_idx = model_turns(req);
        let preset = self.script.get(step_idx).cloned();
        async move {
            let Some(preset) = preset else {
                return Err(Error {
                    message: "script exhausted",
                    kind: ErrorKind::Other,
                });
            };
            if let Some(delay) = preset.delay {
                sleep(delay).await;
            }
            if let Some(kind) = preset.error {
                return Err(Error {
                    message: "scripted failure",
                    kind,
                });
            }

            let has_tool_call = preset
                .events
                .iter()
                .any(|event| matches!(event, PresetEvent::ToolCall(_)));
            Ok(TestModelResponse {
                step_idx,
                events: preset.events.iter().cloned().collect(),
                finish_reason: Some(if has_tool_call {
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                }),
                all_events: preset.events,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;
    use std::time::Duration;

    use agent_router_model::{
        ModelMessage, ModelRequest, ModelTool, ToolCallRequest, ToolCallResult,
    };
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>, OpaqueMessage) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(_) => break,
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        assert_eq!(
            poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap(),
            None
        );
        (msg, tool_call, resp.make_opaque_message().unwrap())
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::with_script([
            PresetResponse::with_events([
                PresetEvent::MessageDelta("Let me ".to_owned()),
                PresetEvent::MessageDelta("check.".to_owned()),
                PresetEvent::ToolCall(ToolCallRequest {
                    id: "tool:1".to_owned(),
                    name: "search_kb".to_owned(),
                    arguments: json!({ "query": "plan A price" }),
                }),
            ]),
            PresetResponse::with_text("Plan A costs $49/month."),
        ]);
        assert_eq!(provider.model(), TEST_MODEL_NAME);

        let mut req = ModelRequest {
            messages: vec![ModelMessage::User("How much is plan A?".to_owned())],
            tools: vec![ModelTool {
                name: "search_kb".to_owned(),
                description: "Searches the knowledge base".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": { "query": { "type": "string" } }
                }),
            }],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, opaque_msg) = collect_response(resp).await;
        assert_eq!(msg, "Let me check.");
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "search_kb");

        req.messages.push(ModelMessage::Opaque(opaque_msg));
        req.messages.push(ModelMessage::Tool(ToolCallResult {
            id: tool_call.id,
            content: r#"{"results":[]}"#.to_owned(),
        }));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, _) = collect_response(resp).await;
        assert_eq!(msg, "Plan A costs $49/month.");
        assert!(tool_call.is_none());

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.requests()[1], req);

        // A third turn is past the end of the script.
        req.messages
            .push(ModelMessage::Assistant("Plan A costs $49/month.".to_owned()));
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_error_and_delay() {
        let provider = TestModelProvider::with_script([PresetResponse::with_error(
            ErrorKind::RateLimitExceeded,
        )
        .delayed(Duration::from_secs(5))]);
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        };

        let started = tokio::time::Instant::now();
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
