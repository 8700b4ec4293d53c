//! A type-erased client performing one round trip to the model.

use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use agent_router_model::{
    ModelFinishReason, ModelMessage, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ModelTool, OpaqueMessage,
    ToolCallRequest,
};
use thiserror::Error;
use tokio::time::timeout;
use tracing::Instrument;

use crate::conversation::Conversation;

/// Deadline for one model call unless configured otherwise.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// The only failures a model round trip can produce.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The provider failed, rejected the request or answered with something
    /// that could not be decoded.
    #[error("upstream model failure: {0}")]
    Upstream(String),
    /// The call did not complete before its deadline.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

type CompleteResult = Result<ModelReply, ModelError>;
type BoxedCompleteFuture = Pin<Box<dyn Future<Output = CompleteResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest, Duration) -> BoxedCompleteFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
///
/// Every call is bounded by a deadline covering both the request and the
/// streamed answer.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    model: Arc<str>,
    deadline: Duration,
}

impl ModelClient {
    /// Wraps `provider`, bounding each call by [`DEFAULT_MODEL_TIMEOUT`].
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let model: Arc<str> = provider.model().into();
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, deadline| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {req:?}");
                    let reply = timeout(deadline, async move {
                        handle_response::<P>(fut.await).await
                    })
                    .await;
                    let Ok(reply) = reply else {
                        warn!("model call exceeded {deadline:?}");
                        return Err(ModelError::Timeout(deadline));
                    };
                    // Provider-side timeouts are reported with the caller's
                    // deadline.
                    reply.map_err(|err| match err {
                        ModelError::Timeout(_) => ModelError::Timeout(deadline),
                        err => err,
                    })
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            model,
            deadline: DEFAULT_MODEL_TIMEOUT,
        }
    }

    /// Replaces the deadline applied to each call.
    #[inline]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns the identifier of the model behind this client.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the deadline applied to each call.
    #[inline]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Sends the whole conversation along with the available tools and
    /// waits for the complete reply.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ModelTool],
    ) -> Result<ModelReply, ModelError> {
        let req = ModelRequest {
            messages: conversation.to_messages(),
            tools: tools.to_vec(),
        };
        (self.handler_fn)(req, self.deadline).await
    }
}

/// A completely received reply from the model.
#[derive(Clone, Debug)]
pub struct ModelReply {
    /// The text the model produced, possibly empty.
    pub content: String,
    /// The provider-native assistant message, if the provider keeps one.
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model, in the order they were emitted.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

impl ModelReply {
    /// Returns the message to append to the conversation.
    ///
    /// The provider-native form is preferred since it carries the tool call
    /// metadata the provider needs to match results to requests.
    pub fn to_message(&self) -> ModelMessage {
        match &self.opaque_msg {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg.clone()),
            // Downgrade to a text-only message.
            None => ModelMessage::Assistant(self.content.clone()),
        }
    }
}

fn map_provider_error<E: ModelProviderError>(err: E) -> ModelError {
    error!("got an error: {err}");
    if err.kind().is_timeout() {
        ModelError::Timeout(Duration::ZERO)
    } else {
        ModelError::Upstream(format!("{err}"))
    }
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> CompleteResult {
    let resp = resp_or_err.map_err(map_provider_error)?;

    let mut content = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event = poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx))
            .await
            .map_err(map_provider_error)?;

        let Some(event) = event else {
            // The request has been handled gracefully without errors,
            // now try getting the opaque message for this response.
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                content.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelReply {
        content,
        opaque_msg,
        tool_calls,
        finish_reason,
    })
}
