use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpaqueMessage;
use crate::provider::ModelProviderError;

/// A streamed response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// - `Poll::Pending` means the next event is not ready yet; the current
    ///   task will be woken when it may be.
    /// - `Poll::Ready(Ok(Some(event)))` delivers an event. More may follow.
    /// - `Poll::Ready(Ok(None))` means the response has completed. Calling
    ///   again after completion keeps returning `None`.
    /// - `Poll::Ready(Err(error))` means the response failed.
    ///
    /// Tool call events are emitted only once their arguments are complete.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;

    /// Makes an [`OpaqueMessage`] holding the provider-native form of the
    /// assistant message in this response.
    ///
    /// Only meaningful once every event has been polled. Implementations
    /// return the same message on every call.
    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        None
    }
}

/// The reason why a model response has finished.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelFinishReason {
    /// The model wants one or more tools to run.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
    /// Generation hit the provider's output limit.
    Length,
    /// The provider filtered the output.
    ContentFilter,
}

impl ModelFinishReason {
    /// Maps an OpenAI-style `finish_reason` string.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "tool_calls" | "function_call" => ModelFinishReason::ToolCalls,
            "length" => ModelFinishReason::Length,
            "content_filter" => ModelFinishReason::ContentFilter,
            _ => ModelFinishReason::Stop,
        }
    }
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned id; the matching tool result must echo it.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments, normally a JSON object.
    ///
    /// When the model emits arguments that are not valid JSON, providers
    /// pass the raw text through as a string so it can be reported back.
    pub arguments: Value,
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The response has been completed.
    Completed(ModelFinishReason),
    /// Received a message delta.
    MessageDelta(String),
    /// Received a complete tool call request.
    ToolCall(ToolCallRequest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_from_wire() {
        assert_eq!(
            ModelFinishReason::from_wire("tool_calls"),
            ModelFinishReason::ToolCalls
        );
        assert_eq!(
            ModelFinishReason::from_wire("length"),
            ModelFinishReason::Length
        );
        assert_eq!(
            ModelFinishReason::from_wire("stop"),
            ModelFinishReason::Stop
        );
        assert_eq!(
            ModelFinishReason::from_wire("something_new"),
            ModelFinishReason::Stop
        );
    }
}
