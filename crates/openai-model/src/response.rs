use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use agent_router_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::{Map, Value};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, Message, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    tool_calls: Vec<ToolCall>,
    // Indices of tool calls whose arguments may still be streaming. They are
    // only emitted once the finish reason arrives.
    pending_tool_call_idx: VecDeque<usize>,
    // Cleared after the response returns the completed event.
    pending_finish_reason: Option<ModelFinishReason>,
}

impl PartialState {
    #[inline]
    fn finish(self) -> Option<(String, Message)> {
        Some((
            self.id?,
            Message::Assistant {
                content: (!self.content.is_empty()).then_some(self.content),
                tool_calls: if self.tool_calls.is_empty() {
                    None
                } else {
                    Some(self.tool_calls)
                },
            },
        ))
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            content: Default::default(),
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = partial_state.finish();
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id.as_str(), msg.clone()))
    }
}

fn map_sse_error(err: SseError) -> Error {
    match err {
        SseError::ChunksError(chunks_err) if chunks_err.timed_out => {
            Error::new("timed out reading the response", ErrorKind::Timeout)
        }
        SseError::ChunksError(_) => {
            Error::new("failed to read the response", ErrorKind::Other)
        }
        SseError::InvalidPayload => {
            Error::new("malformed event stream", ErrorKind::InvalidResponse)
        }
    }
}

fn parse_arguments(raw: Option<&str>) -> Value {
    match raw.map(str::trim) {
        None | Some("") => Value::Object(Map::new()),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|err| {
            debug!("tool call arguments are not JSON: {err}");
            Value::String(raw.to_owned())
        }),
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    let mut message_delta = None;

    // Tool calls are held back until the finish reason arrives, so that
    // their arguments are complete when emitted.
    while message_delta.is_none()
        && partial_state.pending_finish_reason.is_none()
    {
        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => return Err(map_sse_error(err)),
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::InvalidResponse)
            })?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new(
                "chunk id mismatch",
                ErrorKind::InvalidResponse,
            ));
        };

        // Usage-only chunks carry no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            partial_state.content.push_str(&content);
            message_delta = Some(content);
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            merge_tool_calls(&mut partial_state, tool_calls);
        }
        if let Some(finish_reason) = choice.finish_reason {
            partial_state.pending_finish_reason =
                Some(ModelFinishReason::from_wire(&finish_reason));
        }
    }

    // The order of events are important. Always emit message delta first, then
    // emit pending tool calls, and finally emit pending finish reason if any.

    if let Some(message_delta) = message_delta {
        return Ok((
            Some(ModelResponseEvent::MessageDelta(message_delta)),
            partial_state,
        ));
    }

    if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
        let tool_call = &partial_state.tool_calls[idx];
        let function = tool_call.function.as_ref();
        let request = ToolCallRequest {
            id: tool_call.id.clone().unwrap_or_default(),
            name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
            arguments: parse_arguments(
                function.and_then(|f| f.arguments.as_deref()),
            ),
        };
        return Ok((Some(ModelResponseEvent::ToolCall(request)), partial_state));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}

fn merge_tool_calls(partial_state: &mut PartialState, deltas: Vec<ToolCall>) {
    for tool_call in deltas {
        let Some(partial_tool_call) = partial_state
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            partial_state
                .pending_tool_call_idx
                .push_back(partial_state.tool_calls.len());
            partial_state.tool_calls.push(tool_call);
            continue;
        };
        // Patch the partial tool call.
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type.get_or_insert_default().push_str(&ty);
        }
        if let Some(function) = tool_call.function {
            match partial_tool_call.function {
                Some(ref mut partial_func) => {
                    if let Some(name) = function.name {
                        partial_func
                            .name
                            .get_or_insert_default()
                            .push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial_func
                            .arguments
                            .get_or_insert_default()
                            .push_str(&arguments);
                    }
                }
                None => partial_tool_call.function = Some(function),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::io::Chunks;

    async fn collect_events(
        fixture: &'static [u8],
    ) -> (Vec<ModelResponseEvent>, Option<OpaqueMessage>) {
        let chunks =
            Chunks::from_vec_deque(vec![Bytes::from_static(fixture)].into());
        let mut resp = pin!(OpenAIResponse::from_sse(Sse::new(chunks)));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            events.push(event);
        }
        (events, resp.make_opaque_message())
    }

    #[tokio::test]
    async fn test_tool_call_events() {
        let (events, full_msg) =
            collect_events(include_bytes!("../fixtures/tool_call_response.txt"))
                .await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_kb".to_owned(),
                    name: "search_kb".to_owned(),
                    arguments: json!({ "query": "plan A price", "top_k": 3 }),
                }),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_ticket".to_owned(),
                    name: "create_ticket".to_owned(),
                    arguments: json!({
                        "customer_id": "c_42",
                        "summary": "Pricing question",
                        "priority": "low"
                    }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );

        let full_msg = full_msg.unwrap();
        assert_eq!(full_msg.id(), "chatcmpl-7");
        let Message::Assistant {
            content,
            tool_calls,
        } = full_msg.to_raw::<Message>().unwrap()
        else {
            panic!("expected an assistant message");
        };
        assert_eq!(content, &None);
        assert_eq!(tool_calls.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_text_events() {
        let (events, full_msg) =
            collect_events(include_bytes!("../fixtures/text_response.txt"))
                .await;
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Plan A costs ".to_owned()),
                ModelResponseEvent::MessageDelta("$49/month.".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
        let full_msg = full_msg.unwrap();
        assert_eq!(
            full_msg.to_raw::<Message>(),
            Some(&Message::Assistant {
                content: Some("Plan A costs $49/month.".to_owned()),
                tool_calls: None,
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: {not json}\n\n")].into(),
        );
        let mut resp = pin!(OpenAIResponse::from_sse(Sse::new(chunks)));
        let err = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap_err();
        assert_eq!(
            agent_router_model::ModelProviderError::kind(&err),
            ErrorKind::InvalidResponse
        );
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(None), json!({}));
        assert_eq!(parse_arguments(Some("  ")), json!({}));
        assert_eq!(parse_arguments(Some(r#"{"a":1}"#)), json!({ "a": 1 }));
        assert_eq!(parse_arguments(Some("{oops")), json!("{oops"));
    }
}
