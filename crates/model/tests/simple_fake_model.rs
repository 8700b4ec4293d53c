use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use agent_router_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    Role, ToolCallRequest,
};
use serde_json::json;
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fake provider failed: {}", self.0)
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Answers pricing questions by looking them up first, everything else by
/// echoing the question back word by word.
struct FakeModelResponse {
    pending: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeModelResponse {
    fn new(input: &str) -> Self {
        let mut pending: VecDeque<_> = VecDeque::new();
        if input.contains("price") {
            pending.push_back(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: "call_0".to_owned(),
                name: "search_kb".to_owned(),
                arguments: json!({ "query": input, "top_k": 3 }),
            }));
            pending.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::ToolCalls,
            ));
        } else {
            let words: Vec<_> = format!("You asked: {input}")
                .split(' ')
                .map(ToString::to_string)
                .collect();
            let last = words.len() - 1;
            for (idx, mut word) in words.into_iter().enumerate() {
                if idx != last {
                    word.push(' ');
                }
                pending.push_back(ModelResponseEvent::MessageDelta(word));
            }
            pending.push_back(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ));
        }
        Self {
            pending,
            sleep: None,
        }
    }
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeModelProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep(Duration::from_millis(1))));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;
        Poll::Ready(Ok(this.pending.pop_front()))
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;
    type Response = FakeModelResponse;

    fn model(&self) -> &str {
        "fake-1"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let question = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let result = match question {
            Some(question) => Ok(FakeModelResponse::new(&question)),
            None => Err(FakeModelProviderError(ErrorKind::InvalidResponse)),
        };
        ready(result)
    }
}

async fn collect(
    resp: FakeModelResponse,
) -> (String, Vec<ToolCallRequest>, Option<ModelFinishReason>) {
    use std::future::poll_fn;

    let mut resp = Box::pin(resp);
    let mut text = String::new();
    let mut tool_calls = vec![];
    let mut finish = None;
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::ToolCall(req) => tool_calls.push(req),
            ModelResponseEvent::Completed(reason) => finish = Some(reason),
        }
    }
    (text, tool_calls, finish)
}

#[tokio::test]
async fn test_text_completion() {
    let provider = FakeModelProvider;
    assert_eq!(provider.model(), "fake-1");

    let req = ModelRequest {
        messages: vec![
            ModelMessage::System("Be brief.".to_owned()),
            ModelMessage::User("Good morning".to_owned()),
        ],
        tools: vec![],
    };
    assert_eq!(req.messages[0].role(), Role::System);

    let resp = provider.send_request(&req).await.unwrap();
    let (text, tool_calls, finish) = collect(resp).await;
    assert_eq!(text, "You asked: Good morning");
    assert!(tool_calls.is_empty());
    assert_eq!(finish, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_tool_call_completion() {
    let provider = FakeModelProvider;
    let req = ModelRequest {
        messages: vec![ModelMessage::User("price of plan A".to_owned())],
        tools: vec![],
    };
    let resp = provider.send_request(&req).await.unwrap();
    let (text, tool_calls, finish) = collect(resp).await;
    assert!(text.is_empty());
    assert_eq!(tool_calls.len(), 1);
    assert_eq!(tool_calls[0].name, "search_kb");
    assert_eq!(tool_calls[0].arguments["top_k"], 3);
    assert_eq!(finish, Some(ModelFinishReason::ToolCalls));
}

#[tokio::test]
async fn test_error() {
    let provider = FakeModelProvider;
    let req = ModelRequest::default();
    let err = provider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert!(!err.kind().is_timeout());
}
