//! The HTTP API.

use agent_router_core::trace::{ToolCallRecord, Trace};
use agent_router_core::{RunErrorKind, RunFailure, RunSuccess, Task};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::service::Service;

/// Longest accepted task, in characters.
pub const MAX_TASK_CHARS: usize = 5000;
/// Longest accepted customer id, in characters.
pub const MAX_CUSTOMER_ID_CHARS: usize = 100;
/// Longest accepted language code, in characters.
pub const MAX_LANGUAGE_CHARS: usize = 10;

const RUN_PATH: &str = "/v1/agent/run";

/// Builds the router serving the agent API.
pub fn router(service: Service) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
        .route(RUN_PATH, get(run_usage).post(run_agent))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Body of `POST /v1/agent/run`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RunRequest {
    /// What the agent should do.
    pub task: String,
    /// The customer the task is about.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// The language of the answer.
    #[serde(default)]
    pub language: Option<String>,
}

impl RunRequest {
    /// Checks the request and turns it into a task.
    pub fn into_task(self) -> Result<Task, String> {
        let text = self.task.trim();
        if text.is_empty() {
            return Err("`task` must not be empty".to_owned());
        }
        if text.chars().count() > MAX_TASK_CHARS {
            return Err(format!(
                "`task` must be at most {MAX_TASK_CHARS} characters"
            ));
        }
        let mut task = Task::new(text);

        if let Some(customer_id) = non_blank(self.customer_id) {
            if customer_id.chars().count() > MAX_CUSTOMER_ID_CHARS {
                return Err(format!(
                    "`customer_id` must be at most {MAX_CUSTOMER_ID_CHARS} characters"
                ));
            }
            task = task.with_customer_id(customer_id);
        }
        if let Some(language) = non_blank(self.language) {
            if language.chars().count() > MAX_LANGUAGE_CHARS {
                return Err(format!(
                    "`language` must be at most {MAX_LANGUAGE_CHARS} characters"
                ));
            }
            task = task.with_language(language);
        }
        Ok(task)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct ToolCallView {
    name: String,
    arguments: Value,
    result: Value,
}

impl From<&ToolCallRecord> for ToolCallView {
    fn from(record: &ToolCallRecord) -> Self {
        ToolCallView {
            name: record.name.clone(),
            arguments: record.arguments.clone(),
            result: record.outcome.to_payload(),
        }
    }
}

fn tool_call_views(trace: &Trace) -> Vec<ToolCallView> {
    trace.tool_calls.iter().map(ToolCallView::from).collect()
}

#[derive(Debug, Serialize)]
struct Metrics {
    latency_ms: u64,
    model: String,
    round_trip_count: u32,
    iterations: u32,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    trace_id: String,
    final_answer: String,
    tool_calls: Vec<ToolCallView>,
    metrics: Metrics,
}

impl From<RunSuccess> for RunResponse {
    fn from(success: RunSuccess) -> Self {
        let trace = success.trace;
        RunResponse {
            trace_id: trace.trace_id.to_string(),
            final_answer: success.final_answer,
            tool_calls: tool_call_views(&trace),
            metrics: Metrics {
                latency_ms: trace.latency_ms,
                model: trace.model,
                round_trip_count: trace.round_trips,
                iterations: trace.iterations,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct FailureResponse {
    trace_id: String,
    error: String,
    latency_ms: u64,
    tool_calls: Vec<ToolCallView>,
}

impl From<RunFailure> for FailureResponse {
    fn from(failure: RunFailure) -> Self {
        FailureResponse {
            trace_id: failure.trace.trace_id.to_string(),
            error: failure.error.to_string(),
            latency_ms: failure.trace.latency_ms,
            tool_calls: tool_call_views(&failure.trace),
        }
    }
}

/// Maps a failed run onto the status reported to the client.
pub fn status_for(kind: RunErrorKind) -> StatusCode {
    match kind {
        RunErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        RunErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        RunErrorKind::IterationLimitExceeded => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn info() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "agent": RUN_PATH,
        },
        "usage": {
            "health_check": "GET /health",
            "run_agent": format!("POST {RUN_PATH}"),
            "example_request": {
                "task": "What is the price of plan A?",
                "language": "en",
            },
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_usage() -> Json<Value> {
    Json(json!({
        "error": "This endpoint requires the POST method",
        "method": "POST",
        "endpoint": RUN_PATH,
        "required_fields": {
            "task": "string - the task or question for the agent",
            "customer_id": "string (optional) - the customer the task is about",
            "language": "string (optional) - answer language, e.g. `en`",
        },
        "example": {
            "task": "What is the price of plan A?",
            "language": "en",
        },
    }))
}

async fn run_agent(
    State(service): State<Service>,
    Json(request): Json<RunRequest>,
) -> Response {
    let task = match request.into_task() {
        Ok(task) => task,
        Err(error) => {
            debug!("rejected run request: {error}");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorBody { error }),
            )
                .into_response();
        }
    };

    match service.run(task).await {
        Ok(success) => Json(RunResponse::from(success)).into_response(),
        Err(failure) => {
            let status = status_for(failure.error.kind());
            (status, Json(FailureResponse::from(failure))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: &str) -> RunRequest {
        RunRequest {
            task: task.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_task() {
        let task = RunRequest {
            task: "  What is the price of plan A?\n".to_owned(),
            customer_id: Some(" c_42 ".to_owned()),
            language: Some("".to_owned()),
        }
        .into_task()
        .unwrap();
        assert_eq!(task.text, "What is the price of plan A?");
        assert_eq!(task.customer_id.as_deref(), Some("c_42"));
        assert_eq!(task.language, None);

        assert!(request(" \t ").into_task().is_err());
        assert!(request(&"a".repeat(MAX_TASK_CHARS)).into_task().is_ok());
        assert!(request(&"a".repeat(MAX_TASK_CHARS + 1)).into_task().is_err());

        let err = RunRequest {
            language: Some("portuguese-br".to_owned()),
            ..request("Olá")
        }
        .into_task()
        .unwrap_err();
        assert!(err.contains("language"));
    }

    #[test]
    fn test_status_for() {
        assert_eq!(status_for(RunErrorKind::Upstream), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(RunErrorKind::Timeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(RunErrorKind::IterationLimitExceeded),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
