//! Per-request execution traces.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::tool::{Error as ToolError, ToolResult};

/// How a tool call ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The handler returned a result.
    Result(Value),
    /// The request was rejected or the handler failed.
    Error(ToolError),
}

impl ToolOutcome {
    /// Returns the JSON fed back to the model for this outcome.
    pub fn to_payload(&self) -> Value {
        match self {
            ToolOutcome::Result(result) => result.clone(),
            ToolOutcome::Error(err) => err.to_payload(),
        }
    }
}

impl From<ToolResult> for ToolOutcome {
    #[inline]
    fn from(result: ToolResult) -> Self {
        match result {
            Ok(value) => ToolOutcome::Result(value),
            Err(err) => ToolOutcome::Error(err),
        }
    }
}

/// One tool call as it happened.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCallRecord {
    /// The id the model gave the call.
    pub call_id: String,
    /// The requested tool name, verbatim.
    pub name: String,
    /// The arguments the handler was given.
    pub arguments: Value,
    /// The result or the structured error.
    pub outcome: ToolOutcome,
    /// The iteration that produced the call, starting at 1.
    pub iteration: u32,
    /// Wall-clock time spent dispatching the call.
    pub duration_ms: u64,
}

/// The trace of one run, complete or partial.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace {
    /// Unique per request.
    pub trace_id: Uuid,
    /// The model that served the run.
    pub model: String,
    /// Tool calls in the order their results entered the conversation.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Iterations started.
    pub iterations: u32,
    /// Model calls attempted, including failed ones.
    pub round_trips: u32,
    /// Time since the run started.
    pub latency_ms: u64,
}

/// Append-only recorder for one run.
#[derive(Debug)]
pub struct Tracer {
    trace_id: Uuid,
    model: String,
    started_at: Instant,
    tool_calls: Vec<ToolCallRecord>,
    iterations: u32,
    round_trips: u32,
}

impl Tracer {
    /// Starts a new trace with a fresh id.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            model: model.into(),
            started_at: Instant::now(),
            tool_calls: vec![],
            iterations: 0,
            round_trips: 0,
        }
    }

    /// Returns the id of this trace.
    #[inline]
    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// Returns the time since the run started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Marks the start of a new iteration and returns its 1-based index.
    #[inline]
    pub fn begin_iteration(&mut self) -> u32 {
        self.iterations += 1;
        self.iterations
    }

    /// Counts one model call.
    #[inline]
    pub fn count_round_trip(&mut self) {
        self.round_trips += 1;
    }

    /// Appends a tool call.
    pub fn record(&mut self, record: ToolCallRecord) {
        debug_assert!(record.iteration <= self.iterations);
        info!(
            tool = %record.name,
            iteration = record.iteration,
            duration_ms = record.duration_ms,
            ok = matches!(record.outcome, ToolOutcome::Result(_)),
            "tool call: {}",
            record.arguments
        );
        self.tool_calls.push(record);
    }

    /// Returns the trace so far.
    pub fn snapshot(&self) -> Trace {
        Trace {
            trace_id: self.trace_id,
            model: self.model.clone(),
            tool_calls: self.tool_calls.clone(),
            iterations: self.iterations,
            round_trips: self.round_trips,
            latency_ms: duration_ms(self.elapsed()),
        }
    }

    /// Finalizes the trace.
    pub fn finish(self) -> Trace {
        let latency_ms = duration_ms(self.elapsed());
        Trace {
            trace_id: self.trace_id,
            model: self.model,
            tool_calls: self.tool_calls,
            iterations: self.iterations,
            round_trips: self.round_trips,
            latency_ms,
        }
    }
}

/// Converts to whole milliseconds, saturating.
#[inline]
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tracer() {
        let mut tracer = Tracer::new("gpt-4o");
        assert_eq!(tracer.begin_iteration(), 1);
        tracer.count_round_trip();
        tracer.record(ToolCallRecord {
            call_id: "call_1".to_owned(),
            name: "search_kb".to_owned(),
            arguments: json!({ "query": "plan A" }),
            outcome: Ok(json!({ "results": [] })).into(),
            iteration: 1,
            duration_ms: 3,
        });
        assert_eq!(tracer.snapshot().tool_calls.len(), 1);

        tracer.begin_iteration();
        tracer.count_round_trip();
        let trace = tracer.finish();
        assert_eq!(trace.iterations, 2);
        assert_eq!(trace.round_trips, 2);
        assert_eq!(trace.model, "gpt-4o");

        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["trace_id"], trace.trace_id.to_string());
        assert_eq!(
            value["tool_calls"][0]["outcome"],
            json!({ "result": { "results": [] } })
        );
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let a = Tracer::new("m");
        let b = Tracer::new("m");
        assert_ne!(a.trace_id(), b.trace_id());
    }

    #[test]
    fn test_error_outcome() {
        let outcome: ToolOutcome =
            Err(ToolError::validation().with_field("query")).into();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "error": { "kind": "validation", "reason": null, "fields": ["query"] }
            })
        );
        assert_eq!(outcome.to_payload()["kind"], "validation");
    }
}
