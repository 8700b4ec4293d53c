use std::sync::Arc;

use agent_router_core::tool::{Error as ToolError, Tool, ToolName, ToolResult};
use chrono::{DateTime, NaiveDateTime, ParseError, Utc};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::storage::{Channel, Followup, Record, RecordStore};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScheduleFollowupParameters {
    #[schemars(description = "Identifier of the customer to contact.")]
    customer_id: String,
    #[schemars(
        description = "When to contact the customer, as an ISO 8601 timestamp, e.g. 2025-12-15T10:30:00+01:00. Times without an offset are taken as UTC."
    )]
    datetime: String,
    #[schemars(description = "How to contact the customer.")]
    channel: Channel,
    #[schemars(
        description = "Optional email address or phone number to use instead of the one on file."
    )]
    contact: Option<String>,
}

/// A tool for booking a follow-up contact with a customer.
pub struct ScheduleFollowupTool {
    store: Arc<dyn RecordStore>,
    parameter_schema: Value,
}

impl ScheduleFollowupTool {
    /// Creates a new follow-up tool writing to `store`.
    #[inline]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        ScheduleFollowupTool {
            store,
            parameter_schema: schema_for!(ScheduleFollowupParameters)
                .to_value(),
        }
    }
}

impl Tool for ScheduleFollowupTool {
    type Input = ScheduleFollowupParameters;

    fn name(&self) -> ToolName {
        ToolName::ScheduleFollowup
    }

    fn description(&self) -> &str {
        r#"
Schedules a follow-up contact with a customer by email, phone or WhatsApp at a given time.
Returns a confirmation id."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ScheduleFollowupParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let store = Arc::clone(&self.store);
        async move {
            if input.customer_id.trim().is_empty() {
                return Err(ToolError::validation()
                    .with_reason("`customer_id` must not be blank")
                    .with_field("customer_id"));
            }
            if let Err(err) = parse_datetime(&input.datetime) {
                return Err(ToolError::validation()
                    .with_reason(format!(
                        "`datetime` is not an ISO 8601 timestamp: {err}"
                    ))
                    .with_field("datetime"));
            }

            let followup = Followup {
                customer_id: input.customer_id,
                datetime: input.datetime,
                channel: input.channel,
                contact: input.contact.filter(|c| !c.trim().is_empty()),
            };
            let confirmation_id = store
                .put(Record::Followup(followup))
                .await
                .map_err(|err| {
                    error!("failed to store follow-up: {err}");
                    ToolError::execution().with_reason(err.to_string())
                })?;

            info!("scheduled follow-up {confirmation_id}");
            Ok(json!({ "confirmation_id": confirmation_id, "scheduled": true }))
        }
    }
}

// Accepted when the timestamp carries no offset.
const NAIVE_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses an ISO 8601 timestamp. A missing offset means UTC.
fn parse_datetime(value: &str) -> Result<DateTime<Utc>, ParseError> {
    let value = value.trim();
    let err = match DateTime::parse_from_rfc3339(value) {
        Ok(datetime) => return Ok(datetime.with_timezone(&Utc)),
        Err(err) => err,
    };
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or(err)
}
