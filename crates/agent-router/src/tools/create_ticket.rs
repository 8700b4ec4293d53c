use std::sync::Arc;

use agent_router_core::tool::{Error as ToolError, Tool, ToolName, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::storage::{Priority, Record, RecordStore, Ticket};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTicketParameters {
    #[schemars(description = "Identifier of the customer the ticket is about.")]
    customer_id: String,
    #[schemars(description = "One-line summary of the problem.")]
    summary: String,
    #[schemars(description = "How urgent the ticket is.")]
    priority: Priority,
    #[schemars(description = "Optional longer description of the problem.")]
    details: Option<String>,
}

/// A tool for opening support tickets.
pub struct CreateTicketTool {
    store: Arc<dyn RecordStore>,
    parameter_schema: Value,
}

impl CreateTicketTool {
    /// Creates a new ticket tool writing to `store`.
    #[inline]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        CreateTicketTool {
            store,
            parameter_schema: schema_for!(CreateTicketParameters).to_value(),
        }
    }
}

impl Tool for CreateTicketTool {
    type Input = CreateTicketParameters;

    fn name(&self) -> ToolName {
        ToolName::CreateTicket
    }

    fn description(&self) -> &str {
        r#"
Opens a support ticket for a customer when a request needs human follow-up.
Returns the id of the new ticket."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CreateTicketParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let store = Arc::clone(&self.store);
        async move {
            let mut err = ToolError::validation();
            if input.customer_id.trim().is_empty() {
                err = err.with_field("customer_id");
            }
            if input.summary.trim().is_empty() {
                err = err.with_field("summary");
            }
            if !err.fields().is_empty() {
                return Err(err.with_reason("arguments must not be blank"));
            }

            let ticket = Ticket {
                customer_id: input.customer_id,
                summary: input.summary.trim().to_owned(),
                priority: input.priority,
                details: input.details.filter(|d| !d.trim().is_empty()),
            };
            let ticket_id =
                store.put(Record::Ticket(ticket)).await.map_err(|err| {
                    error!("failed to store ticket: {err}");
                    ToolError::execution().with_reason(err.to_string())
                })?;

            info!("created ticket {ticket_id}");
            Ok(json!({ "ticket_id": ticket_id, "status": "created" }))
        }
    }
}
