use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolName, ToolResult};

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> ToolName;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> ToolName {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    #[inline]
    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let input: T::Input = match serde_path_to_error::deserialize(arguments)
        {
            Ok(input) => input,
            Err(err) => {
                return Box::pin(std::future::ready(ToolResult::Err(
                    input_error(err),
                )));
            }
        };

        let name = self.0.name();
        Box::pin(
            self.0
                .execute(input)
                .instrument(debug_span!("tool execute", tool = %name)),
        )
    }
}

fn input_error(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let field = err.path().to_string();
    let err = Error::validation().with_reason(err.into_inner().to_string());
    // A failure at the root has no single field to blame.
    if field == "." {
        err.with_field("arguments")
    } else {
        err.with_field(field)
    }
}
