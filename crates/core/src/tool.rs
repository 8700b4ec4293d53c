//! Tool call supports.

mod error;
mod name;
mod object;
mod registry;
mod schema;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use name::{ToolName, UnknownToolName};
pub(crate) use object::{ToolObject, ToolObjectImpl};
pub use registry::{
    DEFAULT_TOOL_TIMEOUT, RegistryError, ToolRegistry, ToolRegistryBuilder,
};

/// The result of a tool call.
pub type ToolResult = Result<Value, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access shared collaborators
/// such as a record store or a search index. To do this, make the context an
/// immutable state of the tool, which can be set during initialization, and
/// clone it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> ToolName;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    ///
    /// Arguments are checked against this schema before they are
    /// deserialized into [`Tool::Input`].
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    /// The future may be dropped before completion when its deadline passes,
    /// and the same call may be retried by the model, so side effects must
    /// tolerate duplicate invocation.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
