use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model_client::ModelError;
use crate::trace::Trace;

/// Why a run failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RunError {
    /// The model provider failed.
    #[error("upstream model failure: {0}")]
    Upstream(String),
    /// A model call ran past its deadline.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    /// The model kept asking for tools until the cap was reached.
    #[error("no final answer after {max} iterations")]
    IterationLimitExceeded {
        /// The configured cap.
        max: u32,
    },
}

/// The kind of a [`RunError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// See [`RunError::Upstream`].
    Upstream,
    /// See [`RunError::Timeout`].
    Timeout,
    /// See [`RunError::IterationLimitExceeded`].
    IterationLimitExceeded,
}

impl RunError {
    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> RunErrorKind {
        match self {
            RunError::Upstream(_) => RunErrorKind::Upstream,
            RunError::Timeout(_) => RunErrorKind::Timeout,
            RunError::IterationLimitExceeded { .. } => {
                RunErrorKind::IterationLimitExceeded
            }
        }
    }
}

impl From<ModelError> for RunError {
    #[inline]
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Upstream(message) => RunError::Upstream(message),
            ModelError::Timeout(deadline) => RunError::Timeout(deadline),
        }
    }
}

/// A failed run together with everything traced before the failure.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{error}")]
pub struct RunFailure {
    /// What went wrong.
    pub error: RunError,
    /// The partial trace.
    pub trace: Trace,
}

/// A completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSuccess {
    /// The answer for the user.
    pub final_answer: String,
    /// The complete trace.
    pub trace: Trace,
}

/// The outcome of [`Orchestrator::run`](crate::Orchestrator::run).
pub type RunResult = Result<RunSuccess, RunFailure>;
