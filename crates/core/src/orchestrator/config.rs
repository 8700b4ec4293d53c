use std::time::Duration;

use crate::model_client::DEFAULT_MODEL_TIMEOUT;

/// Iteration cap unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 6;

/// Answer language for tasks that do not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Settings of the tool-calling loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    max_iterations: u32,
    model_timeout: Duration,
    default_language: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfigBuilder::default().build()
    }
}

impl OrchestratorConfig {
    /// Returns a builder starting from the defaults.
    #[inline]
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// Returns the maximum number of model round trips per run.
    #[inline]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns the deadline for each model call.
    #[inline]
    pub fn model_timeout(&self) -> Duration {
        self.model_timeout
    }

    /// Returns the language used when a task does not name one.
    #[inline]
    pub fn default_language(&self) -> &str {
        &self.default_language
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Clone, Debug, Default)]
pub struct OrchestratorConfigBuilder {
    max_iterations: Option<u32>,
    model_timeout: Option<Duration>,
    default_language: Option<String>,
}

impl OrchestratorConfigBuilder {
    /// Sets the iteration cap. Values below 1 are raised to 1.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Sets the deadline for each model call.
    #[inline]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    /// Sets the language used when a task does not name one.
    #[inline]
    pub fn with_default_language<S: Into<String>>(mut self, language: S) -> Self {
        self.default_language = Some(language.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_iterations: self
                .max_iterations
                .unwrap_or(DEFAULT_MAX_ITERATIONS)
                .max(1),
            model_timeout: self.model_timeout.unwrap_or(DEFAULT_MODEL_TIMEOUT),
            default_language: self
                .default_language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned()),
        }
    }
}
