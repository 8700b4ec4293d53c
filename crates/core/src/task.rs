use serde::{Deserialize, Serialize};

/// The input to one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// What the user asked for.
    pub text: String,
    /// The customer the request is about, if known.
    pub customer_id: Option<String>,
    /// The language the answer should be written in.
    pub language: Option<String>,
}

impl Task {
    /// Creates a task with the given text.
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Attaches a customer id.
    #[inline]
    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Sets the answer language.
    #[inline]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}
