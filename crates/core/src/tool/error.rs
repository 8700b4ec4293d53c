use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use serde::Serialize;
use serde_json::{Value, json};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The tool name or the arguments were rejected before execution.
    Validation,
    /// The handler failed or ran past its deadline.
    Execution,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "Validation error"),
            ErrorKind::Execution => write!(f, "Execution error"),
        }
    }
}

/// Describes a tool call error.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
}

impl Error {
    /// Creates a new error with the `Validation` kind.
    #[inline]
    pub fn validation() -> Self {
        Self {
            kind: ErrorKind::Validation,
            reason: None,
            fields: vec![],
        }
    }

    /// Creates a new error with the `Execution` kind.
    #[inline]
    pub fn execution() -> Self {
        Self {
            kind: ErrorKind::Execution,
            reason: None,
            fields: vec![],
        }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            reason: Some(reason.into()),
            ..self
        }
    }

    /// Names an offending argument.
    #[inline]
    pub fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the names of the offending arguments, if any.
    #[inline]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }

    /// Returns the structured payload fed back to the model.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "error": self.reason(),
            "kind": self.kind,
        });
        if !self.fields.is_empty() {
            payload["fields"] = json!(self.fields);
        }
        payload
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason())?;
        if !self.fields.is_empty() {
            write!(f, " ({})", self.fields.join(", "))?;
        }
        Ok(())
    }
}

impl StdError for Error {}
