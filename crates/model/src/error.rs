use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The kind of error a model provider reports.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The provider rejected the credentials.
    Unauthorized,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The provider did not answer in time.
    Timeout,
    /// The provider answered with something that could not be decoded.
    InvalidResponse,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Returns `true` if the error was caused by a deadline.
    #[inline]
    pub fn is_timeout(self) -> bool {
        self == ErrorKind::Timeout
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Timeout => "timed out",
            ErrorKind::InvalidResponse => "invalid response",
            ErrorKind::Other => "provider error",
        };
        f.write_str(s)
    }
}
