//! Provider-neutral types for talking to a language model.
//!
//! The orchestration loop never speaks a vendor protocol directly. It builds
//! a [`ModelRequest`] out of the conversation and the declared tool schemas,
//! hands it to a [`ModelProvider`], and reads back a stream of
//! [`ModelResponseEvent`]s: text deltas, tool call requests and a final
//! finish reason.
//!
//! Nothing in this crate performs I/O. Provider crates implement the traits,
//! and the core crate drives them.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
