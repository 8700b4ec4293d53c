//! An HTTP service that lets a language model answer support tasks by
//! calling a small set of server-side tools.
//!
//! The crate includes a binary that serves the API. You can also use it as a
//! library to embed the assembled agent into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod config;
pub mod kb;
pub mod server;
mod service;
pub mod storage;
pub mod tools;

pub use service::{Service, ServiceBuilder};

/// Re-exports of [`agent_router_core`] crate.
pub mod core {
    pub use agent_router_core::*;
}
