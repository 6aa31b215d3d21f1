//! Async client for the chat gateway: a typed REST surface plus a
//! reconnecting WebSocket session with an explicit lifecycle.
//!
//! The crate has two independent halves. [`ApiClient`] wraps the REST
//! gateway with one method per endpoint and transparent bearer-token
//! handling. [`Session`] owns a WebSocket connection end to end: the
//! auth handshake, a FIFO queue for frames sent before the handshake
//! completes, per-event-type listeners, and capped exponential backoff
//! when the server drops the connection.

pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use palaver_protocol as protocol;

pub use config::Config;
pub use error::{Error, Result};
pub use http::ApiClient;
pub use session::Session;
pub use session::core::SessionState;
