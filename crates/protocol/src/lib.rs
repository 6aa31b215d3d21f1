//! Wire types for the Palaver chat API.
//!
//! This crate is pure data: the WebSocket envelope and event payloads in
//! [`event`], the REST request/response shapes in [`api`], and the
//! normalized error body in [`error`]. Both the client library and the
//! bench harness depend on it; nothing here performs I/O.

pub mod api;
pub mod error;
pub mod event;

pub use error::ApiErrorBody;
pub use event::{Envelope, event_type};
