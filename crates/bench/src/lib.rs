//! Load-test harness for the Palaver chat API.
//!
//! Virtual users (VUs) drive the REST gateway and WebSocket session the
//! same way the browser client does, through `palaver-client`. The
//! harness records latency trends and failure rates per endpoint,
//! evaluates thresholds over them, and emits a JSON report; a failed
//! threshold makes the process exit non-zero so CI can gate on it.

pub mod cli;
pub mod exec;
pub mod identity;
pub mod invites;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod scenario;
