//! Session state machine.
//!
//! The machine is pure: it consumes [`TransportEvent`]s and caller
//! operations, mutates its own state, and returns [`Action`]s for the I/O
//! layer to carry out. No sockets, timers, or callbacks live here, so every
//! transition can be tested by feeding synthetic events.
//!
//! # States
//!
//! ```text
//! Connecting ──open──► Open ──AUTH_SUCCESS──► Authenticated
//!     ▲                 │                          │
//!     │               close                      close
//!     └── backoff ◄── Closed ◄─────────────────────┘
//! ```
//!
//! A close while the intentional-close flag is set terminates the machine
//! instead of scheduling a reconnect.

use std::collections::VecDeque;
use std::time::Duration;

use palaver_protocol::event::AuthRequest;
use palaver_protocol::{Envelope, event_type};
use serde_json::Value;

use super::backoff::Backoff;

/// Connection lifecycle states, one physical connection attempt at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport requested, not yet open.
    Connecting,
    /// Transport open; authentication not yet acknowledged.
    Open,
    /// Server acknowledged authentication; sends go straight to the wire.
    Authenticated,
    /// Transport closed; a reconnect may be scheduled.
    Closed,
}

/// Transport-level events fed into the machine by the I/O layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport delivered its open event.
    Opened,
    /// A text frame arrived.
    Frame(String),
    /// The transport closed. `requested` is true only when the close was
    /// initiated by [`SessionCore::begin_close`].
    Closed { requested: bool },
}

/// Work the I/O layer must perform after a transition.
#[derive(Debug)]
pub enum Action {
    /// Write a text frame to the transport.
    Transmit(String),
    /// Invoke the listener registered for `event_type`, if any.
    Deliver { event_type: String, data: Value },
    /// Wait `after`, then attempt a new connection.
    Reconnect { after: Duration },
    /// Tear down: intentional close, no reconnect.
    Shutdown,
}

/// The session machine's owned state: token, pre-auth outbound queue,
/// backoff schedule, and the intentional-close flag.
#[derive(Debug)]
pub struct SessionCore {
    state: SessionState,
    token: Option<String>,
    queue: VecDeque<Envelope>,
    backoff: Backoff,
    closing: bool,
}

impl SessionCore {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            token: None,
            queue: VecDeque::new(),
            backoff: Backoff::new(),
            closing: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Records the bearer token. If the transport is currently open, the
    /// authentication request goes out immediately; otherwise it is sent on
    /// the next `Opened` event.
    pub fn authenticate(&mut self, token: impl Into<String>) -> Option<Action> {
        let token = token.into();
        self.token = Some(token.clone());
        match self.state {
            SessionState::Open | SessionState::Authenticated => self.auth_request(&token),
            SessionState::Connecting | SessionState::Closed => None,
        }
    }

    /// Transmits immediately when authenticated, otherwise appends to the
    /// FIFO queue flushed on `AUTH_SUCCESS`.
    pub fn send(&mut self, event_type: impl Into<String>, data: Value) -> Option<Action> {
        let envelope = Envelope::new(event_type, data);
        if self.state == SessionState::Authenticated {
            Self::transmit(&envelope)
        } else {
            self.queue.push_back(envelope);
            None
        }
    }

    /// Marks the close as intentional. The next `Closed` event yields
    /// [`Action::Shutdown`] instead of a reconnect.
    pub fn begin_close(&mut self) {
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Single transition function consuming transport events.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<Action> {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Frame(text) => self.on_frame(&text),
            TransportEvent::Closed { requested } => self.on_closed(requested),
        }
    }

    fn on_opened(&mut self) -> Vec<Action> {
        self.state = SessionState::Open;
        self.backoff.reset();
        match self.token.clone() {
            Some(token) => self.auth_request(&token).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn on_frame(&mut self, text: &str) -> Vec<Action> {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                // Malformed frames are dropped; a bad frame must never kill
                // the dispatch loop.
                tracing::warn!("dropping malformed frame: {err}");
                return Vec::new();
            }
        };

        let mut actions = Vec::new();
        if envelope.event_type == event_type::AUTH_SUCCESS {
            self.state = SessionState::Authenticated;
            // Flush strictly in enqueue order, ahead of anything the
            // AUTH_SUCCESS listener itself sends.
            while let Some(queued) = self.queue.pop_front() {
                actions.extend(Self::transmit(&queued));
            }
        }
        actions.push(Action::Deliver {
            event_type: envelope.event_type,
            data: envelope.data,
        });
        actions
    }

    fn on_closed(&mut self, requested: bool) -> Vec<Action> {
        self.state = SessionState::Closed;
        if requested || self.closing {
            vec![Action::Shutdown]
        } else {
            vec![Action::Reconnect {
                after: self.backoff.next_delay(),
            }]
        }
    }

    fn auth_request(&self, token: &str) -> Option<Action> {
        let data = serde_json::to_value(AuthRequest {
            token: token.to_string(),
        })
        .unwrap_or(Value::Null);
        Self::transmit(&Envelope::new(event_type::AUTH_REQUEST, data))
    }

    fn transmit(envelope: &Envelope) -> Option<Action> {
        match serde_json::to_string(envelope) {
            Ok(text) => Some(Action::Transmit(text)),
            Err(err) => {
                // Drop rather than put a frame the server cannot parse on
                // the wire.
                tracing::error!("failed to encode outbound frame: {err}");
                None
            }
        }
    }
}

impl Default for SessionCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered callback, shared so it can be invoked after the table
/// lock is released.
pub type Listener = std::sync::Arc<parking_lot::Mutex<Box<dyn FnMut(Value) + Send>>>;

/// Single-slot-per-type listener table.
///
/// Registering a listener for a type that already has one replaces it;
/// dispatching a type with no listener is a silent no-op. There is no
/// multi-subscriber fan-out.
///
/// Listeners are handed out via [`ListenerTable::get`] and invoked with
/// the table unlocked, so a running listener may register or remove
/// listeners — including itself.
#[derive(Default)]
pub struct ListenerTable {
    listeners: std::collections::HashMap<String, Listener>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, event_type: impl Into<String>, listener: impl FnMut(Value) + Send + 'static) {
        self.listeners.insert(
            event_type.into(),
            std::sync::Arc::new(parking_lot::Mutex::new(Box::new(listener))),
        );
    }

    pub fn remove(&mut self, event_type: &str) {
        self.listeners.remove(event_type);
    }

    /// The listener registered for `event_type`, if any. Removal while the
    /// handle is held only affects later dispatches.
    pub fn get(&self, event_type: &str) -> Option<Listener> {
        self.listeners.get(event_type).cloned()
    }

    /// Invokes the registered listener, if any, synchronously.
    pub fn dispatch(&self, event_type: &str, data: Value) {
        if let Some(listener) = self.get(event_type) {
            (*listener.lock())(data);
        }
    }
}

impl std::fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerTable")
            .field("types", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
