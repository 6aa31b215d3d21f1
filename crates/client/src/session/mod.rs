//! Authenticated, auto-reconnecting WebSocket session.
//!
//! [`Session`] wraps the pure state machine in [`core`] with a tokio
//! I/O loop over tokio-tungstenite. A session is constructed explicitly
//! with [`Session::connect`] and torn down with [`Session::close`]; the
//! handle is cheap to clone and clones share the one underlying session.
//!
//! The loop owns at most one physical connection at a time. On an
//! unintentional close it waits out the backoff delay and connects again;
//! transport failures are never surfaced to listeners.

pub mod backoff;
pub mod core;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use self::core::{Action, ListenerTable, SessionCore, TransportEvent};

/// Handle to a running session. Clones share state; the last clone does not
/// implicitly close the connection — call [`Session::close`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    core: Mutex<SessionCore>,
    listeners: Mutex<ListenerTable>,
    /// Sender into the live connection's writer, replaced per connection.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    cancel: CancellationToken,
}

/// What the connection loop should do after processing an event.
enum LoopDirective {
    Continue,
    Reconnect(Duration),
    Shutdown,
}

impl Session {
    /// Creates the session and starts connecting to `ws_url` in the
    /// background. Must be called within a tokio runtime.
    pub fn connect(ws_url: impl Into<String>) -> Self {
        let inner = Arc::new(SessionInner {
            core: Mutex::new(SessionCore::new()),
            listeners: Mutex::new(ListenerTable::new()),
            outbound: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        tokio::spawn(run_loop(inner.clone(), ws_url.into()));
        Self { inner }
    }

    /// Records the bearer token and sends the authentication request as
    /// soon as (or immediately if) the transport is open.
    pub fn authenticate(&self, token: impl Into<String>) {
        // Transmit under the core lock so the frame cannot interleave
        // with a queue flush on another task.
        let mut core = self.inner.core.lock();
        if let Some(Action::Transmit(text)) = core.authenticate(token) {
            self.inner.transmit(text);
        }
    }

    /// Registers the single listener for `event_type`, replacing any
    /// previous registration for that type.
    pub fn set_listener(
        &self,
        event_type: impl Into<String>,
        listener: impl FnMut(Value) + Send + 'static,
    ) {
        self.inner.listeners.lock().set(event_type, listener);
    }

    /// Deregisters the listener for `event_type`; later frames of that type
    /// are silently dropped.
    pub fn remove_listener(&self, event_type: &str) {
        self.inner.listeners.lock().remove(event_type);
    }

    /// Transmits `{type, data}` immediately when authenticated, otherwise
    /// queues it for the flush that follows `AUTH_SUCCESS`.
    pub fn send(&self, event_type: impl Into<String>, data: Value) {
        let mut core = self.inner.core.lock();
        if let Some(Action::Transmit(text)) = core.send(event_type, data) {
            self.inner.transmit(text);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.core.lock().is_authenticated()
    }

    /// Intentional shutdown: closes the transport and suppresses any
    /// further reconnect attempts.
    pub fn close(&self) {
        self.inner.core.lock().begin_close();
        self.inner.cancel.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.inner.core.lock().state())
            .finish()
    }
}

impl SessionInner {
    /// Invokes the registered listener for `event_type`, if any. The table
    /// lock is released before the call, so a listener may register or
    /// remove listeners (including itself); neither the core lock nor the
    /// table lock is held, so it may also call send()/authenticate().
    fn deliver(&self, event_type: &str, data: Value) {
        let listener = self.listeners.lock().get(event_type);
        if let Some(listener) = listener {
            (*listener.lock())(data);
        }
    }

    fn transmit(&self, text: String) {
        let outbound = self.outbound.lock();
        match outbound.as_ref() {
            Some(tx) => {
                if tx.send(text).is_err() {
                    tracing::debug!("outbound channel closed, frame dropped");
                }
            }
            None => tracing::debug!("no live transport, frame dropped"),
        }
    }
}

/// Feeds one transport event through the state machine and applies the
/// resulting actions, returning the loop directive if one was produced.
///
/// Transmits (the auth request, a queue flush) are pushed to the transport
/// while the core lock is still held, so a concurrent `send` on another
/// task cannot slot a frame into the middle of a flush. Deliveries run
/// after the lock is released.
fn process(inner: &SessionInner, event: TransportEvent) -> LoopDirective {
    let mut directive = LoopDirective::Continue;
    let mut deliveries = Vec::new();
    {
        let mut core = inner.core.lock();
        for action in core.handle(event) {
            match action {
                Action::Transmit(text) => inner.transmit(text),
                Action::Deliver { event_type, data } => deliveries.push((event_type, data)),
                Action::Reconnect { after } => directive = LoopDirective::Reconnect(after),
                Action::Shutdown => directive = LoopDirective::Shutdown,
            }
        }
    }
    for (event_type, data) in deliveries {
        inner.deliver(&event_type, data);
    }
    directive
}

/// Reconnect loop: one iteration per physical connection attempt.
async fn run_loop(inner: Arc<SessionInner>, url: String) {
    loop {
        if inner.cancel.is_cancelled() {
            break;
        }

        tracing::debug!("connecting to {url}");
        let connected = tokio::select! {
            result = connect_async(url.as_str()) => Some(result),
            () = inner.cancel.cancelled() => None,
        };

        let directive = match connected {
            None => LoopDirective::Shutdown,
            Some(Ok((stream, _response))) => {
                tracing::debug!("websocket open");
                run_connection(&inner, stream).await
            }
            Some(Err(err)) => {
                tracing::warn!("websocket connect failed: {err}");
                process(&inner, TransportEvent::Closed { requested: false })
            }
        };

        match directive {
            LoopDirective::Shutdown => break,
            LoopDirective::Reconnect(after) => {
                tracing::debug!("reconnecting in {}ms", after.as_millis());
                tokio::select! {
                    () = tokio::time::sleep(after) => {}
                    () = inner.cancel.cancelled() => break,
                }
            }
            LoopDirective::Continue => {}
        }
    }
    tracing::debug!("session loop stopped");
}

/// Pumps one open connection until it closes, then reports the close to the
/// state machine. The old transport handle is dropped before any reconnect.
async fn run_connection(
    inner: &SessionInner,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> LoopDirective {
    let (mut write, mut read) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    *inner.outbound.lock() = Some(tx);

    // Opened never produces a reconnect/shutdown directive.
    let _ = process(inner, TransportEvent::Opened);

    let mut requested = false;
    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = process(inner, TransportEvent::Frame(text));
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!("websocket read error: {err}");
                    break;
                }
            },
            outbound = rx.recv() => match outbound {
                Some(text) => {
                    if let Err(err) = write.send(Message::Text(text)).await {
                        tracing::warn!("websocket write error: {err}");
                        break;
                    }
                }
                None => break,
            },
            () = inner.cancel.cancelled() => {
                requested = true;
                let _ = write.send(Message::Close(None)).await;
                break;
            }
        }
    }

    inner.outbound.lock().take();
    process(inner, TransportEvent::Closed { requested })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cloned_handles_share_one_session() {
        // Unroutable port: the loop just retries in the background.
        let session = Session::connect("ws://127.0.0.1:9/ws");
        let clone = session.clone();
        assert!(Arc::ptr_eq(&session.inner, &clone.inner));

        clone.close();
        assert!(session.inner.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn listener_registration_is_shared_across_clones() {
        let session = Session::connect("ws://127.0.0.1:9/ws");
        let clone = session.clone();

        session.set_listener("X", |_| {});
        clone.remove_listener("X");

        session.close();
    }
}
