//! End-to-end session behavior against a loopback WebSocket server:
//! handshake ordering, pre-auth queueing, and reconnect after a drop.

use std::time::{Duration, Instant};

use futures_util::{SinkExt as _, StreamExt as _};
use palaver::Session;
use palaver_protocol::{Envelope, event_type};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("timed out waiting for connection")
        .expect("accept failed");
    tokio_tungstenite::accept_async(stream)
        .await
        .expect("websocket handshake failed")
}

async fn read_envelope(ws: &mut WebSocketStream<TcpStream>) -> Envelope {
    loop {
        let message = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("read error");
        match message {
            Message::Text(text) => return serde_json::from_str(&text).expect("malformed frame"),
            // tungstenite answers pings internally; skip control frames.
            _ => continue,
        }
    }
}

async fn send_envelope(ws: &mut WebSocketStream<TcpStream>, event_type: &str, data: serde_json::Value) {
    let frame = serde_json::to_string(&Envelope::new(event_type, data)).unwrap();
    ws.send(Message::Text(frame)).await.expect("send failed");
}

#[tokio::test]
async fn handshake_queues_and_flushes_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    let session = Session::connect(url);
    let (auth_tx, mut auth_rx) = mpsc::unbounded_channel();
    session.set_listener(event_type::AUTH_SUCCESS, move |data| {
        let _ = auth_tx.send(data);
    });

    // Sent before the handshake completes, so it must be queued.
    session.send("PING", json!({ "seq": 1 }));
    session.authenticate("token-1");

    let mut ws = accept_ws(&listener).await;

    let first = read_envelope(&mut ws).await;
    assert_eq!(first.event_type, event_type::AUTH_REQUEST);
    assert_eq!(first.data["token"], "token-1");

    send_envelope(&mut ws, event_type::AUTH_SUCCESS, json!({ "user_id": "u1" })).await;

    // The flush happens only after AUTH_SUCCESS, preserving FIFO order.
    let second = read_envelope(&mut ws).await;
    assert_eq!(second.event_type, "PING");
    assert_eq!(second.data["seq"], 1);

    let delivered = timeout(WAIT, auth_rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered["user_id"], "u1");
    assert!(session.is_authenticated());

    // Authenticated sends go straight out, no queueing.
    session.send("PING", json!({ "seq": 2 }));
    let third = read_envelope(&mut ws).await;
    assert_eq!(third.data["seq"], 2);

    session.close();
}

#[tokio::test]
async fn listener_can_remove_itself_during_dispatch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    let session = Session::connect(url);
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let handle = session.clone();
        let tx = tx.clone();
        session.set_listener("ONE_SHOT", move |_| {
            // One-shot: deregister from inside the callback.
            handle.remove_listener("ONE_SHOT");
            let _ = tx.send("one_shot");
        });
    }
    {
        let tx = tx.clone();
        session.set_listener("AFTER", move |_| {
            let _ = tx.send("after");
        });
    }
    session.authenticate("token-3");

    let mut ws = accept_ws(&listener).await;
    let first = read_envelope(&mut ws).await;
    assert_eq!(first.event_type, event_type::AUTH_REQUEST);

    send_envelope(&mut ws, event_type::AUTH_SUCCESS, json!({ "user_id": "u3" })).await;
    send_envelope(&mut ws, "ONE_SHOT", json!({})).await;
    send_envelope(&mut ws, "ONE_SHOT", json!({})).await;
    send_envelope(&mut ws, "AFTER", json!({})).await;

    // The first ONE_SHOT fires and removes itself, the second is silently
    // dropped, and dispatch keeps running for later events.
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some("one_shot"));
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some("after"));

    session.close();
}

#[tokio::test]
async fn listener_sends_follow_the_flushed_queue() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    let session = Session::connect(url);
    session.send("QUEUED", json!({}));
    {
        let handle = session.clone();
        session.set_listener(event_type::AUTH_SUCCESS, move |_| {
            handle.send("FROM_LISTENER", json!({}));
        });
    }
    session.authenticate("token-4");

    let mut ws = accept_ws(&listener).await;
    let first = read_envelope(&mut ws).await;
    assert_eq!(first.event_type, event_type::AUTH_REQUEST);

    send_envelope(&mut ws, event_type::AUTH_SUCCESS, json!({ "user_id": "u4" })).await;

    // The pre-auth queue drains before anything sent from inside the
    // AUTH_SUCCESS listener reaches the wire.
    assert_eq!(read_envelope(&mut ws).await.event_type, "QUEUED");
    assert_eq!(read_envelope(&mut ws).await.event_type, "FROM_LISTENER");

    session.close();
}

#[tokio::test]
async fn reconnects_and_reauthenticates_after_server_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    let session = Session::connect(url);
    session.authenticate("token-2");

    let mut ws = accept_ws(&listener).await;
    let first = read_envelope(&mut ws).await;
    assert_eq!(first.event_type, event_type::AUTH_REQUEST);
    send_envelope(&mut ws, event_type::AUTH_SUCCESS, json!({ "userId": "u2" })).await;

    // Unintentional drop from the server side.
    let dropped_at = Instant::now();
    drop(ws);

    let mut ws = accept_ws(&listener).await;
    let elapsed = dropped_at.elapsed();
    assert!(
        elapsed >= Duration::from_millis(900),
        "reconnected after {elapsed:?}, before the backoff delay"
    );

    // The stored token is replayed on the fresh transport.
    let replay = read_envelope(&mut ws).await;
    assert_eq!(replay.event_type, event_type::AUTH_REQUEST);
    assert_eq!(replay.data["token"], "token-2");
    assert!(!session.is_authenticated());

    session.close();

    // Intentional close: the server sees the connection end and no
    // further connection attempts arrive.
    let _ = timeout(WAIT, ws.next()).await;
    let extra = timeout(Duration::from_millis(1500), listener.accept()).await;
    assert!(extra.is_err(), "session reconnected after close()");
}
