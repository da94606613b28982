//! Subscription transport tests against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request as WsRequest, Response as WsResponse,
};

use graphlink::{ClientError, Session, SessionOptions, SessionState, SubscriptionTransport};

const QUERY: &str = "subscription{onMsg{id}}";

/// Accept a WebSocket connection, echoing the client's requested
/// sub-protocol as RFC 6455 requires so the client handshake succeeds.
async fn accept_ws(
    stream: tokio::net::TcpStream,
) -> tokio_tungstenite::WebSocketStream<tokio::net::TcpStream> {
    tokio_tungstenite::accept_hdr_async(stream, |req: &WsRequest, mut resp: WsResponse| {
        if let Some(proto) = req.headers().get("Sec-WebSocket-Protocol") {
            resp.headers_mut()
                .insert("Sec-WebSocket-Protocol", proto.clone());
        }
        Ok(resp)
    })
    .await
    .unwrap()
}

async fn wait_closed(session: &Session) {
    for _ in 0..500 {
        if session.state() == SessionState::Closed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session did not close");
}

fn as_json(msg: &Message) -> Value {
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_end_to_end_two_deliveries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;

        let init = ws.next().await.unwrap().unwrap();
        seen_tx.send(as_json(&init)).unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();

        let start = ws.next().await.unwrap().unwrap();
        seen_tx.send(as_json(&start)).unwrap();

        ws.send(Message::Text(
            r#"{"type":"data","id":"1","payload":{"foo":1}}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"data","id":"1","payload":{"foo":2}}"#.into(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
    });

    let transport = SubscriptionTransport::new();
    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let faults = Arc::new(Mutex::new(Vec::new()));

    let deliveries_clone = deliveries.clone();
    transport.on_delivery(move |envelope| {
        deliveries_clone.lock().push(envelope.payload.clone());
    });
    let faults_clone = faults.clone();
    transport.on_fault(move |err| {
        faults_clone.lock().push(err.clone());
    });

    let session = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap();

    // Exactly one init and one start, carrying the supplied query and id.
    assert_eq!(seen_rx.recv().await.unwrap(), json!({"type": "connection_init"}));
    assert_eq!(
        seen_rx.recv().await.unwrap(),
        json!({"id": "1", "type": "start", "payload": {"query": QUERY}})
    );

    wait_closed(&session).await;

    assert_eq!(
        *deliveries.lock(),
        vec![Some(json!({"foo": 1})), Some(json!({"foo": 2}))]
    );
    assert!(faults.lock().is_empty(), "loop terminated with a fault");
}

#[tokio::test]
async fn test_handshake_error_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(
            r#"{"type":"error","payload":{"message":"unauthorized"}}"#.into(),
        ))
        .await
        .unwrap();
    });

    let transport = SubscriptionTransport::new();
    let err = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Handshake(_)), "got {err:?}");
}

#[tokio::test]
async fn test_keepalive_before_ack_is_tolerated() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"ka"}"#.into())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        // Stay open until the client hangs up.
        while ws.next().await.is_some() {}
    });

    let transport = SubscriptionTransport::new();
    let session = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap();

    assert!(session.is_active());
    transport.close(&session, "1").await.unwrap();
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = SubscriptionTransport::new();
    let err = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Connection(_)), "got {err:?}");
}

#[tokio::test]
async fn test_malformed_message_stops_loop_without_delivery() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text("this is not json".into())).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let transport = SubscriptionTransport::new();
    let deliveries = Arc::new(Mutex::new(Vec::<Option<Value>>::new()));
    let faults = Arc::new(Mutex::new(Vec::new()));

    let deliveries_clone = deliveries.clone();
    transport.on_delivery(move |envelope| {
        deliveries_clone.lock().push(envelope.payload.clone());
    });
    let faults_clone = faults.clone();
    transport.on_fault(move |err| {
        faults_clone.lock().push(err.clone());
    });

    let session = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap();

    wait_closed(&session).await;

    assert!(deliveries.lock().is_empty());
    let faults = faults.lock();
    assert_eq!(faults.len(), 1);
    assert!(matches!(faults[0], ClientError::MalformedMessage(_)));
}

#[tokio::test]
async fn test_subscription_fail_is_a_terminal_fault() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(
            r#"{"type":"subscription_fail","id":"1","payload":{"message":"bad operation"}}"#
                .into(),
        ))
        .await
        .unwrap();
        while ws.next().await.is_some() {}
    });

    let transport = SubscriptionTransport::new();
    let faults = Arc::new(Mutex::new(Vec::new()));
    let faults_clone = faults.clone();
    transport.on_fault(move |err| {
        faults_clone.lock().push(err.clone());
    });

    let session = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap();

    wait_closed(&session).await;

    let faults = faults.lock();
    assert_eq!(faults.len(), 1);
    assert!(matches!(faults[0], ClientError::SubscriptionFault(_)));
}

#[tokio::test]
async fn test_unknown_type_ends_stream_without_fault() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"complete","id":"1"}"#.into()))
            .await
            .unwrap();
        while ws.next().await.is_some() {}
    });

    let transport = SubscriptionTransport::new();
    let faults = Arc::new(Mutex::new(Vec::<ClientError>::new()));
    let faults_clone = faults.clone();
    transport.on_fault(move |err| {
        faults_clone.lock().push(err.clone());
    });

    let session = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap();

    wait_closed(&session).await;
    assert!(faults.lock().is_empty());
}

#[tokio::test]
async fn test_second_disconnect_is_already_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();
        let _start = ws.next().await.unwrap().unwrap();
        while ws.next().await.is_some() {}
    });

    let transport = SubscriptionTransport::new();
    let session = transport
        .open(&format!("ws://{addr}"), QUERY, SessionOptions::new())
        .await
        .unwrap();

    assert!(session.is_active());
    transport.close(&session, "1").await.unwrap();
    let err = transport.close(&session, "1").await.unwrap_err();
    assert!(matches!(err, ClientError::AlreadyClosed));
}

#[tokio::test]
async fn test_custom_subscription_id_and_protocol() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_ws(stream).await;
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(r#"{"type":"connection_ack"}"#.into()))
            .await
            .unwrap();
        let start = ws.next().await.unwrap().unwrap();
        seen_tx.send(as_json(&start)).unwrap();
        while ws.next().await.is_some() {}
    });

    let transport = SubscriptionTransport::new();
    let session = transport
        .open(
            &format!("ws://{addr}"),
            QUERY,
            SessionOptions::new()
                .subscription_id("sub-42")
                .protocol("graphql-ws"),
        )
        .await
        .unwrap();

    assert_eq!(session.subscription_id(), "sub-42");
    assert_eq!(session.protocol(), "graphql-ws");
    assert_eq!(
        seen_rx.recv().await.unwrap(),
        json!({"id": "sub-42", "type": "start", "payload": {"query": QUERY}})
    );

    transport.close(&session, "sub-42").await.unwrap();
}
