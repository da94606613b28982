//! Subscription session lifecycle: connect, handshake, receive loop,
//! disconnect.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::codec::{self, Envelope, MessageKind};
use super::frame::FrameAssembler;
use crate::error::{ClientError, Result};
use crate::signal::Signal;

/// Type alias for a connected WebSocket stream.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// The default sub-protocol identifier.
pub const DEFAULT_PROTOCOL: &str = "graphql-ws";

/// Options for establishing a subscription session.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Upgrade `http`/`https` URLs to `wss` when true, `ws` when false.
    pub secure: bool,
    /// Correlates the start message with later stop/disconnect messages.
    /// Unique per active session; not reused after close.
    pub subscription_id: String,
    /// Sub-protocol identifier sent during the socket handshake.
    pub protocol: String,
    /// Bearer token passed as an `Authorization` header.
    pub bearer_token: Option<String>,
    /// Additional headers for the socket handshake.
    pub headers: HashMap<String, String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            secure: true,
            subscription_id: "1".into(),
            protocol: DEFAULT_PROTOCOL.into(),
            bearer_token: None,
            headers: HashMap::new(),
        }
    }
}

impl SessionOptions {
    /// Create options with defaults (secure, id `"1"`, `graphql-ws`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subscription id.
    pub fn subscription_id(mut self, id: impl Into<String>) -> Self {
        self.subscription_id = id.into();
        self
    }

    /// Set the `secure` flag controlling `ws`/`wss` scheme normalization.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the sub-protocol identifier.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Set a bearer token for the handshake.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Add a custom header for the socket handshake.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Lifecycle state of a subscription session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Opening the socket.
    #[default]
    Connecting,
    /// Socket open, `connection_init` sent, waiting for `connection_ack`.
    HandshakePending,
    /// Handshake complete, receive loop running.
    Active,
    /// Terminated by fault, peer close, or disconnect.
    Closed,
}

/// A live subscription session owning one socket connection.
///
/// Created by [`Session::connect`]; its receive loop runs as an
/// independent task for the lifetime of the session. Delivery events and
/// faults are broadcast on the signals supplied at connect time. Every
/// fault is terminal for the session; there is no retry or reconnect.
///
/// There is no timeout on the handshake or on receive: a peer that hangs
/// without closing the socket blocks the loop indefinitely.
pub struct Session {
    subscription_id: String,
    protocol: String,
    state: Arc<Mutex<SessionState>>,
    writer: Arc<tokio::sync::Mutex<WsWriter>>,
}

impl Session {
    /// Open a socket to `url`, run the handshake, and start the named
    /// operation.
    ///
    /// Synchronously relative to the caller this sends `connection_init`,
    /// waits for `connection_ack` (keep-alives may interleave), then sends
    /// `start` with `query` and the configured subscription id. On return
    /// the receive loop is already running; `data` envelopes are broadcast
    /// on `delivery` and terminal faults on `faults`.
    ///
    /// Fails with [`ClientError::Connection`] if the socket cannot be
    /// opened and [`ClientError::Handshake`] if the peer answers with an
    /// `error`/`connection_error` envelope or closes before acking.
    pub async fn connect(
        url: &str,
        query: &str,
        options: SessionOptions,
        delivery: Arc<Signal<Envelope>>,
        faults: Arc<Signal<ClientError>>,
    ) -> Result<Self> {
        let ws_url = normalize_scheme(url, options.secure)?;
        let request = build_request(&ws_url, &options)?;

        let state = Arc::new(Mutex::new(SessionState::Connecting));

        tracing::debug!(
            target: "graphlink::subscription",
            url = %ws_url,
            protocol = %options.protocol,
            "connecting"
        );

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        *state.lock() = SessionState::HandshakePending;

        let (write, mut read) = stream.split();
        let writer = Arc::new(tokio::sync::Mutex::new(write));

        send_text(&writer, codec::encode_init()).await?;

        // The handshake shares the reassembler with the receive loop so a
        // message fragmented across the ack boundary cannot be torn.
        let mut assembler = FrameAssembler::new();
        await_ack(&mut read, &mut assembler).await?;

        send_text(
            &writer,
            codec::encode_start(&options.subscription_id, query),
        )
        .await?;
        *state.lock() = SessionState::Active;

        tracing::debug!(
            target: "graphlink::subscription",
            id = %options.subscription_id,
            "subscription started"
        );

        tokio::spawn(receive_loop(
            read,
            assembler,
            state.clone(),
            delivery,
            faults,
        ));

        Ok(Self {
            subscription_id: options.subscription_id,
            protocol: options.protocol,
            state,
            writer,
        })
    }

    /// The subscription id this session started with.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// The negotiated sub-protocol identifier.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the receive loop is still running.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Send a `stop` envelope for `id`, then close the socket with a
    /// normal-closure status and a human-readable reason.
    ///
    /// Fails with [`ClientError::AlreadyClosed`] if the session is already
    /// closed, whether by an earlier disconnect or by loop termination.
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                return Err(ClientError::AlreadyClosed);
            }
            *state = SessionState::Closed;
        }

        tracing::debug!(target: "graphlink::subscription", id = %id, "disconnecting");

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Text(codec::encode_stop(id).into())).await {
            tracing::warn!(target: "graphlink::subscription", error = %e, "stop message not sent");
        }
        let close = CloseFrame {
            code: CloseCode::Normal,
            reason: "subscription stopped by client".into(),
        };
        if let Err(e) = writer.send(Message::Close(Some(close))).await {
            tracing::warn!(target: "graphlink::subscription", error = %e, "close frame not sent");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("subscription_id", &self.subscription_id)
            .field("protocol", &self.protocol)
            .field("state", &self.state())
            .finish()
    }
}

/// Normalize a URL scheme for the socket connection.
///
/// `http`/`https` become `ws` or `wss` according to `secure`; `ws`/`wss`
/// pass through untouched.
fn normalize_scheme(url: &str, secure: bool) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(url.to_string()),
        "http" | "https" => {
            let target = if secure { "wss" } else { "ws" };
            let rest = &url[parsed.scheme().len()..];
            Ok(format!("{target}{rest}"))
        }
        other => Err(ClientError::InvalidUrl(format!(
            "unsupported scheme `{other}`"
        ))),
    }
}

/// Build the socket handshake request with sub-protocol and auth headers.
fn build_request(
    url: &str,
    options: &SessionOptions,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ClientError::Connection(e.to_string()))?;

    let headers = request.headers_mut();
    headers.insert(
        "Sec-WebSocket-Protocol",
        http::header::HeaderValue::try_from(options.protocol.as_str())?,
    );
    if let Some(ref token) = options.bearer_token {
        headers.insert(
            "Authorization",
            http::header::HeaderValue::try_from(format!("Bearer {token}"))?,
        );
    }
    for (name, value) in &options.headers {
        let header_name = http::header::HeaderName::try_from(name.as_str())?;
        let header_value = http::header::HeaderValue::try_from(value.as_str())?;
        headers.insert(header_name, header_value);
    }

    Ok(request)
}

async fn send_text(writer: &Arc<tokio::sync::Mutex<WsWriter>>, text: String) -> Result<()> {
    writer
        .lock()
        .await
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| ClientError::Connection(e.to_string()))
}

/// Read the next complete logical text message.
///
/// `Ok(None)` means the stream ended cleanly; a close or end-of-stream
/// mid-fragment is [`ClientError::TransportClosed`]. Single reader
/// discipline: this is the only place the read half is polled.
async fn next_logical(read: &mut WsReader, assembler: &mut FrameAssembler) -> Result<Option<String>> {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(complete) = assembler.push(text.as_bytes(), true)? {
                    return Ok(Some(complete));
                }
            }
            Ok(Message::Frame(frame)) => {
                // Raw fragments are only surfaced when the transport is
                // configured for frame-level reads; route them through the
                // reassembler like any other fragment.
                let is_final = frame.header().is_final;
                let payload: &[u8] = frame.payload();
                if let Some(complete) = assembler.push(payload, is_final)? {
                    return Ok(Some(complete));
                }
            }
            Ok(Message::Binary(data)) => {
                if let Some(complete) = assembler.push(&data, true)? {
                    return Ok(Some(complete));
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                assembler.close()?;
                return Ok(None);
            }
            Err(e) => return Err(ClientError::Connection(e.to_string())),
        }
    }
    assembler.close()?;
    Ok(None)
}

/// Wait for `connection_ack`, tolerating interleaved keep-alives.
async fn await_ack(read: &mut WsReader, assembler: &mut FrameAssembler) -> Result<()> {
    while let Some(text) = next_logical(read, assembler).await? {
        let envelope = codec::decode(&text)?;
        match envelope.message_kind() {
            MessageKind::ConnectionAck => {
                tracing::debug!(target: "graphlink::subscription", "connection acknowledged");
                return Ok(());
            }
            MessageKind::KeepAlive => {}
            MessageKind::Error | MessageKind::ConnectionError => {
                return Err(ClientError::Handshake(payload_text(&envelope)));
            }
            _ => {
                return Err(ClientError::Handshake(format!(
                    "unexpected `{}` before connection_ack",
                    envelope.kind
                )));
            }
        }
    }
    Err(ClientError::Handshake(
        "connection closed before connection_ack".into(),
    ))
}

/// Classify inbound envelopes until a fault, an unknown message, or the
/// end of the stream, then mark the session closed.
async fn receive_loop(
    mut read: WsReader,
    mut assembler: FrameAssembler,
    state: Arc<Mutex<SessionState>>,
    delivery: Arc<Signal<Envelope>>,
    faults: Arc<Signal<ClientError>>,
) {
    loop {
        let text = match next_logical(&mut read, &mut assembler).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!(target: "graphlink::subscription", "message stream ended");
                break;
            }
            Err(e) => {
                faults.emit(&e);
                break;
            }
        };

        let envelope = match codec::decode(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                faults.emit(&e);
                break;
            }
        };

        match envelope.message_kind() {
            MessageKind::ConnectionAck => {
                // Handshake already satisfied synchronously; a repeated ack
                // is informational only.
                tracing::debug!(target: "graphlink::subscription", "connection acknowledged");
            }
            MessageKind::Data => {
                tracing::trace!(
                    target: "graphlink::subscription",
                    id = envelope.id.as_deref().unwrap_or(""),
                    "delivery event"
                );
                delivery.emit(&envelope);
            }
            MessageKind::KeepAlive => {}
            MessageKind::Error => {
                faults.emit(&ClientError::Handshake(payload_text(&envelope)));
                break;
            }
            MessageKind::ConnectionError => {
                faults.emit(&ClientError::ConnectionFault(payload_text(&envelope)));
                break;
            }
            MessageKind::SubscriptionFail => {
                faults.emit(&ClientError::SubscriptionFault(payload_text(&envelope)));
                break;
            }
            MessageKind::Unknown => {
                tracing::warn!(
                    target: "graphlink::subscription",
                    kind = %envelope.kind,
                    "unknown message type, treating as end of stream"
                );
                break;
            }
        }
    }

    *state.lock() = SessionState::Closed;
}

fn payload_text(envelope: &Envelope) -> String {
    envelope
        .payload
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_else(|| format!("`{}` with no payload", envelope.kind))
}
