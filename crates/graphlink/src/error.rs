//! Error types for the GraphQL client.

use std::fmt;

/// Errors raised by query execution, document parsing, and the
/// subscription transport.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// The subscription socket could not be opened.
    Connection(String),
    /// The peer replied with an error instead of `connection_ack`, or
    /// closed before acknowledging.
    Handshake(String),
    /// Mid-stream `connection_error` message from the peer.
    ConnectionFault(String),
    /// Mid-stream `subscription_fail` message from the peer.
    SubscriptionFault(String),
    /// An inbound frame could not be decoded.
    MalformedMessage(String),
    /// The peer closed the socket in the middle of a fragmented message.
    TransportClosed,
    /// Disconnect was called on a session that is already closed.
    AlreadyClosed,
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// HTTP request failed.
    Http(String),
    /// JSON serialization/deserialization error.
    Json(String),
    /// I/O error.
    Io(String),
    /// A GraphQL document could not be parsed.
    Document(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::Handshake(msg) => write!(f, "Handshake error: {msg}"),
            Self::ConnectionFault(msg) => write!(f, "Connection fault: {msg}"),
            Self::SubscriptionFault(msg) => write!(f, "Subscription fault: {msg}"),
            Self::MalformedMessage(msg) => write!(f, "Malformed message: {msg}"),
            Self::TransportClosed => write!(f, "Transport closed mid-message"),
            Self::AlreadyClosed => write!(f, "Session is already closed"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::Http(msg) => write!(f, "HTTP request error: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Document(msg) => write!(f, "Document error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for ClientError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for ClientError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
