//! Live subscription delivery over a persistent socket.
//!
//! Implements the `graphql-ws` sub-protocol: a `connection_init` →
//! `connection_ack` handshake, a `start` message for the named operation,
//! then a receive loop that reassembles frames, decodes envelopes, and
//! either broadcasts delivery events or surfaces terminal faults.
//!
//! Components, leaf to root:
//!
//! - [`codec`] — encodes outbound control messages and decodes inbound
//!   frames into typed [`Envelope`]s.
//! - [`FrameAssembler`] — accumulates fragmented socket frames into one
//!   logical text message.
//! - [`Session`] — owns one socket, drives the handshake and the receive
//!   loop.
//!
//! The public entry point for most callers is
//! [`SubscriptionTransport`](crate::SubscriptionTransport).

pub mod codec;
mod frame;
mod session;

pub use codec::{Envelope, MessageKind};
pub use frame::FrameAssembler;
pub use session::{DEFAULT_PROTOCOL, Session, SessionOptions, SessionState};
