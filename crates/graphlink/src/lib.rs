//! GraphQL client for host applications.
//!
//! This crate provides two execution paths against a GraphQL endpoint:
//!
//! - **One-shot queries**: HTTP POST of an already-serialized operation
//!   through a shared [`QueryClient`].
//! - **Live subscriptions**: a persistent socket speaking the `graphql-ws`
//!   sub-protocol, driven by a [`Session`] whose receive loop broadcasts
//!   delivery events and faults to registered listeners.
//!
//! Plus the glue around them: [`document`] parses `.graphql` files
//! (including `#import` resolution) into operation lists.
//!
//! # Subscriptions
//!
//! ```ignore
//! use graphlink::{SessionOptions, SubscriptionTransport};
//!
//! let transport = SubscriptionTransport::new();
//!
//! transport.on_delivery(|envelope| {
//!     println!("data: {:?}", envelope.payload);
//! });
//! transport.on_fault(|err| {
//!     eprintln!("subscription fault: {}", err);
//! });
//!
//! let session = transport
//!     .open(
//!         "https://api.example.com/graphql",
//!         "subscription { messageReceived { id content } }",
//!         SessionOptions::new().bearer_token("my-token"),
//!     )
//!     .await?;
//!
//! // ... later
//! transport.close(&session, session.subscription_id()).await?;
//! ```
//!
//! Faults are terminal for their session and are never retried; the
//! listener on the fault registry is the place to decide what happens
//! next. One subscription id is active per socket.
//!
//! # One-shot queries
//!
//! ```ignore
//! use graphlink::{Auth, QueryClient};
//!
//! let client = QueryClient::new();
//! let body = client
//!     .post_query(
//!         "https://api.example.com/graphql",
//!         "{ users { id name } }",
//!         None,
//!         Some(&Auth::bearer("my-token")),
//!         None,
//!     )
//!     .await;
//! ```
//!
//! # Documents
//!
//! ```ignore
//! let doc = graphlink::document::load_document("queries/messages.graphql")?;
//! for op in &doc.operations {
//!     println!("{:?} {:?}", op.kind, op.name);
//! }
//! ```

pub mod document;
mod error;
mod http;
mod signal;
pub mod subscription;
mod transport;

pub use document::{Document, Operation, OperationKind};
pub use error::{ClientError, Result};
pub use http::{Auth, QueryClient};
pub use signal::{ConnectionId, Signal};
pub use subscription::{Envelope, MessageKind, Session, SessionOptions, SessionState};
pub use transport::SubscriptionTransport;
