//! Public entry point for subscriptions and shared HTTP resources.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ClientError, Result};
use crate::http::QueryClient;
use crate::signal::{ConnectionId, Signal};
use crate::subscription::{Envelope, Session, SessionOptions};

/// Orchestrates subscription sessions and holds the externally shared
/// mutable state: the delivery/fault listener registries and the one-shot
/// HTTP query client.
///
/// Delivery events are `data` envelopes broadcast to every registered
/// listener; faults from a session's receive loop are broadcast on a
/// separate registry so errors are never conflated with data.
///
/// # Example
///
/// ```ignore
/// use graphlink::{SessionOptions, SubscriptionTransport};
///
/// let transport = SubscriptionTransport::new();
/// transport.on_delivery(|envelope| {
///     println!("data: {:?}", envelope.payload);
/// });
///
/// let session = transport
///     .open("https://api.example.com/graphql", "subscription { events { id } }", SessionOptions::new())
///     .await?;
///
/// transport.close(&session, session.subscription_id()).await?;
/// ```
pub struct SubscriptionTransport {
    delivery: Arc<Signal<Envelope>>,
    faults: Arc<Signal<ClientError>>,
    http: Mutex<Option<Arc<QueryClient>>>,
}

impl Default for SubscriptionTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionTransport {
    /// Create a transport with no listeners and no HTTP client yet.
    pub fn new() -> Self {
        Self {
            delivery: Arc::new(Signal::new()),
            faults: Arc::new(Signal::new()),
            http: Mutex::new(None),
        }
    }

    /// Open a socket, run the handshake, and start the subscription.
    ///
    /// Delegates to [`Session::connect`]; the returned session's receive
    /// loop broadcasts on this transport's listener registries.
    pub async fn open(
        &self,
        url: &str,
        query: &str,
        options: SessionOptions,
    ) -> Result<Session> {
        Session::connect(
            url,
            query,
            options,
            self.delivery.clone(),
            self.faults.clone(),
        )
        .await
    }

    /// Stop the subscription with the given id and close the session.
    pub async fn close(&self, session: &Session, id: &str) -> Result<()> {
        session.disconnect(id).await
    }

    /// Register a delivery-event listener.
    pub fn on_delivery<F>(&self, listener: F) -> ConnectionId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.delivery.connect(listener)
    }

    /// Remove a delivery-event listener.
    pub fn remove_delivery(&self, id: ConnectionId) -> bool {
        self.delivery.disconnect(id)
    }

    /// Register a fault listener.
    pub fn on_fault<F>(&self, listener: F) -> ConnectionId
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.faults.connect(listener)
    }

    /// Remove a fault listener.
    pub fn remove_fault(&self, id: ConnectionId) -> bool {
        self.faults.disconnect(id)
    }

    /// The shared HTTP client for one-shot query execution, constructed on
    /// first use.
    pub fn query_client(&self) -> Arc<QueryClient> {
        let mut guard = self.http.lock();
        guard.get_or_insert_with(|| Arc::new(QueryClient::new())).clone()
    }

    /// Detach all listeners and dispose the held HTTP client.
    ///
    /// Called once at process start to guarantee a clean slate for the
    /// only externally shared mutable state this crate holds.
    pub fn reset(&self) {
        tracing::debug!(target: "graphlink::transport", "resetting listeners and HTTP resources");
        self.delivery.disconnect_all();
        self.faults.disconnect_all();
        *self.http.lock() = None;
    }
}

impl std::fmt::Debug for SubscriptionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionTransport")
            .field("delivery_listeners", &self.delivery.connection_count())
            .field("fault_listeners", &self.faults.connection_count())
            .finish()
    }
}
