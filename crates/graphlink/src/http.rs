//! One-shot GraphQL query execution over HTTP POST.
//!
//! A single [`QueryClient`] is shared for all plain request/response
//! execution. Transport failures are logged and degrade to "no response"
//! rather than surfacing an error: a failed one-shot query is recoverable
//! by the caller retrying, unlike a broken subscription.

use std::collections::HashMap;

use serde_json::Value;

/// An authorization scheme/token pair, rendered as `"{scheme} {token}"`.
#[derive(Clone, Debug)]
pub struct Auth {
    /// The scheme, e.g. `Bearer`.
    pub scheme: String,
    /// The credential.
    pub token: String,
}

impl Auth {
    /// Create an auth pair with an explicit scheme.
    pub fn new(scheme: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            token: token.into(),
        }
    }

    /// Create a `Bearer` token pair.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new("Bearer", token)
    }

    fn header_value(&self) -> String {
        format!("{} {}", self.scheme, self.token)
    }
}

/// A shared HTTP client for one-shot query execution.
pub struct QueryClient {
    client: reqwest::Client,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    /// Create a client with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST an already-serialized query payload and return the raw
    /// response body text.
    ///
    /// The body is whatever the server answered with, including GraphQL
    /// error documents and non-2xx responses; only a transport-level
    /// failure yields `None`, after logging it.
    pub async fn post_raw(
        &self,
        url: &str,
        payload: Vec<u8>,
        auth: Option<&Auth>,
        headers: Option<&HashMap<String, String>>,
    ) -> Option<String> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(payload);

        if let Some(auth) = auth {
            request = request.header("Authorization", auth.header_value());
        }
        if let Some(headers) = headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(target: "graphlink::http", url = %url, error = %e, "query request failed");
                return None;
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => {
                tracing::debug!(
                    target: "graphlink::http",
                    url = %url,
                    status = status.as_u16(),
                    "query response received"
                );
                Some(body)
            }
            Err(e) => {
                tracing::error!(target: "graphlink::http", url = %url, error = %e, "query response body unreadable");
                None
            }
        }
    }

    /// Serialize `{"query": ..., "variables": ...}` and POST it.
    pub async fn post_query(
        &self,
        url: &str,
        query: &str,
        variables: Option<Value>,
        auth: Option<&Auth>,
        headers: Option<&HashMap<String, String>>,
    ) -> Option<String> {
        let mut body = serde_json::Map::new();
        body.insert("query".into(), Value::String(query.to_string()));
        if let Some(variables) = variables {
            body.insert("variables".into(), variables);
        }
        let payload = Value::Object(body).to_string().into_bytes();
        self.post_raw(url, payload, auth, headers).await
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient").finish()
    }
}
