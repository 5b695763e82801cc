//! Shared HTTP plumbing for the engine adapters.
//!
//! Every backend speaks JSON over HTTP. [`HttpBackend`] owns the `reqwest`
//! client and maps failures onto [`EngineError`]: transport problems become
//! `BackendUnavailable`, rejected searches `Search`, every other rejected
//! call `Indexing`.
//!
//! Paths are given as segments and percent-encoded one by one, so index
//! names and document keys containing `/`, `?` or `#` stay a single segment.
//!
//! Meilisearch and Algolia acknowledge writes with an enqueued task.
//! [`HttpBackend::wait_for_task`] polls such a task until it settles, bounded
//! by the request timeout.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::traits::EngineError;

const FIRST_POLL_DELAY: Duration = Duration::from_millis(10);
const MAX_POLL_DELAY: Duration = Duration::from_millis(250);

/// What an HTTP call was doing, for error context and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Index,
    Delete,
    Search,
    Flush,
    SyncSettings,
    Provision,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Delete => "delete",
            Self::Search => "search",
            Self::Flush => "flush",
            Self::SyncSettings => "sync_settings",
            Self::Provision => "provision",
        }
    }
}

/// Status and body of a completed HTTP exchange
#[derive(Debug)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Progress of an asynchronous backend task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Succeeded,
    Failed(String),
}

pub struct HttpBackend {
    client: Client,
    base_url: Url,
    backend: &'static str,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        backend: &'static str,
        base_url: &str,
        headers: HeaderMap,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| EngineError::Config(format!("invalid {} url '{}': {}", backend, base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(EngineError::Config(format!(
                "invalid {} url '{}': not a base url",
                backend, base_url
            )));
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: parsed,
            backend,
            request_timeout,
        })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Base url extended by `segments`, each percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base urls, so the segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client.request(method, self.url(segments))
    }

    /// Send a request, returning the reply whatever its status.
    pub async fn send(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<HttpReply, EngineError> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timeout: {}", e)
            } else if e.is_connect() {
                format!("failed to connect: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            self.unavailable(operation, message)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.unavailable(operation, format!("failed to read response: {}", e)))?;

        Ok(HttpReply { status, body })
    }

    /// Send a request and decode a successful JSON reply.
    pub async fn send_json(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<Value, EngineError> {
        let reply = self.send(operation, request).await?;
        if !reply.is_success() {
            return Err(self.rejection(operation, &reply));
        }
        self.decode(operation, &reply.body)
    }

    pub fn decode(&self, operation: Operation, body: &str) -> Result<Value, EngineError> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body).map_err(|e| {
            self.unavailable(operation, format!("failed to parse response: {}", e))
        })
    }

    /// Poll the task at `segments` until `classify` reports it settled.
    ///
    /// A failed task becomes `Indexing` carrying the backend's diagnostic.
    /// Polling longer than the request timeout is `BackendUnavailable`.
    pub async fn wait_for_task<F>(
        &self,
        operation: Operation,
        segments: &[&str],
        classify: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(&Value) -> TaskState,
    {
        let deadline = Instant::now() + self.request_timeout;
        let mut delay = FIRST_POLL_DELAY;

        loop {
            let request = self.request(Method::GET, segments);
            let task = self.send_json(operation, request).await?;

            match classify(&task) {
                TaskState::Succeeded => return Ok(()),
                TaskState::Failed(message) => {
                    return Err(EngineError::Indexing {
                        backend: self.backend,
                        operation: operation.as_str(),
                        message,
                        failures: Vec::new(),
                    })
                }
                TaskState::Pending => {}
            }

            if Instant::now() + delay > deadline {
                return Err(self.unavailable(
                    operation,
                    format!("task {} did not finish within {:?}", segments.join("/"), self.request_timeout),
                ));
            }
            debug!(backend = self.backend, task = %segments.join("/"), "Task pending");
            sleep(delay).await;
            delay = (delay * 2).min(MAX_POLL_DELAY);
        }
    }

    /// Map a non-success reply onto the error kind of `operation`.
    pub fn rejection(&self, operation: Operation, reply: &HttpReply) -> EngineError {
        let message = format!("HTTP {}: {}", reply.status.as_u16(), error_message(&reply.body));
        match operation {
            Operation::Search => EngineError::Search {
                backend: self.backend,
                message,
            },
            _ => EngineError::Indexing {
                backend: self.backend,
                operation: operation.as_str(),
                message,
                failures: Vec::new(),
            },
        }
    }

    pub fn unavailable(&self, operation: Operation, message: String) -> EngineError {
        EngineError::BackendUnavailable {
            backend: self.backend,
            operation: operation.as_str(),
            message,
        }
    }
}

/// All three backends report errors as `{"message": "..."}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new(
            "test",
            "http://localhost:7700/",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(backend().base_url(), "http://localhost:7700");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = HttpBackend::new(
            "test",
            "not a url",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let http = backend();
        let url = http.url(&["collections", "products", "documents", "x?y"]);
        assert_eq!(url.path(), "/collections/products/documents/x%3Fy");
        assert_eq!(url.query(), None);

        let url = http.url(&["collections", "products", "documents", "AB/12"]);
        assert_eq!(url.path(), "/collections/products/documents/AB%2F12");

        let url = http.url(&["indexes", "q#1"]);
        assert_eq!(url.path(), "/indexes/q%231");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_url_keeps_base_path() {
        let http = HttpBackend::new(
            "test",
            "http://localhost:8108/typesense/",
            HeaderMap::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(http.url(&["collections"]).path(), "/typesense/collections");
    }

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"bad filter","code":"x"}"#), "bad filter");
        assert_eq!(error_message("plain text\n"), "plain text");
    }

    #[test]
    fn test_rejection_kind_follows_operation() {
        let reply = HttpReply {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"message":"nope"}"#.into(),
        };
        let http = backend();

        match http.rejection(Operation::Search, &reply) {
            EngineError::Search { backend, message } => {
                assert_eq!(backend, "test");
                assert_eq!(message, "HTTP 400: nope");
            }
            other => panic!("Expected Search error, got {:?}", other),
        }

        match http.rejection(Operation::Flush, &reply) {
            EngineError::Indexing { operation, failures, .. } => {
                assert_eq!(operation, "flush");
                assert!(failures.is_empty());
            }
            other => panic!("Expected Indexing error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_empty_body() {
        assert_eq!(backend().decode(Operation::Flush, "").unwrap(), Value::Null);
    }
}
