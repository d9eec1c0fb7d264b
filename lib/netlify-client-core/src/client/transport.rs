//! The HTTP transport seam.
//!
//! The client never talks to the network directly: it hands a [`ResolvedRequest`]
//! to a [`Transport`] and gets back either a [`RawResponse`] or a [`TransportFailure`].
//! [`ReqwestTransport`] is the default implementation.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use http::{HeaderMap, StatusCode};
use tracing::debug;

use super::request::ResolvedRequest;

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, TransportFailure>> + Send + 'a>>;

/// Sends one resolved request and returns what came back.
///
/// Implementations must not retry: retries are decided by the client.
pub trait Transport: fmt::Debug + Send + Sync {
    /// Executes the request once.
    fn send(&self, request: ResolvedRequest) -> TransportFuture<'_>;
}

/// A response as received from the transport, body fully read.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// The response status.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The raw response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates a response with the given status, no headers and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a response with a JSON body and `Content-Type: application/json`.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status).with_header(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response.body = value.to_string().into_bytes();
        response
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Kind of transport failure, used to decide whether a retry may help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// Name resolution or connection establishment failed.
    Connect,
    /// The request timed out.
    Timeout,
    /// The connection was reset or closed before a complete response arrived.
    Connection,
    /// Anything else (invalid request, body error, redirect loop...).
    Other,
}

/// A request that never produced a response.
#[derive(Debug)]
pub struct TransportFailure {
    kind: TransportFailureKind,
    source: Box<dyn Error + Send + Sync>,
}

impl TransportFailure {
    /// Creates a failure of the given kind.
    pub fn new(kind: TransportFailureKind, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// Shorthand for a [`TransportFailureKind::Connect`] failure.
    pub fn connect(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::new(TransportFailureKind::Connect, source)
    }

    /// Returns the failure kind.
    pub fn kind(&self) -> TransportFailureKind {
        self.kind
    }

    /// Connect, timeout and lost-connection failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransportFailureKind::Connect
                | TransportFailureKind::Timeout
                | TransportFailureKind::Connection
        )
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TransportFailureKind::Connect => "connection failure",
            TransportFailureKind::Timeout => "timeout",
            TransportFailureKind::Connection => "connection lost",
            TransportFailureKind::Other => "transport failure",
        };
        write!(f, "{kind}: {}", self.source)
    }
}

impl Error for TransportFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_connect() {
            TransportFailureKind::Connect
        } else if error.is_timeout() {
            TransportFailureKind::Timeout
        } else if error.is_builder() || error.is_redirect() || error.is_decode() {
            TransportFailureKind::Other
        } else if error.is_request() || is_connection_lost(&error) {
            TransportFailureKind::Connection
        } else {
            TransportFailureKind::Other
        };
        Self::new(kind, error)
    }
}

/// Looks for a reset, aborted or truncated connection anywhere in the source chain.
fn is_connection_lost(error: &(dyn Error + 'static)) -> bool {
    std::iter::successors(Some(error), |current: &&(dyn Error + 'static)| (*current).source()).any(|current| {
        current.downcast_ref::<io::Error>().is_some_and(|io_error| {
            matches!(
                io_error.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        })
    })
}

/// [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing reqwest client (proxy, TLS and timeouts come from it).
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(&self, request: ResolvedRequest) -> Result<RawResponse, TransportFailure> {
        let request = request.into_reqwest();
        debug!(?request, "sending...");
        let response = self.client.execute(request).await?;
        debug!(?response, "...receiving");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: ResolvedRequest) -> TransportFuture<'_> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_failures() {
        let failure = TransportFailure::connect("dns error");
        assert!(failure.is_retryable());
        assert_eq!(failure.kind(), TransportFailureKind::Connect);

        let failure = TransportFailure::new(TransportFailureKind::Timeout, "too slow");
        assert!(failure.is_retryable());

        let failure = TransportFailure::new(TransportFailureKind::Connection, "reset by peer");
        assert!(failure.is_retryable());

        let failure = TransportFailure::new(TransportFailureKind::Other, "broken body");
        assert!(!failure.is_retryable());
    }

    #[test]
    fn should_detect_lost_connection_in_source_chain() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(is_connection_lost(&reset));

        let wrapped = TransportFailure::new(
            TransportFailureKind::Other,
            io::Error::from(io::ErrorKind::UnexpectedEof),
        );
        assert!(is_connection_lost(&wrapped));

        let refused = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(!is_connection_lost(&refused));
    }

    #[test]
    fn should_keep_builder_errors_terminal() {
        let error = reqwest::Client::new()
            .get("http://[::1")
            .build()
            .expect_err("invalid URL");

        let failure = TransportFailure::from(error);

        assert_eq!(failure.kind(), TransportFailureKind::Other);
        assert!(!failure.is_retryable());
    }

    #[test]
    fn should_display_failure() {
        let failure = TransportFailure::connect("connection refused");

        insta::assert_snapshot!(failure, @"connection failure: connection refused");
    }

    #[test]
    fn should_build_json_response() {
        let response = RawResponse::json(StatusCode::OK, &serde_json::json!({"id": "t1"}));

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["content-type"], "application/json");
        assert_eq!(response.body, br#"{"id":"t1"}"#);
    }
}
