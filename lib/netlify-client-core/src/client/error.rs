use std::fmt::Debug;
use std::time::Duration;

use http::{Method, StatusCode};
use url::Url;

use super::transport::TransportFailure;

/// Errors that can occur when using the ApiClient.
///
/// The first five variants are the outcomes of a call: a missing parameter caught before any I/O,
/// a transport failure, a non-success status, an undecodable success body, and a ticket that was
/// never authorized in time. The remaining variants report configuration mistakes.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ApiClientError {
    /// A required parameter was not provided.
    ///
    /// Raised while building the request, so no network call is made.
    #[display("Operation '{operation_id}' is missing required parameter '{name}'")]
    #[from(skip)]
    MissingParameter {
        /// The operation being called.
        operation_id: String,
        /// The missing parameter name.
        name: String,
    },

    /// The request never produced a response (DNS, connection, timeout...).
    #[display("{method} {url} failed: {source}")]
    #[from(skip)]
    Transport {
        /// Method of the attempted request.
        method: Method,
        /// URL of the attempted request.
        url: Url,
        /// The underlying transport failure.
        source: TransportFailure,
    },

    /// The server answered with a non-success status code.
    #[display("HTTP {status}: {raw_body}")]
    #[from(skip)]
    Http {
        /// The response status.
        status: StatusCode,
        /// The response body decoded as JSON, when it is JSON.
        body: Option<serde_json::Value>,
        /// The response body as text (truncated).
        raw_body: String,
    },

    /// The server answered with a success status but the body cannot be decoded.
    #[display("Failed to parse response ({status}): {message}\n{raw_body}")]
    #[from(skip)]
    ResponseParse {
        /// The response status.
        status: StatusCode,
        /// What went wrong while decoding.
        message: String,
        /// The response body as text (truncated).
        raw_body: String,
    },

    /// The ticket was not authorized before the deadline.
    #[display("Timeout while waiting for ticket grant after {timeout:?} ({polls} polls)")]
    #[from(skip)]
    Timeout {
        /// The configured timeout.
        timeout: Duration,
        /// Number of ticket polls performed.
        polls: u32,
    },

    /// No operation is registered under that id.
    #[display("Unknown operation: {id}")]
    #[from(skip)]
    UnknownOperation {
        /// The requested operation id.
        id: String,
    },

    /// Two descriptors share the same operation id.
    #[display("Duplicate operation: {id}")]
    #[from(skip)]
    DuplicateOperation {
        /// The duplicated operation id.
        id: String,
    },

    /// An operation descriptor cannot be used.
    #[display("Invalid descriptor for '{operation_id}': {message}")]
    #[from(skip)]
    InvalidDescriptor {
        /// The offending operation id (may be empty when unknown).
        operation_id: String,
        /// Why the descriptor is invalid.
        message: String,
    },

    /// The scheme, host and path prefix do not form a valid base URL.
    #[display("Invalid base URL '{base_url}': {error}")]
    #[from(skip)]
    InvalidBaseUrl {
        /// The rejected base URL.
        base_url: String,
        /// The underlying parse error.
        error: url::ParseError,
    },

    /// A parameter value cannot be rendered at its location.
    #[display("Unsupported value for parameter '{name}': {message}. Got: {value}")]
    #[from(skip)]
    UnsupportedParameterValue {
        /// The parameter name.
        name: String,
        /// Why the value is unsupported.
        message: String,
        /// The value that was provided.
        value: serde_json::Value,
    },

    /// HTTP client error from the underlying reqwest library.
    ///
    /// Occurs when the default transport cannot be built (e.g. an invalid proxy).
    ReqwestError(reqwest::Error),

    /// URL parsing error when constructing request URLs.
    UrlError(url::ParseError),

    /// Invalid HTTP header name.
    InvalidHeaderName(http::header::InvalidHeaderName),

    /// Invalid HTTP header value.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// JSON serialization/deserialization error.
    JsonValueError(serde_json::Error),

    /// Query parameter serialization error.
    QuerySerializationError(serde_urlencoded::ser::Error),
}

impl ApiClientError {
    /// Returns the HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } | Self::ResponseParse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for [`ApiClientError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
