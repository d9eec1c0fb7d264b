//! # Netlify Client Core
//!
//! A REST client driven by a registry of operation descriptors.
//!
//! Each operation (`operationId`, HTTP verb, path template, declared parameters) is
//! callable by id. The client resolves path placeholders, builds the query string,
//! headers and body from named parameters, retries transient failures, and decodes
//! the response. It also implements the ticket-based token exchange: poll a ticket
//! until the user authorizes it, then exchange it for an access token.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netlify_client_core::{ApiClient, OperationRegistry};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Site {
//!     id: String,
//!     name: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let operations = OperationRegistry::from_json(r#"[
//!     {
//!         "operationId": "getSite",
//!         "verb": "get",
//!         "path": "/sites/{site_id}",
//!         "parameters": [{"name": "site_id", "in": "path", "required": true}]
//!     }
//! ]"#)?;
//!
//! let client = ApiClient::builder()
//!     .with_access_token("my-token")
//!     .with_registry(operations)
//!     .build()?;
//!
//! let site: Site = client
//!     .operation("getSite")?
//!     .with_param("siteId", "my-site-id") // lowerCamelCase aliases are accepted
//!     .await?
//!     .as_json()?;
//! println!("{site:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Parameters
//!
//! Parameters are named values ([`ParamValue`]). Where each one goes is decided by
//! the operation descriptor:
//!
//! - **path**: substituted into `{name}` placeholders, percent-encoded
//! - **query**: appended in declaration order, arrays are comma-joined
//! - **header**: sent as request headers
//! - **body**: serialized as JSON, or as a file upload for binary parameters; also
//!   accepted under the generic name `body`
//!
//! Global parameters set with [`ApiClientBuilder::with_global_param`] apply to every
//! call; a call-time parameter with the same name wins. A missing required parameter
//! fails with [`ApiClientError::MissingParameter`] before any network activity.
//!
//! ## Retries
//!
//! Connection failures (refused or dropped), timeouts and `429`/`502`/`503`/`504`
//! responses are retried up to [`MAX_RETRY`] times. The delay comes from `Retry-After`, then from
//! `X-RateLimit-Reset`, and defaults to one second. See [`RetryPolicy`].
//!
//! ## Ticket exchange
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use netlify_client_core::{ApiClient, TicketExchangeOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = ApiClient::builder().build()?;
//!
//! let ticket = client.create_ticket("my-oauth-client-id").await?;
//! println!("Authorize at https://app.netlify.com/authorize?response_type=ticket&ticket={}", ticket.id);
//!
//! let options = TicketExchangeOptions::default().with_timeout(Duration::from_secs(300));
//! let token = client.get_access_token(&ticket, options).await?;
//! assert_eq!(client.access_token(), Some(&token));
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate logs with [`tracing`]; install a subscriber to see requests, retries
//! and ticket polls.

mod client;

// Public API - only expose user-facing types and functions
pub use self::client::{
    AccessTokenResponse, ApiCall, ApiClient, ApiClientBuilder, ApiClientError, CREATE_TICKET,
    CallParameters, CallResult, EXCHANGE_TICKET, FilePart, MAX_RETRY, OperationDescriptor,
    OperationRegistry, ParamValue, ParameterDescriptor, ParameterLocation, RawResponse,
    ReqwestTransport, RequestBody, ResolvedRequest, ResponseBody, RetryPolicy, SHOW_TICKET,
    SecureString, Ticket, TicketExchangeOptions, Transport, TransportFailure,
    TransportFailureKind, TransportFuture,
};
