use std::sync::Arc;

use http::HeaderMap;
use url::Url;

mod builder;
pub use self::builder::ApiClientBuilder;

mod call;
pub use self::call::ApiCall;

mod call_parameters;
pub use self::call_parameters::{CallParameters, FilePart, ParamValue};

mod registry;
pub use self::registry::{
    CREATE_TICKET, EXCHANGE_TICKET, OperationDescriptor, OperationRegistry, ParameterDescriptor,
    ParameterLocation, SHOW_TICKET,
};

mod path;

mod body;
pub use self::body::RequestBody;

mod request;
pub use self::request::ResolvedRequest;

mod transport;
pub use self::transport::{
    RawResponse, ReqwestTransport, Transport, TransportFailure, TransportFailureKind,
    TransportFuture,
};

mod retry;
pub use self::retry::{MAX_RETRY, RetryPolicy};

mod response;
pub use self::response::{CallResult, ResponseBody};

mod ticket;
pub use self::ticket::{AccessTokenResponse, Ticket, TicketExchangeOptions};

mod auth;
pub use self::auth::SecureString;

mod error;
pub use self::error::ApiClientError;

#[cfg(test)]
mod stub;


/// REST client driven by a registry of operation descriptors.
///
/// Every registered operation is callable by id through [`ApiClient::operation`].
/// The client builds the request from the descriptor, retries transient failures,
/// and decodes the response. Use [`ApiClientBuilder`] to create instances.
///
/// # Example
///
/// ```rust,no_run
/// use netlify_client_core::{ApiClient, TicketExchangeOptions};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = ApiClient::builder().build()?;
///
/// let ticket = client.create_ticket("my-oauth-client-id").await?;
/// // ... the user authorizes the ticket in a browser ...
/// client
///     .get_access_token(&ticket, TicketExchangeOptions::default())
///     .await?;
///
/// // Subsequent calls are authenticated
/// let ticket = client.show_ticket(&ticket.id).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Token handling
///
/// The access token is a plain field: writes need `&mut self`. An [`ApiCall`] copies
/// the token when it is created, so a call in flight keeps the token it started with.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    registry: Arc<OperationRegistry>,
    scheme: String,
    host: String,
    path_prefix: String,
    base_url: Url,
    default_headers: HeaderMap,
    access_token: Option<SecureString>,
    global_params: CallParameters,
    retry_policy: RetryPolicy,
}

// Create
impl ApiClient {
    /// Creates a builder with the default configuration, see [`ApiClientBuilder`].
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }
}

// Operations
impl ApiClient {
    /// Returns a call bound to the operation `operation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::UnknownOperation`] when no such operation is registered.
    pub fn operation(&self, operation_id: &str) -> Result<ApiCall, ApiClientError> {
        let descriptor = self.registry.get(operation_id).ok_or_else(|| {
            ApiClientError::UnknownOperation {
                id: operation_id.to_string(),
            }
        })?;
        Ok(ApiCall::build(self, Arc::clone(descriptor)))
    }

    /// Lists the registered operations, in registration order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.registry.iter()
    }
}

// Configuration
impl ApiClient {
    /// The base URL every operation path is appended to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The configured host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The configured path prefix.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// The stored access token, if any.
    pub fn access_token(&self) -> Option<&SecureString> {
        self.access_token.as_ref()
    }

    /// Stores or clears the access token.
    ///
    /// `None` and an empty token both clear it; calls created afterwards carry no
    /// `Authorization` header.
    pub fn set_access_token(&mut self, token: Option<SecureString>) {
        self.access_token = token.filter(|token| !token.is_empty());
    }
}
