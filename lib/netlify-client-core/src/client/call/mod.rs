use std::sync::Arc;

use http::HeaderMap;
use indexmap::IndexMap;
use url::Url;

use super::auth::SecureString;
use super::call_parameters::CallParameters;
use super::registry::OperationDescriptor;
use super::retry::RetryPolicy;
use super::transport::Transport;

mod builder;
mod execution;

/// A bound operation call, ready to be configured and awaited.
///
/// Obtained from [`ApiClient::operation`](crate::ApiClient::operation). The call captures
/// the client configuration when it is created: base URL, default headers, global
/// parameters and the access token. Later changes to the client do not affect it.
///
/// # Method Groups
///
/// - [`with_param(name, value)`](Self::with_param) / [`with_params(params)`](Self::with_params) - Set operation parameters
/// - [`with_header(name, value)`](Self::with_header) / [`with_headers(headers)`](Self::with_headers) - Override request headers
/// - `.await` - Build, send (with retries) and decode the response
///
/// # Example
///
/// ```rust,no_run
/// use netlify_client_core::ApiClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::builder().with_access_token("my-token").build()?;
/// let ticket = client
///     .operation("showTicket")?
///     .with_param("ticket_id", "abc-123")
///     .await?;
/// println!("{:?}", ticket.json());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ApiCall {
    transport: Arc<dyn Transport>,
    descriptor: Arc<OperationDescriptor>,
    base_url: Url,
    default_headers: HeaderMap,
    access_token: Option<SecureString>,
    retry_policy: RetryPolicy,
    global_params: CallParameters,

    params: CallParameters,
    header_overrides: IndexMap<String, String>,
}

impl ApiCall {
    pub(in crate::client) fn build(
        client: &super::ApiClient,
        descriptor: Arc<OperationDescriptor>,
    ) -> Self {
        Self {
            transport: Arc::clone(&client.transport),
            descriptor,
            base_url: client.base_url.clone(),
            default_headers: client.default_headers.clone(),
            access_token: client.access_token.clone(),
            retry_policy: client.retry_policy.clone(),
            global_params: client.global_params.clone(),
            params: CallParameters::new(),
            header_overrides: IndexMap::new(),
        }
    }

    /// The descriptor of the called operation.
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }
}
