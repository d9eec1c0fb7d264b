use std::sync::Arc;

use http::HeaderMap;
use http::header::{ACCEPT, HeaderValue, USER_AGENT};
use url::Url;

use super::auth::SecureString;
use super::call_parameters::{CallParameters, ParamValue};
use super::registry::OperationRegistry;
use super::retry::RetryPolicy;
use super::transport::{ReqwestTransport, Transport};
use super::{ApiClient, ApiClientError};

const DEFAULT_SCHEME: &str = "https";
const DEFAULT_HOST: &str = "api.netlify.com";
const DEFAULT_PATH_PREFIX: &str = "/api/v1";
const DEFAULT_USER_AGENT: &str = "netlify/js-client";

/// Builder for creating `ApiClient` instances.
///
/// # Default Configuration
///
/// - **Base URL**: `https://api.netlify.com/api/v1` (scheme, host and path prefix)
/// - **User-Agent**: `netlify/js-client`
/// - **Access token**: none
/// - **Global parameters**: none
/// - **Operations**: the ticket operations (`createTicket`, `showTicket`, `exchangeTicket`)
/// - **Transport**: [`ReqwestTransport`] without proxy
/// - **Retries**: [`RetryPolicy::default`]
///
/// # Example
///
/// ```rust
/// use netlify_client_core::{ApiClient, OperationRegistry};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let operations = OperationRegistry::from_json(r#"[
///     {"operationId": "listSites", "verb": "get", "path": "/sites", "parameters": []}
/// ]"#)?;
///
/// let client = ApiClient::builder()
///     .with_user_agent("my-cli/1.0")
///     .with_access_token("my-token")
///     .with_registry(OperationRegistry::ticket_operations().merge(operations)?)
///     .build()?;
///
/// assert_eq!(client.base_url().as_str(), "https://api.netlify.com/api/v1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ApiClientBuilder {
    scheme: String,
    host: String,
    path_prefix: String,
    user_agent: String,
    access_token: Option<SecureString>,
    global_params: CallParameters,
    proxy: Option<reqwest::Proxy>,
    registry: Option<OperationRegistry>,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: RetryPolicy,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            access_token: None,
            global_params: CallParameters::new(),
            proxy: None,
            registry: None,
            transport: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ApiClientBuilder {
    /// Builds the final `ApiClient` instance with all configured settings.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::InvalidBaseUrl`] if scheme, host and path prefix do not form a URL
    /// - [`ApiClientError::InvalidHeaderValue`] if the user agent is not a valid header value
    /// - [`ApiClientError::ReqwestError`] if the default transport cannot be built
    pub fn build(self) -> Result<ApiClient, ApiClientError> {
        let Self {
            scheme,
            host,
            path_prefix,
            user_agent,
            access_token,
            global_params,
            proxy,
            registry,
            transport,
            retry_policy,
        } = self;

        let base_url = base_url(&scheme, &host, &path_prefix)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_str(&user_agent)?);
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let transport = match transport {
            Some(transport) => transport,
            None => {
                let mut client = reqwest::Client::builder();
                if let Some(proxy) = proxy {
                    client = client.proxy(proxy);
                }
                Arc::new(ReqwestTransport::new(client.build()?))
            }
        };

        let registry = registry.unwrap_or_else(OperationRegistry::ticket_operations);

        Ok(ApiClient {
            transport,
            registry: Arc::new(registry),
            scheme,
            host,
            path_prefix,
            base_url,
            default_headers,
            access_token: access_token.filter(|token| !token.is_empty()),
            global_params,
            retry_policy,
        })
    }

    /// Sets the `User-Agent` header sent with every request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the URL scheme (`https` by default).
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the host, with an optional port (`api.netlify.com` by default).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the path prefix prepended to every operation path (`/api/v1` by default).
    pub fn with_path_prefix(mut self, path_prefix: impl Into<String>) -> Self {
        self.path_prefix = path_prefix.into();
        self
    }

    /// Sets the access token sent as `Authorization: Bearer <token>`.
    ///
    /// An empty token means no token.
    pub fn with_access_token(mut self, token: impl Into<SecureString>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Adds a parameter sent with every call that declares it.
    ///
    /// Call-time parameters with the same name take precedence.
    pub fn with_global_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        self.global_params.insert(name, value);
        self
    }

    /// Routes the default transport through a proxy.
    ///
    /// Ignored when a custom transport is set with [`Self::with_transport`].
    pub fn with_proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Replaces the set of callable operations.
    pub fn with_registry(mut self, registry: OperationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the HTTP transport.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

fn base_url(scheme: &str, host: &str, path_prefix: &str) -> Result<Url, ApiClientError> {
    let separator = if path_prefix.is_empty() || path_prefix.starts_with('/') {
        ""
    } else {
        "/"
    };
    let base_url = format!("{scheme}://{host}{separator}{path_prefix}");

    let url = base_url
        .parse::<Url>()
        .map_err(|error| ApiClientError::InvalidBaseUrl {
            base_url: base_url.clone(),
            error,
        })?;
    if url.cannot_be_a_base() || !url.has_host() {
        return Err(ApiClientError::InvalidBaseUrl {
            base_url,
            error: url::ParseError::EmptyHost,
        });
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stub::StubTransport;
    use crate::client::transport::RawResponse;

    #[test]
    fn should_build_default_base_url() {
        let client = ApiClient::builder().build().expect("valid client");

        insta::assert_snapshot!(client.base_url(), @"https://api.netlify.com/api/v1");
    }

    #[test]
    fn should_build_custom_base_url() {
        let client = ApiClient::builder()
            .with_scheme("http")
            .with_host("localhost:8080")
            .with_path_prefix("v2")
            .build()
            .expect("valid client");

        insta::assert_snapshot!(client.base_url(), @"http://localhost:8080/v2");
        assert_eq!(client.scheme(), "http");
        assert_eq!(client.host(), "localhost:8080");
        assert_eq!(client.path_prefix(), "v2");
    }

    #[test]
    fn should_reject_invalid_base_url() {
        let result = ApiClient::builder().with_host("").build();

        assert!(matches!(result, Err(ApiClientError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn should_reject_invalid_user_agent() {
        let result = ApiClient::builder().with_user_agent("bad\nagent").build();

        assert!(matches!(result, Err(ApiClientError::InvalidHeaderValue(_))));
    }

    #[test]
    fn should_ignore_empty_access_token() {
        let client = ApiClient::builder()
            .with_access_token("")
            .build()
            .expect("valid client");

        assert!(client.access_token().is_none());
    }

    #[test]
    fn should_register_ticket_operations_by_default() {
        let client = ApiClient::builder()
            .with_transport(StubTransport::always(RawResponse::default()))
            .build()
            .expect("valid client");

        let ids = client
            .operations()
            .map(|operation| operation.operation_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["createTicket", "showTicket", "exchangeTicket"]);
    }

    #[test]
    fn should_accept_proxy() {
        let proxy = reqwest::Proxy::all("http://127.0.0.1:3128").expect("valid proxy");

        let client = ApiClient::builder().with_proxy(proxy).build();

        assert!(client.is_ok());
    }
}
