use std::future::{Future, IntoFuture};
use std::pin::Pin;

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use tracing::debug;

use super::ApiCall;
use crate::client::call_parameters::CallParameters;
use crate::client::request::RequestBuilder;
use crate::client::response::interpret;
use crate::client::{ApiClientError, CallResult};

impl ApiCall {
    /// Runs the whole pipeline: build, send with retries, decode.
    async fn exchange(self) -> Result<CallResult, ApiClientError> {
        let Self {
            transport,
            descriptor,
            base_url,
            default_headers,
            access_token,
            retry_policy,
            global_params,
            params,
            header_overrides,
        } = self;

        let params = CallParameters::merge(&global_params, &params);

        let mut overrides = HeaderMap::new();
        for (name, value) in &header_overrides {
            overrides.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let request = RequestBuilder {
            descriptor: &descriptor,
            base_url: &base_url,
            default_headers: &default_headers,
            access_token: access_token.as_ref(),
        }
        .build(params, &overrides)?;

        debug!(
            operation_id = %descriptor.operation_id,
            method = %request.method,
            url = %request.url,
            "calling operation"
        );
        let outcome = retry_policy.send(transport.as_ref(), &request).await;

        interpret(&request.method, &request.url, outcome)
    }
}

/// Implement IntoFuture for ApiCall to enable direct .await syntax
///
/// ```rust,no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let client = netlify_client_core::ApiClient::builder().build()?;
/// let ticket = client
///     .operation("showTicket")?
///     .with_param("ticket_id", "abc")
///     .await?;
/// # Ok(())
/// # }
/// ```
impl IntoFuture for ApiCall {
    type Output = Result<CallResult, ApiClientError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.exchange())
    }
}
