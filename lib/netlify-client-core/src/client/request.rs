use headers::HeaderMapExt;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use tracing::debug;
use url::Url;

use super::auth::SecureString;
use super::body::RequestBody;
use super::call_parameters::CallParameters;
use super::path::resolve_path;
use super::registry::{OperationDescriptor, ParameterDescriptor, ParameterLocation};
use super::ApiClientError;

/// Name accepted for the payload of any operation, whatever its body parameter is called.
const BODY_ALIAS: &str = "body";

/// A fully resolved HTTP request, ready for the transport.
///
/// Cloned for every attempt so retries send exactly the same request.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: Url,
    /// All request headers, `Content-Type` included when there is a body.
    pub headers: HeaderMap,
    /// Optional payload.
    pub body: Option<RequestBody>,
}

impl ResolvedRequest {
    /// Returns the header value as text, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub(in crate::client) fn into_reqwest(self) -> reqwest::Request {
        let Self {
            method,
            url,
            headers,
            body,
        } = self;

        let mut request = reqwest::Request::new(method, url);
        *request.headers_mut() = headers;
        if let Some(body) = body {
            *request.body_mut() = Some(reqwest::Body::from(body.data));
        }
        request
    }
}

/// Turns an operation descriptor and call parameters into a [`ResolvedRequest`].
///
/// Header precedence, lowest first: default headers, `Authorization` from the stored
/// token, body `Content-Type`, header parameters, per-call overrides.
#[derive(Debug)]
pub(in crate::client) struct RequestBuilder<'a> {
    pub(in crate::client) descriptor: &'a OperationDescriptor,
    pub(in crate::client) base_url: &'a Url,
    pub(in crate::client) default_headers: &'a HeaderMap,
    pub(in crate::client) access_token: Option<&'a SecureString>,
}

impl RequestBuilder<'_> {
    /// Builds the request from already merged parameters.
    ///
    /// Fails with [`ApiClientError::MissingParameter`] before anything is sent
    /// if a required parameter is absent.
    pub(in crate::client) fn build(
        &self,
        mut params: CallParameters,
        header_overrides: &HeaderMap,
    ) -> Result<ResolvedRequest, ApiClientError> {
        let descriptor = self.descriptor;

        let mut path_values = Vec::new();
        for param in descriptor.parameters_in(ParameterLocation::Path) {
            if let Some(value) = self.take(&mut params, param)? {
                path_values.push((param.name.as_str(), value.to_text(&param.name)?));
            }
        }
        let path = resolve_path(&descriptor.path, |name| {
            path_values
                .iter()
                .find(|(declared, _)| *declared == name)
                .map(|(_, value)| value.clone())
        })
        .map_err(|name| self.missing(&name))?;

        let mut query = Vec::new();
        for param in descriptor.parameters_in(ParameterLocation::Query) {
            if let Some(value) = self.take(&mut params, param)? {
                query.push((param.name.as_str(), value.to_text(&param.name)?));
            }
        }

        let mut header_params = Vec::new();
        for param in descriptor.parameters_in(ParameterLocation::Header) {
            if let Some(value) = self.take(&mut params, param)? {
                header_params.push((param.name.as_str(), value.to_text(&param.name)?));
            }
        }

        let mut body = None;
        for param in descriptor.parameters_in(ParameterLocation::Body) {
            let aliased = params.take(BODY_ALIAS);
            let value = params.take(&param.name).or(aliased);
            if let Some(value) = self.require(param, value)? {
                body = Some(RequestBody::from_param(&param.name, param.binary, value)?);
            }
        }

        for name in params.remaining_names() {
            debug!(operation_id = %descriptor.operation_id, %name, "ignore undeclared parameter");
        }

        let url = self.build_url(&path, &query)?;
        let headers = self.build_headers(body.as_ref(), &header_params, header_overrides)?;

        Ok(ResolvedRequest {
            method: descriptor.verb.clone(),
            url,
            headers,
            body,
        })
    }

    fn take(
        &self,
        params: &mut CallParameters,
        param: &ParameterDescriptor,
    ) -> Result<Option<super::ParamValue>, ApiClientError> {
        self.require(param, params.take(&param.name))
    }

    fn require(
        &self,
        param: &ParameterDescriptor,
        value: Option<super::ParamValue>,
    ) -> Result<Option<super::ParamValue>, ApiClientError> {
        match value {
            None if param.required => Err(self.missing(&param.name)),
            value => Ok(value),
        }
    }

    fn missing(&self, name: &str) -> ApiClientError {
        ApiClientError::MissingParameter {
            operation_id: self.descriptor.operation_id.clone(),
            name: name.to_string(),
        }
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiClientError> {
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = url.parse::<Url>()?;

        if !query.is_empty() {
            let query_string = serde_urlencoded::to_string(query)?;
            url.set_query(Some(&query_string));
        }

        Ok(url)
    }

    fn build_headers(
        &self,
        body: Option<&RequestBody>,
        header_params: &[(&str, String)],
        header_overrides: &HeaderMap,
    ) -> Result<HeaderMap, ApiClientError> {
        let mut headers = self.default_headers.clone();

        if let Some(token) = self.access_token {
            headers.insert(AUTHORIZATION, token.to_bearer_header()?);
        }

        if let Some(body) = body {
            headers.typed_insert(body.content_type.clone());
        }

        for (name, value) in header_params {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        for name in header_overrides.keys() {
            headers.remove(name);
        }
        for (name, value) in header_overrides {
            headers.append(name.clone(), value.clone());
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use http::header::{ACCEPT, USER_AGENT};
    use serde_json::json;

    use super::*;
    use crate::client::call_parameters::FilePart;

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("netlify/js-client"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn base_url() -> Url {
        "https://api.netlify.com/api/v1".parse().expect("valid url")
    }

    fn list_deploys() -> OperationDescriptor {
        OperationDescriptor::new("listSiteDeploys", Method::GET, "/sites/{site_id}/deploys")
            .with_parameter(ParameterDescriptor::path("site_id"))
            .with_parameter(ParameterDescriptor::query("page"))
            .with_parameter(ParameterDescriptor::query("per_page"))
            .with_parameter(ParameterDescriptor::header("X-Request-Id"))
    }

    fn build(
        descriptor: &OperationDescriptor,
        token: Option<&SecureString>,
        params: CallParameters,
        overrides: &HeaderMap,
    ) -> Result<ResolvedRequest, ApiClientError> {
        let base_url = base_url();
        let default_headers = default_headers();
        let builder = RequestBuilder {
            descriptor,
            base_url: &base_url,
            default_headers: &default_headers,
            access_token: token,
        };
        builder.build(params, overrides)
    }

    #[test]
    fn should_build_url_with_path_and_query() {
        let params = CallParameters::new()
            .add_param("per_page", 50)
            .add_param("site_id", "my site")
            .add_param("page", 2);

        let request =
            build(&list_deploys(), None, params, &HeaderMap::new()).expect("should build");

        assert_eq!(request.method, Method::GET);
        insta::assert_snapshot!(
            request.url,
            @"https://api.netlify.com/api/v1/sites/my%20site/deploys?page=2&per_page=50"
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn should_fail_on_missing_path_parameter() {
        let params = CallParameters::new().add_param("page", 2);

        let result = build(&list_deploys(), None, params, &HeaderMap::new());

        assert!(matches!(
            result,
            Err(ApiClientError::MissingParameter { operation_id, name })
                if operation_id == "listSiteDeploys" && name == "site_id"
        ));
    }

    #[test]
    fn should_fail_on_missing_required_query_parameter() {
        let descriptor = OperationDescriptor::new("createTicket", Method::POST, "/oauth/tickets")
            .with_parameter(ParameterDescriptor::query("client_id").required());

        let result = build(&descriptor, None, CallParameters::new(), &HeaderMap::new());

        assert!(matches!(
            result,
            Err(ApiClientError::MissingParameter { name, .. }) if name == "client_id"
        ));
    }

    #[test]
    fn should_accept_body_alias_for_declared_body_parameter() {
        let descriptor = OperationDescriptor::new("createSite", Method::POST, "/sites")
            .with_parameter(ParameterDescriptor::body("site").required());

        let aliased = CallParameters::new().add_param("body", json!({"name": "from-alias"}));
        let request =
            build(&descriptor, None, aliased, &HeaderMap::new()).expect("should build");
        let body = request.body.expect("has body");
        assert_eq!(body.data, br#"{"name":"from-alias"}"#);

        let both = CallParameters::new()
            .add_param("body", json!({"name": "from-alias"}))
            .add_param("site", json!({"name": "declared"}));
        let request = build(&descriptor, None, both, &HeaderMap::new()).expect("should build");
        let body = request.body.expect("has body");
        assert_eq!(body.data, br#"{"name":"declared"}"#);
        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn should_never_put_path_or_body_parameters_in_query() {
        let descriptor = OperationDescriptor::new("updateSite", Method::PATCH, "/sites/{site_id}")
            .with_parameter(ParameterDescriptor::path("site_id"))
            .with_parameter(ParameterDescriptor::body("site").required());
        let params = CallParameters::new()
            .add_param("site_id", "s1")
            .add_param("site", json!({"name": "renamed"}));

        let request = build(&descriptor, None, params, &HeaderMap::new()).expect("should build");

        assert_eq!(request.url.query(), None);
        assert_eq!(request.url.path(), "/api/v1/sites/s1");
        let body = request.body.expect("has body");
        assert_eq!(body.data, br#"{"name":"renamed"}"#);
        assert_eq!(request.headers["content-type"], "application/json");
    }

    #[test]
    fn should_ignore_undeclared_parameters() {
        let params = CallParameters::new()
            .add_param("site_id", "s1")
            .add_param("unknown", "x");

        let request =
            build(&list_deploys(), None, params, &HeaderMap::new()).expect("should build");

        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn should_include_default_and_bearer_headers() {
        let token = SecureString::from("my-token");
        let params = CallParameters::new()
            .add_param("site_id", "s1")
            .add_param("X-Request-Id", "req-1");

        let request =
            build(&list_deploys(), Some(&token), params, &HeaderMap::new()).expect("should build");

        assert_eq!(request.header("user-agent"), Some("netlify/js-client"));
        assert_eq!(request.header("accept"), Some("application/json"));
        assert_eq!(request.header("authorization"), Some("Bearer my-token"));
        assert_eq!(request.header("x-request-id"), Some("req-1"));
    }

    #[test]
    fn should_omit_authorization_without_token() {
        let params = CallParameters::new().add_param("site_id", "s1");

        let request =
            build(&list_deploys(), None, params, &HeaderMap::new()).expect("should build");

        assert!(request.header("authorization").is_none());
    }

    #[test]
    fn should_let_overrides_win() {
        let token = SecureString::from("stored-token");
        let mut overrides = HeaderMap::new();
        overrides.insert(AUTHORIZATION, HeaderValue::from_static("Bearer override"));
        overrides.insert(USER_AGENT, HeaderValue::from_static("my-cli/1.0"));
        let params = CallParameters::new().add_param("site_id", "s1");

        let request =
            build(&list_deploys(), Some(&token), params, &overrides).expect("should build");

        assert_eq!(request.header("authorization"), Some("Bearer override"));
        assert_eq!(request.header("user-agent"), Some("my-cli/1.0"));
        assert_eq!(request.headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn should_send_file_as_multipart() {
        let descriptor = OperationDescriptor::new(
            "uploadDeployFile",
            Method::PUT,
            "/deploys/{deploy_id}/files/{path}",
        )
        .with_parameter(ParameterDescriptor::path("deploy_id"))
        .with_parameter(ParameterDescriptor::path("path"))
        .with_parameter(ParameterDescriptor::body("file_body").required().binary());
        let params = CallParameters::new()
            .add_param("deployId", "d1")
            .add_param("path", "assets/app.js")
            .add_param("file_body", FilePart::new("app.js", b"console.log(1)".to_vec()));

        let request = build(&descriptor, None, params, &HeaderMap::new()).expect("should build");

        insta::assert_snapshot!(
            request.url,
            @"https://api.netlify.com/api/v1/deploys/d1/files/assets%2Fapp.js"
        );
        let content_type = request.header("content-type").expect("content type");
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert_eq!(request.url.query(), None);
    }

    #[test]
    fn should_convert_into_reqwest_request() {
        let descriptor = OperationDescriptor::new("createSite", Method::POST, "/sites")
            .with_parameter(ParameterDescriptor::body("site"));
        let params = CallParameters::new().add_param("site", json!({"name": "s"}));
        let request = build(&descriptor, None, params, &HeaderMap::new()).expect("should build");

        let request = request.into_reqwest();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), "https://api.netlify.com/api/v1/sites");
        assert_eq!(request.headers()["content-type"], "application/json");
        let body = request
            .body()
            .and_then(reqwest::Body::as_bytes)
            .expect("buffered body");
        assert_eq!(body, br#"{"name":"s"}"#);
    }
}
