use std::any::type_name;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::ApiClientError;
use super::transport::{RawResponse, TransportFailure};

/// Maximum length of a response body kept in error messages.
pub(in crate::client) const BODY_MAX_LENGTH: usize = 1024;

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No content.
    Empty,
    /// A JSON document (`application/json` or any `+json` media type).
    Json(serde_json::Value),
    /// A `text/*` body.
    Text(String),
    /// Anything else, as received.
    Bytes(Vec<u8>),
}

/// The successful result of an operation call.
#[derive(Debug, Clone)]
pub struct CallResult {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl CallResult {
    /// The response status (always a 2xx).
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The decoded body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Consumes the result and returns the decoded body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Returns the JSON document, if the body is JSON.
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if the body is text.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserializes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::ResponseParse`] when the body is not JSON or does not
    /// match `T`. The message names the JSON path that failed.
    pub fn as_json<T>(&self) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.json() else {
            return Err(ApiClientError::ResponseParse {
                status: self.status,
                message: format!("expected a JSON body to decode {}", type_name::<T>()),
                raw_body: describe_body(&self.body),
            });
        };

        serde_path_to_error::deserialize(value).map_err(|err| ApiClientError::ResponseParse {
            status: self.status,
            message: format!("at '{}': {}", err.path(), err.inner()),
            raw_body: truncate(&value.to_string()),
        })
    }
}

/// Turns the transport outcome into the call result.
pub(in crate::client) fn interpret(
    method: &Method,
    url: &Url,
    outcome: Result<RawResponse, TransportFailure>,
) -> Result<CallResult, ApiClientError> {
    let response = outcome.map_err(|source| ApiClientError::Transport {
        method: method.clone(),
        url: url.clone(),
        source,
    })?;

    let RawResponse {
        status,
        headers,
        body,
    } = response;

    if !status.is_success() {
        let json = serde_json::from_slice(&body).ok();
        let raw_body = truncate(&String::from_utf8_lossy(&body));
        debug!(%method, %url, %status, "unsuccessful response");
        return Err(ApiClientError::Http {
            status,
            body: json,
            raw_body,
        });
    }

    let body = decode_body(status, &headers, body)?;

    Ok(CallResult {
        status,
        headers,
        body,
    })
}

fn decode_body(
    status: StatusCode,
    headers: &HeaderMap,
    body: Vec<u8>,
) -> Result<ResponseBody, ApiClientError> {
    if body.is_empty() {
        return Ok(ResponseBody::Empty);
    }

    let media_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok());

    let parse_error = |message: String, body: &[u8]| ApiClientError::ResponseParse {
        status,
        message,
        raw_body: truncate(&String::from_utf8_lossy(body)),
    };

    match media_type {
        Some(media_type) if is_json(&media_type) => serde_json::from_slice(&body)
            .map(ResponseBody::Json)
            .map_err(|err| parse_error(format!("invalid JSON: {err}"), &body)),
        Some(media_type) if media_type.type_() == mime::TEXT => String::from_utf8(body)
            .map(ResponseBody::Text)
            .map_err(|err| parse_error(format!("invalid UTF-8 text: {err}"), err.as_bytes())),
        _ => Ok(ResponseBody::Bytes(body)),
    }
}

fn is_json(media_type: &mime::Mime) -> bool {
    media_type.subtype() == mime::JSON || media_type.suffix() == Some(mime::JSON)
}

fn describe_body(body: &ResponseBody) -> String {
    match body {
        ResponseBody::Empty => String::new(),
        ResponseBody::Json(value) => truncate(&value.to_string()),
        ResponseBody::Text(text) => truncate(text),
        ResponseBody::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= BODY_MAX_LENGTH {
        return text.to_string();
    }
    let head = text
        .char_indices()
        .take_while(|(index, ch)| index + ch.len_utf8() <= BODY_MAX_LENGTH)
        .map(|(_, ch)| ch)
        .collect::<String>();
    format!("{head}... (truncated)")
}
