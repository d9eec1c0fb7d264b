use headers::ContentType;

use super::ApiClientError;
use super::call_parameters::{FilePart, ParamValue};

/// Serialized payload of a request with its content type.
#[derive(Clone, PartialEq, derive_more::Debug)]
pub struct RequestBody {
    pub(in crate::client) content_type: ContentType,
    #[debug(ignore)]
    pub(in crate::client) data: Vec<u8>,
}

impl RequestBody {
    /// Serializes a JSON value as `application/json`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::JsonValueError`] if serialization fails.
    pub fn json(value: &serde_json::Value) -> Result<Self, ApiClientError> {
        let data = serde_json::to_vec(value)?;
        Ok(Self {
            content_type: ContentType::json(),
            data,
        })
    }

    /// Raw bytes as `application/octet-stream`.
    pub fn octet_stream(data: Vec<u8>) -> Self {
        Self {
            content_type: ContentType::octet_stream(),
            data,
        }
    }

    /// A `multipart/form-data` body with a single file part named `name`.
    pub fn multipart(name: &str, file: &FilePart) -> Self {
        let boundary = format!("----formdata-netlify-{}", uuid::Uuid::new_v4());
        let FilePart {
            file_name,
            content_type,
            data,
        } = file;

        let name = quoted_value(name);
        let file_name = quoted_value(file_name);

        let mut body_data = Vec::with_capacity(data.len() + 256);
        body_data.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body_data.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n")
                .as_bytes(),
        );
        body_data.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body_data.extend_from_slice(data);
        body_data.extend_from_slice(b"\r\n");
        body_data.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let content_type = format!("multipart/form-data; boundary={boundary}")
            .parse::<mime::Mime>()
            .map_or_else(
                |_| ContentType::from(mime::MULTIPART_FORM_DATA),
                ContentType::from,
            );

        Self {
            content_type,
            data: body_data,
        }
    }

    /// Encodes the value of the body parameter `name`.
    ///
    /// JSON parameters are sent as JSON. Binary parameters are sent as a multipart
    /// file when the value is a [`FilePart`], as raw bytes when the value is a string.
    pub(in crate::client) fn from_param(
        name: &str,
        binary: bool,
        value: ParamValue,
    ) -> Result<Self, ApiClientError> {
        match (binary, value) {
            (_, ParamValue::File(file)) => Ok(Self::multipart(name, &file)),
            (true, ParamValue::Json(serde_json::Value::String(text))) => {
                Ok(Self::octet_stream(text.into_bytes()))
            }
            (_, ParamValue::Json(value)) => Self::json(&value),
        }
    }

    /// The content type of the body.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// The encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Content of a quoted header parameter: `"` and `\` are escaped, CR and LF are dropped.
fn quoted_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for ch in value.chars().filter(|ch| !matches!(ch, '\r' | '\n')) {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_encode_json_body() {
        let body = RequestBody::json(&json!({"name": "my-site"})).expect("valid JSON");

        assert_eq!(body.content_type, ContentType::json());
        insta::assert_snapshot!(String::from_utf8_lossy(&body.data), @r#"{"name":"my-site"}"#);
    }

    #[test]
    fn should_encode_multipart_file() {
        let file = FilePart::new("site.zip", b"PK..".to_vec())
            .with_content_type("application/zip".parse().expect("valid mime"));

        let body = RequestBody::multipart("zip", &file);

        let content_type = body.content_type.to_string();
        assert!(content_type.starts_with("multipart/form-data; boundary=----formdata-netlify-"));
        let text = String::from_utf8_lossy(&body.data);
        assert!(text.contains("Content-Disposition: form-data; name=\"zip\"; filename=\"site.zip\""));
        assert!(text.contains("Content-Type: application/zip\r\n\r\nPK..\r\n"));
        assert!(text.trim_end().ends_with("--"));
    }

    #[test]
    fn should_escape_content_disposition_parameters() {
        let file = FilePart::new("evil\".zip\r\nX-Injected: yes", b"data".to_vec());

        let body = RequestBody::multipart("file\r\nbody", &file);

        let text = String::from_utf8_lossy(&body.data);
        let disposition = text
            .lines()
            .find(|line| line.starts_with("Content-Disposition"))
            .expect("a disposition line");
        insta::assert_snapshot!(
            disposition,
            @r#"Content-Disposition: form-data; name="filebody"; filename="evil\".zipX-Injected: yes""#
        );
        assert!(!text.lines().any(|line| line.starts_with("X-Injected")));
    }

    #[test]
    fn should_pick_encoding_from_declaration() {
        let json_body =
            RequestBody::from_param("site", false, ParamValue::from("text")).expect("encodable");
        assert_eq!(json_body.content_type, ContentType::json());
        assert_eq!(json_body.data, br#""text""#);

        let raw_body =
            RequestBody::from_param("file_body", true, ParamValue::from("raw content"))
                .expect("encodable");
        assert_eq!(raw_body.content_type, ContentType::octet_stream());
        assert_eq!(raw_body.data, b"raw content");

        let file_body = RequestBody::from_param(
            "file_body",
            true,
            ParamValue::File(FilePart::new("a.txt", b"abc".to_vec())),
        )
        .expect("encodable");
        assert!(file_body.content_type.to_string().starts_with("multipart/form-data"));
    }
}
