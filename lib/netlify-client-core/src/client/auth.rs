use std::fmt;

use http::HeaderValue;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ApiClientError;

/// Secure wrapper for the access token that zeroes memory on drop.
///
/// Debug output is redacted and Display output is masked, so tokens can be logged safely.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Creates a new secure string from the provided value.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Returns a reference to the inner string value.
    ///
    /// # Security Note
    /// The returned reference should not be stored for extended periods
    /// to minimize exposure time of sensitive data.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the SecureString and returns the inner String.
    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Returns `true` when the wrapped value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds the `Authorization` header value: `Bearer <token>`.
    ///
    /// The value is marked sensitive so that `http` hides it from debug output.
    pub(in crate::client) fn to_bearer_header(&self) -> Result<HeaderValue, ApiClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Keeps the first and last four characters of values longer than eight characters.
    fn mask_sensitive(value: &str) -> String {
        let count = value.chars().count();
        if count <= 8 {
            return "***".to_string();
        }
        let head = value.chars().take(4).collect::<String>();
        let tail = value.chars().skip(count - 4).collect::<String>();
        format!("{head}...{tail}")
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::mask_sensitive(&self.0))
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_redact_debug_output() {
        let token = SecureString::from("super-secret-access-token");

        insta::assert_debug_snapshot!(token, @r#"
        SecureString {
            value: "[REDACTED]",
        }
        "#);
    }

    #[test]
    fn should_mask_display_output() {
        let long = SecureString::from("abcdefghijklmnop");
        let short = SecureString::from("abc");

        assert_eq!(long.to_string(), "abcd...mnop");
        assert_eq!(short.to_string(), "***");
    }

    #[test]
    fn should_mask_multibyte_tokens_by_chars() {
        let short = SecureString::from("aéééééé");
        let long = SecureString::from("éééé-token-日本語字");

        assert_eq!(short.to_string(), "***");
        assert_eq!(long.to_string(), "éééé...日本語字");
    }

    #[test]
    fn should_build_bearer_header() {
        let token = SecureString::from("my-token");

        let value = token.to_bearer_header().expect("valid header");

        assert_eq!(value, "Bearer my-token");
        assert!(value.is_sensitive());
    }

    #[test]
    fn should_reject_token_with_newline() {
        let token = SecureString::from("bad\ntoken");

        let result = token.to_bearer_header();

        assert!(matches!(result, Err(ApiClientError::InvalidHeaderValue(_))));
    }
}
