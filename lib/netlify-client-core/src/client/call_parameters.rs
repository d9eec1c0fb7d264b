use indexmap::IndexMap;
use serde::Serialize;

use super::ApiClientError;

/// A file sent as a binary body parameter.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct FilePart {
    pub(in crate::client) file_name: String,
    pub(in crate::client) content_type: mime::Mime,
    #[debug(ignore)]
    pub(in crate::client) data: Vec<u8>,
}

impl FilePart {
    /// Creates a file part with `application/octet-stream` content type.
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: mime::APPLICATION_OCTET_STREAM,
            data: data.into(),
        }
    }

    /// Sets the content type of the part.
    #[must_use]
    pub fn with_content_type(mut self, content_type: mime::Mime) -> Self {
        self.content_type = content_type;
        self
    }
}

/// A parameter value: any JSON value, or a file for binary body parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A JSON value; strings, numbers, booleans and arrays of those are valid everywhere.
    Json(serde_json::Value),
    /// File content, only valid for binary body parameters.
    File(FilePart),
}

impl ParamValue {
    /// Serializes any value into a JSON parameter value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::JsonValueError`] when the value cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiClientError> {
        let value = serde_json::to_value(value)?;
        Ok(Self::Json(value))
    }

    /// `null` is treated as an absent value.
    pub(in crate::client) fn is_absent(&self) -> bool {
        matches!(self, Self::Json(serde_json::Value::Null))
    }

    /// Renders the value for a path segment, a query entry or a header.
    ///
    /// Arrays are joined with `,`; objects and files are rejected.
    pub(in crate::client) fn to_text(&self, name: &str) -> Result<String, ApiClientError> {
        let unsupported = |message: &str, value: serde_json::Value| {
            ApiClientError::UnsupportedParameterValue {
                name: name.to_string(),
                message: message.to_string(),
                value,
            }
        };

        match self {
            Self::Json(value) => match value {
                serde_json::Value::Array(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        let part = scalar_to_text(item).ok_or_else(|| {
                            unsupported("nested values are not supported", value.clone())
                        })?;
                        parts.push(part);
                    }
                    Ok(parts.join(","))
                }
                _ => scalar_to_text(value)
                    .ok_or_else(|| unsupported("objects are not supported", value.clone())),
            },
            Self::File(file) => Err(unsupported(
                "files are only supported as binary body",
                serde_json::Value::String(file.file_name.clone()),
            )),
        }
    }
}

fn scalar_to_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Json(value.into())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Json(value.into())
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Json(value.as_str().into())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Json(value.into())
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Json(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Json(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Json(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Json(value.into())
    }
}

impl From<FilePart> for ParamValue {
    fn from(value: FilePart) -> Self {
        Self::File(value)
    }
}

/// Named parameter values for one operation call, in insertion order.
///
/// Instance-level (global) parameters and call-time parameters are combined with
/// [`CallParameters::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParameters {
    values: IndexMap<String, ParamValue>,
}

impl CallParameters {
    /// Creates an empty set of parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous value with the same name.
    #[must_use]
    pub fn add_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a parameter, replacing any previous value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Returns `true` if no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterates over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Merges global and call-time parameters.
    ///
    /// Precedence is exactly: a call-time value replaces a global value with the same
    /// name. Order is the global order followed by call-only names.
    pub fn merge(global: &Self, call: &Self) -> Self {
        let mut values = global.values.clone();
        for (name, value) in &call.values {
            values.insert(name.clone(), value.clone());
        }
        Self { values }
    }

    /// Removes and returns the value declared as `name`.
    ///
    /// The lowerCamelCase alias (`ticketId` for `ticket_id`) is accepted too; when both
    /// are present the declared name wins and the alias is dropped. `null` counts as absent.
    pub(in crate::client) fn take(&mut self, name: &str) -> Option<ParamValue> {
        let alias = camel_case_alias(name);
        let aliased = alias
            .as_deref()
            .and_then(|alias| self.values.shift_remove(alias));
        self.values
            .shift_remove(name)
            .or(aliased)
            .filter(|value| !value.is_absent())
    }

    /// Names left over after all declared parameters were taken.
    pub(in crate::client) fn remaining_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for CallParameters
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self { values }
    }
}

fn camel_case_alias(name: &str) -> Option<String> {
    use cruet::*;
    let alias = name.to_camel_case();
    (!alias.is_empty() && alias != name).then_some(alias)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_merge_call_over_global() {
        let global = CallParameters::new()
            .add_param("site_id", "global-site")
            .add_param("per_page", 100);
        let call = CallParameters::new()
            .add_param("site_id", "call-site")
            .add_param("page", 2);

        let merged = CallParameters::merge(&global, &call);

        insta::assert_debug_snapshot!(merged, @r#"
        CallParameters {
            values: {
                "site_id": Json(
                    String("call-site"),
                ),
                "per_page": Json(
                    Number(100),
                ),
                "page": Json(
                    Number(2),
                ),
            },
        }
        "#);
    }

    #[test]
    fn should_keep_global_when_call_is_empty() {
        let global = CallParameters::new().add_param("account_slug", "acme");

        let merged = CallParameters::merge(&global, &CallParameters::new());

        assert_eq!(merged, global);
    }

    #[test]
    fn should_take_declared_name_or_camel_case_alias() {
        let mut params = CallParameters::new().add_param("ticketId", "t-1");

        let value = params.take("ticket_id");

        assert_eq!(value, Some(ParamValue::Json(json!("t-1"))));
        assert!(params.is_empty());
    }

    #[test]
    fn should_prefer_declared_name_over_alias() {
        let mut params = CallParameters::new()
            .add_param("ticketId", "alias")
            .add_param("ticket_id", "declared");

        let value = params.take("ticket_id");

        assert_eq!(value, Some(ParamValue::Json(json!("declared"))));
        assert_eq!(params.remaining_names().count(), 0);
    }

    #[test]
    fn should_treat_null_as_absent() {
        let mut params = CallParameters::new().add_param("site_id", json!(null));

        assert_eq!(params.take("site_id"), None);
    }

    #[test]
    fn should_render_scalars_and_arrays() {
        let cases = [
            (json!("text"), "text"),
            (json!(42), "42"),
            (json!(true), "true"),
            (json!(["a", "b", 3]), "a,b,3"),
        ];

        for (value, expected) in cases {
            let rendered = ParamValue::Json(value).to_text("p").expect("renderable");
            assert_eq!(rendered, expected);
        }
    }

    #[test]
    fn should_reject_objects_and_files() {
        let object = ParamValue::Json(json!({"nested": true}));
        let file = ParamValue::File(FilePart::new("a.zip", vec![1, 2]));

        assert!(matches!(
            object.to_text("filter"),
            Err(ApiClientError::UnsupportedParameterValue { .. })
        ));
        assert!(matches!(
            file.to_text("zip"),
            Err(ApiClientError::UnsupportedParameterValue { .. })
        ));
    }

    #[test]
    fn should_collect_from_pairs() {
        let params: CallParameters = [("a", "1"), ("b", "2")].into_iter().collect();

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("b"), Some(&ParamValue::from("2")));
    }
}
