use super::ApiCall;
use crate::client::call_parameters::{CallParameters, ParamValue};

impl ApiCall {
    /// Sets a parameter for this call.
    ///
    /// A call-time value replaces a global parameter with the same name. The value is
    /// routed to the path, the query, a header or the body according to the descriptor;
    /// names the descriptor does not declare are ignored.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Sets several parameters, replacing existing values with the same names.
    pub fn with_params(mut self, params: CallParameters) -> Self {
        self.params = CallParameters::merge(&self.params, &params);
        self
    }

    /// Overrides a request header for this call.
    ///
    /// Overrides win over the default headers, the stored `Authorization` header and
    /// header parameters. Invalid names or values are reported when the call is awaited.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_overrides.insert(name.into(), value.into());
        self
    }

    /// Overrides several request headers.
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.header_overrides.extend(
            headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }
}
