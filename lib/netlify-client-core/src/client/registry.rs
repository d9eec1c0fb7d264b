//! Operation descriptors and the registry that holds them.
//!
//! A descriptor is the static description of one endpoint: its `operationId`, HTTP verb,
//! path template and declared parameters. Descriptors are loaded once, either built in
//! code, from a plain JSON list, or from the `paths` object of an OpenAPI/Swagger document.

use std::collections::HashSet;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::ApiClientError;
use super::path::placeholders;

/// Operation id of the ticket creation endpoint.
pub const CREATE_TICKET: &str = "createTicket";
/// Operation id of the ticket status endpoint.
pub const SHOW_TICKET: &str = "showTicket";
/// Operation id of the ticket-for-token exchange endpoint.
pub const EXCHANGE_TICKET: &str = "exchangeTicket";

const HTTP_METHODS: [&str; 8] = [
    "get", "post", "put", "patch", "delete", "head", "options", "trace",
];

/// Where a parameter goes in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    /// Substituted into a `{name}` placeholder of the path.
    Path,
    /// Appended to the query string.
    Query,
    /// Sent as a request header.
    Header,
    /// Sent as the request body.
    Body,
}

impl ParameterLocation {
    fn parse(location: &str) -> Option<Self> {
        match location {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "body" | "formData" => Some(Self::Body),
            _ => None,
        }
    }
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// The parameter name as declared.
    pub name: String,
    /// Where the parameter is sent.
    pub location: ParameterLocation,
    /// Whether the call fails without it.
    pub required: bool,
    /// For body parameters: the payload is a file, not JSON.
    pub binary: bool,
}

impl ParameterDescriptor {
    fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            binary: false,
        }
    }

    /// A path parameter; path parameters are always required.
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Path).required()
    }

    /// An optional query parameter.
    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Query)
    }

    /// An optional header parameter.
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Header)
    }

    /// An optional JSON body parameter.
    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Body)
    }

    /// Marks the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks a body parameter as binary (file upload).
    #[must_use]
    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }
}

/// Static description of one callable endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// Unique operation id, e.g. `showTicket`.
    pub operation_id: String,
    /// HTTP method.
    pub verb: Method,
    /// Path template with `{name}` placeholders, relative to the base URL.
    pub path: String,
    /// Declared parameters, in declaration order.
    pub parameters: Vec<ParameterDescriptor>,
}

impl OperationDescriptor {
    /// Creates a descriptor without parameters.
    pub fn new(operation_id: impl Into<String>, verb: Method, path: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            verb,
            path: path.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a declared parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declared parameters at the given location, in declaration order.
    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(move |param| param.location == location)
    }

    /// Checks the descriptor is usable.
    ///
    /// Each parameter has one location, at most one body parameter exists,
    /// and every placeholder of the path is declared as a path parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::InvalidDescriptor`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ApiClientError> {
        let invalid = |message: String| ApiClientError::InvalidDescriptor {
            operation_id: self.operation_id.clone(),
            message,
        };

        if self.operation_id.is_empty() {
            return Err(invalid("empty operation id".to_string()));
        }

        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(invalid(format!(
                    "parameter '{}' is declared more than once",
                    param.name
                )));
            }
        }

        if self.parameters_in(ParameterLocation::Body).count() > 1 {
            return Err(invalid("more than one body parameter".to_string()));
        }

        for name in placeholders(&self.path) {
            let declared = self
                .parameters_in(ParameterLocation::Path)
                .any(|param| param.name == name);
            if !declared {
                return Err(invalid(format!(
                    "placeholder '{{{name}}}' has no path parameter"
                )));
            }
        }

        Ok(())
    }
}

/// Immutable set of operation descriptors indexed by operation id.
///
/// Ids are unique: building a registry with a duplicated id fails.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: IndexMap<String, Arc<OperationDescriptor>>,
}

impl OperationRegistry {
    /// Builds a registry from descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::DuplicateOperation`] for a repeated id and
    /// [`ApiClientError::InvalidDescriptor`] for an unusable descriptor.
    pub fn new(
        descriptors: impl IntoIterator<Item = OperationDescriptor>,
    ) -> Result<Self, ApiClientError> {
        let mut operations = IndexMap::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            let id = descriptor.operation_id.clone();
            if operations.contains_key(&id) {
                return Err(ApiClientError::DuplicateOperation { id });
            }
            operations.insert(id, Arc::new(descriptor));
        }

        Ok(Self { operations })
    }

    /// The three ticket operations used by the authorization handshake.
    pub fn ticket_operations() -> Self {
        let descriptors = [
            OperationDescriptor::new(CREATE_TICKET, Method::POST, "/oauth/tickets")
                .with_parameter(ParameterDescriptor::query("client_id").required()),
            OperationDescriptor::new(SHOW_TICKET, Method::GET, "/oauth/tickets/{ticket_id}")
                .with_parameter(ParameterDescriptor::path("ticket_id")),
            OperationDescriptor::new(
                EXCHANGE_TICKET,
                Method::POST,
                "/oauth/tickets/{ticket_id}/exchange",
            )
            .with_parameter(ParameterDescriptor::path("ticket_id")),
        ];

        let operations = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.operation_id.clone(), Arc::new(descriptor)))
            .collect();
        Self { operations }
    }

    /// Parses descriptors from JSON.
    ///
    /// Accepts either a list of descriptors or an OpenAPI/Swagger document with a `paths` object.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a descriptor is invalid.
    pub fn from_json(json: &str) -> Result<Self, ApiClientError> {
        let value = serde_json::from_str::<Value>(json)?;
        Self::from_value(&value)
    }

    /// Same as [`OperationRegistry::from_json`] for an already parsed value.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor is malformed or invalid.
    pub fn from_value(value: &Value) -> Result<Self, ApiClientError> {
        let descriptors = if value.is_array() {
            let raws = Vec::<RawOperation>::deserialize(value)?;
            raws.into_iter()
                .map(RawOperation::into_descriptor)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            extract_operations(value)?
        };

        Self::new(descriptors)
    }

    /// Adds descriptors from another registry.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::DuplicateOperation`] if an id exists in both registries.
    pub fn merge(mut self, other: Self) -> Result<Self, ApiClientError> {
        for (id, descriptor) in other.operations {
            if self.operations.contains_key(&id) {
                return Err(ApiClientError::DuplicateOperation { id });
            }
            self.operations.insert(id, descriptor);
        }
        Ok(self)
    }

    /// Looks up a descriptor by operation id.
    pub fn get(&self, operation_id: &str) -> Option<&Arc<OperationDescriptor>> {
        self.operations.get(operation_id)
    }

    /// Returns `true` if an operation with this id exists.
    pub fn contains(&self, operation_id: &str) -> bool {
        self.operations.contains_key(operation_id)
    }

    /// Iterates over descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values().map(|descriptor| &**descriptor)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperation {
    operation_id: String,
    #[serde(alias = "method")]
    verb: String,
    path: String,
    #[serde(default)]
    parameters: Vec<RawParameter>,
}

impl RawOperation {
    fn into_descriptor(self) -> Result<OperationDescriptor, ApiClientError> {
        let verb = parse_verb(&self.operation_id, &self.verb)?;
        let parameters = self
            .parameters
            .into_iter()
            .map(|raw| raw.into_descriptor(&self.operation_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OperationDescriptor {
            operation_id: self.operation_id,
            verb,
            path: self.path,
            parameters,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "in")]
    location: String,
    #[serde(default)]
    required: bool,
    #[serde(rename = "type")]
    kind: Option<String>,
    format: Option<String>,
    schema: Option<Value>,
}

impl RawParameter {
    fn is_binary(&self) -> bool {
        let schema_format = self
            .schema
            .as_ref()
            .and_then(|schema| schema.get("format"))
            .and_then(Value::as_str);
        self.kind.as_deref() == Some("file")
            || self.format.as_deref() == Some("binary")
            || schema_format == Some("binary")
    }

    fn into_descriptor(self, operation_id: &str) -> Result<ParameterDescriptor, ApiClientError> {
        let location = ParameterLocation::parse(&self.location).ok_or_else(|| {
            ApiClientError::InvalidDescriptor {
                operation_id: operation_id.to_string(),
                message: format!(
                    "parameter '{}' has unsupported location '{}'",
                    self.name, self.location
                ),
            }
        })?;
        let binary = self.is_binary() || self.location == "formData";

        Ok(ParameterDescriptor {
            name: self.name,
            // path parameters are always required
            required: self.required || location == ParameterLocation::Path,
            location,
            binary,
        })
    }
}

fn parse_verb(operation_id: &str, verb: &str) -> Result<Method, ApiClientError> {
    Method::from_bytes(verb.to_uppercase().as_bytes()).map_err(|err| {
        ApiClientError::InvalidDescriptor {
            operation_id: operation_id.to_string(),
            message: format!("invalid verb '{verb}': {err}"),
        }
    })
}

/// Extracts descriptors from the `paths` object of an OpenAPI or Swagger document.
///
/// Path-level parameters are merged with operation-level ones (operation wins).
/// An OpenAPI 3 `requestBody` becomes a body parameter named `body`.
/// Operations without `operationId` are skipped.
fn extract_operations(document: &Value) -> Result<Vec<OperationDescriptor>, ApiClientError> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return Err(ApiClientError::InvalidDescriptor {
            operation_id: String::new(),
            message: "expected a list of operations or a document with 'paths'".to_string(),
        });
    };

    let mut descriptors = Vec::new();
    for (path, path_item) in paths {
        let path_level = path_item.get("parameters");

        for method in HTTP_METHODS {
            let Some(operation) = path_item.get(method) else {
                continue;
            };
            let Some(operation_id) = operation.get("operationId").and_then(Value::as_str) else {
                debug!(%path, %method, "skip operation without operationId");
                continue;
            };

            let verb = parse_verb(operation_id, method)?;
            let mut descriptor = OperationDescriptor::new(operation_id, verb, path.as_str());
            for raw in collect_params(path_level, operation.get("parameters"))? {
                descriptor = descriptor.with_parameter(raw.into_descriptor(operation_id)?);
            }
            if let Some(body) = request_body_parameter(operation) {
                descriptor = descriptor.with_parameter(body);
            }
            descriptors.push(descriptor);
        }
    }

    Ok(descriptors)
}

fn collect_params(
    path_level: Option<&Value>,
    operation_level: Option<&Value>,
) -> Result<Vec<RawParameter>, ApiClientError> {
    let mut params = IndexMap::<(String, String), RawParameter>::new();
    for source in [path_level, operation_level].into_iter().flatten() {
        let raws = Vec::<RawParameter>::deserialize(source)?;
        for raw in raws {
            params.insert((raw.name.clone(), raw.location.clone()), raw);
        }
    }

    Ok(params.into_values().collect())
}

fn request_body_parameter(operation: &Value) -> Option<ParameterDescriptor> {
    let request_body = operation.get("requestBody")?;
    let required = request_body
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let binary = request_body
        .get("content")
        .and_then(Value::as_object)
        .is_some_and(|content| {
            content.iter().any(|(media_type, media)| {
                media_type == "application/octet-stream"
                    || media.pointer("/schema/format").and_then(Value::as_str) == Some("binary")
            })
        });

    let mut body = ParameterDescriptor::body("body");
    body.required = required;
    body.binary = binary;
    Some(body)
}
