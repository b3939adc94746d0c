//! Deterministic request construction.

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::credentials::CredentialSnapshot;
use crate::error::GatewayError;
use crate::template::endpoint;
use crate::template::BuiltRequest;

/// Header carrying the CSRF token when the snapshot has one.
pub const CSRF_HEADER: &str = "csrf-token";
/// Fixed accept header value the upstream expects.
pub const ACCEPT_VALUE: &str = "application/vnd.api.normalized+json";
/// Protocol-version header name and pinned value.
pub const PROTOCOL_VERSION_HEADER: &str = "x-api-protocol-version";
pub const PROTOCOL_VERSION: &str = "2.0.0";

/// Percent-encode one component for embedding inside a structured query
/// value (e.g. a composite identifier). Every call site uses this routine;
/// there is no ad hoc escaping anywhere else in the crate.
pub fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Builds outbound requests against one upstream.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    base_url: String,
}

impl TemplateEngine {
    /// `base_url` must not end with a slash (enforced by config validation).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build the outbound request for `endpoint` with `params`, layering in
    /// whatever credential fields are present.
    ///
    /// Pure and total for supported endpoints: identical inputs produce a
    /// byte-identical [`BuiltRequest`]. Unknown endpoints fail with
    /// `UnsupportedEndpoint`, unknown parameter names with
    /// `InvalidParameter`; nothing is silently dropped or reordered.
    pub fn build(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        credentials: &CredentialSnapshot,
    ) -> Result<BuiltRequest, GatewayError> {
        let spec = endpoint::lookup(endpoint)
            .ok_or_else(|| GatewayError::UnsupportedEndpoint(endpoint.to_string()))?;

        for (name, _) in params {
            if !spec.knows_param(name) {
                return Err(GatewayError::InvalidParameter {
                    endpoint: endpoint.to_string(),
                    name: name.clone(),
                });
            }
        }

        let lookup_param = |key: &str| {
            params
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str())
        };

        // Query keys always emit in descriptor order; absent keys are omitted.
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any_query = false;
        for key in spec.query_order {
            if let Some(value) = lookup_param(key) {
                serializer.append_pair(key, value);
                any_query = true;
            }
        }
        let url = if any_query {
            format!("{}{}?{}", self.base_url, spec.path, serializer.finish())
        } else {
            format!("{}{}", self.base_url, spec.path)
        };

        let body = if spec.body_fields.is_empty() {
            None
        } else {
            let mut fields = Map::new();
            for key in spec.body_fields {
                if let Some(value) = lookup_param(key) {
                    fields.insert((*key).to_string(), Value::String(value.to_string()));
                }
            }
            Some(Value::Object(fields).to_string())
        };

        // Fixed header set and order. Absent credential fields drop their
        // header entirely rather than emitting an empty value.
        let mut headers: Vec<(&'static str, String)> = vec![
            ("accept", ACCEPT_VALUE.to_string()),
            (PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION.to_string()),
        ];
        if let Some(token) = &credentials.csrf_token {
            headers.push((CSRF_HEADER, token.clone()));
        }
        if !credentials.cookies.is_empty() {
            let cookie = credentials
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            headers.push(("cookie", cookie));
        }
        if body.is_some() {
            headers.push(("content-type", "application/json".to_string()));
        }

        Ok(BuiltRequest {
            method: spec.method.clone(),
            url,
            headers,
            body,
        })
    }
}
