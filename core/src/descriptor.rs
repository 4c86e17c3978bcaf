//! Caller-side description of one outbound request.
//!
//! # Design
//! A `RequestDescriptor` is plain data. `Fitting` only borrows it, so the same
//! descriptor can be sent any number of times (or from several tasks at once)
//! without being touched by the pipeline. Validation is deferred to
//! `Fitting::prepare` so descriptors can be built up incrementally.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::Method;

/// Content type used when the descriptor leaves it empty.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Everything needed to issue one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestDescriptor {
    /// Scheme and host, optionally with a path prefix. Required.
    pub base_path: String,
    /// Appended to `base_path` verbatim.
    pub suffix: String,
    /// Required.
    pub method: Option<Method>,
    /// Falls back to [`DEFAULT_CONTENT_TYPE`] when `None` or empty.
    pub content_type: Option<String>,
    /// Extra headers, in the order they were added.
    pub headers: Vec<(String, String)>,
    /// Serialized as the JSON body of POST and PUT requests.
    pub parameters: Map<String, Value>,
}

impl RequestDescriptor {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a header. An existing header with the same name (ignoring case)
    /// keeps its position and takes the new value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        upsert_header(&mut self.headers, name.into(), value.into());
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// `base_path` followed by `suffix`, no escaping or slash handling.
    pub fn target(&self) -> String {
        format!("{}{}", self.base_path, self.suffix)
    }

    /// The configured content type, or the JSON default.
    pub fn effective_content_type(&self) -> &str {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => ct,
            _ => DEFAULT_CONTENT_TYPE,
        }
    }
}

/// Insert or overwrite `name` in an ordered header list.
pub(crate) fn upsert_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        Some(entry) => entry.1 = value,
        None => headers.push((name, value)),
    }
}
