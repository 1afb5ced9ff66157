//! Page decoding and the transport seam

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

/// One decoded search response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Total number of matches reported by the service, if present
    pub total: Option<u64>,
    /// Result records in the order received
    pub records: Vec<Value>,
}

impl Page {
    /// Create a page from records
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            total: None,
            records,
        }
    }

    /// Decode a response body
    ///
    /// A missing records field is an empty page. A records field that is not
    /// an array, or a body that is not an object, is a decode error.
    pub fn from_value(body: Value, records_path: &str, total_path: Option<&str>) -> Result<Self> {
        if !body.is_object() {
            return Err(Error::decode(format!(
                "expected a JSON object, got {}",
                json_kind(&body)
            )));
        }

        let total = total_path
            .and_then(|p| extract_simple_path(&body, p))
            .and_then(Value::as_u64);

        let records = match take_simple_path(body, records_path) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(arr)) => arr,
            Some(other) => {
                return Err(Error::decode(format!(
                    "'{records_path}' should be an array, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(Self { total, records })
    }

    /// Number of records on the page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Something that can fetch one page for a set of query parameters
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page described by `query` (search params plus limit/offset)
    async fn fetch_page(&self, query: &[(String, String)]) -> Result<Page>;
}

/// Look up a dot-separated path
pub(crate) fn extract_simple_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let mut current = value;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Move the value at a dot-separated path out of `value`
fn take_simple_path(mut value: Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    for part in path.split('.').filter(|p| !p.is_empty()) {
        value = match value {
            Value::Object(mut map) => map.remove(part)?,
            _ => return None,
        };
    }
    Some(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
