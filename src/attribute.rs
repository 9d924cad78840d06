//! Attribute value marshalling.
//!
//! Turns loosely-typed values into named, possibly multi-valued,
//! directory attributes.

use serde_json::Value;

/// A named attribute with its ordered values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeValue {
    name: String,
    values: Vec<Vec<u8>>,
    collection: bool,
}

impl AttributeValue {
    /// Create a multi-valued attribute from raw values.
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            collection: true,
        }
    }

    /// Coerce `value` into an attribute named `name`.
    ///
    /// An array yields one value per element, in order. Anything else
    /// yields a single value.
    pub fn coerce(name: impl Into<String>, value: &Value) -> Self {
        let (values, collection) = match value {
            Value::Array(items) => (items.iter().map(scalar_bytes).collect(), true),
            scalar => (vec![scalar_bytes(scalar)], false),
        };

        Self {
            name: name.into(),
            values,
            collection,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    /// Whether the attribute was built from a collection, whatever its
    /// number of values.
    pub fn is_multi_valued(&self) -> bool {
        self.collection
    }

    /// Split into owned name and values.
    pub fn into_parts(self) -> (String, Vec<Vec<u8>>) {
        (self.name, self.values)
    }
}

/// Coerce every entry of an attribute map, keeping map order.
pub fn coerce_all(attributes: &serde_json::Map<String, Value>) -> Vec<AttributeValue> {
    attributes
        .iter()
        .map(|(name, value)| AttributeValue::coerce(name.as_str(), value))
        .collect()
}

/// Wire form of a single scalar. `null` is sent as an empty value and left
/// to the server to accept or reject.
fn scalar_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => Vec::new(),
        Value::Bool(true) => b"TRUE".to_vec(),
        Value::Bool(false) => b"FALSE".to_vec(),
        other => scalar_text(other).into_bytes(),
    }
}

/// Text form of a loosely-typed value: strings as-is, anything else as JSON.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
