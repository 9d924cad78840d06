//! Caller-visible representation of a directory entry.

use std::collections::HashMap;

use ldap3::SearchEntry;
use serde::Serialize;
use serde_json::{Map, Value};

/// Entry as returned by a search or a read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub dn: String,
    /// Textual attributes.
    pub attrs: HashMap<String, Vec<String>>,
    /// Attributes whose values are not valid UTF-8.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Default::default()
        }
    }

    /// Add a textual attribute.
    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Values of attribute `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// First value of attribute `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// JSON object with the `dn` and every attribute, sorted by name.
    ///
    /// Single-valued attributes are rendered as a plain value. Binary values
    /// are arrays of bytes.
    pub fn to_value(&self) -> Value {
        let mut attributes: Vec<(&String, Value)> = self
            .attrs
            .iter()
            .map(|(name, values)| (name, collapse(values.iter().cloned().map(Value::String))))
            .chain(self.bin_attrs.iter().map(|(name, values)| {
                (name, collapse(values.iter().map(|bytes| Value::from(bytes.as_slice()))))
            }))
            .collect();
        attributes.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut object = Map::new();
        object.insert("dn".into(), Value::String(self.dn.clone()));
        for (name, value) in attributes {
            object.insert(name.clone(), value);
        }

        Value::Object(object)
    }
}

fn collapse(values: impl Iterator<Item = Value>) -> Value {
    let mut values: Vec<Value> = values.collect();
    match values.len() {
        1 => values.remove(0),
        _ => Value::Array(values),
    }
}

impl From<SearchEntry> for Entry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}
