//! Modification lists for modify requests.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::attribute::AttributeValue;
use crate::error::{DirectoryError, Result};

/// How a modification item changes its attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModificationKind {
    Add,
    Delete,
    Replace,
}

impl FromStr for ModificationKind {
    type Err = DirectoryError;

    /// Parse the case-sensitive names `ADD`, `DELETE` and `REPLACE`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADD" => Ok(ModificationKind::Add),
            "DELETE" => Ok(ModificationKind::Delete),
            "REPLACE" => Ok(ModificationKind::Replace),
            _ => Err(DirectoryError::config(format!(
                "{s} is not a valid modification type"
            ))),
        }
    }
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModificationKind::Add => write!(f, "ADD"),
            ModificationKind::Delete => write!(f, "DELETE"),
            ModificationKind::Replace => write!(f, "REPLACE"),
        }
    }
}

/// One single-attribute unit of a modify request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
    pub kind: ModificationKind,
    pub attribute: AttributeValue,
}

impl From<Modification> for ldap3::Mod<Vec<u8>> {
    fn from(modification: Modification) -> Self {
        let (name, values) = modification.attribute.into_parts();
        let values = values.into_iter().collect();

        match modification.kind {
            ModificationKind::Add => ldap3::Mod::Add(name.into_bytes(), values),
            ModificationKind::Delete => ldap3::Mod::Delete(name.into_bytes(), values),
            ModificationKind::Replace => ldap3::Mod::Replace(name.into_bytes(), values),
        }
    }
}

/// Ordered, flattened list of [`Modification`] items.
///
/// Items keep the order they were given in, the server applies them in
/// sequence within a single request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModificationSpec {
    items: Vec<Modification>,
}

impl ModificationSpec {
    /// Apply `kind` to every attribute of the map.
    pub fn from_uniform_map(kind: ModificationKind, attributes: &Map<String, Value>) -> Self {
        let mut spec = Self::default();
        spec.push_all(kind, attributes);
        spec
    }

    /// Build from `(kind, attributes)` pairs.
    pub fn from_typed_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ModificationKind, &'a Map<String, Value>)>,
    {
        let mut spec = Self::default();
        for (kind, attributes) in pairs {
            spec.push_all(kind, attributes);
        }
        spec
    }

    /// Build from loosely-typed pairs `[kind, {attribute: value, ...}]`.
    ///
    /// `kind` must be one of `ADD`, `DELETE` or `REPLACE`.
    pub fn from_pairs(pairs: &[Value]) -> Result<Self> {
        let mut spec = Self::default();

        for pair in pairs {
            let [kind, attributes] = pair.as_array().map(Vec::as_slice).unwrap_or_default() else {
                return Err(DirectoryError::config(
                    "modifications must be a list of pairs",
                ));
            };

            let kind = match kind {
                Value::String(name) => name.parse::<ModificationKind>()?,
                other => {
                    return Err(DirectoryError::config(format!(
                        "{other} is not a valid modification type"
                    )));
                },
            };

            let Value::Object(attributes) = attributes else {
                return Err(DirectoryError::config(
                    "second element of a modification pair must be an attribute map",
                ));
            };

            spec.push_all(kind, attributes);
        }

        Ok(spec)
    }

    fn push_all(&mut self, kind: ModificationKind, attributes: &Map<String, Value>) {
        self.items.extend(attributes.iter().map(|(name, value)| Modification {
            kind,
            attribute: AttributeValue::coerce(name.as_str(), value),
        }));
    }

    pub fn items(&self) -> &[Modification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Modification> {
        self.items
    }
}
