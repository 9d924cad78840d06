//! Search request description.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::attribute::scalar_text;
use crate::error::{DirectoryError, Result};

/// Filter matching every entry.
pub const DEFAULT_FILTER: &str = "(objectClass=*)";

/// Attribute selector asking the server for no attribute at all.
pub const NO_ATTRIBUTES: &str = "1.1";

/// Search breadth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Only the base entry itself.
    Base,
    /// Immediate children of the base entry.
    One,
    /// The whole subtree, base included.
    #[default]
    Sub,
}

impl FromStr for Scope {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BASE" => Ok(Scope::Base),
            "ONE" => Ok(Scope::One),
            "SUB" => Ok(Scope::Sub),
            _ => Err(DirectoryError::config(format!("unknown search scope: {s}"))),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scope::Base => write!(f, "BASE"),
            Scope::One => write!(f, "ONE"),
            Scope::Sub => write!(f, "SUB"),
        }
    }
}

impl From<Scope> for ldap3::Scope {
    fn from(val: Scope) -> Self {
        match val {
            Scope::Base => ldap3::Scope::Base,
            Scope::One => ldap3::Scope::OneLevel,
            Scope::Sub => ldap3::Scope::Subtree,
        }
    }
}

/// All parameters of one search, filled with defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Search {
    base: String,
    scope: Scope,
    filter: String,
    filter_args: Option<Vec<Value>>,
    attrs: Option<Vec<String>>,
}

impl Default for Search {
    fn default() -> Self {
        Self {
            base: String::default(),
            scope: Scope::default(),
            filter: DEFAULT_FILTER.to_owned(),
            filter_args: None,
            attrs: None,
        }
    }
}

impl Search {
    /// Build a [`Search`] from a parameter map.
    ///
    /// Keys are matched case-insensitively against `base`, `filter`,
    /// `scope` and `filterArgs`. Any other key is rejected.
    pub fn from_map(params: &Map<String, Value>) -> Result<Self> {
        let mut search = Self::default();

        for (key, value) in params {
            match key.to_ascii_lowercase().as_str() {
                "base" => search.base = scalar_text(value),
                "filter" => search.filter = scalar_text(value),
                "scope" => search.scope = scalar_text(value).parse()?,
                "filterargs" => {
                    search.filter_args = Some(match value {
                        Value::Array(items) => items.clone(),
                        single => vec![single.clone()],
                    })
                },
                _ => {
                    return Err(DirectoryError::config(format!(
                        "unknown search parameter: {key}"
                    )));
                },
            }
        }

        Ok(search)
    }

    /// Search `base` with `filter` on `scope`, every other field defaulted.
    pub fn filter_in(
        filter: impl Into<String>,
        base: impl Into<String>,
        scope: Scope,
    ) -> Self {
        Self::default().with_filter(filter).with_base(base).with_scope(scope)
    }

    /// Base-scoped probe on `dn` asking for no attribute.
    pub(crate) fn probe(dn: &str) -> Self {
        Self::default()
            .with_base(dn)
            .with_scope(Scope::Base)
            .with_attrs(Vec::<String>::new())
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set values bound to the `{0}`, `{1}`... placeholders of the filter.
    pub fn with_filter_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.filter_args = Some(args.into_iter().collect());
        self
    }

    /// Restrict returned attributes. An empty list returns none.
    pub fn with_attrs<S: Into<String>>(mut self, attrs: impl IntoIterator<Item = S>) -> Self {
        self.attrs = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn filter_args(&self) -> Option<&[Value]> {
        self.filter_args.as_deref()
    }

    pub fn attrs(&self) -> Option<&[String]> {
        self.attrs.as_deref()
    }

    /// Attribute selectors as sent on the wire.
    pub fn requested_attrs(&self) -> Vec<String> {
        match &self.attrs {
            None => vec!["*".to_owned()],
            Some(attrs) if attrs.is_empty() => vec![NO_ATTRIBUTES.to_owned()],
            Some(attrs) => attrs.clone(),
        }
    }

    /// Filter with every `{n}` placeholder replaced by the escaped n-th
    /// filter argument.
    ///
    /// Without filter arguments the filter is returned unchanged.
    pub fn bound_filter(&self) -> Result<String> {
        let Some(args) = &self.filter_args else {
            return Ok(self.filter.clone());
        };

        let mut out = String::with_capacity(self.filter.len());
        let mut rest = self.filter.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            let index = after
                .find('}')
                .map(|end| &after[..end])
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));

            match index {
                Some(digits) => {
                    let arg = digits
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| args.get(i))
                        .ok_or_else(|| {
                            DirectoryError::config(format!(
                                "no filter argument for placeholder {{{digits}}}"
                            ))
                        })?;
                    out.push_str(&escape_ldap(&scalar_text(arg)));
                    rest = &after[digits.len() + 1..];
                },
                None => {
                    out.push('{');
                    rest = after;
                },
            }
        }
        out.push_str(rest);

        Ok(out)
    }
}

impl TryFrom<&Value> for Search {
    type Error = DirectoryError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Object(params) => Self::from_map(params),
            _ => Err(DirectoryError::config("search parameters must be a map")),
        }
    }
}

/// Escape a filter assertion value (RFC 4515).
pub(crate) fn escape_ldap(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            '\\' => out.push_str(r"\5c"),
            '\0' => out.push_str(r"\00"),
            c => out.push(c),
        }
    }
    out
}
