//! Scripting-friendly facade over LDAP directories.
//!
//! Add, delete, modify, rename, compare, read, check and search entries
//! using loosely-typed parameter maps. Each call opens its own connection
//! and releases it before returning.
//!
//! ```no_run
//! use ldap_facade::Directory;
//! use serde_json::json;
//!
//! # async fn run() -> ldap_facade::error::Result<()> {
//! let ldap = Directory::new_instance_with_credentials(
//!     "ldap://localhost:389",
//!     "cn=admin,dc=example",
//!     "secret",
//! )?;
//!
//! let attrs = json!({"objectClass": ["top", "person"], "cn": "test", "sn": "t"});
//! ldap.add("cn=test,dc=example", attrs.as_object().unwrap()).await?;
//! assert!(ldap.exists("cn=test,dc=example").await?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(unused_mut)]

pub mod attribute;
pub mod config;
pub mod directory;
pub mod entry;
pub mod error;
pub mod ldap;
pub mod modification;
pub mod search;
pub mod session;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod mock;

pub use attribute::AttributeValue;
pub use config::{Bind, Configuration, Settings};
pub use directory::Directory;
pub use entry::Entry;
pub use error::{DirectoryError, Result};
pub use modification::{Modification, ModificationKind, ModificationSpec};
pub use search::{Scope, Search};
