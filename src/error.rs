//! Error handler for directory operations.

use ldap3::LdapError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// LDAP result code `noSuchObject`.
pub const NO_SUCH_OBJECT: u32 = 32;

/// Enum representing every failure a directory operation can raise.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Malformed caller input, detected before any connection is opened.
    #[error("invalid parameter: {0}")]
    Config(String),

    #[error("entry {0} does not exist")]
    NotFound(String),

    #[error("result of search is not unique, {0} entries matched")]
    Ambiguous(usize),

    /// Anything reported by the transport or the directory server.
    #[error(transparent)]
    Protocol(#[from] LdapError),

    #[error("entry callback failed: {0}")]
    Callback(Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to deserialize configuration: {0}")]
    Configuration(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DirectoryError {
    /// Create a [`DirectoryError::Config`] from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error means the target entry is absent.
    ///
    /// True for [`DirectoryError::NotFound`] and for a protocol result
    /// carrying [`NO_SUCH_OBJECT`].
    pub fn is_not_found(&self) -> bool {
        match self {
            DirectoryError::NotFound(_) => true,
            DirectoryError::Protocol(LdapError::LdapResult { result }) => {
                result.rc == NO_SUCH_OBJECT
            },
            _ => false,
        }
    }

    /// Short label used on logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DirectoryError::Config(_) => "config",
            DirectoryError::NotFound(_) => "not_found",
            DirectoryError::Ambiguous(_) => "ambiguous",
            DirectoryError::Protocol(_) => "protocol",
            DirectoryError::Callback(_) => "callback",
            DirectoryError::Configuration(_) | DirectoryError::Io(_) => {
                "configuration"
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn ldap_failure(rc: u32) -> DirectoryError {
    DirectoryError::Protocol(LdapError::LdapResult {
        result: ldap3::LdapResult {
            rc,
            matched: String::default(),
            text: String::default(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        },
    })
}
