//! Configuration manager for directory connections.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DirectoryError, Result};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
/// Anonymous connection to a local server.
pub const DEFAULT_URL: &str = "ldap://localhost:389/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a connection authenticates.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Bind {
    #[default]
    Anonymous,
    /// Simple bind with a DN and its password.
    Simple { user: String, password: String },
}

impl std::fmt::Debug for Bind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bind::Anonymous => write!(f, "Anonymous"),
            Bind::Simple { user, .. } => f
                .debug_struct("Simple")
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Everything needed to open one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Server URL, validated by the constructors.
    pub url: String,
    pub bind: Bind,
    /// Connection establishment timeout.
    pub timeout: Duration,
    pub starttls: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            bind: Bind::Anonymous,
            timeout: DEFAULT_TIMEOUT,
            starttls: false,
        }
    }
}

impl Settings {
    /// Anonymous connection to `url`.
    pub fn anonymous(url: &str) -> Result<Self> {
        Ok(Self {
            url: parse_url(url)?,
            ..Default::default()
        })
    }

    /// Connection to `url` bound as `user`.
    pub fn simple(url: &str, user: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: parse_url(url)?,
            bind: Bind::Simple {
                user: user.into(),
                password: password.into(),
            },
            ..Default::default()
        })
    }

    pub fn is_anonymous(&self) -> bool {
        self.bind == Bind::Anonymous
    }
}

/// Validate and normalise a directory URL. Only `ldap`, `ldaps` and `ldapi`
/// are accepted.
fn parse_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|err| DirectoryError::config(format!("invalid URL {url}: {err}")))?;

    match parsed.scheme() {
        "ldap" | "ldaps" | "ldapi" => Ok(parsed.into()),
        scheme => Err(DirectoryError::config(format!(
            "unsupported URL scheme: {scheme}"
        ))),
    }
}

/// Structure of the `config.yaml` file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Related to the directory server.
    #[serde(default)]
    pub directory: Directory,
    #[serde(skip)]
    path: PathBuf,
}

/// Directory server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    /// URL of the server, e.g. `ldap://localhost:389`.
    pub address: String,
    /// DN to bind as. Anonymous when missing.
    pub user: Option<String>,
    /// Password of `user`.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Connection timeout, in seconds.
    pub timeout: Option<u64>,
    #[serde(default)]
    pub starttls: bool,
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            address: DEFAULT_URL.to_owned(),
            user: None,
            password: None,
            timeout: None,
            starttls: false,
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing file yields the default configuration.
    pub fn read(self) -> Result<Self> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration = serde_yaml::from_reader(file)?;
                config.path = file_path.clone();
                Ok(config)
            },
            Err(err) => {
                tracing::error!(error = %err, path = %file_path.display(), "configuration file not found");
                Ok(Self {
                    path: file_path.clone(),
                    ..Default::default()
                })
            },
        }
    }

    /// Connection settings described by the `directory` section.
    pub fn settings(&self) -> Result<Settings> {
        let cfg = &self.directory;

        let mut settings = match (&cfg.user, &cfg.password) {
            (None, None) => Settings::anonymous(&cfg.address)?,
            (Some(user), Some(password)) => Settings::simple(&cfg.address, user, password)?,
            _ => {
                return Err(DirectoryError::config(
                    "`user` and `password` must be set together",
                ));
            },
        };

        if let Some(timeout) = cfg.timeout {
            settings.timeout = Duration::from_secs(timeout);
        }
        settings.starttls = cfg.starttls;

        Ok(settings)
    }
}
