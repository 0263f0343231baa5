//! Configuration manager for dirauth.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConnectorError, Result};
use crate::model::{Credential, TlsPolicy};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const SCHEMES: &[&str] = &["ldap", "ldaps", "ldapi"];

/// Read-only view of the directory settings.
///
/// The host may back this with its own storage; [`DirectoryConfig`] is the
/// file-based implementation.
pub trait SettingsProvider: Send + Sync {
    /// Directory endpoint. `None` disables directory authentication.
    fn uri(&self) -> Option<&str>;

    /// Account used for searches that are not initiated by a user.
    fn service_account(&self) -> Option<Credential>;

    fn tls_policy(&self) -> TlsPolicy;

    /// Upgrade plain `ldap://` connections with StartTLS.
    fn starttls(&self) -> bool {
        false
    }

    /// Default base DN for searches.
    fn search_base(&self) -> &str;

    /// Recognized organizational unit names. `None` means membership
    /// resolution is unsupported.
    fn organizational_units(&self) -> Option<&[String]>;

    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Directory configuration, loaded once at startup.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// `ldap://host:port`, `ldaps://host:port` or `ldapi://path`.
    pub uri: Option<String>,
    /// Service account DN.
    pub auth_user: Option<String>,
    /// Service account password.
    #[serde(skip_serializing)]
    pub auth_password: Option<String>,
    /// Demand and validate the server certificate.
    pub request_tls_cert: bool,
    pub starttls: bool,
    /// DN used when a search gives no base.
    pub search_base: String,
    /// Useful for organization unit (OU).
    pub ou: Option<Vec<String>>,
    /// Seconds allowed for connect, bind and search.
    pub timeout: Option<u64>,
    #[serde(skip)]
    pub(crate) path: PathBuf,
}

impl DirectoryConfig {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing file yields the default configuration, which leaves
    /// directory authentication disabled.
    pub fn read(self) -> Result<Arc<Self>> {
        let file_path = if self.path.is_file() {
            self.path.as_path()
        } else {
            Path::new(DEFAULT_CONFIG_PATH)
        };

        match File::open(file_path) {
            Ok(file) => {
                let config: DirectoryConfig = serde_yaml::from_reader(file)?;
                Ok(Arc::new(config.normalize()?))
            },
            Err(err) => {
                tracing::error!(
                    error = %err,
                    path = %file_path.display(),
                    "directory configuration not found"
                );
                Ok(Arc::new(Self::default()))
            },
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml(document: &str) -> Result<Self> {
        let config: DirectoryConfig = serde_yaml::from_str(document)?;
        config.normalize()
    }

    /// Treat a blank URI as absent and reject non-directory schemes.
    fn normalize(mut self) -> Result<Self> {
        self.uri = match self.uri.take().map(|uri| uri.trim().to_owned()) {
            Some(uri) if !uri.is_empty() => {
                let parsed = Url::parse(&uri)?;
                if !SCHEMES.contains(&parsed.scheme()) {
                    return Err(ConnectorError::UnsupportedScheme(
                        parsed.scheme().to_owned(),
                    ));
                }
                Some(uri)
            },
            _ => None,
        };

        Ok(self)
    }
}

impl SettingsProvider for DirectoryConfig {
    fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    fn service_account(&self) -> Option<Credential> {
        self.auth_user.as_ref().map(|user| {
            Credential::new(
                user,
                self.auth_password.clone().unwrap_or_default(),
            )
        })
    }

    fn tls_policy(&self) -> TlsPolicy {
        self.request_tls_cert.into()
    }

    fn starttls(&self) -> bool {
        self.starttls
    }

    fn search_base(&self) -> &str {
        &self.search_base
    }

    fn organizational_units(&self) -> Option<&[String]> {
        self.ou.as_deref()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}
