//! Error handler for dirauth.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConnectorError>;

/// LDAP result code for a rejected simple bind.
pub const INVALID_CREDENTIALS_CODE: u32 = 49;

/// Enum representing every way a directory operation can end without a value.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// No URI configured. The feature is off, this is not a failure.
    #[error("directory authentication is disabled")]
    Disabled,

    #[error("invalid credentials to bind to LDAP as {principal}")]
    InvalidCredentials { principal: String },

    #[error("directory error: {0}")]
    Directory(String),

    #[error("organizational units are not configured")]
    NotConfigured,

    #[error("no directory entry matches `{filter}`")]
    EntryNotFound { filter: String },

    #[error("invalid directory URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("unsupported directory URI scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("configuration file is malformed: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl From<ldap3::LdapError> for ConnectorError {
    /// Every ldap3 failure is a directory error. Rejected binds are told
    /// apart where the bound DN is known.
    fn from(err: ldap3::LdapError) -> Self {
        Self::Directory(err.to_string())
    }
}

impl ConnectorError {
    /// Whether the host must answer with a plain authentication failure.
    ///
    /// Unreachable directory, unknown entry and wrong password all collapse
    /// into this so the caller cannot tell which one happened.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Disabled
                | Self::InvalidCredentials { .. }
                | Self::Directory(_)
                | Self::EntryNotFound { .. }
        )
    }
}
