//! Values exchanged with the directory.

use std::collections::HashMap;
use std::fmt;

/// A bind identity. No principal means an anonymous connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    principal: Option<String>,
    secret: String,
}

impl Credential {
    /// Create a new [`Credential`] binding as `principal`.
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            secret: secret.into(),
        }
    }

    /// Credential for an unbound connection.
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            secret: String::default(),
        }
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Whether the credential names someone to bind as.
    ///
    /// A blank DN is a request for an anonymous bind, so it does not count.
    pub fn has_principal(&self) -> bool {
        self.principal
            .as_deref()
            .is_some_and(|principal| !principal.trim().is_empty())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("principal", &self.principal)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// How the server certificate is checked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Demand a certificate and validate it.
    RequireCert,
    /// Skip certificate validation entirely.
    #[default]
    NoVerify,
}

impl TlsPolicy {
    pub fn verifies_certificate(&self) -> bool {
        matches!(self, Self::RequireCert)
    }
}

impl From<bool> for TlsPolicy {
    fn from(request_cert: bool) -> Self {
        if request_cert {
            Self::RequireCert
        } else {
            Self::NoVerify
        }
    }
}

/// Search depth below the base DN.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

/// First entry returned by a search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub dn: String,
    /// Attribute values as sent by the server, in server order.
    pub attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl SearchResult {
    /// Values of `attribute`, looked up case-insensitively.
    pub fn values(&self, attribute: &str) -> &[Vec<u8>] {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// First value of `attribute` decoded as UTF-8.
    pub fn first_str(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .first()
            .and_then(|value| std::str::from_utf8(value).ok())
    }
}
