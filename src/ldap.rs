//! LDAP support.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap as Ldap3, LdapConnAsync, LdapConnSettings, SearchEntry};

use crate::error::{ConnectorError, INVALID_CREDENTIALS_CODE, Result};
use crate::model::{Scope, SearchResult, TlsPolicy};

/// Request every user attribute.
const ALL_ATTRIBUTES: &str = "*";

/// Transport settings for one connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub tls: TlsPolicy,
    pub starttls: bool,
    /// Applies to the connect and to every later operation.
    pub timeout: Option<Duration>,
}

/// Port opening connections to a directory server.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Open an unbound session targeted at `uri`.
    async fn open(
        &self,
        uri: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn DirectorySession>>;
}

/// A single connection to the directory server.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. A rejected password is reported as
    /// [`ConnectorError::InvalidCredentials`].
    async fn bind(&mut self, principal: &str, secret: &str) -> Result<()>;

    /// Entries matching `filter`, in server order.
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
    ) -> Result<Vec<SearchResult>>;

    /// Release the connection.
    async fn unbind(&mut self) -> Result<()>;
}

/// [`DirectoryClient`] backed by [`ldap3`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Ldap3Client;

impl Ldap3Client {
    /// Create a new [`Ldap3Client`].
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryClient for Ldap3Client {
    async fn open(
        &self,
        uri: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn DirectorySession>> {
        let settings = connection_settings(options);
        let (handle, conn) = LdapConnAsync::with_settings(settings, uri).await?;
        ldap3::drive!(handle);

        tracing::trace!(%uri, tls = ?options.tls, "LDAP connection established");

        Ok(Box::new(Ldap3Session {
            conn,
            timeout: options.timeout,
        }))
    }
}

/// ldap3 settings for `options`. ldap3 only speaks protocol version 3.
fn connection_settings(options: &ConnectOptions) -> LdapConnSettings {
    let settings = LdapConnSettings::new()
        .set_no_tls_verify(skips_certificate_check(options))
        .set_starttls(options.starttls);

    match options.timeout {
        Some(timeout) => settings.set_conn_timeout(timeout),
        None => settings,
    }
}

fn skips_certificate_check(options: &ConnectOptions) -> bool {
    !options.tls.verifies_certificate()
}

struct Ldap3Session {
    conn: Ldap3,
    timeout: Option<Duration>,
}

impl Ldap3Session {
    /// Handle with the operation timeout armed for the next request.
    fn conn(&mut self) -> &mut Ldap3 {
        match self.timeout {
            Some(timeout) => self.conn.with_timeout(timeout),
            None => &mut self.conn,
        }
    }
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn bind(&mut self, principal: &str, secret: &str) -> Result<()> {
        let result = self.conn().simple_bind(principal, secret).await?;

        if result.rc == INVALID_CREDENTIALS_CODE {
            return Err(ConnectorError::InvalidCredentials {
                principal: principal.to_owned(),
            });
        }

        result.success()?;
        Ok(())
    }

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
    ) -> Result<Vec<SearchResult>> {
        let (entries, _) = self
            .conn()
            .search(base, scope.into(), filter, vec![ALL_ATTRIBUTES])
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).into())
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.conn.unbind().await?;
        Ok(())
    }
}

impl From<Scope> for ldap3::Scope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Base => ldap3::Scope::Base,
            Scope::OneLevel => ldap3::Scope::OneLevel,
            Scope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

impl From<SearchEntry> for SearchResult {
    fn from(entry: SearchEntry) -> Self {
        let mut attributes = entry.bin_attrs;
        for (name, values) in entry.attrs {
            attributes
                .entry(name)
                .or_default()
                .extend(values.into_iter().map(String::into_bytes));
        }

        Self {
            dn: entry.dn,
            attributes,
        }
    }
}

/// Text before the first comma of a distinguished name.
pub fn leading_component(dn: &str) -> &str {
    dn.split(',').next().unwrap_or_default().trim()
}

/// Common name carried by the leading component of `dn`.
///
/// `None` when the leading component is not a non-empty `CN=` value.
pub fn common_name(dn: &str) -> Option<&str> {
    let component = leading_component(dn);
    let (attribute, value) = component.split_once('=')?;

    if !attribute.trim().eq_ignore_ascii_case("cn") {
        return None;
    }

    Some(value.trim()).filter(|value| !value.is_empty())
}

/// Escape a value for use inside a search filter (RFC 4515).
pub fn escape_filter_value(input: &str) -> String {
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
