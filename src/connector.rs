//! Directory connector: connection acquisition, searches and membership
//! resolution.
//!
//! Every public operation opens its own connection and releases it before
//! returning. Nothing is cached between calls.

use std::sync::Arc;

use crate::config::SettingsProvider;
use crate::error::{ConnectorError, Result};
use crate::ldap::{
    ConnectOptions, DirectoryClient, DirectorySession, Ldap3Client,
    common_name, leading_component,
};
use crate::model::{Credential, Scope, SearchResult, TlsPolicy};
use crate::telemetry::{self, LogSink};

/// Multi-valued attribute listing the groups of an entry.
pub const MEMBER_OF: &str = "memberOf";

/// An open directory connection, bound or anonymous.
///
/// Good for one search; both [`Connection::search`] and
/// [`Connection::unbind`] consume it.
pub struct Connection {
    session: Box<dyn DirectorySession>,
    principal: Option<String>,
    log: Arc<dyn LogSink>,
}

impl Connection {
    /// DN the connection is bound as, `None` when anonymous.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.principal.is_some()
    }

    /// Run one search then unbind, whatever the search outcome.
    ///
    /// Only the first matching entry is kept.
    pub async fn search(
        mut self,
        base: &str,
        scope: Scope,
        filter: &str,
    ) -> Result<Option<SearchResult>> {
        let outcome = self.session.search(base, scope, filter).await;
        self.release().await;

        match outcome {
            Ok(entries) => {
                telemetry::record_search(if entries.is_empty() {
                    "empty"
                } else {
                    "found"
                });

                if entries.len() > 1 {
                    self.log.debug(&format!(
                        "Search `{filter}` matched {} entries, keeping the first",
                        entries.len()
                    ));
                }

                Ok(entries.into_iter().next())
            },
            Err(err) => {
                telemetry::record_search("error");
                self.log.error(&format!("LDAP search failed: {err}"));
                Err(err)
            },
        }
    }

    /// Release the connection without searching.
    pub async fn unbind(mut self) {
        self.release().await;
    }

    async fn release(&mut self) {
        if let Err(err) = self.session.unbind().await {
            self.log.debug(&format!("LDAP unbind failed: {err}"));
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// Authenticates users and resolves their organizational units.
#[derive(Clone)]
pub struct DirectoryConnector {
    settings: Arc<dyn SettingsProvider>,
    log: Arc<dyn LogSink>,
    client: Arc<dyn DirectoryClient>,
}

impl DirectoryConnector {
    /// Create a new [`DirectoryConnector`] speaking LDAP through [`ldap3`].
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self::with_client(settings, log, Arc::new(Ldap3Client::new()))
    }

    /// Create a new [`DirectoryConnector`] on a custom transport.
    pub fn with_client(
        settings: Arc<dyn SettingsProvider>,
        log: Arc<dyn LogSink>,
        client: Arc<dyn DirectoryClient>,
    ) -> Self {
        Self {
            settings,
            log,
            client,
        }
    }

    /// Open a connection bound as `credential`, or as the service account
    /// when `None`.
    ///
    /// Without a principal on either side the connection stays anonymous.
    pub async fn get_connection(
        &self,
        credential: Option<Credential>,
    ) -> Result<Connection> {
        let Some(uri) = self.settings.uri().filter(|uri| !uri.trim().is_empty())
        else {
            self.log.debug("No LDAP URI");
            return Err(ConnectorError::Disabled);
        };

        // A blank DN would make the server bind anonymously.
        let credential = credential
            .filter(Credential::has_principal)
            .or_else(|| self.settings.service_account())
            .filter(Credential::has_principal)
            .unwrap_or_else(Credential::anonymous);

        let options = ConnectOptions {
            tls: self.settings.tls_policy(),
            starttls: self.settings.starttls(),
            timeout: self.settings.timeout(),
        };

        self.log
            .debug(&format!("Initializing LDAP connection to {uri}"));
        match options.tls {
            TlsPolicy::RequireCert => {
                self.log.debug("Requesting TLS certificate")
            },
            TlsPolicy::NoVerify => self
                .log
                .debug("TLS certificate validation is disabled"),
        }

        let mut session = self
            .client
            .open(uri, &options)
            .await
            .map_err(|err| self.report(err))?;

        let Some(principal) = credential.principal() else {
            return Ok(Connection {
                session,
                principal: None,
                log: Arc::clone(&self.log),
            });
        };

        self.log.debug(&format!("Binding to LDAP as {principal}"));
        if let Err(err) = session.bind(principal, credential.secret()).await {
            telemetry::record_bind("failure");
            if let Err(unbind) = session.unbind().await {
                self.log.debug(&format!("LDAP unbind failed: {unbind}"));
            }

            return Err(self.report(err));
        }

        telemetry::record_bind("success");
        Ok(Connection {
            session,
            principal: Some(principal.to_owned()),
            log: Arc::clone(&self.log),
        })
    }

    /// Search under the service account and keep the first entry.
    ///
    /// An empty or missing `base` falls back to the configured search base.
    pub async fn search(
        &self,
        filter: &str,
        base: Option<&str>,
        scope: Scope,
    ) -> Result<Option<SearchResult>> {
        let base = match base {
            Some(base) if !base.is_empty() => base,
            _ => self.settings.search_base(),
        };

        let connection = self.get_connection(None).await?;
        connection.search(base, scope, filter).await
    }

    /// Check a user's password by binding as them.
    pub async fn authenticate(&self, principal: &str, secret: &str) -> Result<()> {
        // An empty DN or password turns a simple bind into an unauthenticated
        // one, which servers accept.
        if principal.trim().is_empty() || secret.is_empty() {
            return Err(self.report(ConnectorError::InvalidCredentials {
                principal: principal.to_owned(),
            }));
        }

        let connection = self
            .get_connection(Some(Credential::new(principal, secret)))
            .await?;
        connection.unbind().await;
        Ok(())
    }

    /// Common names of the groups `dn` is a member of, in directory order.
    ///
    /// Values of `memberOf` that do not start with a `CN=` component or are
    /// not UTF-8 are skipped.
    pub async fn resolve_memberships(&self, dn: &str) -> Result<Vec<String>> {
        if self.settings.organizational_units().is_none() {
            self.log.debug("No organizational units configured");
            return Err(ConnectorError::NotConfigured);
        }

        let filter = leading_component(dn);
        let Some(entry) = self.search(filter, None, Scope::Subtree).await?
        else {
            self.log
                .error(&format!("No LDAP entry found for {filter}"));
            return Err(ConnectorError::EntryNotFound {
                filter: filter.to_owned(),
            });
        };

        let memberships = entry
            .values(MEMBER_OF)
            .iter()
            .filter_map(|value| {
                let name = std::str::from_utf8(value)
                    .ok()
                    .and_then(common_name)
                    .map(str::to_owned);
                if name.is_none() {
                    self.log.debug(&format!(
                        "Skipping malformed {MEMBER_OF} value on {}",
                        entry.dn
                    ));
                }
                name
            })
            .collect();

        Ok(memberships)
    }

    /// Keep the memberships naming a configured organizational unit.
    pub fn filter_memberships(&self, memberships: &[String]) -> Vec<String> {
        let Some(units) = self.settings.organizational_units() else {
            return Vec::new();
        };

        memberships
            .iter()
            .filter(|name| units.iter().any(|unit| unit.eq_ignore_ascii_case(name)))
            .cloned()
            .collect()
    }

    fn report(&self, err: ConnectorError) -> ConnectorError {
        self.log.error(&err.to_string());
        err
    }
}
