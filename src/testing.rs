//! Recording doubles for the directory and log ports.
//!
//! MUST NEVER be used in production.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ConnectorError, Result};
use crate::ldap::{ConnectOptions, DirectoryClient, DirectorySession};
use crate::model::{Scope, SearchResult, TlsPolicy};
use crate::telemetry::LogSink;

/// A request received by [`MockDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open { uri: String, options: ConnectOptions },
    Bind { principal: String },
    Search { base: String, scope: Scope, filter: String },
    Unbind,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    passwords: HashMap<String, String>,
    entries: Vec<SearchResult>,
    open_error: Option<String>,
    search_error: Option<String>,
    unbind_error: Option<String>,
    untrusted_certificate: bool,
}

/// In-memory directory recording every call.
///
/// Binds succeed unless the principal was registered with
/// [`MockDirectory::accept`] under another secret.
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<State>>,
}

impl MockDirectory {
    pub fn accept(self, principal: &str, secret: &str) -> Self {
        self.with(|state| {
            state.passwords.insert(principal.into(), secret.into());
        })
    }

    /// Entries returned by every search.
    pub fn entries(self, entries: Vec<SearchResult>) -> Self {
        self.with(|state| state.entries = entries)
    }

    pub fn fail_open(self, reason: &str) -> Self {
        self.with(|state| state.open_error = Some(reason.into()))
    }

    pub fn fail_search(self, reason: &str) -> Self {
        self.with(|state| state.search_error = Some(reason.into()))
    }

    pub fn fail_unbind(self, reason: &str) -> Self {
        self.with(|state| state.unbind_error = Some(reason.into()))
    }

    /// Server whose certificate does not validate.
    pub fn untrusted_certificate(self) -> Self {
        self.with(|state| state.untrusted_certificate = true)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn unbinds(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Unbind))
            .count()
    }

    pub fn filters(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search { filter, .. } => Some(filter),
                _ => None,
            })
            .collect()
    }

    /// Options of the last connection attempt.
    pub fn opened_with(&self) -> Option<ConnectOptions> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Open { options, .. } => Some(options),
            _ => None,
        })
    }

    fn with(self, update: impl FnOnce(&mut State)) -> Self {
        update(&mut self.state.lock().unwrap());
        self
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    async fn open(
        &self,
        uri: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn DirectorySession>> {
        self.record(Call::Open {
            uri: uri.into(),
            options: *options,
        });

        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.open_error {
            return Err(ConnectorError::Directory(reason.clone()));
        }
        if state.untrusted_certificate && options.tls == TlsPolicy::RequireCert {
            return Err(ConnectorError::Directory(
                "certificate verify failed".into(),
            ));
        }

        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl DirectorySession for MockDirectory {
    async fn bind(&mut self, principal: &str, secret: &str) -> Result<()> {
        self.record(Call::Bind {
            principal: principal.into(),
        });

        match self.state.lock().unwrap().passwords.get(principal) {
            Some(expected) if expected != secret => {
                Err(ConnectorError::InvalidCredentials {
                    principal: principal.into(),
                })
            },
            _ => Ok(()),
        }
    }

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
    ) -> Result<Vec<SearchResult>> {
        self.record(Call::Search {
            base: base.into(),
            scope,
            filter: filter.into(),
        });

        let state = self.state.lock().unwrap();
        match &state.search_error {
            Some(reason) => Err(ConnectorError::Directory(reason.clone())),
            None => Ok(state.entries.clone()),
        }
    }

    async fn unbind(&mut self) -> Result<()> {
        self.record(Call::Unbind);

        match &self.state.lock().unwrap().unbind_error {
            Some(reason) => Err(ConnectorError::Directory(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Log sink keeping every message.
#[derive(Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<(bool, String)>>,
}

impl RecordingLog {
    pub fn debugs(&self) -> Vec<String> {
        self.level(false)
    }

    pub fn errors(&self) -> Vec<String> {
        self.level(true)
    }

    pub fn all(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    fn level(&self, error: bool) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(is_error, _)| *is_error == error)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl LogSink for RecordingLog {
    fn debug(&self, message: &str) {
        self.lines.lock().unwrap().push((false, message.to_owned()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push((true, message.to_owned()));
    }
}
