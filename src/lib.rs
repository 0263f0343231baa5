//! dirauth authenticates users against an LDAP directory and resolves their
//! organizational unit memberships.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dirauth::config::DirectoryConfig;
//! use dirauth::telemetry::TracingLogSink;
//! use dirauth::DirectoryConnector;
//!
//! # async fn run() -> dirauth::error::Result<()> {
//! let config = DirectoryConfig::default().path("config.yaml").read()?;
//! let connector = DirectoryConnector::new(config, Arc::new(TracingLogSink::new()));
//!
//! let dn = "CN=alice,OU=people,DC=example,DC=com";
//! connector.authenticate(dn, "wonderland").await?;
//! let groups = connector.resolve_memberships(dn).await?;
//! println!("{}", connector.filter_memberships(&groups).join(", "));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
mod connector;
pub mod error;
pub mod ldap;
pub mod model;
pub mod telemetry;
#[cfg(test)]
mod testing;

pub use connector::{Connection, DirectoryConnector, MEMBER_OF};
pub use error::{ConnectorError, Result};
pub use model::{Credential, Scope, SearchResult, TlsPolicy};
