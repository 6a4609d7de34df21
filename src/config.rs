//! Connection and run settings.

use crate::error::{DumpError, Result};
use secrecy::{ExposeSecret as _, SecretString};

pub const ENV_HOST: &str = "ELASTICSEARCH_HOST";
pub const ENV_USERNAME: &str = "ELASTICSEARCH_USERNAME";
pub const ENV_PASSWORD: &str = "ELASTICSEARCH_PASSWORD";
pub const ENV_API_KEY: &str = "ELASTICSEARCH_API_KEY";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_USERNAME: &str = "elastic";
pub const DEFAULT_PORT: u16 = 9200;

/// Documents requested per search/scroll page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Documents sent per bulk request.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Server-side lifetime of a scroll cursor between two page requests.
pub const SCROLL_KEEP_ALIVE: &str = "1m";

/// How to reach the cluster.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub api_key: Option<SecretString>,
    /// Certificate verification is off unless asked for; clusters behind
    /// self-signed certificates are the common case.
    pub verify_certs: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            username: Some(DEFAULT_USERNAME.to_owned()),
            password: None,
            api_key: None,
            verify_certs: false,
        }
    }
}

/// Resolved authentication scheme.
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic {
        username: String,
        password: SecretString,
    },
    ApiKey(SecretString),
}

impl ConnectionConfig {
    /// Pick the authentication scheme.
    ///
    /// Username and password take precedence over an API key when both are set.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Config`] when neither a username/password pair nor
    /// an API key is available.
    pub fn credentials(&self) -> Result<Credentials> {
        let non_empty = |s: &&SecretString| !s.expose_secret().is_empty();

        if let (Some(username), Some(password)) = (
            self.username.as_deref().filter(|u| !u.is_empty()),
            self.password.as_ref().filter(non_empty),
        ) {
            return Ok(Credentials::Basic {
                username: username.to_owned(),
                password: password.clone(),
            });
        }

        if let Some(key) = self.api_key.as_ref().filter(non_empty) {
            return Ok(Credentials::ApiKey(key.clone()));
        }

        Err(DumpError::Config(
            "Either username/password or api_key must be provided".to_owned(),
        ))
    }

    /// Base URL of the cluster, with scheme and port filled in.
    ///
    /// `localhost` and loopback addresses default to plain HTTP, anything else
    /// to HTTPS.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Config`] for an empty host.
    pub fn base_url(&self) -> Result<String> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(DumpError::Config("host must not be empty".to_owned()));
        }

        let (scheme, rest) = match host.split_once("://") {
            Some((scheme, rest)) => (scheme.to_owned(), rest),
            None => {
                let name = host.split(':').next().unwrap_or(host);
                let scheme = if matches!(name, "localhost" | "127.0.0.1") {
                    "http"
                } else {
                    "https"
                };
                (scheme.to_owned(), host)
            }
        };

        let authority = rest.split('/').next().unwrap_or(rest);
        if authority.contains(':') {
            Ok(format!("{scheme}://{rest}"))
        } else {
            Ok(format!("{scheme}://{authority}:{DEFAULT_PORT}{}", &rest[authority.len()..]))
        }
    }
}

/// Settings for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub page_size: usize,
    /// Write `<name>-checksum.json` next to each data file.
    pub checksum: bool,
    /// Write `_manifest.json` once all collections are done.
    pub manifest: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            checksum: true,
            manifest: true,
        }
    }
}

/// Settings for a bulk load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub chunk_size: usize,
    pub pipeline: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pipeline: None,
        }
    }
}
