//! Connection options and their resolution into a libpq-style conninfo string.

use serde::Deserialize;

use crate::error::{PgTxError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "5432";
pub const DEFAULT_SSLMODE: &str = "prefer";

/// Options accepted by `Connection::connect`.
///
/// Only `db` is required; everything else falls back to a default when resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub db: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub sslmode: Option<String>,
    /// Seconds to wait for the connection to be established
    pub connect_timeout: Option<u64>,
    pub application_name: Option<String>,
}

impl ConnectOptions {
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: Some(db.into()),
            ..Self::default()
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn pass(mut self, pass: impl Into<String>) -> Self {
        self.pass = Some(pass.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Validates the options and applies defaults.
    ///
    /// `default_user` is only called when no user was given.
    pub fn resolve<F>(self, default_user: F) -> Result<ConnectConfig>
    where
        F: FnOnce() -> Option<String>,
    {
        let db = match self.db {
            Some(db) if !db.is_empty() => db,
            _ => return Err(PgTxError::configuration("Invalid db name")),
        };
        let user = match self.user {
            Some(user) => user,
            None => default_user().ok_or_else(|| {
                PgTxError::configuration("no user given and the OS login could not be determined")
            })?,
        };

        Ok(ConnectConfig {
            db,
            user,
            pass: self.pass,
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or_else(|| DEFAULT_PORT.to_string()),
            sslmode: self.sslmode.unwrap_or_else(|| DEFAULT_SSLMODE.to_string()),
            connect_timeout: self.connect_timeout,
            application_name: self.application_name,
        })
    }
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    pub db: String,
    pub user: String,
    pub pass: Option<String>,
    pub host: String,
    pub port: String,
    pub sslmode: String,
    pub connect_timeout: Option<u64>,
    pub application_name: Option<String>,
}

impl ConnectConfig {
    /// Renders the `key='value'` conninfo string understood by the driver.
    pub fn conninfo(&self) -> String {
        let mut pairs = vec![
            ("dbname", self.db.clone()),
            ("user", self.user.clone()),
        ];
        if let Some(pass) = &self.pass {
            pairs.push(("password", pass.clone()));
        }
        pairs.push(("host", self.host.clone()));
        pairs.push(("port", self.port.clone()));
        pairs.push(("sslmode", self.sslmode.clone()));
        if let Some(timeout) = self.connect_timeout {
            pairs.push(("connect_timeout", timeout.to_string()));
        }
        if let Some(name) = &self.application_name {
            pairs.push(("application_name", name.clone()));
        }

        pairs
            .iter()
            .map(|(key, value)| format!("{}='{}'", key, quote_conninfo_value(value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_conninfo_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Login name of the current OS user, read from the environment.
pub fn os_login() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}
