use std::{fmt, num::ParseIntError};

use crate::mail::{Encryption, MailerSettings, Sender};

const DEFAULT_DOMAIN: &str = "localhost";
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} env var is not set")]
    Missing(&'static str),
    #[error("{key} env var is not a valid port: {value:?}")]
    InvalidPort {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

#[derive(Clone)]
pub struct Settings {
    pub dsn: String,
    pub mailer: MailerSettings,
}

// The dsn usually carries the database password.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("mailer", &self.mailer)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let require = |key: &'static str| get(key).ok_or(SettingsError::Missing(key));

        let port = match get("SMTP_PORT") {
            Some(value) => value
                .parse()
                .map_err(|source| SettingsError::InvalidPort {
                    key: "SMTP_PORT",
                    value,
                    source,
                })?,
            None => DEFAULT_SMTP_PORT,
        };

        let encryption = get("SMTP_ENCRYPTION")
            .map(|mode| Encryption::resolve(&mode))
            .unwrap_or_default();

        Ok(Self {
            dsn: require("DSN")?,
            mailer: MailerSettings {
                domain: get("MAIL_DOMAIN").unwrap_or_else(|| DEFAULT_DOMAIN.to_owned()),
                host: require("SMTP_HOST")?,
                port,
                username: get("SMTP_USERNAME").unwrap_or_default(),
                password: get("SMTP_PASSWORD").unwrap_or_default(),
                encryption,
                sender: Sender {
                    address: require("MAIL_FROM_ADDRESS")?,
                    name: get("MAIL_FROM_NAME").unwrap_or_default(),
                },
            },
        })
    }
}
