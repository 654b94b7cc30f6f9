//! Mail configuration

use std::collections::HashMap;
use std::{env, fs};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::mail::errors::MailError;

/// Environment variable naming the configuration file path.
pub const CONFIG_PATH_ENV: &str = "MAIL_CONFIG_FILE_PATH";

/// Configuration file path used when [`CONFIG_PATH_ENV`] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "mail.config.json";

/// The mail configuration consumed by the [`Mailer`](super::Mailer).
///
/// A nested mapping: the top-level keys select the active connection, the
/// template root, and the render engine; every other key is a transport
/// entry holding that transport's driver name and settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    /// Name of the active transport entry
    pub connection: Option<String>,

    /// Directory holding the mail templates, relative to the process
    /// working directory (`mails` when unset)
    pub views: Option<String>,

    /// Name of the render engine used to compile templates
    pub view_engine: Option<String>,

    /// One entry per transport name
    #[serde(flatten)]
    pub transports: HashMap<String, TransportConfig>,

    /// Path this configuration was loaded from, when it came from a file
    #[serde(skip)]
    source: Option<String>,
}

impl MailConfig {
    /// Loads the configuration from the file named by the
    /// `MAIL_CONFIG_FILE_PATH` environment variable, falling back to
    /// `mail.config.json`. A `.env` file is honored when present.
    pub fn load() -> Result<Self, MailError> {
        dotenvy::dotenv().ok();

        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::from_file(&path)
    }

    /// Loads the configuration from a JSON file at `path`.
    pub fn from_file(path: &str) -> Result<Self, MailError> {
        let contents = fs::read_to_string(path).map_err(|e| MailError::ConfigFile {
            path: path.to_string(),
            source: e.into(),
        })?;

        let mut config: Self =
            serde_json::from_str(&contents).map_err(|e| MailError::ConfigFile {
                path: path.to_string(),
                source: e.into(),
            })?;

        config.source = Some(path.to_string());

        Ok(config)
    }

    /// Returns the transport entry registered under `name`.
    pub fn transport(&self, name: &str) -> Option<&TransportConfig> {
        self.transports.get(name)
    }

    /// Describes where this configuration came from, for error messages.
    pub fn source_description(&self) -> &str {
        self.source.as_deref().unwrap_or("the mail configuration")
    }
}

/// The settings of one transport entry.
///
/// A thin wrapper over the raw JSON object: the composer only requires a
/// non-empty `driver` field, everything else is interpreted by the driver
/// itself.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TransportConfig(serde_json::Value);

impl TransportConfig {
    /// Wraps a raw JSON value as a transport entry.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the non-empty `driver` field, if present.
    pub fn driver(&self) -> Option<&str> {
        self.0
            .get("driver")
            .and_then(serde_json::Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Returns one raw setting by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Deserializes the entry into a driver-specific settings type.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.0.clone())
    }
}
