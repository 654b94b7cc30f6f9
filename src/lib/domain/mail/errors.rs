//! Mail errors

use thiserror::Error;

use crate::domain::{mail::driver::DriverError, templates::errors::TemplateError};

/// Errors raised while composing or dispatching a mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// A required piece of mail configuration is missing
    #[error("missing mail configuration: {0}")]
    MissingConfig(String),

    /// A caller supplied an invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No driver is registered under the requested name
    #[error("`{0}` is not a valid mail driver")]
    UnknownDriver(String),

    /// The configuration file could not be read or parsed
    #[error("failed to load mail configuration from `{path}`")]
    ConfigFile {
        /// Path the configuration was loaded from
        path: String,
        /// Underlying read or parse error
        #[source]
        source: anyhow::Error,
    },

    /// Template selection or rendering failed
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The transport driver failed
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The mail was already dispatched successfully
    #[error("mail has already been sent")]
    AlreadySent,
}
