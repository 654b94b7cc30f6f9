#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Email composition and dispatch facade.
//!
//! One uniform message-building API regardless of which transport or
//! template engine is configured: a [`Mailer`] accumulates addresses,
//! subject, attachments and render data through chained calls, renders the
//! body variants of a named view through a pluggable render engine, and
//! hands the finished [`Message`] to a pluggable transport driver.
//!
//! ```no_run
//! # async fn example() -> Result<(), postbox::MailError> {
//! let mut mailer = postbox::Mailer::new(Some("confirm-account"))?;
//!
//! mailer
//!     .from(("no-reply@app.com", "The App"))
//!     .to("jane@doe.com")
//!     .subject("Confirm your account")
//!     .data(serde_json::json!({ "username": "jane" }));
//!
//! let result = mailer.send().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Transports are selected by the `connection` entry of the configuration
//! file and resolved through a process-wide driver registry; additional
//! drivers can be plugged in at runtime with [`extend`].

pub mod domain;
pub mod infrastructure;

pub use domain::mail::{
    Address, DeliveryResult, DriverError, IntoAddresses, MailConfig, MailError, Mailer, Message,
    TransportConfig, TransportDriver,
};
pub use domain::templates::{ContentBundle, RenderEngine, TemplateError};
pub use infrastructure::drivers::{driver, extend};
