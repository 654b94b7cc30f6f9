//! Mail composition and dispatch.

pub mod config;
pub mod driver;
pub mod errors;
pub mod mailer;
pub mod message;

pub use config::{MailConfig, TransportConfig};
pub use driver::{DeliveryResult, DriverError, TransportDriver};
pub use errors::MailError;
pub use mailer::Mailer;
pub use message::{Address, Alternative, Attachment, AttachmentOptions, IntoAddresses, Message};
