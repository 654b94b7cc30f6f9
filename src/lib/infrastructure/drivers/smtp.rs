//! SMTP driver

use std::fmt;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::domain::mail::{
    config::TransportConfig,
    driver::{DeliveryResult, DriverError, TransportDriver},
    message::{Address, Attachment, AttachmentOptions, Message},
};

/// Settings of an SMTP transport entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP relay hostname
    pub host: String,

    /// SMTP relay port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use an implicit TLS connection instead of STARTTLS
    #[serde(default)]
    pub secure: bool,

    /// Relay credentials
    pub auth: Option<SmtpAuth>,
}

/// SMTP relay credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpAuth {
    /// Relay username
    pub user: String,

    /// Relay password
    pub pass: String,
}

fn default_port() -> u16 {
    587
}

/// Built-in driver delivering mail through an SMTP relay with lettre.
///
/// The transport client is built once, when the registry applies the
/// connection settings; lettre handles connection pooling internally.
#[derive(Default)]
pub struct SmtpDriver {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    host: String,
}

impl SmtpDriver {
    /// Creates an unconfigured driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the transport client has been built.
    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }
}

impl fmt::Debug for SmtpDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpDriver")
            .field("host", &self.host)
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[async_trait]
impl TransportDriver for SmtpDriver {
    fn set_config(&mut self, config: &TransportConfig) -> Result<(), DriverError> {
        let settings: SmtpConfig = config
            .parse()
            .map_err(|e| DriverError::Config(e.to_string()))?;

        let mut builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| DriverError::Config(e.to_string()))?;

        builder = builder.port(settings.port);

        if let Some(auth) = settings.auth {
            builder = builder.credentials(Credentials::new(auth.user, auth.pass));
        }

        self.transport = Some(builder.build());
        self.host = settings.host;

        Ok(())
    }

    #[mutants::skip]
    async fn send(&self, message: &Message) -> Result<DeliveryResult, DriverError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| DriverError::Config("smtp driver is not configured".to_string()))?;

        let (email, message_id) = build_email(message, &self.host).await?;

        debug!(%message_id, "dispatching mail over smtp");

        let response = transport
            .send(email)
            .await
            .map_err(|e| DriverError::Delivery(e.into()))?;

        Ok(DeliveryResult {
            message_id: Some(message_id),
            payload: json!({
                "code": response.code().to_string(),
                "message": response.message().collect::<Vec<_>>().join("\n"),
            }),
        })
    }
}

/// Assembles a lettre message from the composed message, returning it with
/// the generated message id.
async fn build_email(
    message: &Message,
    host: &str,
) -> Result<(lettre::Message, String), DriverError> {
    let mut builder = lettre::Message::builder();

    let from = message
        .from
        .first()
        .or_else(|| message.sender.first())
        .ok_or_else(|| DriverError::Message("a `from` address is required".to_string()))?;
    builder = builder.from(mailbox(from)?);

    if let Some(sender) = message.sender.first() {
        builder = builder.sender(mailbox(sender)?);
    }

    for address in &message.to {
        builder = builder.to(mailbox(address)?);
    }

    for address in &message.cc {
        builder = builder.cc(mailbox(address)?);
    }

    for address in &message.bcc {
        builder = builder.bcc(mailbox(address)?);
    }

    for address in &message.reply_to {
        builder = builder.reply_to(mailbox(address)?);
    }

    if let Some(subject) = &message.subject {
        builder = builder.subject(subject.clone());
    }

    if let Some(id) = &message.in_reply_to {
        builder = builder.in_reply_to(id.clone());
    }

    let message_id = format!("<{}@{host}>", Uuid::now_v7());
    builder = builder.message_id(Some(message_id.clone()));

    // Alternative body parts, least preferred first.
    let mut bodies: Vec<SinglePart> = Vec::new();

    if let Some(text) = &message.text {
        bodies.push(SinglePart::plain(text.clone()));
    }

    if let Some(watch_html) = &message.watch_html {
        bodies.push(
            SinglePart::builder()
                .header(content_type("text/watch-html")?)
                .body(watch_html.clone()),
        );
    }

    for alternative in &message.alternatives {
        let value = alternative
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");

        bodies.push(
            SinglePart::builder()
                .header(content_type(value)?)
                .body(alternative.content.clone()),
        );
    }

    if let Some(html) = &message.html {
        bodies.push(SinglePart::html(html.clone()));
    }

    let mut attachments: Vec<SinglePart> = Vec::new();

    for attachment in &message.attachments {
        attachments.push(attachment_part(attachment).await?);
    }

    let email = if attachments.is_empty() {
        let mut bodies = bodies;

        match bodies.len() {
            0 => builder.singlepart(SinglePart::plain(String::new())),
            1 => builder.singlepart(bodies.remove(0)),
            _ => builder.multipart(alternative_part(bodies)),
        }
    } else {
        let mut mixed = MultiPart::mixed().multipart(alternative_part(bodies));

        for part in attachments {
            mixed = mixed.singlepart(part);
        }

        builder.multipart(mixed)
    }
    .map_err(|e| DriverError::Message(e.to_string()))?;

    Ok((email, message_id))
}

fn mailbox(address: &Address) -> Result<Mailbox, DriverError> {
    let invalid = |e: lettre::address::AddressError| {
        DriverError::Message(format!("invalid address `{address}`: {e}"))
    };

    match address {
        Address::Bare(bare) => Ok(Mailbox::new(None, bare.parse().map_err(invalid)?)),
        Address::Named { name, address } => Ok(Mailbox::new(
            Some(name.clone()),
            address.parse().map_err(invalid)?,
        )),
    }
}

fn alternative_part(parts: Vec<SinglePart>) -> MultiPart {
    let mut iter = parts.into_iter();

    let mut multipart = match iter.next() {
        Some(first) => MultiPart::alternative().singlepart(first),
        None => MultiPart::alternative().singlepart(SinglePart::plain(String::new())),
    };

    for part in iter {
        multipart = multipart.singlepart(part);
    }

    multipart
}

async fn attachment_part(attachment: &Attachment) -> Result<SinglePart, DriverError> {
    match attachment {
        Attachment::Path { path, options } => {
            let content = tokio::fs::read(path).await.map_err(|e| {
                DriverError::Message(format!(
                    "failed to read attachment `{}`: {e}",
                    path.display()
                ))
            })?;

            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("attachment")
                .to_string();

            data_part(content, filename, options)
        }
        Attachment::Data {
            content,
            filename,
            options,
        } => data_part(content.clone(), filename.clone(), options),
    }
}

fn data_part(
    content: Vec<u8>,
    filename: String,
    options: &AttachmentOptions,
) -> Result<SinglePart, DriverError> {
    let value = options
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    let part = match &options.cid {
        Some(cid) => AttachmentPart::new_inline(cid.clone()),
        None => AttachmentPart::new(filename),
    };

    Ok(part.body(content, content_type(value)?))
}

fn content_type(value: &str) -> Result<ContentType, DriverError> {
    ContentType::parse(value)
        .map_err(|e| DriverError::Message(format!("invalid content type `{value}`: {e}")))
}
