//! Mail composer

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use crate::domain::mail::{
    config::MailConfig,
    driver::{DeliveryResult, TransportDriver},
    errors::MailError,
    message::{Alternative, Attachment, AttachmentOptions, IntoAddresses, Message},
};
use crate::domain::templates::engine::RenderEngine;
use crate::infrastructure::{drivers, engines};

/// Composition states of a [`Mailer`].
///
/// Construction resolves the connection (`Connected`), the first mutator
/// call starts composing, and a successful dispatch is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connected,
    Composing,
    Sent,
}

/// The stateful composer accumulating message fields before dispatch.
///
/// A `Mailer` is bound at construction to an optional view name and a
/// configuration, resolves its transport driver immediately, and then
/// accumulates message fields through chained calls until [`send`] or
/// [`send_raw`] hands the finished message to the driver.
///
/// ```no_run
/// # use postbox::{Mailer, MailError};
/// # async fn welcome() -> Result<(), MailError> {
/// let mut mailer = Mailer::new(Some("welcome"))?;
///
/// mailer
///     .from(("no-reply@app.com", "The App"))
///     .to("jane@doe.com")
///     .subject("Welcome aboard")
///     .data(serde_json::json!({ "name": "Jane" }));
///
/// mailer.send().await?;
/// # Ok(())
/// # }
/// ```
///
/// Dispatching twice is rejected: a second [`send`] or [`send_raw`] after a
/// successful dispatch fails with [`MailError::AlreadySent`]. A failed
/// dispatch leaves the message as last composed, so the same `Mailer` can
/// retry.
///
/// [`send`]: Mailer::send
/// [`send_raw`]: Mailer::send_raw
pub struct Mailer {
    template: Option<String>,
    config: MailConfig,
    engine: Box<dyn RenderEngine>,
    driver: Box<dyn TransportDriver>,
    message: Message,
    data: Value,
    state: State,
}

impl Mailer {
    /// Creates a composer bound to `template`, loading the configuration
    /// from the file named by `MAIL_CONFIG_FILE_PATH` (default
    /// `mail.config.json`).
    ///
    /// Fails when the configuration cannot be loaded, names an unsupported
    /// view engine, or does not resolve to a transport driver.
    #[mutants::skip]
    pub fn new(template: Option<&str>) -> Result<Self, MailError> {
        Self::with_config(template, MailConfig::load()?)
    }

    /// Creates a composer bound to `template` with an explicit
    /// configuration, taking precedence over any configuration file.
    pub fn with_config(template: Option<&str>, config: MailConfig) -> Result<Self, MailError> {
        let engine = engines::for_config(&config)?;
        let driver = Self::resolve_driver(&config, None)?;

        Ok(Self {
            template: template.map(str::to_string),
            config,
            engine,
            driver,
            message: Message::default(),
            data: Value::Null,
            state: State::Connected,
        })
    }

    /// Switches to another named connection without discarding the message
    /// fields composed so far.
    pub fn connection(&mut self, name: Option<&str>) -> Result<&mut Self, MailError> {
        self.driver = Self::resolve_driver(&self.config, name)?;

        if self.state != State::Sent {
            self.state = if self.message.is_empty() {
                State::Connected
            } else {
                State::Composing
            };
        }

        Ok(self)
    }

    /// Resolves the connection named by `name` (or by the configuration)
    /// into a live, configured driver.
    fn resolve_driver(
        config: &MailConfig,
        name: Option<&str>,
    ) -> Result<Box<dyn TransportDriver>, MailError> {
        let source = config.source_description();

        let name = name
            .or(config.connection.as_deref())
            .ok_or_else(|| MailError::MissingConfig(format!("define `connection` inside {source}")))?;

        let transport = config.transport(name).ok_or_else(|| {
            MailError::MissingConfig(format!("define `{name}` inside {source}"))
        })?;

        let driver_name = transport.driver().ok_or_else(|| {
            MailError::MissingConfig(format!("define `{name}.driver` inside {source}"))
        })?;

        debug!(connection = name, driver = driver_name, "resolving mail driver");

        drivers::driver(driver_name, transport)
    }

    /// Appends entries to the `from` addresses.
    pub fn from(&mut self, addresses: impl IntoAddresses) -> &mut Self {
        self.compose();
        self.message.from.extend(addresses.into_addresses());
        self
    }

    /// Appends entries to the `to` recipients.
    pub fn to(&mut self, addresses: impl IntoAddresses) -> &mut Self {
        self.compose();
        self.message.to.extend(addresses.into_addresses());
        self
    }

    /// Appends entries to the carbon copy recipients.
    pub fn cc(&mut self, addresses: impl IntoAddresses) -> &mut Self {
        self.compose();
        self.message.cc.extend(addresses.into_addresses());
        self
    }

    /// Appends entries to the blind carbon copy recipients.
    pub fn bcc(&mut self, addresses: impl IntoAddresses) -> &mut Self {
        self.compose();
        self.message.bcc.extend(addresses.into_addresses());
        self
    }

    /// Appends entries to the envelope sender addresses.
    pub fn sender(&mut self, addresses: impl IntoAddresses) -> &mut Self {
        self.compose();
        self.message.sender.extend(addresses.into_addresses());
        self
    }

    /// Appends entries to the reply-to addresses.
    pub fn reply_to(&mut self, addresses: impl IntoAddresses) -> &mut Self {
        self.compose();
        self.message.reply_to.extend(addresses.into_addresses());
        self
    }

    /// Sets the identifier of the message this one replies to.
    pub fn in_reply_to(&mut self, message_id: impl Into<String>) -> &mut Self {
        self.compose();
        self.message.in_reply_to = Some(message_id.into());
        self
    }

    /// Sets the subject line.
    pub fn subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.compose();
        self.message.subject = Some(subject.into());
        self
    }

    /// Stores the data object the template is rendered against.
    ///
    /// Calling it again replaces the stored object entirely; there is no
    /// merge.
    pub fn data(&mut self, data: Value) -> &mut Self {
        self.compose();
        self.data = data;
        self
    }

    /// Appends a file attachment.
    pub fn attach(&mut self, path: impl Into<PathBuf>, options: AttachmentOptions) -> &mut Self {
        self.compose();
        self.message.attachments.push(Attachment::Path {
            path: path.into(),
            options,
        });
        self
    }

    /// Appends an attachment carrying raw data under `filename`.
    ///
    /// Fails with an invalid-argument error, before touching the message,
    /// when `filename` is empty.
    pub fn attach_data(
        &mut self,
        content: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        options: AttachmentOptions,
    ) -> Result<&mut Self, MailError> {
        let filename = filename.into();

        if filename.is_empty() {
            return Err(MailError::InvalidArgument(
                "a filename is required when attaching raw data".to_string(),
            ));
        }

        self.compose();
        self.message.attachments.push(Attachment::Data {
            content: content.into(),
            filename,
            options,
        });

        Ok(self)
    }

    /// Embeds a file as an inline attachment addressable as `cid:<cid>`
    /// from the HTML body. The `cid` must be unique within the message.
    pub fn embed(
        &mut self,
        path: impl Into<PathBuf>,
        cid: impl Into<String>,
        mut options: AttachmentOptions,
    ) -> &mut Self {
        options.cid = Some(cid.into());
        self.attach(path, options)
    }

    /// Appends an alternate body representation.
    pub fn alternative(
        &mut self,
        content: impl Into<String>,
        content_type: Option<&str>,
    ) -> &mut Self {
        self.compose();
        self.message.alternatives.push(Alternative {
            content: content.into(),
            content_type: content_type.map(str::to_string),
        });
        self
    }

    /// Stores an opaque payload handed to the driver untouched; its
    /// semantics are driver-defined.
    pub fn driver_extras(&mut self, extras: Value) -> &mut Self {
        self.compose();
        self.message.extras = Some(extras);
        self
    }

    /// Returns the message as composed so far.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the view name this composer renders at dispatch, if any.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Renders the bound template against the stored data, merges the
    /// produced body variants into the message, and hands it to the
    /// driver.
    ///
    /// Variants the render does not produce leave the corresponding
    /// message field untouched. The driver's outcome, success or failure,
    /// is passed through unaltered.
    pub async fn send(&mut self) -> Result<DeliveryResult, MailError> {
        if self.state == State::Sent {
            return Err(MailError::AlreadySent);
        }

        if let Some(view) = self.template.clone() {
            let bundle = self.engine.render(&view, &self.data)?;

            debug!(
                view,
                html = bundle.html.is_some(),
                text = bundle.text.is_some(),
                watch_html = bundle.watch_html.is_some(),
                "rendered mail template"
            );

            if let Some(html) = bundle.html {
                self.message.html = Some(html);
            }

            if let Some(text) = bundle.text {
                self.message.text = Some(text);
            }

            if let Some(watch_html) = bundle.watch_html {
                self.message.watch_html = Some(watch_html);
            }
        }

        self.dispatch().await
    }

    /// Dispatches `body` directly, bypassing the render engine.
    ///
    /// A body beginning (after leading whitespace) with `<` is taken as
    /// HTML, anything else as plain text.
    pub async fn send_raw(&mut self, body: impl Into<String>) -> Result<DeliveryResult, MailError> {
        if self.state == State::Sent {
            return Err(MailError::AlreadySent);
        }

        let body = body.into();

        if body.trim_start().starts_with('<') {
            self.message.html = Some(body);
        } else {
            self.message.text = Some(body);
        }

        self.dispatch().await
    }

    async fn dispatch(&mut self) -> Result<DeliveryResult, MailError> {
        let result = self.driver.send(&self.message).await?;

        self.state = State::Sent;

        Ok(result)
    }

    fn compose(&mut self) {
        if self.state == State::Connected {
            self.state = State::Composing;
        }
    }
}

impl fmt::Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("template", &self.template)
            .field("connection", &self.config.connection)
            .field("state", &self.state)
            .field("message", &self.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use mockall::Sequence;
    use serde_json::json;
    use testresult::TestResult;

    use crate::domain::mail::driver::DriverError;
    use crate::domain::mail::message::Address;
    use crate::domain::mail::tests::MockTransportDriver;
    use crate::domain::templates::errors::TemplateError;
    use crate::infrastructure::drivers::registry;

    use super::*;

    fn memory_config() -> MailConfig {
        serde_json::from_value(json!({
            "connection": "memory",
            "view_engine": "handlebars",
            "memory": { "driver": "memory" }
        }))
        .expect("valid config")
    }

    fn memory_config_with_views(views: &str) -> MailConfig {
        serde_json::from_value(json!({
            "connection": "memory",
            "view_engine": "handlebars",
            "views": views,
            "memory": { "driver": "memory" }
        }))
        .expect("valid config")
    }

    fn write_view(views: &std::path::Path, view: &str, kind: &str, content: &str) -> TestResult {
        let view_dir = views.join(view);
        fs::create_dir_all(&view_dir)?;
        fs::write(view_dir.join(format!("{view}.{kind}.hbs")), content)?;

        Ok(())
    }

    #[test]
    fn test_builds_a_complete_mail_message() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;

        mailer
            .driver_extras(json!({ "campaign_id": "welcome-2024" }))
            .data(json!({ "name": "Foo Bar", "username": "foo-bar" }))
            .in_reply_to("10122121112")
            .embed("logo.png", "logo", AttachmentOptions::default())
            .from(("foo@bar.com", "Foo Bar"))
            .to(("jane@doe.com", "Jane Doe"))
            .cc(("john@doe.com", "John Doe"))
            .attach_data(b"hello text".to_vec(), "hello.txt", AttachmentOptions::default())?
            .bcc(("admin@app.com", "Administrator"))
            .sender(("mark@meyner.com", "Mark Meyner"))
            .reply_to(("anne@meyner.com", "Anne Meyner"))
            .subject("Test Mail")
            .attach(
                "absolute/path/to/file.jpg",
                AttachmentOptions {
                    content_type: Some("image/jpeg".to_string()),
                    ..AttachmentOptions::default()
                },
            )
            .alternative("**Hello**", Some("text/x-web-markdown"));

        let message = mailer.message();

        assert_eq!(message.from, vec![Address::named("foo@bar.com", "Foo Bar")]);
        assert_eq!(message.to, vec![Address::named("jane@doe.com", "Jane Doe")]);
        assert_eq!(message.cc, vec![Address::named("john@doe.com", "John Doe")]);
        assert_eq!(message.bcc, vec![Address::named("admin@app.com", "Administrator")]);
        assert_eq!(message.sender, vec![Address::named("mark@meyner.com", "Mark Meyner")]);
        assert_eq!(message.reply_to, vec![Address::named("anne@meyner.com", "Anne Meyner")]);
        assert_eq!(message.subject.as_deref(), Some("Test Mail"));
        assert_eq!(message.in_reply_to.as_deref(), Some("10122121112"));
        assert_eq!(message.attachments.len(), 3);
        assert_eq!(message.alternatives.len(), 1);
        assert_eq!(
            message.extras,
            Some(json!({ "campaign_id": "welcome-2024" }))
        );

        Ok(())
    }

    #[test]
    fn test_address_mutators_append_and_accumulate() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;

        mailer
            .to("jane@doe.com")
            .to(("john@doe.com", "John Doe"))
            .to(vec![
                Address::bare("admin@app.com"),
                Address::named("mark@meyner.com", "Mark"),
            ]);

        assert_eq!(
            mailer.message().to,
            vec![
                Address::bare("jane@doe.com"),
                Address::named("john@doe.com", "John Doe"),
                Address::bare("admin@app.com"),
                Address::named("mark@meyner.com", "Mark"),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_attach_data_requires_filename() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;

        let result = mailer.attach_data(b"hello".to_vec(), "", AttachmentOptions::default());

        assert!(matches!(result, Err(MailError::InvalidArgument(_))));
        assert!(mailer.message().attachments.is_empty());

        Ok(())
    }

    #[test]
    fn test_embed_is_attach_with_cid() -> TestResult {
        let mut embedded = Mailer::with_config(None, memory_config())?;
        embedded.embed("logo.png", "logo", AttachmentOptions::default());

        let mut attached = Mailer::with_config(None, memory_config())?;
        attached.attach(
            "logo.png",
            AttachmentOptions {
                cid: Some("logo".to_string()),
                ..AttachmentOptions::default()
            },
        );

        assert_eq!(embedded.message().attachments, attached.message().attachments);

        Ok(())
    }

    #[test]
    fn test_construction_fails_without_connection_name() {
        let config: MailConfig = serde_json::from_value(json!({
            "view_engine": "handlebars",
            "memory": { "driver": "memory" }
        }))
        .expect("valid config");

        let result = Mailer::with_config(None, config);

        assert!(matches!(result, Err(MailError::MissingConfig(_))));
    }

    #[test]
    fn test_construction_fails_without_transport_entry() {
        let config: MailConfig = serde_json::from_value(json!({
            "connection": "smtp",
            "view_engine": "handlebars"
        }))
        .expect("valid config");

        let result = Mailer::with_config(None, config);

        assert!(matches!(result, Err(MailError::MissingConfig(_))));
    }

    #[test]
    fn test_construction_fails_without_driver_field() {
        let config: MailConfig = serde_json::from_value(json!({
            "connection": "smtp",
            "view_engine": "handlebars",
            "smtp": { "host": "smtp.mailtrap.io" }
        }))
        .expect("valid config");

        let result = Mailer::with_config(None, config);

        assert!(
            matches!(result, Err(MailError::MissingConfig(message)) if message.contains("smtp.driver"))
        );
    }

    #[test]
    fn test_construction_fails_for_unsupported_view_engine() {
        let config: MailConfig = serde_json::from_value(json!({
            "connection": "memory",
            "view_engine": "edge",
            "memory": { "driver": "memory" }
        }))
        .expect("valid config");

        let result = Mailer::with_config(None, config);

        assert!(matches!(
            result,
            Err(MailError::Template(TemplateError::UnsupportedEngine(_)))
        ));
    }

    #[tokio::test]
    async fn test_send_merges_only_present_template_variants() -> TestResult {
        let views = tempfile::tempdir()?;
        write_view(views.path(), "welcome", "html", "<p>Hello {{name}}</p>")?;

        let config = memory_config_with_views(views.path().to_str().expect("utf-8 path"));
        let mut mailer = Mailer::with_config(Some("welcome"), config)?;

        mailer
            .from("no-reply@app.com")
            .to("jane@doe.com")
            .subject("Welcome")
            .data(json!({ "name": "Jane" }));

        let result = mailer.send().await?;

        assert!(result.message_id.expect("message id").ends_with("@memory>"));
        assert_eq!(mailer.message().html.as_deref(), Some("<p>Hello Jane</p>"));
        assert_eq!(mailer.message().text, None);
        assert_eq!(mailer.message().watch_html, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_data_calls_replace_the_stored_object() -> TestResult {
        let views = tempfile::tempdir()?;
        write_view(views.path(), "welcome", "text", "Hello {{name}}")?;

        let config = memory_config_with_views(views.path().to_str().expect("utf-8 path"));
        let mut mailer = Mailer::with_config(Some("welcome"), config)?;

        mailer
            .to("jane@doe.com")
            .data(json!({ "name": "Jane", "stale": true }))
            .data(json!({ "name": "John" }));

        mailer.send().await?;

        assert_eq!(mailer.message().text.as_deref(), Some("Hello John"));

        Ok(())
    }

    #[tokio::test]
    async fn test_template_compile_errors_propagate_from_send() -> TestResult {
        let views = tempfile::tempdir()?;
        write_view(views.path(), "broken", "html", "{{#if name}}unclosed")?;

        let config = memory_config_with_views(views.path().to_str().expect("utf-8 path"));
        let mut mailer = Mailer::with_config(Some("broken"), config)?;

        let result = mailer.to("jane@doe.com").send().await;

        assert!(matches!(
            result,
            Err(MailError::Template(TemplateError::Render { .. }))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_raw_classifies_html_bodies() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;

        mailer.to("jane@doe.com").send_raw("  <p>Hi</p>").await?;

        assert_eq!(mailer.message().html.as_deref(), Some("  <p>Hi</p>"));
        assert_eq!(mailer.message().text, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_raw_classifies_text_bodies() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;

        mailer
            .to("jane@doe.com")
            .send_raw("Your security code is 301030")
            .await?;

        assert_eq!(
            mailer.message().text.as_deref(),
            Some("Your security code is 301030")
        );
        assert_eq!(mailer.message().html, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_second_send_is_rejected() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;
        mailer.to("jane@doe.com");

        mailer.send().await?;
        let result = mailer.send().await;

        assert!(matches!(result, Err(MailError::AlreadySent)));

        Ok(())
    }

    #[tokio::test]
    async fn test_driver_failure_passes_through_and_allows_retry() -> TestResult {
        registry::extend("flaky", || {
            let mut driver = MockTransportDriver::new();
            let mut sequence = Sequence::new();

            driver.expect_set_config().returning(|_| Ok(()));
            driver
                .expect_send()
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| {
                    Err(DriverError::Delivery(anyhow::anyhow!(
                        "535 authentication failed"
                    )))
                });
            driver
                .expect_send()
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Ok(DeliveryResult::default()));

            driver
        });

        let config: MailConfig = serde_json::from_value(json!({
            "connection": "flaky",
            "view_engine": "handlebars",
            "flaky": { "driver": "flaky" }
        }))
        .expect("valid config");

        let mut mailer = Mailer::with_config(None, config)?;
        mailer.to("jane@doe.com");

        let failure = mailer.send_raw("Hi").await;

        match failure {
            Err(MailError::Driver(DriverError::Delivery(payload))) => {
                assert_eq!(payload.to_string(), "535 authentication failed");
            }
            other => panic!("expected delivery failure, got {other:?}"),
        }

        // The failed dispatch is not terminal; the same composition can be
        // retried as-is.
        mailer.send_raw("Hi").await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_connection_switch_preserves_composed_fields() -> TestResult {
        let config: MailConfig = serde_json::from_value(json!({
            "connection": "memory",
            "view_engine": "handlebars",
            "memory": { "driver": "memory" },
            "backup": { "driver": "memory" }
        }))
        .expect("valid config");

        let mut mailer = Mailer::with_config(None, config)?;
        mailer.to("jane@doe.com").subject("Still here");

        mailer.connection(Some("backup"))?;

        assert_eq!(mailer.message().to, vec![Address::bare("jane@doe.com")]);
        assert_eq!(mailer.message().subject.as_deref(), Some("Still here"));

        mailer.send_raw("Hi").await?;

        Ok(())
    }

    #[test]
    fn test_connection_switch_to_unknown_entry_fails() -> TestResult {
        let mut mailer = Mailer::with_config(None, memory_config())?;

        let result = mailer.connection(Some("sparkpost"));

        assert!(matches!(result, Err(MailError::MissingConfig(_))));

        Ok(())
    }
}
