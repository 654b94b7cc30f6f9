//! Render engine implementations.

mod handlebars;
mod minijinja;

pub use self::handlebars::HandlebarsEngine;
pub use self::minijinja::MiniJinjaEngine;

use crate::domain::{
    mail::config::MailConfig,
    templates::{engine::RenderEngine, errors::TemplateError},
};

/// Names of the supported render engines.
pub const SUPPORTED_ENGINES: [&str; 2] = ["handlebars", "minijinja"];

/// Selects and constructs the render engine named by `view_engine`.
///
/// Runs at mailer construction so a misconfigured engine fails before any
/// message is composed.
pub fn for_config(config: &MailConfig) -> Result<Box<dyn RenderEngine>, TemplateError> {
    let views = config.views.as_deref();

    match config.view_engine.as_deref() {
        Some("handlebars") => Ok(Box::new(HandlebarsEngine::new(views))),
        Some("minijinja") => Ok(Box::new(MiniJinjaEngine::new(views))),
        other => Err(TemplateError::UnsupportedEngine(
            other.unwrap_or_default().to_string(),
        )),
    }
}
