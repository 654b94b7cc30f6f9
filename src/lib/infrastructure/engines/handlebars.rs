//! Handlebars render engine

use handlebars::Handlebars;

use crate::domain::templates::{
    engine::{ContentBundle, RenderEngine},
    errors::TemplateError,
    resolver::TemplateResolver,
};

/// Render engine compiling templates with the Handlebars syntax.
#[derive(Debug, Clone)]
pub struct HandlebarsEngine {
    resolver: TemplateResolver,
}

impl HandlebarsEngine {
    /// File extension of Handlebars template files.
    pub const EXTENSION: &'static str = "hbs";

    /// Creates an engine loading templates from the `views` directory.
    pub fn new(views: Option<&str>) -> Self {
        Self {
            resolver: TemplateResolver::new(views, Self::EXTENSION),
        }
    }
}

impl RenderEngine for HandlebarsEngine {
    fn render(
        &self,
        view: &str,
        data: &serde_json::Value,
    ) -> Result<ContentBundle, TemplateError> {
        let raw = self.resolver.content(view);
        let registry = Handlebars::new();

        let mut compile = |source: String| {
            registry
                .render_template(&source, data)
                .map_err(|e| TemplateError::Render {
                    view: view.to_string(),
                    source: e.into(),
                })
        };

        Ok(ContentBundle {
            html: raw.html.map(&mut compile).transpose()?,
            text: raw.text.map(&mut compile).transpose()?,
            watch_html: raw.watch_html.map(&mut compile).transpose()?,
        })
    }
}
