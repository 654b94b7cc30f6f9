//! MiniJinja render engine

use minijinja::Environment;

use crate::domain::templates::{
    engine::{ContentBundle, RenderEngine},
    errors::TemplateError,
    resolver::TemplateResolver,
};

/// Render engine compiling templates with the Jinja2 syntax.
#[derive(Debug, Clone)]
pub struct MiniJinjaEngine {
    resolver: TemplateResolver,
}

impl MiniJinjaEngine {
    /// File extension of MiniJinja template files.
    pub const EXTENSION: &'static str = "j2";

    /// Creates an engine loading templates from the `views` directory.
    pub fn new(views: Option<&str>) -> Self {
        Self {
            resolver: TemplateResolver::new(views, Self::EXTENSION),
        }
    }
}

impl RenderEngine for MiniJinjaEngine {
    fn render(
        &self,
        view: &str,
        data: &serde_json::Value,
    ) -> Result<ContentBundle, TemplateError> {
        let raw = self.resolver.content(view);
        let environment = Environment::new();

        let mut compile = |source: String| {
            environment
                .render_str(&source, data)
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
