//! Render engine capability

use crate::domain::templates::errors::TemplateError;

/// The three body variants a single render can produce.
///
/// `None` marks a variant whose template file does not exist; a mail may
/// legitimately ship with only an HTML body or only a text body. A bundle
/// is produced fresh on every render and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBundle {
    /// Rendered HTML body
    pub html: Option<String>,

    /// Rendered plain text body
    pub text: Option<String>,

    /// Rendered Apple Watch HTML body
    pub watch_html: Option<String>,
}

impl ContentBundle {
    /// Returns true when no variant is present.
    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.text.is_none() && self.watch_html.is_none()
    }
}

/// A pluggable engine compiling a named view plus a data object into body
/// content.
///
/// Implementations must not fail for a missing template file (the variant
/// simply stays absent) but must propagate compile and render errors.
pub trait RenderEngine: Send + Sync {
    /// Renders the view named `view` against `data`.
    fn render(&self, view: &str, data: &serde_json::Value)
        -> Result<ContentBundle, TemplateError>;
}
