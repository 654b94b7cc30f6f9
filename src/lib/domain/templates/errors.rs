//! Template errors

use thiserror::Error;

/// Errors raised while selecting a render engine or rendering a view.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The configured view engine is not one of the supported engines
    #[error("unsupported view engine `{0}`, expected one of: handlebars, minijinja")]
    UnsupportedEngine(String),

    /// A template file was found but could not be compiled or rendered
    #[error("failed to render view `{view}`")]
    Render {
        /// Name of the view being rendered
        view: String,
        /// Underlying engine error
        #[source]
        source: anyhow::Error,
    },
}
