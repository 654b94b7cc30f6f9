//! Template resolution

use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::domain::templates::engine::ContentBundle;

/// Default directory holding mail templates when `views` is not configured.
pub const DEFAULT_VIEWS_DIR: &str = "mails";

/// Locates and loads the raw template files for a view.
///
/// Shared by every render engine: the engine contributes only its file
/// extension and its compile step. A view `welcome` with the `hbs`
/// extension resolves to `<cwd>/<views>/welcome/welcome.<kind>.hbs` for
/// each body kind.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    views: String,
    extension: &'static str,
}

impl TemplateResolver {
    /// Creates a resolver rooted at `views` (the default `mails` directory
    /// when `None`) for template files with `extension`.
    pub fn new(views: Option<&str>, extension: &'static str) -> Self {
        Self {
            views: views.unwrap_or(DEFAULT_VIEWS_DIR).to_string(),
            extension,
        }
    }

    /// Resolves the directory of `view` under the process working
    /// directory. A pure path join, no filesystem check.
    pub fn views_path(&self, view: &str) -> PathBuf {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&self.views)
            .join(view)
    }

    /// Loads the raw template content of every body kind of `view`.
    ///
    /// A kind whose file cannot be read resolves to `None` rather than an
    /// error; template variants are optional.
    pub fn content(&self, view: &str) -> ContentBundle {
        ContentBundle {
            html: self.file_content(view, "html"),
            text: self.file_content(view, "text"),
            watch_html: self.file_content(view, "watch-html"),
        }
    }

    fn file_content(&self, view: &str, kind: &str) -> Option<String> {
        let path = self
            .views_path(view)
            .join(format!("{view}.{kind}.{ext}", ext = self.extension));

        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(_) => {
                debug!(path = %path.display(), "template variant not found, skipping");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_views_path_defaults_to_mails_directory() -> TestResult {
        let resolver = TemplateResolver::new(None, "hbs");

        assert_eq!(
            resolver.views_path("confirm-email"),
            env::current_dir()?.join("mails").join("confirm-email")
        );

        Ok(())
    }

    #[test]
    fn test_views_path_honors_configured_directory() -> TestResult {
        let resolver = TemplateResolver::new(Some("server/mails"), "hbs");

        assert_eq!(
            resolver.views_path("confirm-email"),
            env::current_dir()?
                .join("server/mails")
                .join("confirm-email")
        );

        Ok(())
    }

    #[test]
    fn test_content_reads_every_present_kind() -> TestResult {
        let dir = tempfile::tempdir()?;
        let view_dir = dir.path().join("confirm-email");
        fs::create_dir_all(&view_dir)?;

        fs::write(view_dir.join("confirm-email.html.hbs"), "<p>{{name}}</p>")?;
        fs::write(view_dir.join("confirm-email.text.hbs"), "{{name}}")?;
        fs::write(view_dir.join("confirm-email.watch-html.hbs"), "<b>{{name}}</b>")?;

        let resolver =
            TemplateResolver::new(Some(dir.path().to_str().expect("utf-8 path")), "hbs");
        let bundle = resolver.content("confirm-email");

        assert_eq!(bundle.html.as_deref(), Some("<p>{{name}}</p>"));
        assert_eq!(bundle.text.as_deref(), Some("{{name}}"));
        assert_eq!(bundle.watch_html.as_deref(), Some("<b>{{name}}</b>"));

        Ok(())
    }

    #[test]
    fn test_content_gracefully_skips_missing_variants() -> TestResult {
        let dir = tempfile::tempdir()?;
        let view_dir = dir.path().join("payment-received");
        fs::create_dir_all(&view_dir)?;

        fs::write(view_dir.join("payment-received.html.hbs"), "<p>Thanks</p>")?;

        let resolver =
            TemplateResolver::new(Some(dir.path().to_str().expect("utf-8 path")), "hbs");
        let bundle = resolver.content("payment-received");

        assert_eq!(bundle.html.as_deref(), Some("<p>Thanks</p>"));
        assert_eq!(bundle.text, None);
        assert_eq!(bundle.watch_html, None);

        Ok(())
    }

    #[test]
    fn test_content_of_unknown_view_is_empty() {
        let resolver = TemplateResolver::new(Some("does/not/exist"), "hbs");

        assert!(resolver.content("missing").is_empty());
    }
}
