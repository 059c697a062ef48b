//! The public façade: one engine, its styling config and an image converter.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compose::HtmlComposer;
use crate::config::{Config, WarningBehavior};
use crate::convert::{DiagnosticSink, ImageConverter, ImageFormat, RenderBackend};
use crate::engine::Engine;
use crate::error::{LatexError, Result};
use crate::typeset::TypesetRunner;

/// Renders LaTeX math to HTML fragments, HTML documents and images.
///
/// A `Latex` is not meant to be shared between threads without external
/// locking; give each worker its own instance instead (see
/// [`Latex::try_clone`]).
#[derive(Debug, Default)]
pub struct Latex {
    runner: TypesetRunner,
    config: Config,
    converter: ImageConverter,
}

impl Latex {
    /// Load `library_source` (the KaTeX bundle) with an empty config.
    pub fn new(library_source: impl Into<Arc<str>>) -> Result<Self> {
        Self::with_config(library_source, Config::default())
    }

    pub fn with_config(library_source: impl Into<Arc<str>>, config: Config) -> Result<Self> {
        let engine = Engine::new(library_source)?;
        Ok(Self {
            runner: TypesetRunner::new(engine),
            config,
            converter: ImageConverter::default(),
        })
    }

    /// Load the library from `library_path` and the stylesheet from
    /// `stylesheet_path`.
    pub fn from_files(
        library_path: impl AsRef<Path>,
        stylesheet_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let library_path = library_path.as_ref();
        let source = fs::read_to_string(library_path).map_err(|e| {
            LatexError::Existential(format!(
                "could not read typesetting library '{}': {e}",
                library_path.display()
            ))
        })?;
        let config = Config::new().with_stylesheet(stylesheet_path)?;
        Self::with_config(source, config)
    }

    /// Deep copy: reloads the library into a new engine and copies the
    /// config. The converter backend and sink are shared.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            runner: TypesetRunner::new(self.runner.engine().try_clone()?),
            config: self.config.clone(),
            converter: self.converter.clone(),
        })
    }

    /// Exchange engines, configs and converters.
    pub fn swap(&mut self, other: &mut Latex) {
        std::mem::swap(self, other);
    }

    /// Move everything out, leaving an instance equal to
    /// [`Latex::default()`] behind.
    pub fn take(&mut self) -> Latex {
        std::mem::take(self)
    }

    /// Whether the typesetting library is loaded.
    pub fn is_loaded(&self) -> bool {
        self.runner.engine().is_loaded()
    }

    fn composer(&self) -> HtmlComposer<'_> {
        HtmlComposer::new(&self.runner, &self.config)
    }

    // ── Rendering ────────────────────────────────────────────────────────

    /// LaTeX → HTML fragment, ready to embed in a page that already has the
    /// KaTeX stylesheet.
    pub fn render_fragment(&self, latex: &str) -> Result<String> {
        self.composer().fragment(latex)
    }

    /// LaTeX → standalone HTML document with the stylesheet inlined.
    pub fn render_document(&self, latex: &str) -> Result<String> {
        self.composer().document(latex)
    }

    /// LaTeX → image file at `path`.
    ///
    /// The markup is typeset before anything touches the filesystem, so a
    /// parse error never leaves files behind.
    pub fn render_image(
        &self,
        latex: &str,
        path: impl AsRef<Path>,
        format: ImageFormat,
    ) -> Result<()> {
        let document = self.render_document(latex)?;
        self.converter.convert(
            &document,
            path.as_ref(),
            format,
            self.config.warning_behavior(),
        )
    }

    pub fn png(&self, latex: &str, path: impl AsRef<Path>) -> Result<()> {
        self.render_image(latex, path, ImageFormat::Png)
    }

    pub fn jpg(&self, latex: &str, path: impl AsRef<Path>) -> Result<()> {
        self.render_image(latex, path, ImageFormat::Jpg)
    }

    pub fn svg(&self, latex: &str, path: impl AsRef<Path>) -> Result<()> {
        self.render_image(latex, path, ImageFormat::Svg)
    }

    // ── Styling ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_stylesheet(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.config.set_stylesheet(path)
    }

    pub fn stylesheet_path(&self) -> &Path {
        self.config.stylesheet_path()
    }

    pub fn stylesheet_content(&self) -> &str {
        self.config.stylesheet_content()
    }

    pub fn add_css(&mut self, css: &str) {
        self.config.add_css(css);
    }

    pub fn additional_css(&self) -> &str {
        self.config.additional_css()
    }

    pub fn clear_css(&mut self) {
        self.config.clear_css();
    }

    pub fn warning_behavior(&self) -> WarningBehavior {
        self.config.warning_behavior()
    }

    pub fn set_warning_behavior(&mut self, behavior: WarningBehavior) {
        self.config.set_warning_behavior(behavior);
    }

    // ── Conversion plumbing ──────────────────────────────────────────────

    pub fn set_backend(&mut self, backend: Arc<dyn RenderBackend>) {
        self.converter.set_backend(backend);
    }

    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.converter.set_diagnostic_sink(sink);
    }

    pub fn set_temp_dir(&mut self, dir: Option<PathBuf>) {
        self.converter.set_temp_dir(dir);
    }
}
