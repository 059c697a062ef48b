//! ImageConverter – drives a headless HTML renderer against a generated
//! document and turns its callback diagnostics into [`LatexError`]s.
//!
//! A single conversion goes through these stages, with no retries:
//!
//! 1. write the document to a unique temporary file,
//! 2. build the [`ConverterSettings`] record and install callbacks according
//!    to the [`WarningBehavior`],
//! 3. run the backend into a staging file next to the output,
//! 4. check what the callbacks recorded and what the backend returned,
//! 5. verify and move the staged image over the output path.
//!
//! Temporary files are removed on every exit path because they are owned by
//! [`tempfile::NamedTempFile`] guards.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::config::WarningBehavior;
use crate::error::{LatexError, Result};
use crate::wkhtml::WkHtmlToImage;

/// Output formats the renderer is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpg,
    Svg,
}

impl ImageFormat {
    /// The renderer's name for the format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Svg => "svg",
        }
    }

    /// Guess the format from a file extension (case-insensitive).
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpg),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Matching decoder format for raster outputs.
    fn raster(self) -> Option<image::ImageFormat> {
        match self {
            Self::Png => Some(image::ImageFormat::Png),
            Self::Jpg => Some(image::ImageFormat::Jpeg),
            Self::Svg => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "svg" => Ok(Self::Svg),
            other => Err(format!("unknown image format '{other}'")),
        }
    }
}

/// Settings record handed to the renderer. Serialises to the renderer's
/// global-setting keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverterSettings {
    #[serde(rename = "in")]
    pub input: PathBuf,
    #[serde(rename = "out")]
    pub output: PathBuf,
    #[serde(rename = "fmt")]
    pub format: ImageFormat,
    pub transparent: bool,
    /// `0` lets the renderer pick the width.
    #[serde(rename = "screenWidth")]
    pub screen_width: u32,
    /// 0–100.
    pub quality: u8,
}

impl ConverterSettings {
    /// Settings with the fixed defaults: opaque background, automatic
    /// screen width, maximum quality.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            format,
            transparent: false,
            screen_width: 0,
            quality: 100,
        }
    }

    /// Key/value pairs in the renderer's global-setting vocabulary.
    pub fn global_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("transparent", self.transparent.to_string()),
            ("in", self.input.display().to_string()),
            ("out", self.output.display().to_string()),
            ("fmt", self.format.as_str().to_string()),
            ("screenWidth", self.screen_width.to_string()),
            ("quality", self.quality.to_string()),
        ]
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

type MessageCallback<'a> = Box<dyn FnMut(&str) + 'a>;

/// Callbacks a backend reports diagnostics through.
///
/// The callbacks never unwind into the backend: they only record, and the
/// converter inspects what was recorded after the backend returns.
#[derive(Default)]
pub struct ConverterHooks<'a> {
    on_error: Option<MessageCallback<'a>>,
    on_warning: Option<MessageCallback<'a>>,
}

impl<'a> ConverterHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_error_callback(&mut self, callback: impl FnMut(&str) + 'a) {
        self.on_error = Some(Box::new(callback));
    }

    pub fn set_warning_callback(&mut self, callback: impl FnMut(&str) + 'a) {
        self.on_warning = Some(Box::new(callback));
    }

    pub fn has_warning_callback(&self) -> bool {
        self.on_warning.is_some()
    }

    /// Report an error. Ignored if no error callback is installed.
    pub fn error(&mut self, message: &str) {
        if let Some(cb) = self.on_error.as_mut() {
            cb(message);
        }
    }

    /// Report a warning. Ignored if no warning callback is installed.
    pub fn warning(&mut self, message: &str) {
        if let Some(cb) = self.on_warning.as_mut() {
            cb(message);
        }
    }
}

/// A headless HTML → image renderer.
pub trait RenderBackend: Send + Sync {
    /// Render `settings.input` into `settings.output`. Diagnostics go through
    /// `hooks`; the return value says whether the render succeeded.
    fn convert(&self, settings: &ConverterSettings, hooks: &mut ConverterHooks<'_>) -> bool;

    fn name(&self) -> &str {
        "renderer"
    }
}

/// Where renderer warnings go under [`WarningBehavior::Log`].
pub trait DiagnosticSink: Send + Sync {
    fn warning(&self, message: &str);
}

/// Forwards warnings to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn warning(&self, message: &str) {
        log::warn!(target: "latex_forge::convert", "{message}");
    }
}

/// Keeps warnings in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn warning(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// Runs documents through a [`RenderBackend`].
#[derive(Clone)]
pub struct ImageConverter {
    backend: Arc<dyn RenderBackend>,
    sink: Arc<dyn DiagnosticSink>,
    temp_dir: Option<PathBuf>,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new(Arc::new(WkHtmlToImage::default()))
    }
}

impl fmt::Debug for ImageConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageConverter")
            .field("backend", &self.backend.name())
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl ImageConverter {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            backend,
            sink: Arc::new(LogSink),
            temp_dir: None,
        }
    }

    pub fn set_backend(&mut self, backend: Arc<dyn RenderBackend>) {
        self.backend = backend;
    }

    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    /// Directory for temporary documents; the system temp dir when unset.
    pub fn set_temp_dir(&mut self, dir: Option<PathBuf>) {
        self.temp_dir = dir;
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// Render `document` to an image at `output`.
    ///
    /// On failure `output` is left as it was.
    pub fn convert(
        &self,
        document: &str,
        output: &Path,
        format: ImageFormat,
        behavior: WarningBehavior,
    ) -> Result<()> {
        let temp = self.write_document(document)?;

        let staged = staging_file(output, format)?;
        let settings = ConverterSettings::new(temp.path(), staged.path(), format);
        log::debug!("{} settings: {}", self.backend.name(), settings.to_json());

        let pending: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let ok = {
            let mut hooks = ConverterHooks::new();
            hooks.set_error_callback(|m| pending.borrow_mut().push(m.to_string()));
            match behavior {
                WarningBehavior::Strict => {
                    hooks.set_warning_callback(|m| pending.borrow_mut().push(m.to_string()))
                }
                WarningBehavior::Log => {
                    let sink = &*self.sink;
                    hooks.set_warning_callback(move |m| sink.warning(m))
                }
                WarningBehavior::Ignore => {}
            }
            self.backend.convert(&settings, &mut hooks)
        };

        if let Some(message) = pending.into_inner().into_iter().next() {
            return Err(LatexError::Conversion(message));
        }
        if !ok {
            return Err(LatexError::Conversion(format!(
                "could not convert to {format}"
            )));
        }

        verify_output(staged.path(), format)?;
        if let Ok(existing) = fs::metadata(output) {
            fs::set_permissions(staged.path(), existing.permissions()).map_err(|e| {
                LatexError::file(
                    format!("could not set permissions on '{}'", staged.path().display()),
                    e,
                )
            })?;
        }
        staged.persist(output).map_err(|e| {
            LatexError::file(format!("could not write '{}'", output.display()), e.error)
        })?;
        log::debug!("wrote {format} image to '{}'", output.display());
        Ok(())
    }

    fn write_document(&self, document: &str) -> Result<tempfile::NamedTempFile> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("latex-").suffix(".html");
            b
        };
        let created = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut temp = created
            .map_err(|e| LatexError::file("could not create temporary document", e))?;
        temp.write_all(document.as_bytes())
            .and_then(|_| temp.flush())
            .map_err(|e| {
                LatexError::file(
                    format!("could not write '{}'", temp.path().display()),
                    e,
                )
            })?;
        Ok(temp)
    }
}

/// Empty file beside `output` that the backend renders into. It is created
/// with the same mode a plainly created file would get (0666 minus umask).
fn staging_file(output: &Path, format: ImageFormat) -> Result<tempfile::NamedTempFile> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let suffix = format!(".{format}");
    let mut builder = tempfile::Builder::new();
    builder.prefix(".latex-").suffix(&suffix);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
        .tempfile_in(dir)
        .map_err(|e| {
            LatexError::file(
                format!("could not stage output in '{}'", dir.display()),
                e,
            )
        })
}

fn verify_output(path: &Path, format: ImageFormat) -> Result<()> {
    let len = fs::metadata(path)
        .map_err(|e| LatexError::file(format!("could not inspect '{}'", path.display()), e))?
        .len();
    if len == 0 {
        return Err(LatexError::Conversion("renderer produced no output".to_string()));
    }

    if let Some(expected) = format.raster() {
        let reader = image::ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| LatexError::file(format!("could not read '{}'", path.display()), e))?;
        if reader.format() != Some(expected) {
            return Err(LatexError::Conversion(format!(
                "renderer output is not a {format} image"
            )));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| LatexError::Conversion(format!("unreadable {format} output: {e}")))?;
        log::debug!("{format} output is {width}x{height}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(ImageFormat::Png.as_str(), "png");
        assert_eq!(ImageFormat::Jpg.as_str(), "jpg");
        assert_eq!(ImageFormat::Svg.as_str(), "svg");
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpg);
        assert!("gif".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ImageFormat::from_extension("a/b.PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("x.jpeg"), Some(ImageFormat::Jpg));
        assert_eq!(ImageFormat::from_extension("x.svg"), Some(ImageFormat::Svg));
        assert_eq!(ImageFormat::from_extension("x.html"), None);
        assert_eq!(ImageFormat::from_extension("noext"), None);
    }

    #[test]
    fn settings_defaults_and_keys() {
        let s = ConverterSettings::new("in.html", "out.png", ImageFormat::Png);
        assert!(!s.transparent);
        assert_eq!(s.screen_width, 0);
        assert_eq!(s.quality, 100);

        let pairs = s.global_settings();
        assert!(pairs.contains(&("fmt", "png".to_string())));
        assert!(pairs.contains(&("in", "in.html".to_string())));
        assert!(pairs.contains(&("screenWidth", "0".to_string())));

        let json: serde_json::Value = serde_json::from_str(&s.to_json()).unwrap();
        assert_eq!(json["fmt"], "png");
        assert_eq!(json["out"], "out.png");
        assert_eq!(json["quality"], 100);
    }

    #[test]
    fn hooks_without_callbacks_are_silent() {
        let mut hooks = ConverterHooks::new();
        hooks.error("e");
        hooks.warning("w");
        assert!(!hooks.has_warning_callback());
    }

    #[test]
    fn hooks_route_to_callbacks() {
        let seen = RefCell::new(Vec::new());
        {
            let mut hooks = ConverterHooks::new();
            hooks.set_error_callback(|m| seen.borrow_mut().push(format!("E {m}")));
            hooks.set_warning_callback(|m| seen.borrow_mut().push(format!("W {m}")));
            hooks.warning("slow");
            hooks.error("broken");
        }
        assert_eq!(seen.into_inner(), vec!["W slow", "E broken"]);
    }

    #[test]
    fn memory_sink_records() {
        let sink = MemorySink::new();
        sink.warning("one");
        sink.warning("two");
        assert_eq!(sink.messages(), vec!["one", "two"]);
    }

    #[test]
    fn staging_file_sits_next_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("eq.png");
        let staged = staging_file(&out, ImageFormat::Png).unwrap();
        assert_eq!(staged.path().parent(), Some(dir.path()));
        assert!(staged.path().to_string_lossy().ends_with(".png"));
    }

    #[test]
    fn empty_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            verify_output(&path, ImageFormat::Svg),
            Err(LatexError::Conversion(_))
        ));
    }

    #[test]
    fn wrong_raster_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        fs::write(&path, "<svg xmlns='http://www.w3.org/2000/svg'/>").unwrap();
        assert!(matches!(
            verify_output(&path, ImageFormat::Png),
            Err(LatexError::Conversion(_))
        ));
    }
}
