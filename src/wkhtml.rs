//! Backend that shells out to the `wkhtmltoimage` executable.
//!
//! Diagnostics arrive on stderr as `Warning: …` / `Error: …` lines and are
//! forwarded to the matching hook. Progress output is only traced.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::convert::{ConverterHooks, ConverterSettings, RenderBackend};

/// Default executable name, looked up on `PATH`.
pub const DEFAULT_BINARY: &str = "wkhtmltoimage";

#[derive(Debug, Clone)]
pub struct WkHtmlToImage {
    binary: PathBuf,
    extra_args: Vec<OsString>,
}

impl Default for WkHtmlToImage {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl WkHtmlToImage {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Append raw arguments, placed before the input/output paths.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command-line arguments for `settings`, translated from its
    /// global-setting pairs. Input and output paths go last.
    pub fn arguments(&self, settings: &ConverterSettings) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for (key, value) in settings.global_settings() {
            match key {
                "fmt" => args.extend([OsString::from("--format"), value.into()]),
                "quality" => args.extend([OsString::from("--quality"), value.into()]),
                "transparent" if value == "true" => args.push("--transparent".into()),
                "screenWidth" if value != "0" => {
                    args.extend([OsString::from("--width"), value.into()])
                }
                _ => {}
            }
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(settings.input.clone().into_os_string());
        args.push(settings.output.clone().into_os_string());
        args
    }
}

/// Route one stderr line to the right hook.
fn dispatch(line: &str, hooks: &mut ConverterHooks<'_>) {
    let line = line.trim();
    if let Some(msg) = line.strip_prefix("Warning:") {
        hooks.warning(msg.trim());
    } else if let Some(msg) = line.strip_prefix("Error:") {
        hooks.error(msg.trim());
    } else if !line.is_empty() {
        log::trace!("wkhtmltoimage: {line}");
    }
}

impl RenderBackend for WkHtmlToImage {
    fn convert(&self, settings: &ConverterSettings, hooks: &mut ConverterHooks<'_>) -> bool {
        let output = match Command::new(&self.binary)
            .args(self.arguments(settings))
            .output()
        {
            Ok(o) => o,
            Err(e) => {
                hooks.error(&format!(
                    "could not launch '{}': {e}",
                    self.binary.display()
                ));
                return false;
            }
        };

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            dispatch(line, hooks);
        }

        if !output.status.success() {
            log::debug!("wkhtmltoimage exited with {}", output.status);
            return false;
        }
        true
    }

    fn name(&self) -> &str {
        "wkhtmltoimage"
    }
}
