//! Config – stylesheet, user CSS and the warning-escalation policy.
//!
//! Pure data: the composer reads the CSS, the image converter reads the
//! warning policy.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LatexError, Result};

/// How warnings emitted by the headless renderer are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningBehavior {
    /// Warnings fail the conversion exactly like errors.
    Strict,
    /// Warnings are dropped.
    Ignore,
    /// Warnings go to the diagnostic sink; the conversion carries on.
    #[default]
    Log,
}

impl fmt::Display for WarningBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::Ignore => "ignore",
            Self::Log => "log",
        })
    }
}

impl FromStr for WarningBehavior {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "ignore" => Ok(Self::Ignore),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown warning behavior '{other}'")),
        }
    }
}

/// Styling and policy shared by the composer and the converter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the stylesheet whose text is inlined into documents. Empty
    /// means no stylesheet.
    #[serde(default)]
    stylesheet_path: PathBuf,
    /// Cached text of `stylesheet_path`.
    #[serde(skip)]
    stylesheet_content: String,
    /// Extra CSS appended after the stylesheet.
    #[serde(default)]
    additional_css: String,
    #[serde(default)]
    warning_behavior: WarningBehavior,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Config::set_stylesheet`].
    pub fn with_stylesheet(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.set_stylesheet(path)?;
        Ok(self)
    }

    /// Builder form of [`Config::set_warning_behavior`].
    pub fn with_warning_behavior(mut self, behavior: WarningBehavior) -> Self {
        self.warning_behavior = behavior;
        self
    }

    /// Read `path` and cache its text. On failure nothing changes.
    pub fn set_stylesheet(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LatexError::file(
                format!("could not read stylesheet '{}'", path.display()),
                e,
            )
        })?;
        log::debug!(
            "loaded stylesheet '{}' ({} bytes)",
            path.display(),
            content.len()
        );
        self.stylesheet_path = path.to_path_buf();
        self.stylesheet_content = content;
        Ok(())
    }

    pub fn stylesheet_path(&self) -> &Path {
        &self.stylesheet_path
    }

    pub fn stylesheet_content(&self) -> &str {
        &self.stylesheet_content
    }

    pub fn add_css(&mut self, css: &str) {
        self.additional_css.push_str(css);
    }

    pub fn additional_css(&self) -> &str {
        &self.additional_css
    }

    pub fn clear_css(&mut self) {
        self.additional_css.clear();
    }

    pub fn warning_behavior(&self) -> WarningBehavior {
        self.warning_behavior
    }

    pub fn set_warning_behavior(&mut self, behavior: WarningBehavior) {
        self.warning_behavior = behavior;
    }

    /// Serialise to JSON. The stylesheet is stored by path only.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON and load the referenced stylesheet, if any.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(json).map_err(|e| {
            LatexError::file(
                "invalid config JSON",
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        if !config.stylesheet_path.as_os_str().is_empty() {
            let path = std::mem::take(&mut config.stylesheet_path);
            config.set_stylesheet(path)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stylesheet(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".css").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.stylesheet_path(), Path::new(""));
        assert_eq!(config.stylesheet_content(), "");
        assert_eq!(config.additional_css(), "");
        assert_eq!(config.warning_behavior(), WarningBehavior::Log);
    }

    #[test]
    fn set_stylesheet_caches_content() {
        let css = stylesheet(".katex { font-size: 1.21em; }\n");
        let mut config = Config::new();
        config.set_stylesheet(css.path()).unwrap();
        assert_eq!(config.stylesheet_path(), css.path());
        assert_eq!(config.stylesheet_content(), ".katex { font-size: 1.21em; }\n");
    }

    #[test]
    fn failed_read_keeps_previous_stylesheet() {
        let css = stylesheet("body { margin: 0; }");
        let mut config = Config::new();
        config.set_stylesheet(css.path()).unwrap();

        let err = config
            .set_stylesheet("/definitely/not/here.css")
            .unwrap_err();
        assert!(matches!(err, LatexError::File { .. }));
        assert_eq!(config.stylesheet_path(), css.path());
        assert_eq!(config.stylesheet_content(), "body { margin: 0; }");
    }

    #[test]
    fn css_appends_and_clears() {
        let mut config = Config::new();
        config.add_css(".a { color: red; }");
        config.add_css(".b { color: blue; }");
        assert_eq!(config.additional_css(), ".a { color: red; }.b { color: blue; }");
        config.clear_css();
        assert_eq!(config.additional_css(), "");
    }

    #[test]
    fn warning_behavior_parses_and_prints() {
        for b in [WarningBehavior::Strict, WarningBehavior::Ignore, WarningBehavior::Log] {
            assert_eq!(b.to_string().parse::<WarningBehavior>().unwrap(), b);
        }
        assert_eq!("STRICT".parse::<WarningBehavior>().unwrap(), WarningBehavior::Strict);
        assert!("loud".parse::<WarningBehavior>().is_err());
    }

    #[test]
    fn json_roundtrip_reloads_stylesheet() {
        let css = stylesheet(".katex { color: green; }");
        let mut config = Config::new()
            .with_stylesheet(css.path())
            .unwrap()
            .with_warning_behavior(WarningBehavior::Strict);
        config.add_css("p { margin: 0; }");

        let json = config.to_json();
        assert!(json.contains("\"strict\""));
        assert!(!json.contains("color: green"));

        let restored = Config::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn json_with_missing_stylesheet_fails() {
        let json = r#"{ "stylesheet_path": "/nope/katex.css" }"#;
        assert!(matches!(
            Config::from_json(json),
            Err(LatexError::File { .. })
        ));
    }

    #[test]
    fn json_fields_are_optional() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
