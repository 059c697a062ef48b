//! Error taxonomy shared by every public operation.

use std::io;

/// Coarse classification of a [`LatexError`], used by the C API to pick a
/// return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Conversion,
    File,
    Existential,
}

/// Errors surfaced by rendering, conversion and configuration calls.
#[derive(Debug, thiserror::Error)]
pub enum LatexError {
    /// The typesetting library rejected the markup, or the generated call
    /// script was malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The headless renderer reported an error (or an escalated warning), or
    /// produced no usable output.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A stylesheet, temporary document or output file could not be read or
    /// written.
    #[error("{context}: {source}")]
    File {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The engine cannot function: the typesetting library is missing, failed
    /// to load, or the engine was moved out of.
    #[error("engine unavailable: {0}")]
    Existential(String),
}

impl LatexError {
    pub(crate) fn file(context: impl Into<String>, source: io::Error) -> Self {
        Self::File {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::File { .. } => ErrorKind::File,
            Self::Existential(_) => ErrorKind::Existential,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LatexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_keeps_context_and_source() {
        let err = LatexError::file(
            "could not read stylesheet 'x.css'",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::File);
        let text = err.to_string();
        assert!(text.contains("x.css"));
        assert!(text.contains("gone"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn kinds_match_variants() {
        assert_eq!(LatexError::Parse("p".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            LatexError::Conversion("c".into()).kind(),
            ErrorKind::Conversion
        );
        assert_eq!(
            LatexError::Existential("e".into()).kind(),
            ErrorKind::Existential
        );
    }
}
