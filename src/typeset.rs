//! TypesetRunner – turns markup into a generated library call, runs it inside
//! an [`Engine`] and maps script exceptions onto [`LatexError::Parse`].
//!
//! The markup is spliced into a single-quoted script string literal, where a
//! backslash is itself an escape character, so every backslash in the markup
//! is doubled first:
//!
//! ```text
//! \frac{1}{2}  →  katex.renderToString('\\frac{1}{2}');
//! ```

use crate::engine::Engine;
use crate::error::{LatexError, Result};

/// Library function invoked for every render.
pub const ENTRY_POINT: &str = "katex.renderToString";

/// Width of the label (`"ParseError: "`) that prefixes library exceptions.
pub const EXCEPTION_LABEL_WIDTH: usize = 12;

/// Double every backslash; leave everything else alone.
///
/// Not idempotent: escaping twice yields four backslashes per original one.
pub fn escape(markup: &str) -> String {
    markup.replace('\\', "\\\\")
}

/// Build the script that renders `markup`.
pub fn render_call(markup: &str) -> String {
    format!("{ENTRY_POINT}('{}');", escape(markup))
}

/// Drop the fixed-width exception label. Messages no longer than the label
/// are returned whole.
pub fn strip_exception_label(message: &str) -> &str {
    match message.char_indices().nth(EXCEPTION_LABEL_WIDTH) {
        Some((offset, _)) => &message[offset..],
        None => message,
    }
}

/// Runs generated render calls against an owned engine.
#[derive(Debug, Default)]
pub struct TypesetRunner {
    engine: Engine,
}

impl TypesetRunner {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Render `markup` to an HTML fragment.
    pub fn run(&self, markup: &str) -> Result<String> {
        let source = render_call(markup);
        log::trace!("typesetting: {source}");
        self.engine
            .eval(&source)?
            .map_err(|e| LatexError::Parse(strip_exception_label(&e.message).to_string()))
    }
}
