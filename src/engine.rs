//! Engine – one QuickJS runtime + context with the typesetting library loaded.
//!
//! An engine owns its runtime (and the runtime's allocator) exclusively and
//! holds a [`PlatformHandle`] for as long as it lives. Copies are deep: the
//! library is evaluated again in a brand-new runtime. Moves go through
//! [`Engine::swap`] / [`Engine::take`], which leave the source equal to
//! [`Engine::default()`].

use std::fmt;
use std::sync::Arc;

use rquickjs::allocator::RustAllocator;
use rquickjs::convert::Coerced;
use rquickjs::{Context, Ctx, Runtime, Value};

use crate::error::{LatexError, Result};
use crate::platform::{self, PlatformHandle};

/// A script-level exception, stringified the way `String(e)` would render it
/// (`Name: message`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    pub message: String,
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Owns an execution context bound to one loaded copy of the library.
///
/// Field order matters: the context goes before the runtime, and both before
/// the platform handle.
#[derive(Default)]
pub struct Engine {
    context: Option<Context>,
    runtime: Option<Runtime>,
    library: Option<Arc<str>>,
    platform: Option<PlatformHandle>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("loaded", &self.is_loaded())
            .field("library_len", &self.library.as_ref().map(|l| l.len()))
            .finish()
    }
}

impl Engine {
    /// Bring up a runtime, bind a fresh global scope and evaluate
    /// `library_source` in it once.
    ///
    /// Any failure releases what was acquired so far (by dropping it) and is
    /// reported as [`LatexError::Existential`].
    pub fn new(library_source: impl Into<Arc<str>>) -> Result<Self> {
        Self::load(library_source.into())
    }

    fn load(library: Arc<str>) -> Result<Self> {
        let platform = platform::acquire();

        let runtime = Runtime::new_with_alloc(RustAllocator).map_err(|e| {
            LatexError::Existential(format!("could not create script runtime: {e}"))
        })?;
        platform.configure(&runtime);

        let context = Context::full(&runtime).map_err(|e| {
            LatexError::Existential(format!("could not create script context: {e}"))
        })?;

        context
            .with(|ctx| -> std::result::Result<(), ScriptException> {
                let loaded: rquickjs::Result<()> = ctx.eval(library.as_bytes());
                loaded.map_err(|e| exception(&ctx, e))
            })
            .map_err(|e| {
                LatexError::Existential(format!("typesetting library failed to load: {e}"))
            })?;

        log::debug!(
            "engine loaded typesetting library ({} bytes) on platform #{}",
            library.len(),
            platform.generation()
        );

        Ok(Self {
            context: Some(context),
            runtime: Some(runtime),
            library: Some(library),
            platform: Some(platform),
        })
    }

    /// Deep copy: a new runtime with the same library evaluated again.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.library {
            Some(library) => Self::load(Arc::clone(library)),
            None => Ok(Self::default()),
        }
    }

    /// Exchange all resources with `other`.
    pub fn swap(&mut self, other: &mut Engine) {
        std::mem::swap(self, other);
    }

    /// Move the resources out, leaving an unloaded engine behind.
    pub fn take(&mut self) -> Engine {
        std::mem::take(self)
    }

    /// Whether a context with the library is bound.
    pub fn is_loaded(&self) -> bool {
        self.context.is_some()
    }

    /// The library source this engine was loaded from.
    pub fn library_source(&self) -> Option<&str> {
        self.library.as_deref()
    }

    /// Compile and run `source` in the bound scope and stringify the result.
    ///
    /// The outer error is for an unloaded engine; the inner one carries a
    /// script exception.
    pub fn eval(&self, source: &str) -> Result<std::result::Result<String, ScriptException>> {
        let context = self.context.as_ref().ok_or_else(|| {
            LatexError::Existential("engine has no loaded typesetting library".to_string())
        })?;

        Ok(context.with(|ctx| -> std::result::Result<String, ScriptException> {
            let value: Value = ctx
                .eval(source.as_bytes())
                .map_err(|e| exception(&ctx, e))?;
            value
                .get::<Coerced<String>>()
                .map(|text| text.0)
                .map_err(|e| exception(&ctx, e))
        }))
    }

    /// Force a garbage-collection pass on the runtime.
    pub fn collect_garbage(&self) {
        if let Some(runtime) = &self.runtime {
            runtime.run_gc();
        }
    }
}

/// Turn an rquickjs error into a stringified exception, pulling the pending
/// exception value out of the context when there is one.
fn exception<'js>(ctx: &Ctx<'js>, error: rquickjs::Error) -> ScriptException {
    let message = if error.is_exception() {
        let caught = ctx.catch();
        match caught.get::<Coerced<String>>() {
            Ok(text) => text.0,
            Err(_) => error.to_string(),
        }
    } else {
        error.to_string()
    };
    ScriptException { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = "var lib = { twice: function (s) { return s + s; } };";

    #[test]
    fn evaluates_against_loaded_library() {
        let engine = Engine::new(LIBRARY).unwrap();
        assert!(engine.is_loaded());
        let out = engine.eval("lib.twice('ab');").unwrap().unwrap();
        assert_eq!(out, "abab");
    }

    #[test]
    fn non_string_results_are_stringified() {
        let engine = Engine::new(LIBRARY).unwrap();
        assert_eq!(engine.eval("1 + 2").unwrap().unwrap(), "3");
    }

    #[test]
    fn thrown_errors_are_stringified_with_their_name() {
        let engine = Engine::new(LIBRARY).unwrap();
        let err = engine
            .eval("throw new TypeError('bad input');")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.message, "TypeError: bad input");
    }

    #[test]
    fn syntax_errors_surface_as_exceptions() {
        let engine = Engine::new(LIBRARY).unwrap();
        let err = engine.eval("lib.twice('unterminated);").unwrap().unwrap_err();
        assert!(err.message.contains("SyntaxError"), "{}", err.message);
    }

    #[test]
    fn broken_library_fails_construction() {
        let err = Engine::new("var = ;").unwrap_err();
        assert!(matches!(err, LatexError::Existential(_)));

        let err = Engine::new("throw new Error('no katex here');").unwrap_err();
        assert!(err.to_string().contains("no katex here"));
    }

    #[test]
    fn clone_gets_independent_global_state() {
        let engine = Engine::new(LIBRARY).unwrap();
        engine.eval("var counter = 41;").unwrap().unwrap();

        let copy = engine.try_clone().unwrap();
        assert_eq!(copy.library_source(), Some(LIBRARY));
        // The copy re-evaluated the library but never saw `counter`.
        assert_eq!(copy.eval("typeof counter").unwrap().unwrap(), "undefined");
        assert_eq!(engine.eval("counter + 1").unwrap().unwrap(), "42");
    }

    #[test]
    fn take_leaves_an_unloaded_engine() {
        let mut engine = Engine::new(LIBRARY).unwrap();
        let moved = engine.take();
        assert!(moved.is_loaded());
        assert!(!engine.is_loaded());
        assert!(matches!(
            engine.eval("1"),
            Err(LatexError::Existential(_))
        ));
        assert!(!engine.try_clone().unwrap().is_loaded());
    }

    #[test]
    fn swap_exchanges_contexts() {
        let mut a = Engine::new(LIBRARY).unwrap();
        let mut b = Engine::default();
        a.eval("var marker = 'a';").unwrap().unwrap();
        a.swap(&mut b);
        assert!(!a.is_loaded());
        assert_eq!(b.eval("marker").unwrap().unwrap(), "a");
        b.collect_garbage();
    }
}
