//! # latex-forge – LaTeX math → HTML and images
//!
//! Math markup is typeset by the KaTeX JavaScript bundle running inside an
//! embedded QuickJS runtime; images are produced by a headless HTML renderer
//! (`wkhtmltoimage` by default). The stages are:
//!
//! 1. **Platform** – process-wide runtime state, counted across engines ([`platform`])
//! 2. **Engine** – one runtime + context with the library loaded ([`engine`])
//! 3. **Typeset** – escape markup, run the generated call, map exceptions ([`typeset`])
//! 4. **Compose** – wrap the fragment in a styled HTML document ([`compose`])
//! 5. **Convert** – render the document to PNG/JPG/SVG ([`convert`], [`wkhtml`])
//!
//! [`Latex`] ties the stages together. A C-compatible FFI surface is exposed
//! via the [`ffi`] module.

pub mod compose;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod latex;
pub mod platform;
pub mod samples;
pub mod typeset;
pub mod wkhtml;

// Re-exports for convenience
pub use config::{Config, WarningBehavior};
pub use convert::{ImageFormat, RenderBackend};
pub use error::{LatexError, Result};
pub use latex::Latex;
pub use typeset::escape;
