//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names. Engines are passed around as opaque
//! `LatexHandle*` pointers created by `latex_new` / `latex_clone` and released
//! with `latex_free`.
//!
//! ## Memory management
//! - Strings returned through out-parameters are allocated on the Rust heap.
//!   Callers **must** free them with `latex_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! Functions that can fail return a `c_int`:
//!
//! | code | meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | success                                   |
//! | 1    | null pointer argument                     |
//! | 2    | invalid UTF-8 / unknown enum value        |
//! | 3    | markup rejected by the typesetter         |
//! | 4    | image conversion failed                   |
//! | 5    | file could not be read or written         |
//! | 6    | typesetting library missing or unloaded   |
//!
//! Error details can be retrieved via `latex_last_error`.
//!
//! ## Thread safety
//! - `latex_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads.
//! - A single handle must not be used from two threads at once.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::config::WarningBehavior;
use crate::convert::ImageFormat;
use crate::error::{ErrorKind, LatexError};
use crate::latex::Latex;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

const OK: c_int = 0;
const ERR_NULL: c_int = 1;
const ERR_INVALID: c_int = 2;

fn error_code(err: &LatexError) -> c_int {
    set_last_error(&err.to_string());
    match err.kind() {
        ErrorKind::Parse => 3,
        ErrorKind::Conversion => 4,
        ErrorKind::File => 5,
        ErrorKind::Existential => 6,
    }
}

/// Borrow a C string as `&str`, recording an error on failure.
///
/// # Safety
/// `s` must be null or point to a valid null-terminated string.
unsafe fn str_arg<'a>(s: *const c_char) -> Result<&'a str, c_int> {
    if s.is_null() {
        set_last_error("Null pointer argument");
        return Err(ERR_NULL);
    }
    CStr::from_ptr(s).to_str().map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_INVALID
    })
}

/// Hand a Rust string to the caller through `out`.
///
/// # Safety
/// `out` must be a valid pointer.
unsafe fn write_string(out: *mut *mut c_char, s: String) -> c_int {
    match CString::new(s) {
        Ok(cs) => {
            *out = cs.into_raw();
            OK
        }
        Err(_) => {
            *out = ptr::null_mut();
            set_last_error("Output contained null byte");
            ERR_INVALID
        }
    }
}

// ---------------------------------------------------------------------------
// C-compatible types
// ---------------------------------------------------------------------------

/// Opaque engine handle.
pub struct LatexHandle {
    inner: Latex,
}

/// Image format for `latex_render_image`.
#[repr(C)]
pub enum LatexImageFormat {
    Png = 0,
    Jpg = 1,
    Svg = 2,
}

impl From<LatexImageFormat> for ImageFormat {
    fn from(f: LatexImageFormat) -> Self {
        match f {
            LatexImageFormat::Png => ImageFormat::Png,
            LatexImageFormat::Jpg => ImageFormat::Jpg,
            LatexImageFormat::Svg => ImageFormat::Svg,
        }
    }
}

/// Warning behavior for `latex_set_warning_behavior`.
#[repr(C)]
pub enum LatexWarningBehavior {
    Strict = 0,
    Ignore = 1,
    Log = 2,
}

impl From<LatexWarningBehavior> for WarningBehavior {
    fn from(b: LatexWarningBehavior) -> Self {
        match b {
            LatexWarningBehavior::Strict => WarningBehavior::Strict,
            LatexWarningBehavior::Ignore => WarningBehavior::Ignore,
            LatexWarningBehavior::Log => WarningBehavior::Log,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Create an engine from the KaTeX bundle at `library_path` and the stylesheet
/// at `stylesheet_path` (pass `NULL` for no stylesheet).
///
/// # Safety
/// - String arguments must be null or valid null-terminated UTF-8.
/// - `out_handle` must be a valid pointer; on success it receives a handle
///   that must be released with `latex_free`.
#[no_mangle]
pub unsafe extern "C" fn latex_new(
    library_path: *const c_char,
    stylesheet_path: *const c_char,
    out_handle: *mut *mut LatexHandle,
) -> c_int {
    if out_handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let library_path = match str_arg(library_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let created = if stylesheet_path.is_null() {
        std::fs::read_to_string(library_path)
            .map_err(|e| {
                LatexError::Existential(format!(
                    "could not read typesetting library '{library_path}': {e}"
                ))
            })
            .and_then(Latex::new)
    } else {
        match str_arg(stylesheet_path) {
            Ok(css) => Latex::from_files(library_path, css),
            Err(code) => return code,
        }
    };

    match created {
        Ok(latex) => {
            *out_handle = Box::into_raw(Box::new(LatexHandle { inner: latex }));
            OK
        }
        Err(e) => error_code(&e),
    }
}

/// Deep-copy an engine (the library is loaded again).
///
/// # Safety
/// `handle` must come from `latex_new`/`latex_clone`; `out_handle` must be valid.
#[no_mangle]
pub unsafe extern "C" fn latex_clone(
    handle: *const LatexHandle,
    out_handle: *mut *mut LatexHandle,
) -> c_int {
    if handle.is_null() || out_handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    match (*handle).inner.try_clone() {
        Ok(latex) => {
            *out_handle = Box::into_raw(Box::new(LatexHandle { inner: latex }));
            OK
        }
        Err(e) => error_code(&e),
    }
}

/// Release an engine.
///
/// # Safety
/// `handle` must come from `latex_new`/`latex_clone` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn latex_free(handle: *mut LatexHandle) {
    if !handle.is_null() {
        let _ = Box::from_raw(handle);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render `latex` to an HTML fragment. Free `*out_html` with `latex_free_string`.
///
/// # Safety
/// `handle` must be live; `latex` must be valid UTF-8; `out_html` must be valid.
#[no_mangle]
pub unsafe extern "C" fn latex_render_html(
    handle: *const LatexHandle,
    latex: *const c_char,
    out_html: *mut *mut c_char,
) -> c_int {
    if handle.is_null() || out_html.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let markup = match str_arg(latex) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match (*handle).inner.render_fragment(markup) {
        Ok(html) => write_string(out_html, html),
        Err(e) => error_code(&e),
    }
}

/// Render `latex` to a complete HTML document. Free `*out_html` with
/// `latex_free_string`.
///
/// # Safety
/// Same as `latex_render_html`.
#[no_mangle]
pub unsafe extern "C" fn latex_render_document(
    handle: *const LatexHandle,
    latex: *const c_char,
    out_html: *mut *mut c_char,
) -> c_int {
    if handle.is_null() || out_html.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let markup = match str_arg(latex) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match (*handle).inner.render_document(markup) {
        Ok(html) => write_string(out_html, html),
        Err(e) => error_code(&e),
    }
}

/// Render `latex` to an image file at `path`.
///
/// # Safety
/// `handle` must be live; string arguments must be valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn latex_render_image(
    handle: *const LatexHandle,
    latex: *const c_char,
    path: *const c_char,
    format: LatexImageFormat,
) -> c_int {
    if handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let (markup, path) = match (str_arg(latex), str_arg(path)) {
        (Ok(m), Ok(p)) => (m, p),
        (Err(code), _) | (_, Err(code)) => return code,
    };
    match (*handle).inner.render_image(markup, path, format.into()) {
        Ok(()) => OK,
        Err(e) => error_code(&e),
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Replace the stylesheet. On failure the previous one stays in place.
///
/// # Safety
/// `handle` must be live; `path` must be valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn latex_set_stylesheet(
    handle: *mut LatexHandle,
    path: *const c_char,
) -> c_int {
    if handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let path = match str_arg(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match (*handle).inner.set_stylesheet(path) {
        Ok(()) => OK,
        Err(e) => error_code(&e),
    }
}

/// Append CSS after the stylesheet.
///
/// # Safety
/// `handle` must be live; `css` must be valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn latex_add_css(handle: *mut LatexHandle, css: *const c_char) -> c_int {
    if handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    match str_arg(css) {
        Ok(css) => {
            (*handle).inner.add_css(css);
            OK
        }
        Err(code) => code,
    }
}

/// Drop all CSS added with `latex_add_css`.
///
/// # Safety
/// `handle` must be live.
#[no_mangle]
pub unsafe extern "C" fn latex_clear_css(handle: *mut LatexHandle) -> c_int {
    if handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    (*handle).inner.clear_css();
    OK
}

/// Choose how renderer warnings are treated.
///
/// # Safety
/// `handle` must be live.
#[no_mangle]
pub unsafe extern "C" fn latex_set_warning_behavior(
    handle: *mut LatexHandle,
    behavior: LatexWarningBehavior,
) -> c_int {
    if handle.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    (*handle).inner.set_warning_behavior(behavior.into());
    OK
}

// ---------------------------------------------------------------------------
// Memory management & diagnostics
// ---------------------------------------------------------------------------

/// Free a string returned through an out-parameter.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn latex_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next failing `latex_*` call on the
/// same thread. The caller should **not** free this pointer.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn latex_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn latex_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LIBRARY: &str = r#"
        var katex = {
            renderToString: function (tex) {
                if (tex.indexOf('{') >= 0 && tex.indexOf('}') < 0) {
                    var e = new Error("KaTeX parse error: Expected '}'");
                    e.name = 'ParseError';
                    throw e;
                }
                return '<span class="katex">' + tex + '</span>';
            }
        };
    "#;

    fn library_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".js").tempfile().unwrap();
        f.write_all(LIBRARY.as_bytes()).unwrap();
        f
    }

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn last_error() -> String {
        let p = latex_last_error();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
    }

    fn new_handle() -> *mut LatexHandle {
        let lib = library_file();
        let path = cstr(lib.path().to_str().unwrap());
        let mut handle: *mut LatexHandle = ptr::null_mut();
        let rc = unsafe { latex_new(path.as_ptr(), ptr::null(), &mut handle) };
        assert_eq!(rc, 0, "Expected success");
        assert!(!handle.is_null());
        handle
    }

    #[test]
    fn ffi_render_html() {
        let handle = new_handle();
        let markup = cstr(r"\frac{1}{2}");
        let mut out: *mut c_char = ptr::null_mut();

        let rc = unsafe { latex_render_html(handle, markup.as_ptr(), &mut out) };
        assert_eq!(rc, 0);
        let html = unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_owned();
        assert_eq!(html, r#"<span class="katex">\frac{1}{2}</span>"#);

        unsafe {
            latex_free_string(out);
            latex_free(handle);
        }
    }

    #[test]
    fn ffi_parse_error_sets_code_and_message() {
        let handle = new_handle();
        let markup = cstr(r"\frac{1");
        let mut out: *mut c_char = ptr::null_mut();

        let rc = unsafe { latex_render_html(handle, markup.as_ptr(), &mut out) };
        assert_eq!(rc, 3);
        assert!(out.is_null());
        assert!(last_error().contains("KaTeX parse error"));

        unsafe { latex_free(handle) };
    }

    #[test]
    fn ffi_document_uses_added_css() {
        let handle = new_handle();
        let css = cstr(".katex { color: red; }");
        assert_eq!(unsafe { latex_add_css(handle, css.as_ptr()) }, 0);

        let mut copy: *mut LatexHandle = ptr::null_mut();
        assert_eq!(unsafe { latex_clone(handle, &mut copy) }, 0);
        assert_eq!(unsafe { latex_clear_css(copy) }, 0);

        let markup = cstr("x");
        let mut out: *mut c_char = ptr::null_mut();
        assert_eq!(unsafe { latex_render_document(handle, markup.as_ptr(), &mut out) }, 0);
        let doc = unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_owned();
        assert!(doc.contains("<style>.katex { color: red; }</style>"));
        unsafe { latex_free_string(out) };

        assert_eq!(unsafe { latex_render_document(copy, markup.as_ptr(), &mut out) }, 0);
        let doc = unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_owned();
        assert!(doc.contains("<style></style>"));

        unsafe {
            latex_free_string(out);
            latex_free(copy);
            latex_free(handle);
        }
    }

    #[test]
    fn ffi_missing_library_is_existential() {
        let path = cstr("/no/such/katex.min.js");
        let mut handle: *mut LatexHandle = ptr::null_mut();
        let rc = unsafe { latex_new(path.as_ptr(), ptr::null(), &mut handle) };
        assert_eq!(rc, 6);
        assert!(handle.is_null());
    }

    #[test]
    fn ffi_bad_stylesheet_is_file_error() {
        let handle = new_handle();
        let path = cstr("/no/such/katex.min.css");
        assert_eq!(unsafe { latex_set_stylesheet(handle, path.as_ptr()) }, 5);
        assert_eq!(
            unsafe { latex_set_warning_behavior(handle, LatexWarningBehavior::Strict) },
            0
        );
        unsafe { latex_free(handle) };
    }

    #[test]
    fn ffi_null_arguments() {
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { latex_render_html(ptr::null(), ptr::null(), &mut out) };
        assert_eq!(rc, 1);
        assert_eq!(unsafe { latex_clear_css(ptr::null_mut()) }, 1);
        unsafe {
            latex_free(ptr::null_mut());
            latex_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn ffi_version() {
        let v = unsafe { CStr::from_ptr(latex_version()) };
        assert_eq!(v.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
