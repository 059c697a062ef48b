//! latex – command-line LaTeX math → HTML / image converter.
//!
//! Usage:
//!   latex <markup> --katex <katex.min.js> [--css <katex.min.css>] [--out <file>]
//!         [--format fragment|html|png|jpg|svg] [--add-css <css>]
//!         [--warnings strict|ignore|log]
//!   latex --sample --katex <katex.min.js> [--css <katex.min.css>]
//!
//! Without `--out` the fragment (or, with `--format html`, the document) is
//! printed to stdout. With `--out` the format defaults to the file extension.

use std::{env, fs, path::PathBuf, process};

use latex_forge::{samples, Config, ImageFormat, Latex, WarningBehavior};

/// What to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Fragment,
    Document,
    Image(ImageFormat),
}

fn parse_output(s: &str) -> Option<Output> {
    match s {
        "fragment" => Some(Output::Fragment),
        "html" => Some(Output::Document),
        other => other.parse().ok().map(Output::Image),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut markup: Option<String> = None;
    let mut katex: Option<PathBuf> = env::var_os("LATEX_KATEX_JS").map(PathBuf::from);
    let mut css: Option<PathBuf> = env::var_os("LATEX_KATEX_CSS").map(PathBuf::from);
    let mut out: Option<PathBuf> = None;
    let mut format: Option<Output> = None;
    let mut extra_css: Vec<String> = Vec::new();
    let mut warnings = WarningBehavior::default();
    let mut sample = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--katex" | "-k" => katex = Some(PathBuf::from(value(&mut iter, arg, &args[0]))),
            "--css" | "-c" => css = Some(PathBuf::from(value(&mut iter, arg, &args[0]))),
            "--out" | "-o" => out = Some(PathBuf::from(value(&mut iter, arg, &args[0]))),
            "--add-css" => extra_css.push(value(&mut iter, arg, &args[0])),
            "--format" | "-f" => {
                let v = value(&mut iter, arg, &args[0]);
                match parse_output(&v) {
                    Some(f) => format = Some(f),
                    None => fail(&format!("unknown format '{v}'"), &args[0]),
                }
            }
            "--warnings" | "-w" => {
                let v = value(&mut iter, arg, &args[0]);
                match v.parse() {
                    Ok(b) => warnings = b,
                    Err(e) => fail(&e, &args[0]),
                }
            }
            "--sample" => sample = true,
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') && other.len() > 1 => {
                fail(&format!("Unknown flag: {other}"), &args[0]);
            }
            text => {
                if markup.is_some() {
                    fail(&format!("Unexpected argument: {text}"), &args[0]);
                }
                markup = Some(text.to_string());
            }
        }
    }

    let katex = match katex {
        Some(p) => p,
        None => fail("no KaTeX bundle given (--katex or LATEX_KATEX_JS)", &args[0]),
    };

    let source = match fs::read_to_string(&katex) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", katex.display());
            process::exit(1);
        }
    };

    let mut config = match css {
        Some(path) => match Config::new().with_stylesheet(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        None => Config::new(),
    };
    for c in &extra_css {
        config.add_css(c);
    }
    config.set_warning_behavior(warnings);

    let latex = match Latex::with_config(source, config) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if sample {
        for (name, tex) in samples::all() {
            match latex.render_fragment(tex) {
                Ok(html) => println!("{name}: {} bytes", html.len()),
                Err(e) => {
                    eprintln!("{name}: {e}");
                    process::exit(1);
                }
            }
        }
        return;
    }

    let markup = match markup {
        Some(m) => m,
        None => fail("no markup given", &args[0]),
    };

    let format = format.unwrap_or_else(|| match &out {
        Some(path) => ImageFormat::from_extension(path)
            .map(Output::Image)
            .unwrap_or(Output::Document),
        None => Output::Fragment,
    });

    let result = match (format, &out) {
        (Output::Image(fmt), Some(path)) => latex.render_image(&markup, path, fmt).map(|_| {
            eprintln!("Wrote '{}'", path.display());
        }),
        (Output::Image(_), None) => fail("image output needs --out", &args[0]),
        (Output::Fragment, path) => latex.render_fragment(&markup).map(|html| emit(&html, path)),
        (Output::Document, path) => latex.render_document(&markup).map(|html| emit(&html, path)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn emit(html: &str, path: &Option<PathBuf>) {
    match path {
        Some(p) => {
            if let Err(e) = fs::write(p, html) {
                eprintln!("Error writing '{}': {e}", p.display());
                process::exit(1);
            }
            eprintln!("Wrote '{}' ({} bytes)", p.display(), html.len());
        }
        None => println!("{html}"),
    }
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => fail(&format!("{flag} needs a value"), prog),
    }
}

fn fail(msg: &str, prog: &str) -> ! {
    eprintln!("Error: {msg}");
    print_usage(prog);
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("latex – LaTeX math to HTML/image converter (latex-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <markup> --katex <katex.min.js> [--css <katex.min.css>] [--out <file>]");
    eprintln!("  {prog} --sample --katex <katex.min.js>");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --katex, -k     KaTeX bundle (default: $LATEX_KATEX_JS)");
    eprintln!("  --css, -c       Stylesheet inlined into documents (default: $LATEX_KATEX_CSS)");
    eprintln!("  --out, -o       Output file; format follows the extension");
    eprintln!("  --format, -f    fragment | html | png | jpg | svg");
    eprintln!("  --add-css       Extra CSS appended after the stylesheet (repeatable)");
    eprintln!("  --warnings, -w  strict | ignore | log (default: log)");
    eprintln!("  --sample        Render the built-in sample equations");
    eprintln!("  --help          Print this message");
}
