//! HtmlComposer – wraps a typeset fragment into a complete, styled document.

use crate::config::Config;
use crate::error::Result;
use crate::typeset::TypesetRunner;

/// Wrap `fragment` in the document skeleton. The stylesheet text comes first
/// and the additional CSS after it; neither is escaped.
pub fn wrap_document(fragment: &str, config: &Config) -> String {
    let stylesheet = config.stylesheet_content();
    let extra = config.additional_css();

    let mut html = String::with_capacity(fragment.len() + stylesheet.len() + extra.len() + 128);
    html.push_str("<!DOCTYPE html>\n<html>\n");
    html.push_str("<head>\n<meta charset='utf-8'/>\n");
    html.push_str("<style>");
    html.push_str(stylesheet);
    html.push_str(extra);
    html.push_str("</style>\n</head>\n");
    html.push_str("<body>\n");
    html.push_str(fragment);
    html.push_str("\n</body>\n</html>");
    html
}

/// Borrowed view pairing a runner with the styling it renders under.
pub struct HtmlComposer<'a> {
    runner: &'a TypesetRunner,
    config: &'a Config,
}

impl<'a> HtmlComposer<'a> {
    pub fn new(runner: &'a TypesetRunner, config: &'a Config) -> Self {
        Self { runner, config }
    }

    /// The bare typeset fragment.
    pub fn fragment(&self, markup: &str) -> Result<String> {
        self.runner.run(markup)
    }

    /// A complete HTML document around the fragment.
    pub fn document(&self, markup: &str) -> Result<String> {
        let fragment = self.fragment(markup)?;
        Ok(wrap_document(&fragment, self.config))
    }
}
