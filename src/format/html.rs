//! Cleaned pass-through HTML
//!
//! The document is streamed through `lol_html`, which leaves every byte it
//! is not told to touch as it was. Handlers drop script elements, rewrite
//! reference attributes and add a `<meta name="source-url">` tag to the
//! head. [`remove_elements`] is shared with the other formatters.

use crate::config::LinkMode;
use crate::format::links::LinkRewriter;
use crate::format::PageLocation;
use crate::FormatError;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};

/// Elements removed when scripts are stripped
pub(crate) const SCRIPT_SELECTORS: &str = "script, style, iframe, noscript";

/// Reference attributes rewritten by the link modes
const REFERENCE_ATTRS: &[(&str, &str)] = &[
    ("a", "href"),
    ("img", "src"),
    ("link", "href"),
    ("script", "src"),
];

/// Options of the HTML formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Rewrite the document; when false the body is saved verbatim
    pub clean: bool,
    pub remove_scripts: bool,
    pub links: LinkMode,
}

#[derive(Debug, Clone)]
pub struct HtmlFormatter {
    options: HtmlOptions,
    links: LinkRewriter,
}

impl HtmlFormatter {
    pub fn new(options: HtmlOptions, links: LinkRewriter) -> Self {
        Self { options, links }
    }

    pub fn options(&self) -> HtmlOptions {
        self.options
    }

    /// Rewrites the page
    ///
    /// The source meta tag is only added to documents that carry a `<head>`.
    pub fn try_convert(&self, body: &str, page: PageLocation<'_>) -> Result<String, FormatError> {
        if !self.options.clean {
            return Ok(body.to_string());
        }

        let meta = format!(
            "<meta name=\"source-url\" content=\"{}\">",
            escape_attr(page.url.as_str())
        );

        let mut handlers = vec![element!("head", |el| {
            el.append(&meta, ContentType::Html);
            Ok(())
        })];

        if self.options.remove_scripts {
            handlers.push(element!(SCRIPT_SELECTORS, |el| {
                el.remove();
                Ok(())
            }));
        }

        if self.options.links != LinkMode::Keep {
            for &(tag, attr) in REFERENCE_ATTRS {
                handlers.push(element!(format!("{}[{}]", tag, attr), move |el| {
                    let rewritten = el
                        .get_attribute(attr)
                        .and_then(|value| self.rewrite(tag, &value, page));
                    if let Some(value) = rewritten {
                        el.set_attribute(attr, &value)?;
                    }
                    Ok(())
                }));
            }
        }

        Ok(rewrite_str(
            body,
            RewriteStrSettings {
                element_content_handlers: handlers,
                ..RewriteStrSettings::default()
            },
        )?)
    }

    /// New value of a reference attribute of a `tag` element, if it changes
    fn rewrite(&self, tag: &str, value: &str, page: PageLocation<'_>) -> Option<String> {
        match self.options.links {
            LinkMode::Keep => None,
            LinkMode::Absolute => self.links.absolute(value, page),
            LinkMode::Local if tag == "a" => self
                .links
                .local_target(value, page)
                .or_else(|| self.links.absolute(value, page)),
            LinkMode::Local => self.links.absolute(value, page),
        }
    }
}

/// Removes every element matching `css`, subtree included
pub(crate) fn remove_elements(html: &str, css: &str) -> Result<String, FormatError> {
    Ok(rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(css, |el| {
                el.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )?)
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
