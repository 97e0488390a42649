//! Markdown conversion
//!
//! Scripts are stripped and same-origin `href`s are pointed at the mirrored
//! files while the page is still HTML. The main content region is then
//! located and converted with `html2md`. The result is tidied (fenced code
//! gets a language, ATX headings get their space, blank runs collapse) and a
//! YAML front matter block with the title and source URL is prepended.

use crate::crawler::{element_text, extract_title, selector};
use crate::format::collapse_blank_lines;
use crate::format::html::{remove_elements, SCRIPT_SELECTORS};
use crate::format::links::LinkRewriter;
use crate::format::PageLocation;
use crate::FormatError;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use scraper::Html;
use std::panic::{self, AssertUnwindSafe};

/// Candidate containers of the main content, most specific first
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#content",
    ".content",
    "#main-content",
    ".main-content",
    "#docs-content",
    ".documentation",
    ".doc-content",
    ".markdown-body",
    ".article-content",
    ".post-content",
    "[role='main']",
    "[role='article']",
    ".page-content",
    ".site-content",
    ".prose",
    ".markdown",
    ".mdx-content",
    ".docs-container",
    "body",
];

/// A candidate must carry more text than this to count as main content
const MIN_CONTENT_CHARS: usize = 100;

/// Page chrome removed when no main content container qualifies
const NOISE_SELECTORS: &str = "header, footer, nav, .sidebar, .nav, .menu, .toolbar, .banner";

#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    links: LinkRewriter,
}

impl MarkdownFormatter {
    pub fn new(links: LinkRewriter) -> Self {
        Self { links }
    }

    pub fn try_convert(&self, body: &str, page: PageLocation<'_>) -> Result<String, FormatError> {
        let prepared = self.prepare(body, page)?;

        let (title, content_html) = {
            let document = Html::parse_document(&prepared);
            (extract_title(&document, page.url), main_content_html(&document))
        };
        let content_html = match content_html {
            Some(html) => html,
            None => remove_elements(&prepared, NOISE_SELECTORS)?,
        };

        let markdown = panic::catch_unwind(AssertUnwindSafe(|| html2md::parse_html(&content_html)))
            .map_err(|_| FormatError::Panicked)?;
        let markdown = tidy(&markdown);

        Ok(format!(
            "---\ntitle: {}\nurl: {}\n---\n\n{}\n",
            yaml_scalar(&title),
            page.url,
            markdown
        ))
    }

    /// Drops scripts and points same-origin page links at the mirrored
    /// files; image sources are untouched
    fn prepare(&self, body: &str, page: PageLocation<'_>) -> Result<String, FormatError> {
        Ok(rewrite_str(
            body,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!(SCRIPT_SELECTORS, |el| {
                        el.remove();
                        Ok(())
                    }),
                    element!("a[href]", |el| {
                        let local = el
                            .get_attribute("href")
                            .and_then(|href| self.links.local_target(&href, page));
                        if let Some(local) = local {
                            el.set_attribute("href", &local)?;
                        }
                        Ok(())
                    }),
                ],
                ..RewriteStrSettings::default()
            },
        )?)
    }
}

/// Outer HTML of the main content region, if one carries enough text
fn main_content_html(document: &Html) -> Option<String> {
    for css in MAIN_CONTENT_SELECTORS {
        let Some(sel) = selector(css) else {
            continue;
        };
        if let Some(element) = document
            .select(&sel)
            .find(|e| element_text(e).chars().count() > MIN_CONTENT_CHARS)
        {
            return Some(element.html());
        }
    }
    None
}

/// Normalizes fences, heading markers and blank lines
fn tidy(markdown: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut after_opening = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();

        if let Some(info) = trimmed.strip_prefix("```") {
            if in_fence {
                lines.push("```".to_string());
            } else {
                let lang = info.trim();
                lines.push(format!("```{}", if lang.is_empty() { "text" } else { lang }));
                after_opening = true;
            }
            in_fence = !in_fence;
            continue;
        }

        if in_fence {
            if after_opening && line.trim().is_empty() {
                after_opening = false;
                continue;
            }
            after_opening = false;
            lines.push(line.to_string());
        } else {
            lines.push(space_heading(line));
        }
    }

    collapse_blank_lines(&lines.join("\n")).trim().to_string()
}

/// `##Title` becomes `## Title`
fn space_heading(line: &str) -> String {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&hashes) {
        return line.to_string();
    }
    match line[hashes..].chars().next() {
        Some(c) if c != ' ' && c != '#' => format!("{} {}", &line[..hashes], &line[hashes..]),
        _ => line.to_string(),
    }
}

/// Quotes a front matter value when plain YAML would misread it
fn yaml_scalar(value: &str) -> String {
    let needs_quotes = value.contains(": ")
        || value.contains(" #")
        || value.starts_with(['"', '\'', '[', '{', '&', '*', '!', '|', '>', '%', '@', '`', '-', '?'])
        || value.ends_with(':');

    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use url::Url;

    fn formatter() -> MarkdownFormatter {
        let base = Url::parse("https://docs.example.com/guide/").unwrap();
        MarkdownFormatter::new(LinkRewriter::new(base, "md"))
    }

    fn page_url() -> Url {
        Url::parse("https://docs.example.com/guide/intro").unwrap()
    }

    fn convert(html: &str) -> String {
        formatter().try_convert(html, PageLocation::new(&page_url())).unwrap()
    }

    fn filler() -> String {
        "This paragraph explains the installation in enough detail to count as content. ".repeat(3)
    }

    #[test]
    fn test_front_matter() {
        let html = format!(
            "<html><head><title>Getting Started — Example Docs</title></head>\
             <body><main><h1>Getting Started</h1><p>{}</p></main></body></html>",
            filler()
        );
        let md = convert(&html);

        assert!(md.starts_with(
            "---\ntitle: Getting Started\nurl: https://docs.example.com/guide/intro\n---\n\n"
        ));
        assert!(md.contains("Getting Started"));
        assert!(md.contains("installation in enough detail"));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn test_main_content_preferred_over_chrome() {
        let html = format!(
            "<html><body><nav>NAVIGATION LINKS</nav><article><p>{}</p></article>\
             <footer>COPYRIGHT</footer></body></html>",
            filler()
        );
        let md = convert(&html);

        assert!(md.contains("installation"));
        assert!(!md.contains("NAVIGATION LINKS"));
        assert!(!md.contains("COPYRIGHT"));
    }

    #[test]
    fn test_scripts_never_reach_output() {
        let html = format!(
            "<html><body><main><script>var secret = 1;</script><p>{}</p></main></body></html>",
            filler()
        );
        let md = convert(&html);
        assert!(!md.contains("secret"));
    }

    #[test]
    fn test_same_origin_links_rewritten() {
        let html = format!(
            "<main><p>{}</p><p>See <a href=\"/guide/setup/install\">setup</a> and \
             <a href=\"https://other.com/x\">ext</a> and <img src=\"/img/logo.png\" alt=\"logo\">.\
             </p></main>",
            filler()
        );
        let md = convert(&html);

        assert!(md.contains("[setup](setup/install.md)"), "{}", md);
        assert!(md.contains("[ext](https://other.com/x)"));
        assert!(md.contains("![logo](/img/logo.png)"));
    }

    #[test]
    fn test_link_text_with_brackets_and_fragments() {
        let html = format!(
            "<main><p>{}</p><p><a href=\"/guide/arrays\">Array[0]</a> and \
             <a href=\"/guide/api/client#options\">options</a> and \
             <a href=\"/guide/fn_(call)\">call</a></p></main>",
            filler()
        );
        let md = convert(&html);

        assert!(md.contains("(arrays.md)"), "{}", md);
        assert!(md.contains("Array"));
        assert!(md.contains("[options](api/client.md#options)"));
        assert!(md.contains("fn-call.md"));
        assert!(!md.contains("/guide/arrays"));
    }

    #[test]
    fn test_links_in_fallback_content_rewritten() {
        let md = convert("<body><nav>MENU</nav><p><a href=\"/guide/setup\">Setup</a></p></body>");
        assert!(md.contains("[Setup](setup.md)"), "{}", md);
        assert!(!md.contains("MENU"));
    }

    #[test]
    fn test_tidy_code_fences() {
        let md = "Intro\n\n```\n\nlet x = 1;\n```\n\n```rust\nfn main() {}\n```";
        assert_eq!(
            tidy(md),
            "Intro\n\n```text\nlet x = 1;\n```\n\n```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn test_tidy_headings_and_blank_lines() {
        let md = "##Title\n\n\n\n\nText\n#### Already\n####### Seven";
        assert_eq!(tidy(md), "## Title\n\nText\n#### Already\n####### Seven");
    }

    #[test]
    fn test_heading_inside_fence_untouched() {
        let md = "```bash\n#!/bin/sh\n```";
        assert_eq!(tidy(md), "```bash\n#!/bin/sh\n```");
    }

    #[test]
    fn test_yaml_scalar() {
        assert_eq!(yaml_scalar("Plain Title"), "Plain Title");
        assert_eq!(yaml_scalar("API: Overview"), "\"API: Overview\"");
        assert_eq!(yaml_scalar("\"quoted\""), "\"\\\"quoted\\\"\"");
    }

    #[test]
    fn test_deterministic() {
        let html = format!("<main><p>{}</p><a href=\"/guide/a\">A</a></main>", filler());
        assert_eq!(convert(&html), convert(&html));
    }
}
