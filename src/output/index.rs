//! `_index.md`: a nested table of contents of the mirrored pages

use crate::state::SavedPage;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use url::Url;

/// File name of the index in the output root
pub const INDEX_FILE: &str = "_index.md";

#[derive(Debug, Default)]
struct Dir<'a> {
    pages: Vec<&'a SavedPage>,
    dirs: BTreeMap<&'a str, Dir<'a>>,
}

/// Renders the table of contents
///
/// Directories become bold entries and pages become links relative to the
/// output root. Entries are sorted by path, so the output depends only on
/// the set of saved pages.
pub fn format_index(base_url: &Url, captured_at: DateTime<Utc>, pages: &[SavedPage]) -> String {
    let mut root = Dir::default();
    for page in pages {
        let mut parts: Vec<&str> = page.path.split('/').collect();
        parts.pop();
        let dir = parts
            .into_iter()
            .fold(&mut root, |dir, part| dir.dirs.entry(part).or_default());
        dir.pages.push(page);
    }

    let mut md = String::new();
    md.push_str("# Documentation Index\n\n");
    md.push_str(&format!("- **Source**: {}\n", base_url));
    md.push_str(&format!("- **Captured**: {}\n", captured_at.format("%Y-%m-%d %H:%M UTC")));
    md.push_str(&format!("- **Pages**: {}\n\n", pages.len()));
    md.push_str("## Contents\n\n");

    render(&mut root, 0, &mut md);
    md
}

fn render(dir: &mut Dir<'_>, level: usize, md: &mut String) {
    let indent = "  ".repeat(level);

    dir.pages.sort_by(|a, b| a.path.cmp(&b.path));
    for page in &dir.pages {
        md.push_str(&format!(
            "{}- [{}]({})\n",
            indent,
            escape_link_text(&page.title),
            page.path
        ));
    }

    for (name, child) in dir.dirs.iter_mut() {
        md.push_str(&format!("{}- **{}**\n", indent, name));
        render(child, level + 1, md);
    }
}

fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
