//! Crawl report generation
//!
//! This module builds a [`CrawlReport`] from the session statistics at the
//! end of a crawl and renders it as `_report.md` or as console output.

use crate::config::OutputFormat;
use crate::state::{CrawlStats, CrawlStatus, PageState};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// File name of the report in the output root
pub const REPORT_FILE: &str = "_report.md";

/// Failed URLs listed on the console before the rest is elided
const CONSOLE_FAILURE_LIMIT: usize = 20;

/// Summary of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    // Run metadata
    pub base_url: String,
    pub output_dir: String,
    pub output_format: OutputFormat,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: CrawlStatus,
    pub config_hash: String,

    // Counters
    pub pages_downloaded: usize,
    pub assets_downloaded: usize,
    pub pages_filtered: usize,

    /// Pages per final state
    pub state_counts: BTreeMap<PageState, usize>,

    /// Saved pages per crawl depth
    pub depth_breakdown: BTreeMap<u32, usize>,

    /// URL → reason, for pages and assets
    pub failed_urls: BTreeMap<String, String>,
}

impl CrawlReport {
    /// Builds the report from the final session statistics
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base_url: &str,
        output_dir: &str,
        output_format: OutputFormat,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        status: CrawlStatus,
        config_hash: String,
        stats: &CrawlStats,
    ) -> Self {
        let mut depth_breakdown = BTreeMap::new();
        for page in &stats.saved {
            *depth_breakdown.entry(page.depth).or_insert(0) += 1;
        }

        Self {
            base_url: base_url.to_string(),
            output_dir: output_dir.to_string(),
            output_format,
            started_at,
            finished_at,
            status,
            config_hash,
            pages_downloaded: stats.pages_downloaded,
            assets_downloaded: stats.assets_downloaded,
            pages_filtered: stats.pages_filtered,
            state_counts: stats.state_counts(),
            depth_breakdown,
            failed_urls: stats.failed_urls.clone(),
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }

    /// Number of pages in terminal states
    pub fn total_terminal_pages(&self) -> usize {
        self.state_counts
            .iter()
            .filter(|(state, _)| state.is_terminal())
            .map(|(_, count)| count)
            .sum()
    }

    fn count(&self, state: PageState) -> usize {
        self.state_counts.get(&state).copied().unwrap_or(0)
    }

    /// Saved pages as a percentage of finished pages
    pub fn success_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.count(PageState::Saved) as f64 / terminal as f64) * 100.0
    }

    /// Failed pages as a percentage of finished pages
    pub fn failure_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.count(PageState::Failed) as f64 / terminal as f64) * 100.0
    }
}

/// Formats a crawl report as markdown
///
/// # Arguments
///
/// * `report` - The crawl report data
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_report(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Crawl Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Base URL**: {}\n", report.base_url));
    md.push_str(&format!("- **Output Directory**: {}\n", report.output_dir));
    md.push_str(&format!("- **Output Format**: {}\n", report.output_format));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    let duration = report.duration_seconds();
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", report.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", report.config_hash));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Downloaded**: {}\n", report.pages_downloaded));
    md.push_str(&format!("- **Assets Downloaded**: {}\n", report.assets_downloaded));
    md.push_str(&format!("- **Pages Filtered**: {}\n", report.pages_filtered));
    md.push_str(&format!("- **Failed URLs**: {}\n", report.failed_urls.len()));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n", report.success_rate()));
    md.push_str(&format!("- **Failure Rate**: {:.2}%\n\n", report.failure_rate()));

    md.push_str("## Page State Breakdown\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    for state in PageState::all_states() {
        md.push_str(&format!("| {} | {} |\n", state, report.count(state)));
    }
    md.push('\n');

    if !report.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &report.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !report.failed_urls.is_empty() {
        md.push_str("## Failed URLs\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for (url, reason) in &report.failed_urls {
            md.push_str(&format!("| {} | {} |\n", url, reason.replace('|', "\\|")));
        }
        md.push('\n');
    }

    md
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Base URL: {}", report.base_url);
    println!("  Status: {}", report.status);
    println!("  Duration: {}s", report.duration_seconds());
    println!("  Pages downloaded: {}", report.pages_downloaded);
    println!("  Assets downloaded: {}", report.assets_downloaded);
    println!("  Pages filtered: {}", report.pages_filtered);
    println!();

    println!("Pages by State:");
    let mut state_counts: Vec<_> = report.state_counts.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));
    let total: usize = report.state_counts.values().sum();

    for (state, count) in state_counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !report.failed_urls.is_empty() {
        println!("Failed URLs ({}):", report.failed_urls.len());
        for (url, reason) in report.failed_urls.iter().take(CONSOLE_FAILURE_LIMIT) {
            println!("  - {}: {}", url, reason);
        }
        if report.failed_urls.len() > CONSOLE_FAILURE_LIMIT {
            println!(
                "  ... and {} more (see {})",
                report.failed_urls.len() - CONSOLE_FAILURE_LIMIT,
                REPORT_FILE
            );
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages saved)",
        report.success_rate(),
        report.count(PageState::Saved),
        report.total_terminal_pages()
    );
}
