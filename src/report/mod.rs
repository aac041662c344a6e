pub mod document;
pub mod types;

pub use document::IndexDocument;
pub use types::HarvestReport;

use crate::github::EnrichedIssue;
use colored::Colorize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

const TOP_LABELS: usize = 5;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize documents: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Summarise a harvest result.
pub fn build(results: &[EnrichedIssue], repo: &str) -> HarvestReport {
    let no_data = results.iter().all(|r| r.no_data);
    let harvested: Vec<&EnrichedIssue> = results.iter().filter(|r| !r.no_data).collect();

    let mut label_counts: HashMap<&str, usize> = HashMap::new();
    for issue in &harvested {
        for label in &issue.issue.labels {
            *label_counts.entry(label.as_str()).or_default() += 1;
        }
    }
    let mut top_labels: Vec<(String, usize)> = label_counts
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    top_labels.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_labels.truncate(TOP_LABELS);

    HarvestReport {
        repo: repo.to_string(),
        issues: harvested.len(),
        with_diff: harvested.iter().filter(|r| !r.code_diff.is_empty()).count(),
        comments: harvested.iter().map(|r| r.comments.len()).sum(),
        files_changed: harvested.iter().map(|r| r.code_diff.len()).sum(),
        top_labels,
        no_data,
    }
}

/// Print the summary to the terminal (default) or write the indexing
/// documents to `output_path` as JSON.
#[instrument(skip(report, results), fields(repo = %report.repo, issues = report.issues))]
pub fn output(
    report: &HarvestReport,
    results: &[EnrichedIssue],
    output_path: Option<&Path>,
) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing summary to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing documents to file");
            write_documents(results, path)
        }
    }
}

/// Render every result as an indexing document, pretty-printed JSON.
pub fn documents_json(results: &[EnrichedIssue]) -> Result<String, serde_json::Error> {
    let documents: Vec<IndexDocument> = results.iter().map(IndexDocument::from_issue).collect();
    serde_json::to_string_pretty(&documents)
}

fn write_documents(results: &[EnrichedIssue], path: &Path) -> Result<(), ReportError> {
    let json = documents_json(results)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Format and print the summary:
///
/// ═══ Harvest: owner/name ═══
/// Issues: 150 | With closing diff: 97 (64%)
/// Comments: 812 | Files changed: 301
/// Top labels: bug (60), docs (12)
fn print_terminal_report(report: &HarvestReport) {
    println!();
    println!("═══ Harvest: {} ═══", report.repo.bold());
    if report.no_data {
        println!("{}", "No closed issues found.".yellow().bold());
        println!();
        return;
    }

    println!(
        "Issues: {} | With closing diff: {} ({})",
        report.issues,
        report.with_diff,
        colorize_coverage(report.diff_coverage())
    );
    println!(
        "Comments: {} | Files changed: {}",
        report.comments, report.files_changed
    );
    if !report.top_labels.is_empty() {
        let labels = report
            .top_labels
            .iter()
            .map(|(label, count)| format!("{} ({})", label, count))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Top labels: {}", labels);
    }
    println!();
}

fn colorize_coverage(percent: usize) -> colored::ColoredString {
    let text = format!("{}%", percent);
    match percent {
        0..=24 => text.red().bold(),
        25..=59 => text.yellow().bold(),
        _ => text.green().bold(),
    }
}
