use serde::Serialize;

use crate::github::{Comment, CommitDiff, EnrichedIssue};

/// What the indexing collaborator ingests for one issue.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDocument {
    /// Stable key: the issue's public web URL
    pub key: String,
    /// Flattened text to embed
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetadata {
    pub issue_id: u64,
    pub repo: String,
    pub title: String,
    pub body: String,
    pub comments: Vec<Comment>,
    pub code_diff: Vec<CommitDiff>,
    pub total_comments: usize,
    pub total_files_changed: usize,
    pub no_data: bool,
}

impl IndexDocument {
    pub fn from_issue(enriched: &EnrichedIssue) -> Self {
        let issue = &enriched.issue;
        let key = if issue.html_url.is_empty() {
            format!("https://github.com/{}/issues/{}", enriched.repo, issue.number)
        } else {
            issue.html_url.clone()
        };

        Self {
            key,
            text: render_text(enriched),
            metadata: DocumentMetadata {
                issue_id: issue.number,
                repo: enriched.repo.clone(),
                title: issue.title.clone(),
                body: issue.body.clone(),
                comments: enriched.comments.clone(),
                code_diff: enriched.code_diff.clone(),
                total_comments: enriched.comments.len(),
                total_files_changed: enriched.code_diff.len(),
                no_data: enriched.no_data,
            },
        }
    }
}

/// Title, body, `[author] body` comment lines, then `--- path ---` diff sections.
fn render_text(enriched: &EnrichedIssue) -> String {
    let comments = enriched
        .comments
        .iter()
        .map(|c| format!("[{}] {}", c.author, c.body))
        .collect::<Vec<_>>()
        .join("\n");
    let diffs = enriched
        .code_diff
        .iter()
        .map(|d| format!("--- {} ---\n{}", d.path, d.diff))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Issue ID: {}\nTitle: {}\n\n{}\n\nComments:\n{}\n\nCode Diff:\n{}",
        enriched.issue.number, enriched.issue.title, enriched.issue.body, comments, diffs
    )
}
