use serde_json::Value;
use tracing::{debug, warn};

use crate::github::{Comment, CommitDiff, EnrichedIssue, Fetcher, RawIssue, RepoEndpoint};

const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Attach comments and closing-commit diffs to one issue.
///
/// Two branches run concurrently: closing SHA then (dependent) commit diff,
/// and the comment list. Both are awaited before the record is composed.
pub async fn enrich(
    fetcher: &Fetcher,
    issue: RawIssue,
    endpoint: &RepoEndpoint,
    max_patch_bytes: usize,
) -> EnrichedIssue {
    let diff_branch = async {
        match fetch_closing_sha(fetcher, &issue.events_url).await {
            Some(sha) => fetch_commit_diff(fetcher, endpoint, &sha, max_patch_bytes).await,
            None => Vec::new(),
        }
    };
    let comments_branch = fetch_comments(fetcher, &issue.comments_url);

    let (code_diff, comments) = tokio::join!(diff_branch, comments_branch);
    debug!(comments = comments.len(), files = code_diff.len(), "enriched issue");

    EnrichedIssue {
        comments,
        code_diff,
        ..EnrichedIssue::bare(issue, &endpoint.repo())
    }
}

/// Commit id of the first "closed" event that carries one, in feed order.
pub async fn fetch_closing_sha(fetcher: &Fetcher, events_url: &str) -> Option<String> {
    if events_url.is_empty() {
        return None;
    }
    let events = match fetcher.fetch_json(events_url).await {
        Value::Array(events) => events,
        _ => return None,
    };
    closing_sha(&events)
}

fn closing_sha(events: &[Value]) -> Option<String> {
    events.iter().find_map(|event| {
        if event.get("event").and_then(Value::as_str) != Some("closed") {
            return None;
        }
        event
            .get("commit_id")
            .and_then(Value::as_str)
            .filter(|sha| !sha.is_empty())
            .map(str::to_string)
    })
}

/// Changed files of commit `sha`, each patch capped at `max_patch_bytes`.
pub async fn fetch_commit_diff(
    fetcher: &Fetcher,
    endpoint: &RepoEndpoint,
    sha: &str,
    max_patch_bytes: usize,
) -> Vec<CommitDiff> {
    let commit = fetcher.fetch_json(&endpoint.commit_url(sha)).await;
    let Some(files) = commit.get("files").and_then(Value::as_array) else {
        warn!(sha, "commit has no file list");
        return Vec::new();
    };

    files
        .iter()
        .filter_map(CommitDiff::from_value)
        .map(|mut file| {
            file.diff = truncate_patch(file.diff, max_patch_bytes);
            file
        })
        .collect()
}

/// Comments in the order the API returns them; anything but a list is "none".
pub async fn fetch_comments(fetcher: &Fetcher, comments_url: &str) -> Vec<Comment> {
    if comments_url.is_empty() {
        return Vec::new();
    }
    match fetcher.fetch_json(comments_url).await {
        Value::Array(comments) => comments
            .iter()
            .filter_map(|comment| Comment::from_value(comment).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Cut `patch` to at most `max_bytes` (on a char boundary) plus a marker.
fn truncate_patch(patch: String, max_bytes: usize) -> String {
    if patch.len() <= max_bytes {
        return patch;
    }
    let mut cut = max_bytes;
    while !patch.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = patch;
    truncated.truncate(cut);
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
