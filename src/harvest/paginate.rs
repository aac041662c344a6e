use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::github::{Fetcher, RawIssue};

/// Page size requested from the listing; a shorter page is the last one.
pub const PER_PAGE: usize = 100;

/// Collect up to `limit` closed issues (pull requests excluded) from an
/// issues listing, walking pages 1, 2, ... until enough are found, a page is
/// empty or not a list, or a page comes back short.
///
/// Sequential by nature: whether to request page N+1 depends on page N.
#[instrument(skip(fetcher))]
pub async fn fetch_closed_issues(fetcher: &Fetcher, issues_url: &str, limit: usize) -> Vec<RawIssue> {
    let mut issues = Vec::new();
    let mut page = 1u32;

    while issues.len() < limit {
        let url = format!(
            "{}?state=closed&per_page={}&page={}",
            issues_url, PER_PAGE, page
        );
        let entries = match fetcher.fetch_json(&url).await {
            Value::Array(entries) if !entries.is_empty() => entries,
            _ => {
                debug!(page, "no more issues");
                break;
            }
        };

        let raw_count = entries.len();
        let before = issues.len();
        issues.extend(
            entries
                .iter()
                .filter(|entry| entry.get("pull_request").is_none())
                .filter_map(|entry| match RawIssue::from_value(entry) {
                    Ok(issue) => Some(issue),
                    Err(e) => {
                        warn!(page, error = %e, "skipping malformed issue entry");
                        None
                    }
                }),
        );
        debug!(page, raw = raw_count, kept = issues.len() - before, total = issues.len(), "fetched issue page");

        if raw_count < PER_PAGE {
            break;
        }
        page += 1;
    }

    issues.truncate(limit);
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::test_support::{
        fetcher_with, issue_json, issue_page, page_url, pull_request_json, RecordingClock,
        ScriptedTransport, ISSUES_ENDPOINT,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<ScriptedTransport>, Fetcher) {
        let transport = Arc::new(ScriptedTransport::new());
        let fetcher = fetcher_with(&transport, &Arc::new(RecordingClock::at(0)));
        (transport, fetcher)
    }

    #[tokio::test]
    async fn test_short_page_stops_walk() {
        let (transport, fetcher) = setup();
        transport.respond_json(&page_url(1), issue_page(1, 100));
        transport.respond_json(&page_url(2), issue_page(101, 30));

        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;

        assert_eq!(issues.len(), 130);
        assert_eq!(transport.requested_urls(), vec![page_url(1), page_url(2)]);
    }

    #[tokio::test]
    async fn test_truncates_to_target() {
        let (transport, fetcher) = setup();
        transport.respond_json(&page_url(1), issue_page(1, 100));
        transport.respond_json(&page_url(2), issue_page(101, 100));
        transport.respond_json(&page_url(3), issue_page(201, 100));

        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;

        assert_eq!(issues.len(), 150);
        assert_eq!(issues.first().map(|i| i.number), Some(1));
        assert_eq!(issues.last().map(|i| i.number), Some(150));
        // page 2 already reaches the target
        assert_eq!(transport.count(&page_url(3)), 0);
    }

    #[tokio::test]
    async fn test_three_full_pages_when_pull_requests_thin_them_out() {
        let (transport, fetcher) = setup();
        // 50 issues + 50 pull requests on each of the first two pages
        let mixed_page = |first: u64| {
            let entries: Vec<Value> = (first..first + 100)
                .map(|n| if n % 2 == 0 { pull_request_json(n) } else { issue_json(n) })
                .collect();
            Value::Array(entries)
        };
        transport.respond_json(&page_url(1), mixed_page(1));
        transport.respond_json(&page_url(2), mixed_page(101));
        transport.respond_json(&page_url(3), issue_page(201, 100));

        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;

        assert_eq!(transport.requested_urls().len(), 3);
        assert_eq!(issues.len(), 150);
        // 50 of page 3's 100 issues are dropped
        assert_eq!(issues.last().map(|i| i.number), Some(250));
    }

    #[tokio::test]
    async fn test_pull_requests_are_filtered() {
        let (transport, fetcher) = setup();
        transport.respond_json(
            &page_url(1),
            json!([issue_json(1), pull_request_json(2), issue_json(3)]),
        );

        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;
        let numbers: Vec<u64> = issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_page_of_only_pull_requests_does_not_stop_walk() {
        let (transport, fetcher) = setup();
        let prs: Vec<Value> = (1..=100).map(pull_request_json).collect();
        transport.respond_json(&page_url(1), Value::Array(prs));
        transport.respond_json(&page_url(2), issue_page(101, 5));

        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;
        assert_eq!(issues.len(), 5);
    }

    #[tokio::test]
    async fn test_non_list_or_empty_page_stops_walk() {
        let (transport, fetcher) = setup();
        transport.respond_json(&page_url(1), json!({"message": "Not Found"}));
        assert!(fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await.is_empty());

        let (transport, fetcher) = setup();
        transport.respond_json(&page_url(1), issue_page(1, 100));
        transport.respond_json(&page_url(2), json!([]));
        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;
        assert_eq!(issues.len(), 100);
        assert_eq!(transport.count(&page_url(3)), 0);
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let (transport, fetcher) = setup();
        transport.respond_json(&page_url(1), json!([issue_json(1), {"title": "no number"}]));

        let issues = fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 150).await;
        assert_eq!(issues.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_target_issues_no_requests() {
        let (transport, fetcher) = setup();
        assert!(fetch_closed_issues(&fetcher, ISSUES_ENDPOINT, 0).await.is_empty());
        assert!(transport.requests().is_empty());
    }
}
