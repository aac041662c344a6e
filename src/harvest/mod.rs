pub mod enrich;
pub mod paginate;

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, instrument, warn, Instrument};

use crate::github::{parse_issues_endpoint, EnrichedIssue, Fetcher, GitHubError, HarvestRequest};

/// Fan-out limits for one harvest.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Issue enrichments allowed in flight at once
    pub concurrency: usize,
    /// Patch text kept per changed file
    pub max_patch_bytes: usize,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            concurrency: 20,
            max_patch_bytes: 20_000,
        }
    }
}

/// Harvest closed issues from `request.endpoint`, each enriched with its
/// comments and closing-commit diff.
///
/// Output order matches discovery order. An empty harvest yields a single
/// `no_data` placeholder. The only error is an endpoint that cannot be parsed;
/// per-issue failures degrade that issue's record instead.
#[instrument(skip_all, fields(endpoint = %request.endpoint, limit = request.target))]
pub async fn harvest(
    fetcher: &Fetcher,
    request: &HarvestRequest,
    options: &HarvestOptions,
) -> Result<Vec<EnrichedIssue>, GitHubError> {
    let endpoint = parse_issues_endpoint(&request.endpoint)?;
    let repo = endpoint.repo();

    let issues = paginate::fetch_closed_issues(fetcher, &endpoint.issues_url(), request.target).await;
    info!(repo = %repo, issues = issues.len(), "discovered closed issues");
    if issues.is_empty() {
        warn!(repo = %repo, "no closed issues found");
        return Ok(vec![EnrichedIssue::no_data(&repo)]);
    }

    let endpoint = Arc::new(endpoint);
    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, issue) in issues.iter().cloned().enumerate() {
        let fetcher = fetcher.clone();
        let endpoint = Arc::clone(&endpoint);
        let permits = Arc::clone(&permits);
        let max_patch_bytes = options.max_patch_bytes;
        let span = info_span!("enrich", issue = issue.number);

        tasks.spawn(
            async move {
                // the semaphore is never closed
                let _permit = permits.acquire().await;
                let enriched = enrich::enrich(&fetcher, issue, &endpoint, max_patch_bytes).await;
                (index, enriched)
            }
            .instrument(span),
        );
    }

    let mut slots: Vec<Option<EnrichedIssue>> = std::iter::repeat_with(|| None)
        .take(issues.len())
        .collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, enriched)) => slots[index] = Some(enriched),
            Err(e) => warn!(error = %e, "enrichment task failed"),
        }
    }

    let results: Vec<EnrichedIssue> = issues
        .into_iter()
        .zip(slots)
        .map(|(issue, slot)| slot.unwrap_or_else(|| EnrichedIssue::bare(issue, &repo)))
        .collect();
    info!(
        repo = %repo,
        issues = results.len(),
        with_diff = results.iter().filter(|r| !r.code_diff.is_empty()).count(),
        "harvest complete"
    );
    Ok(results)
}
