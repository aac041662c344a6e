pub mod fetch;
pub mod types;

#[cfg(test)]
pub mod test_support;

pub use fetch::Fetcher;
pub use types::{Comment, CommitDiff, EnrichedIssue, HarvestRequest, RawIssue};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Invalid issues endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Parsed form of `<api-host>/repos/<owner>/<name>/issues`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEndpoint {
    /// API root everything else hangs off (e.g. "https://api.github.com")
    pub api_base: String,
    pub owner: String,
    pub name: String,
}

impl RepoEndpoint {
    /// "owner/name"
    pub fn repo(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// URL of the repository's issue listing, without query.
    pub fn issues_url(&self) -> String {
        format!("{}/repos/{}/{}/issues", self.api_base, self.owner, self.name)
    }

    /// URL of a single commit, including its `files` section.
    pub fn commit_url(&self, sha: &str) -> String {
        format!("{}/repos/{}/{}/commits/{}", self.api_base, self.owner, self.name, sha)
    }
}

/// Parse an issues endpoint URL into its component parts.
///
/// Accepts any host so that GitHub Enterprise (`https://host/api/v3/repos/...`)
/// and local test servers work; the path must end in `repos/{owner}/{name}/issues`.
pub fn parse_issues_endpoint(url: &str) -> Result<RepoEndpoint, GitHubError> {
    let invalid = || GitHubError::InvalidEndpoint(url.to_string());

    let parsed = reqwest::Url::parse(url).map_err(|_| invalid())?;
    if parsed.host_str().is_none() {
        return Err(invalid());
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|segment| !segment.is_empty())
        .collect();

    let repos_at = segments
        .iter()
        .rposition(|segment| *segment == "repos")
        .ok_or_else(invalid)?;
    let (prefix, rest) = segments.split_at(repos_at);

    let (owner, name) = match rest {
        [_, owner, name, "issues"] => (owner.to_string(), name.to_string()),
        _ => return Err(invalid()),
    };

    let mut base = parsed.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path(&prefix.join("/"));
    let api_base = base.as_str().trim_end_matches('/').to_string();

    Ok(RepoEndpoint {
        api_base,
        owner,
        name,
    })
}
