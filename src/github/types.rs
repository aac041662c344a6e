use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open/closed state of an issue as reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A closed issue as listed by `GET /repos/{owner}/{repo}/issues`.
/// Note: not Deserialize — built from the loosely-typed listing entry by
/// `RawIssue::from_value`, which defaults whatever the payload leaves out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawIssue {
    /// Issue number, unique per repository
    #[serde(rename = "issue_id")]
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Label names; labels without a name are skipped
    pub labels: Vec<String>,
    /// Author's login
    pub author: String,
    /// Assignee's login, if any
    pub assignee: Option<String>,
    /// Comment count as reported on the issue itself
    #[serde(rename = "comments_count")]
    pub comment_count: u64,
    pub events_url: String,
    pub comments_url: String,
    pub html_url: String,
}

/// One changed file in the commit that closed an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitDiff {
    /// File path (e.g., "src/auth/config.rs")
    pub path: String,
    /// Unified-diff text for this file; empty for binary files
    pub diff: String,
}

/// A single discussion comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// Commenter's login
    pub author: String,
    pub body: String,
}

/// An issue with its discussion and closing-commit diff attached.
///
/// `code_diff` is empty exactly when no "closed" event carrying a commit id
/// was found for the issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedIssue {
    #[serde(flatten)]
    pub issue: RawIssue,
    /// Comments in API (chronological) order
    pub comments: Vec<Comment>,
    pub code_diff: Vec<CommitDiff>,
    /// Owning repository, "owner/name"
    pub repo: String,
    /// Set only on the placeholder produced when nothing was harvested
    pub no_data: bool,
}

impl EnrichedIssue {
    /// Issue with nothing attached. Used when enrichment could not run at all.
    pub fn bare(issue: RawIssue, repo: &str) -> Self {
        Self {
            issue,
            comments: Vec::new(),
            code_diff: Vec::new(),
            repo: repo.to_string(),
            no_data: false,
        }
    }

    /// Placeholder standing in for an empty harvest.
    pub fn no_data(repo: &str) -> Self {
        let issue = RawIssue {
            number: 0,
            title: "No issues fetched".to_string(),
            body: "GitHub API returned zero issues.".to_string(),
            state: IssueState::Unknown,
            created_at: None,
            updated_at: None,
            closed_at: None,
            labels: Vec::new(),
            author: String::new(),
            assignee: None,
            comment_count: 0,
            events_url: String::new(),
            comments_url: String::new(),
            html_url: format!("https://github.com/{}/issues/no-data", repo),
        };
        Self {
            no_data: true,
            ..Self::bare(issue, repo)
        }
    }
}

/// What to harvest: an issues endpoint and how many closed issues to collect.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    /// `<api-host>/repos/<owner>/<name>/issues`
    pub endpoint: String,
    pub target: usize,
}

impl HarvestRequest {
    pub const DEFAULT_TARGET: usize = 150;

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            target: Self::DEFAULT_TARGET,
        }
    }

    pub fn with_target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }
}

// Wire payloads. Everything except the issue number is optional so that
// odd-shaped entries degrade instead of failing the page.

#[derive(Deserialize)]
struct UserPayload {
    login: Option<String>,
}

#[derive(Deserialize)]
struct LabelPayload {
    name: Option<String>,
}

#[derive(Deserialize)]
struct IssuePayload {
    number: u64,
    title: Option<String>,
    body: Option<String>,
    state: Option<IssueState>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    labels: Option<Vec<LabelPayload>>,
    user: Option<UserPayload>,
    assignee: Option<UserPayload>,
    comments: Option<u64>,
    events_url: Option<String>,
    comments_url: Option<String>,
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct CommentPayload {
    user: Option<UserPayload>,
    body: Option<String>,
}

#[derive(Deserialize)]
struct CommitFilePayload {
    filename: Option<String>,
    patch: Option<String>,
}

fn login_of(user: Option<UserPayload>) -> Option<String> {
    user.and_then(|u| u.login)
}

impl RawIssue {
    /// Decode one entry of the issue listing.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let payload = IssuePayload::deserialize(value)?;
        Ok(Self {
            number: payload.number,
            title: payload.title.unwrap_or_default(),
            body: payload.body.unwrap_or_default(),
            state: payload.state.unwrap_or_default(),
            created_at: payload.created_at,
            updated_at: payload.updated_at,
            closed_at: payload.closed_at,
            labels: payload
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| label.name)
                .collect(),
            author: login_of(payload.user).unwrap_or_else(|| "unknown".to_string()),
            assignee: login_of(payload.assignee),
            comment_count: payload.comments.unwrap_or(0),
            events_url: payload.events_url.unwrap_or_default(),
            comments_url: payload.comments_url.unwrap_or_default(),
            html_url: payload.html_url.unwrap_or_default(),
        })
    }
}

impl Comment {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let payload = CommentPayload::deserialize(value)?;
        Ok(Self {
            author: login_of(payload.user).unwrap_or_else(|| "unknown".to_string()),
            body: payload.body.unwrap_or_default(),
        })
    }
}

impl CommitDiff {
    /// Decode one entry of a commit's `files` array. Entries without a
    /// filename yield `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let payload = CommitFilePayload::deserialize(value).ok()?;
        Some(Self {
            path: payload.filename?,
            diff: payload.patch.unwrap_or_default(),
        })
    }
}
