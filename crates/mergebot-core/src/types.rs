use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Paginated results in server order. Each inner vec is one page.
pub type Pages<T> = Vec<Vec<T>>;

// ---------------------------------------------------------------------------
// RepoRef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// PullState
// ---------------------------------------------------------------------------

/// Lifecycle state as reported by the API. Values we don't know about are
/// carried through verbatim so `state` conditions can still match them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullState {
    Open,
    Closed,
    Other(String),
}

impl PullState {
    pub fn as_str(&self) -> &str {
        match self {
            PullState::Open => "open",
            PullState::Closed => "closed",
            PullState::Other(s) => s,
        }
    }
}

impl From<&str> for PullState {
    fn from(s: &str) -> Self {
        match s {
            "open" => PullState::Open,
            "closed" => PullState::Closed,
            other => PullState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PullState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
}

impl Comment {
    pub fn new(id: u64, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            author: author.into(),
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PullRequest
// ---------------------------------------------------------------------------

/// Snapshot of one pull request, taken once per run.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: PullState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Name of the branch the pull request merges into (`base.ref`).
    pub base_ref: String,
    pub html_url: String,
}

impl PartialEq for PullRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PullRequest {}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<#{} \"{}\" by @{} ({})>",
            self.number, self.title, self.author, self.html_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(id: u64, title: &str) -> PullRequest {
        let now = Utc::now();
        PullRequest {
            id,
            number: 12,
            title: title.to_string(),
            author: "erasche".to_string(),
            state: PullState::Open,
            created_at: now,
            updated_at: now,
            base_ref: "dev".to_string(),
            html_url: "https://github.com/galaxyproject/galaxy/pull/12".to_string(),
        }
    }

    #[test]
    fn pull_state_passes_unknown_values_through() {
        assert_eq!(PullState::from("open"), PullState::Open);
        assert_eq!(PullState::from("closed"), PullState::Closed);
        let odd = PullState::from("merged");
        assert_eq!(odd, PullState::Other("merged".to_string()));
        assert_eq!(odd.as_str(), "merged");
    }

    #[test]
    fn identity_is_the_id() {
        assert_eq!(pr(1, "a"), pr(1, "b"));
        assert_ne!(pr(1, "a"), pr(2, "a"));
    }

    #[test]
    fn display_names_number_title_and_author() {
        let shown = pr(1, "[PROCEDURES] Testing").to_string();
        assert_eq!(
            shown,
            "<#12 \"[PROCEDURES] Testing\" by @erasche (https://github.com/galaxyproject/galaxy/pull/12)>"
        );
    }
}
