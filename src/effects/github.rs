//! GitHub API effect types.
//!
//! These types describe the GitHub API operations the checker performs, as
//! data. An interpreter executes them against the real API (or a mock).

use serde::{Deserialize, Serialize};

use crate::types::{CommentId, PrNumber, Sha, StatusState, UserId};

/// A GitHub API effect.
///
/// Each variant describes a GitHub API operation. Effects are repo-scoped:
/// the interpreter is constructed with a `RepoId`, so effects don't include it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// Fetch a git commit object by SHA.
    GetCommit { sha: Sha },

    /// Fetch a single PR by number.
    GetPr { pr: PrNumber },

    /// Fetch one page of issue comments on a PR.
    ///
    /// Pages are 1-based, as in the GitHub API.
    ListCommentsPage { pr: PrNumber, page: u32, per_page: u8 },

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Create a commit status on `sha`.
    CreateStatus {
        sha: Sha,
        state: StatusState,
        description: String,
        context: String,
    },
}

impl GitHubEffect {
    /// Returns true if this effect only reads from the API.
    ///
    /// Reads are safe to retry. Creating a status appends to the commit's
    /// status list, so it is attempted once.
    pub fn is_read(&self) -> bool {
        match self {
            GitHubEffect::GetCommit { .. }
            | GitHubEffect::GetPr { .. }
            | GitHubEffect::ListCommentsPage { .. } => true,
            GitHubEffect::CreateStatus { .. } => false,
        }
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// Git commit data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    /// The full commit message.
    pub message: String,
}

/// PR data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrData {
    /// The PR number.
    pub number: PrNumber,
    /// The author's GitHub user ID. `None` if GitHub did not report a user
    /// (e.g. a deleted account).
    pub author_id: Option<UserId>,
    /// The author's login, for logging.
    pub author_login: Option<String>,
}

/// Comment data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentData {
    /// The comment ID.
    pub id: CommentId,
    /// The author's GitHub user ID.
    pub author_id: UserId,
    /// The comment body.
    pub body: String,
}

/// Response from a GitHub effect.
///
/// Each variant corresponds to the response from a particular effect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `GetCommit`.
    Commit(CommitData),

    /// Response to `GetPr`.
    Pr(PrData),

    /// Response to `ListCommentsPage`.
    CommentsPage {
        comments: Vec<CommentData>,
        /// The next page number, if GitHub advertised one.
        next_page: Option<u32>,
    },

    /// Response to `CreateStatus`.
    StatusCreated,
}
