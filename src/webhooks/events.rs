//! GitHub webhook event types.
//!
//! Only `push` carries a payload we act on. `ping` is acknowledged, and
//! everything else is logged and ignored.

use std::fmt;

use crate::types::{RepoId, Sha};

/// The event named by the `X-GitHub-Event` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Sent once when the webhook is configured.
    Ping,
    /// One or more commits were pushed to a ref.
    Push,
    /// Any other event type.
    Other(String),
}

impl EventKind {
    pub fn from_header(value: &str) -> Self {
        match value {
            "ping" => EventKind::Ping,
            "push" => EventKind::Push,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Ping => write!(f, "ping"),
            EventKind::Push => write!(f, "push"),
            EventKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A decoded `push` event.
///
/// Fields missing from the payload decode to empty strings. Nothing is
/// validated here: an empty ref is simply not protected, and an empty SHA
/// fails when the commit is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// The full ref that was pushed, e.g. `refs/heads/staging`.
    pub git_ref: String,

    /// The SHA of the commit now at the tip of `git_ref`.
    pub head_sha: Sha,

    /// The head commit's message as reported in the payload.
    ///
    /// Informational only; the message used for the approval decision is
    /// re-fetched from the API.
    pub head_message: String,

    /// The repository that was pushed to.
    pub repo: RepoId,
}
