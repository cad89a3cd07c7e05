//! Aggregating per-PR verdicts into a single commit status.

use crate::types::{PrNumber, StatusState};

/// GitHub rejects commit status descriptions longer than this.
pub const MAX_DESCRIPTION_CHARS: usize = 140;

pub const SUCCESS_DESCRIPTION: &str =
    "All pull requests were reviewed by a peer other than the author.";

const REJECTED_PREFIX: &str = "The following pull requests were not approved by a second peer: ";

pub const FAILURE_DESCRIPTION: &str =
    "Something went wrong when checking who approved the pull requests.";

/// The outcome of checking one PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalVerdict {
    pub pr: PrNumber,
    pub approved: bool,
}

/// The commit status to publish for a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: StatusState,
    pub description: String,
}

impl StatusReport {
    /// Builds the report for a completed check.
    ///
    /// Rejected PRs are listed in the order the verdicts were given. An empty
    /// verdict list (no annotated PRs in the commit) is a success.
    pub fn from_verdicts(verdicts: &[ApprovalVerdict]) -> Self {
        let rejected: Vec<String> = verdicts
            .iter()
            .filter(|v| !v.approved)
            .map(|v| v.pr.to_string())
            .collect();

        if rejected.is_empty() {
            StatusReport {
                state: StatusState::Success,
                description: SUCCESS_DESCRIPTION.to_string(),
            }
        } else {
            StatusReport {
                state: StatusState::Error,
                description: truncate_description(&format!(
                    "{}{}",
                    REJECTED_PREFIX,
                    rejected.join(",")
                )),
            }
        }
    }

    /// The report published when the check itself could not complete.
    pub fn pipeline_failure() -> Self {
        StatusReport {
            state: StatusState::Failure,
            description: FAILURE_DESCRIPTION.to_string(),
        }
    }
}

/// Truncates to [`MAX_DESCRIPTION_CHARS`] characters, ending in `...` when cut.
fn truncate_description(description: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description.to_string();
    }
    let mut truncated: String = description
        .chars()
        .take(MAX_DESCRIPTION_CHARS - 3)
        .collect();
    truncated.push_str("...");
    truncated
}
