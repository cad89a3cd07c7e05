//! Commit status states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of a commit status as published by this checker.
///
/// GitHub also has `pending`, which this checker never publishes: a status is
/// only written once the outcome is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    /// Every referenced PR was approved by someone other than its author.
    Success,
    /// At least one referenced PR lacks a non-author approval.
    Error,
    /// The check itself could not be completed.
    Failure,
}

impl StatusState {
    /// Returns the GitHub API string for this state.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            StatusState::Success => "success",
            StatusState::Error => "error",
            StatusState::Failure => "failure",
        }
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}
