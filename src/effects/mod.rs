//! Effects-as-data for GitHub operations.
//!
//! The policy and pipeline code describe API calls as [`GitHubEffect`] values
//! and hand them to a [`GitHubInterpreter`]. This keeps the decision logic
//! testable against a mock interpreter and lets every intended call be logged.

pub mod error;
pub mod github;
pub mod interpreter;

pub use error::EffectError;
pub use github::{CommentData, CommitData, GitHubEffect, GitHubResponse, PrData};
pub use interpreter::{GitHubConnector, GitHubInterpreter};
