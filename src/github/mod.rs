//! GitHub API client and effect interpreter.
//!
//! Executes `GitHubEffect`s via octocrab, authenticated as a GitHub App
//! installation.
//!
//! Key features:
//! - Exponential backoff retry for transient failures on reads
//! - Distinguishes transient vs permanent errors
//! - Installation tokens minted per push

mod auth;
mod client;
mod error;
mod interpreter;
mod retry;

pub use auth::{AuthError, InstallationConnector};
pub use client::OctocrabClient;
pub use error::{GitHubApiError, GitHubErrorKind};
pub use interpreter::{interpret_github_effect, page_number, retry_policy_for};
pub use retry::{RetryConfig, RetryPolicy, retry_with_backoff};
