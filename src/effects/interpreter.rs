//! Effect interpreter traits.
//!
//! The trait-based design enables mock interpreters for testing, with the
//! octocrab-backed interpreter used in production.

use std::fmt;
use std::future::Future;

use super::github::{GitHubEffect, GitHubResponse};
use crate::types::RepoId;

/// Interprets GitHub effects against the GitHub API.
///
/// Implementations are constructed with a `RepoId`, so all effects executed
/// through a single interpreter instance are scoped to that repository.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct MockGitHubInterpreter {
///     responses: HashMap<GitHubEffect, GitHubResponse>,
/// }
///
/// impl GitHubInterpreter for MockGitHubInterpreter {
///     type Error = anyhow::Error;
///
///     async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
///         self.responses.get(&effect)
///             .cloned()
///             .ok_or_else(|| anyhow!("unexpected effect: {:?}", effect))
///     }
/// }
/// ```
pub trait GitHubInterpreter: Send + Sync {
    /// The error type returned by this interpreter.
    type Error: fmt::Display + Send + 'static;

    /// Execute a GitHub effect and return its response.
    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send;
}

/// Produces a repo-scoped interpreter for an incoming push.
///
/// Connecting is where credentials are resolved (for a GitHub App, this mints
/// an installation token), so it happens once per push rather than once per
/// effect.
pub trait GitHubConnector: Send + Sync + 'static {
    type Interpreter: GitHubInterpreter + Clone + 'static;
    type Error: fmt::Display + Send + 'static;

    fn connect(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<Self::Interpreter, Self::Error>> + Send;
}
