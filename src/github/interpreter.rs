//! GitHub effect interpreter using octocrab.
//!
//! Executes [`GitHubEffect`]s against the real GitHub API. Reads are retried
//! with exponential backoff on transient errors. Status creation is attempted
//! once.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::effects::{
    CommentData, CommitData, GitHubEffect, GitHubInterpreter, GitHubResponse, PrData,
};
use crate::types::{CommentId, PrNumber, Sha, StatusState, UserId};

use super::client::OctocrabClient;
use super::error::GitHubApiError;
use super::retry::{RetryConfig, RetryPolicy, retry_with_backoff};

impl GitHubInterpreter for OctocrabClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        let policy = retry_policy_for(&effect);
        interpret_github_effect(self, effect, RetryConfig::DEFAULT, policy).await
    }
}

/// Reads are retried; writes are not.
pub fn retry_policy_for(effect: &GitHubEffect) -> RetryPolicy {
    if effect.is_read() {
        RetryPolicy::RetryTransient
    } else {
        RetryPolicy::NoRetry
    }
}

/// Interprets a GitHub effect with the given retry behavior.
pub async fn interpret_github_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
) -> Result<GitHubResponse, GitHubApiError> {
    debug!(repo = %client.repo(), ?effect, "Executing GitHub effect");
    retry_with_backoff(retry_config, retry_policy, || {
        execute_effect(client, effect.clone())
    })
    .await
}

/// Executes a single effect without retry logic.
async fn execute_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    match effect {
        GitHubEffect::GetCommit { sha } => get_commit(client, sha).await,
        GitHubEffect::GetPr { pr } => get_pr(client, pr).await,
        GitHubEffect::ListCommentsPage { pr, page, per_page } => {
            list_comments_page(client, pr, page, per_page).await
        }
        GitHubEffect::CreateStatus {
            sha,
            state,
            description,
            context,
        } => create_status(client, sha, state, description, context).await,
    }
}

// ─── Commits ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GitCommitResponse {
    #[serde(default)]
    message: String,
}

async fn get_commit(client: &OctocrabClient, sha: Sha) -> Result<GitHubResponse, GitHubApiError> {
    if sha.is_empty() {
        return Err(GitHubApiError::permanent_without_source(
            "push event carried no head commit SHA",
        ));
    }

    let url = format!(
        "/repos/{}/{}/git/commits/{}",
        client.owner(),
        client.repo_name(),
        sha
    );

    let result: Result<GitCommitResponse, _> = client.inner().get(&url, None::<&()>).await;

    match result {
        Ok(commit) => Ok(GitHubResponse::Commit(CommitData {
            message: commit.message,
        })),
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

// ─── Pull Requests ────────────────────────────────────────────────────────────

async fn get_pr(client: &OctocrabClient, pr: PrNumber) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .pulls(client.owner(), client.repo_name())
        .get(pr.0)
        .await;

    match result {
        Ok(pull) => Ok(GitHubResponse::Pr(PrData {
            number: pr,
            author_id: pull.user.as_ref().map(|u| UserId(u.id.into_inner())),
            author_login: pull.user.map(|u| u.login),
        })),
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

// ─── Comments ─────────────────────────────────────────────────────────────────

async fn list_comments_page(
    client: &OctocrabClient,
    pr: PrNumber,
    page: u32,
    per_page: u8,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .issues(client.owner(), client.repo_name())
        .list_comments(pr.0)
        .per_page(per_page)
        .page(page)
        .send()
        .await;

    match result {
        Ok(page_result) => {
            let next_page = page_result
                .next
                .as_ref()
                .and_then(|link| page_number(&link.to_string()));

            let comments = page_result
                .items
                .into_iter()
                .map(|comment| CommentData {
                    id: CommentId(comment.id.into_inner()),
                    author_id: UserId(comment.user.id.into_inner()),
                    body: comment.body.unwrap_or_default(),
                })
                .collect();

            Ok(GitHubResponse::CommentsPage {
                comments,
                next_page,
            })
        }
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

/// Extracts the `page` query parameter from a pagination link.
pub fn page_number(link: &str) -> Option<u32> {
    let url = Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

// ─── Statuses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateStatusRequest<'a> {
    state: StatusState,
    description: &'a str,
    context: &'a str,
}

async fn create_status(
    client: &OctocrabClient,
    sha: Sha,
    state: StatusState,
    description: String,
    context: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/statuses/{}",
        client.owner(),
        client.repo_name(),
        sha
    );

    let request = CreateStatusRequest {
        state,
        description: &description,
        context: &context,
    };

    let result: Result<serde_json::Value, _> = client.inner().post(&url, Some(&request)).await;

    match result {
        Ok(_) => Ok(GitHubResponse::StatusCreated),
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}
