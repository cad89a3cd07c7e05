//! Deciding whether a PR was approved by someone other than its author.
//!
//! An approval is a PR comment whose body is the merge-queue approval command
//! (`bors r+` by default), written by a user other than the PR author. Any API
//! failure while looking for one counts as "not approved".

use tracing::{debug, warn};

use crate::effects::{CommentData, EffectError, GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::{PrNumber, RepoId, UserId};

/// Default approval command.
pub const DEFAULT_APPROVAL_TOKEN: &str = "bors r+";

/// Default number of comments fetched per page.
pub const DEFAULT_COMMENT_PAGE_SIZE: u8 = 10;

/// What counts as an approval, and how comments are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPolicy {
    /// The comment body that approves a PR, compared case-insensitively.
    pub approval_token: String,
    /// Comments per page (1-100).
    pub page_size: u8,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        ApprovalPolicy {
            approval_token: DEFAULT_APPROVAL_TOKEN.to_string(),
            page_size: DEFAULT_COMMENT_PAGE_SIZE,
        }
    }
}

/// Returns true if `body` is exactly the approval command.
///
/// Surrounding whitespace is ignored and case is folded, so `"  BORS R+\n"`
/// approves but `"bors r+ please"` does not.
pub fn is_approval_comment(body: &str, token: &str) -> bool {
    body.trim().to_lowercase() == token.trim().to_lowercase()
}

/// A lazy cursor over a PR's comments, one page at a time.
///
/// Starts at page 1. Ends when GitHub advertises no next page, or advertises a
/// page that does not move forward.
pub struct CommentPager<'a, G> {
    github: &'a G,
    pr: PrNumber,
    per_page: u8,
    next: Option<u32>,
}

impl<'a, G: GitHubInterpreter> CommentPager<'a, G> {
    pub fn new(github: &'a G, pr: PrNumber, per_page: u8) -> Self {
        CommentPager {
            github,
            pr,
            per_page: per_page.clamp(1, 100),
            next: Some(1),
        }
    }

    /// Fetches the next page, or `None` once pagination is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<CommentData>>, EffectError<G::Error>> {
        let Some(page) = self.next else {
            return Ok(None);
        };

        let effect = GitHubEffect::ListCommentsPage {
            pr: self.pr,
            page,
            per_page: self.per_page,
        };
        match self.github.interpret(effect).await {
            Ok(GitHubResponse::CommentsPage {
                comments,
                next_page,
            }) => {
                self.next = next_page.filter(|&n| n > page);
                if next_page.is_some() && self.next.is_none() {
                    warn!(
                        pr = %self.pr,
                        page,
                        ?next_page,
                        "Comment pagination did not advance, stopping"
                    );
                }
                Ok(Some(comments))
            }
            Ok(_) => {
                self.next = None;
                Err(EffectError::UnexpectedResponse {
                    effect: "ListCommentsPage",
                })
            }
            Err(e) => {
                self.next = None;
                Err(EffectError::GitHub(e))
            }
        }
    }
}

/// Fetches the author of a PR.
async fn pr_author<G: GitHubInterpreter>(
    github: &G,
    pr: PrNumber,
) -> Result<Option<UserId>, EffectError<G::Error>> {
    match github.interpret(GitHubEffect::GetPr { pr }).await {
        Ok(GitHubResponse::Pr(data)) => {
            debug!(pr = %pr, author = ?data.author_login, "Resolved PR author");
            Ok(data.author_id)
        }
        Ok(_) => Err(EffectError::UnexpectedResponse { effect: "GetPr" }),
        Err(e) => Err(EffectError::GitHub(e)),
    }
}

/// Looks for an approval comment by someone other than `author`.
async fn find_non_author_approval<G: GitHubInterpreter>(
    github: &G,
    pr: PrNumber,
    author: UserId,
    policy: &ApprovalPolicy,
) -> Result<Option<CommentData>, EffectError<G::Error>> {
    let mut pager = CommentPager::new(github, pr, policy.page_size);
    while let Some(comments) = pager.next_page().await? {
        if let Some(approval) = comments.into_iter().find(|c| {
            c.author_id != author && is_approval_comment(&c.body, &policy.approval_token)
        }) {
            return Ok(Some(approval));
        }
    }
    Ok(None)
}

/// Returns true if `pr` carries an approval comment from someone other than
/// its author.
///
/// Fails closed: a PR with no known author, or any API error, yields `false`.
pub async fn approved_by_non_author<G: GitHubInterpreter>(
    github: &G,
    repo: &RepoId,
    pr: PrNumber,
    policy: &ApprovalPolicy,
) -> bool {
    let author = match pr_author(github, pr).await {
        Ok(Some(author)) => author,
        Ok(None) => {
            warn!(pr = %pr, repo = %repo, "PR has no known author, treating as not approved");
            return false;
        }
        Err(e) => {
            warn!(pr = %pr, repo = %repo, error = %e, "Could not fetch pull request");
            return false;
        }
    };

    match find_non_author_approval(github, pr, author, policy).await {
        Ok(Some(comment)) => {
            debug!(
                pr = %pr,
                comment_id = %comment.id,
                approver = %comment.author_id,
                "Found non-author approval"
            );
            true
        }
        Ok(None) => {
            debug!(pr = %pr, repo = %repo, "No non-author approval found");
            false
        }
        Err(e) => {
            warn!(pr = %pr, repo = %repo, error = %e, "Could not fetch pull request comments");
            false
        }
    }
}
