//! Shared test utilities: a scripted GitHub interpreter and connector.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::effects::{
    CommentData, CommitData, GitHubConnector, GitHubEffect, GitHubInterpreter, GitHubResponse,
    PrData,
};
use crate::types::{CommentId, PrNumber, RepoId, Sha, StatusState, UserId};

type FailWhen = Arc<dyn Fn(&GitHubEffect) -> bool + Send + Sync>;

#[derive(Default)]
struct MockState {
    commits: HashMap<Sha, String>,
    pr_authors: HashMap<PrNumber, Option<UserId>>,
    comments: HashMap<PrNumber, Vec<CommentData>>,
    stuck_pagination: HashSet<PrNumber>,
    fail_when: Vec<FailWhen>,
    delay: Option<Duration>,
    effects: Vec<GitHubEffect>,
    next_comment_id: u64,
}

/// A scripted in-memory GitHub.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the recorded effects through another.
#[derive(Clone, Default)]
pub struct MockGitHub {
    state: Arc<Mutex<MockState>>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(self, sha: impl Into<Sha>, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .commits
            .insert(sha.into(), message.to_string());
        self
    }

    pub fn with_pr(self, pr: u64, author: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .pr_authors
            .insert(PrNumber(pr), Some(UserId(author)));
        self
    }

    /// Registers a PR whose author GitHub does not report.
    pub fn with_authorless_pr(self, pr: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .pr_authors
            .insert(PrNumber(pr), None);
        self
    }

    /// Appends a comment to a PR's thread.
    pub fn with_comment(self, pr: u64, author: u64, body: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_comment_id += 1;
            let id = CommentId(state.next_comment_id);
            state
                .comments
                .entry(PrNumber(pr))
                .or_default()
                .push(CommentData {
                    id,
                    author_id: UserId(author),
                    body: body.to_string(),
                });
        }
        self
    }

    /// Makes every comment page for `pr` advertise itself as the next page.
    pub fn with_stuck_pagination(self, pr: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .stuck_pagination
            .insert(PrNumber(pr));
        self
    }

    /// Fails every effect matching `predicate`.
    pub fn failing_when(
        self,
        predicate: impl Fn(&GitHubEffect) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_when
            .push(Arc::new(predicate));
        self
    }

    /// Delays every effect by `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Every effect received so far, in order.
    pub fn effects(&self) -> Vec<GitHubEffect> {
        self.state.lock().unwrap().effects.clone()
    }

    /// Every `CreateStatus` received so far, as `(sha, state, description, context)`.
    pub fn statuses(&self) -> Vec<(Sha, StatusState, String, String)> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                GitHubEffect::CreateStatus {
                    sha,
                    state,
                    description,
                    context,
                } => Some((sha, state, description, context)),
                _ => None,
            })
            .collect()
    }

    /// The pages requested for `pr`, in order.
    pub fn comment_pages_requested(&self, pr: u64) -> Vec<u32> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                GitHubEffect::ListCommentsPage { pr: p, page, .. } if p == PrNumber(pr) => {
                    Some(page)
                }
                _ => None,
            })
            .collect()
    }

    fn respond(&self, effect: &GitHubEffect) -> Result<GitHubResponse, String> {
        let state = self.state.lock().unwrap();
        if state.fail_when.iter().any(|f| f(effect)) {
            return Err(format!("scripted failure for {:?}", effect));
        }

        match effect {
            GitHubEffect::GetCommit { sha } => state
                .commits
                .get(sha)
                .map(|message| {
                    GitHubResponse::Commit(CommitData {
                        message: message.clone(),
                    })
                })
                .ok_or_else(|| format!("commit {} not found", sha)),
            GitHubEffect::GetPr { pr } => state
                .pr_authors
                .get(pr)
                .map(|author| {
                    GitHubResponse::Pr(PrData {
                        number: *pr,
                        author_id: *author,
                        author_login: author.map(|id| format!("user-{}", id)),
                    })
                })
                .ok_or_else(|| format!("PR {} not found", pr)),
            GitHubEffect::ListCommentsPage { pr, page, per_page } => {
                let all = state.comments.get(pr).map(Vec::as_slice).unwrap_or(&[]);
                let per_page = usize::from((*per_page).max(1));
                let start = (*page as usize).saturating_sub(1) * per_page;
                let comments: Vec<CommentData> =
                    all.iter().skip(start).take(per_page).cloned().collect();
                let next_page = if state.stuck_pagination.contains(pr) {
                    Some(*page)
                } else if start + per_page < all.len() {
                    Some(page + 1)
                } else {
                    None
                };
                Ok(GitHubResponse::CommentsPage {
                    comments,
                    next_page,
                })
            }
            GitHubEffect::CreateStatus { .. } => Ok(GitHubResponse::StatusCreated),
        }
    }
}

impl GitHubInterpreter for MockGitHub {
    type Error = String;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send {
        let this = self.clone();
        async move {
            let delay = {
                let mut state = this.state.lock().unwrap();
                state.effects.push(effect.clone());
                state.delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            this.respond(&effect)
        }
    }
}

/// A connector handing out clones of one [`MockGitHub`].
#[derive(Clone)]
pub struct MockConnector {
    pub github: MockGitHub,
    fail: bool,
    hang: bool,
    connected: Arc<Mutex<Vec<RepoId>>>,
}

impl MockConnector {
    pub fn new(github: MockGitHub) -> Self {
        MockConnector {
            github,
            fail: false,
            hang: false,
            connected: Arc::default(),
        }
    }

    /// A connector whose every `connect` fails, as with a revoked installation.
    pub fn failing() -> Self {
        MockConnector {
            fail: true,
            ..MockConnector::new(MockGitHub::new())
        }
    }

    /// A connector whose every `connect` never resolves, as with a token
    /// exchange that hangs.
    pub fn hanging() -> Self {
        MockConnector {
            hang: true,
            ..MockConnector::new(MockGitHub::new())
        }
    }

    /// Repositories connected to so far.
    pub fn connected(&self) -> Vec<RepoId> {
        self.connected.lock().unwrap().clone()
    }
}

impl GitHubConnector for MockConnector {
    type Interpreter = MockGitHub;
    type Error = String;

    fn connect(
        &self,
        repo: &RepoId,
    ) -> impl Future<Output = Result<Self::Interpreter, Self::Error>> + Send {
        self.connected.lock().unwrap().push(repo.clone());
        let result = if self.fail {
            Err(format!("installation token refused for {}", repo))
        } else {
            Ok(self.github.clone())
        };
        let hang = self.hang;
        async move {
            if hang {
                std::future::pending::<()>().await;
            }
            result
        }
    }
}
