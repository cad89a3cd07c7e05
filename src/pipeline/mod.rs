//! The push-to-status pipeline.
//!
//! For a push to a protected ref: connect to GitHub, read the head commit's
//! message, check every PR it references, and publish exactly one commit
//! status. Evaluation runs under a deadline and the shutdown token; if either
//! fires, or the commit cannot be read, a `failure` status is published
//! instead.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::config::{DEFAULT_DEADLINE_SECS, DEFAULT_MAX_CONCURRENT_CHECKS, DEFAULT_STATUS_CONTEXT};
use crate::effects::{EffectError, GitHubConnector, GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::policy::{
    ApprovalPolicy, ApprovalVerdict, ProtectedRefs, StatusReport, approved_by_non_author,
    distinct_pr_numbers, extract_pr_references,
};
use crate::types::{PrNumber, RepoId, Sha};
use crate::webhooks::PushEvent;

/// Upper bound on the status write, separate from the evaluation deadline.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning for a single push evaluation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub approval: ApprovalPolicy,
    /// The commit status context, e.g. `four-eyes`.
    pub status_context: String,
    /// PR checks allowed in flight at once.
    pub max_concurrent_checks: usize,
    /// Budget for reading the commit and checking every PR.
    pub deadline: Duration,
    /// Budget for writing the status.
    pub publish_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            approval: ApprovalPolicy::default(),
            status_context: DEFAULT_STATUS_CONTEXT.to_string(),
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// What happened to a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The ref is not protected. Nothing was read or written.
    Ignored,
    /// A status was published.
    Reported(StatusReport),
}

/// A push to a protected ref for which no status could be published.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not connect to GitHub for {repo}: {message}")]
    Connect { repo: RepoId, message: String },

    #[error("could not publish status on {sha}: {message}")]
    Publish { sha: Sha, message: String },
}

/// Why evaluation produced no verdicts.
#[derive(Debug, Error)]
enum EvaluationError {
    #[error("could not read head commit: {0}")]
    Commit(String),

    #[error("exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("cancelled by shutdown")]
    Cancelled,
}

/// Runs the four-eyes check for one push event.
#[instrument(
    skip_all,
    fields(repo = %event.repo, git_ref = %event.git_ref, sha = %event.head_sha)
)]
pub async fn handle_push<C: GitHubConnector>(
    connector: &C,
    protected: &ProtectedRefs,
    config: &PipelineConfig,
    event: &PushEvent,
    cancel: &CancellationToken,
) -> Result<PushOutcome, PipelineError> {
    if !protected.is_relevant(&event.git_ref) {
        debug!("Ref is not protected, ignoring push");
        return Ok(PushOutcome::Ignored);
    }

    let deadline = Instant::now() + config.deadline;
    let github = connect_with_deadline(connector, &event.repo, config, deadline, cancel)
        .await
        .map_err(|message| PipelineError::Connect {
            repo: event.repo.clone(),
            message,
        })?;

    let report = match evaluate_with_deadline(&github, event, config, deadline, cancel).await {
        Ok(verdicts) => StatusReport::from_verdicts(&verdicts),
        Err(e) => {
            warn!(error = %e, "Four-eyes check could not complete");
            StatusReport::pipeline_failure()
        }
    };

    publish(&github, &event.head_sha, &report, config).await?;
    info!(state = %report.state, description = %report.description, "Published four-eyes status");
    Ok(PushOutcome::Reported(report))
}

/// Exchanges credentials for a repo-scoped client under the push's deadline.
///
/// A connection that is already available wins over a pending shutdown, so
/// the failure status can still be published; a hung exchange does not.
async fn connect_with_deadline<C: GitHubConnector>(
    connector: &C,
    repo: &RepoId,
    config: &PipelineConfig,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<C::Interpreter, String> {
    tokio::select! {
        biased;

        result = tokio::time::timeout_at(deadline, connector.connect(repo)) => match result {
            Ok(connected) => connected.map_err(|e| e.to_string()),
            Err(_) => Err(EvaluationError::DeadlineExceeded(config.deadline).to_string()),
        },
        _ = cancel.cancelled() => Err(EvaluationError::Cancelled.to_string()),
    }
}

/// Evaluates the push, racing the deadline against shutdown.
///
/// Losing the race drops the evaluation future, which aborts any PR checks
/// still in flight. `deadline` is shared with the connection step.
async fn evaluate_with_deadline<G>(
    github: &G,
    event: &PushEvent,
    config: &PipelineConfig,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<Vec<ApprovalVerdict>, EvaluationError>
where
    G: GitHubInterpreter + Clone + 'static,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(EvaluationError::Cancelled),
        result = tokio::time::timeout_at(deadline, evaluate(github, event, config)) => {
            result.map_err(|_| EvaluationError::DeadlineExceeded(config.deadline))?
        }
    }
}

async fn evaluate<G>(
    github: &G,
    event: &PushEvent,
    config: &PipelineConfig,
) -> Result<Vec<ApprovalVerdict>, EvaluationError>
where
    G: GitHubInterpreter + Clone + 'static,
{
    let message = commit_message(github, &event.head_sha)
        .await
        .map_err(|e| EvaluationError::Commit(e.to_string()))?;
    if !event.head_message.is_empty() && event.head_message != message {
        debug!(
            payload_message = %event.head_message,
            fetched_message = %message,
            "Payload commit message differs from the fetched one, using the fetched one"
        );
    }

    let references = extract_pr_references(&message);
    for reference in &references {
        debug!(
            pr = %reference.number,
            reviewer = %reference.reviewer_hint,
            author = %reference.author_hint,
            "Found PR annotation"
        );
    }

    let prs = distinct_pr_numbers(&references);
    info!(count = prs.len(), "Checking referenced PRs");
    Ok(check_all(github, &event.repo, prs, config).await)
}

async fn commit_message<G: GitHubInterpreter>(
    github: &G,
    sha: &Sha,
) -> Result<String, EffectError<G::Error>> {
    match github
        .interpret(GitHubEffect::GetCommit { sha: sha.clone() })
        .await
    {
        Ok(GitHubResponse::Commit(commit)) => Ok(commit.message),
        Ok(_) => Err(EffectError::UnexpectedResponse {
            effect: "GetCommit",
        }),
        Err(e) => Err(EffectError::GitHub(e)),
    }
}

/// Checks every PR concurrently, at most `max_concurrent_checks` at a time.
///
/// Verdicts come back in the order of `prs`. A check that panics counts as not
/// approved.
pub async fn check_all<G>(
    github: &G,
    repo: &RepoId,
    prs: Vec<PrNumber>,
    config: &PipelineConfig,
) -> Vec<ApprovalVerdict>
where
    G: GitHubInterpreter + Clone + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1)));
    let mut tasks = JoinSet::new();

    for (index, pr) in prs.iter().copied().enumerate() {
        let github = github.clone();
        let repo = repo.clone();
        let policy = config.approval.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(
            async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, approved_by_non_author(&github, &repo, pr, &policy).await)
            }
            .in_current_span(),
        );
    }

    let mut approved = vec![false; prs.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, ok)) => approved[index] = ok,
            Err(e) => warn!(error = %e, "PR check task failed, treating as not approved"),
        }
    }

    prs.into_iter()
        .zip(approved)
        .map(|(pr, approved)| ApprovalVerdict { pr, approved })
        .collect()
}

/// Writes the status, bounded by `publish_timeout`. Never retried.
async fn publish<G: GitHubInterpreter>(
    github: &G,
    sha: &Sha,
    report: &StatusReport,
    config: &PipelineConfig,
) -> Result<(), PipelineError> {
    let effect = GitHubEffect::CreateStatus {
        sha: sha.clone(),
        state: report.state,
        description: report.description.clone(),
        context: config.status_context.clone(),
    };

    let message = match tokio::time::timeout(config.publish_timeout, github.interpret(effect)).await
    {
        Ok(Ok(GitHubResponse::StatusCreated)) => return Ok(()),
        Ok(Ok(_)) => "unexpected response to CreateStatus".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {:?}", config.publish_timeout),
    };

    Err(PipelineError::Publish {
        sha: sha.clone(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::report::{FAILURE_DESCRIPTION, SUCCESS_DESCRIPTION};
    use crate::test_utils::{MockConnector, MockGitHub};
    use crate::types::StatusState;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";
    const AUTHOR: u64 = 100;
    const REVIEWER: u64 = 200;

    fn push(git_ref: &str) -> PushEvent {
        PushEvent {
            git_ref: git_ref.to_string(),
            head_sha: Sha::new(SHA),
            head_message: String::new(),
            repo: RepoId::new("acme", "widgets"),
        }
    }

    async fn run(
        connector: &MockConnector,
        config: &PipelineConfig,
    ) -> Result<PushOutcome, PipelineError> {
        handle_push(
            connector,
            &ProtectedRefs::default(),
            config,
            &push("refs/heads/staging"),
            &CancellationToken::new(),
        )
        .await
    }

    fn reported_state(outcome: &Result<PushOutcome, PipelineError>) -> StatusState {
        match outcome {
            Ok(PushOutcome::Reported(report)) => report.state,
            other => panic!("expected a reported status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn irrelevant_ref_makes_no_calls() {
        let github = MockGitHub::new().with_commit(SHA, "7: thing r=a a=b");
        let connector = MockConnector::new(github.clone());

        let outcome = handle_push(
            &connector,
            &ProtectedRefs::default(),
            &PipelineConfig::default(),
            &push("refs/heads/main"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, PushOutcome::Ignored);
        assert!(connector.connected().is_empty());
        assert!(github.effects().is_empty());
    }

    #[tokio::test]
    async fn no_annotations_publishes_success() {
        let github = MockGitHub::new().with_commit(SHA, "Fix typo in README");
        let connector = MockConnector::new(github.clone());

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert_eq!(reported_state(&outcome), StatusState::Success);
        assert_eq!(
            github.effects(),
            vec![
                GitHubEffect::GetCommit { sha: Sha::new(SHA) },
                GitHubEffect::CreateStatus {
                    sha: Sha::new(SHA),
                    state: StatusState::Success,
                    description: SUCCESS_DESCRIPTION.to_string(),
                    context: "four-eyes".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn approved_pr_publishes_success() {
        let github = MockGitHub::new()
            .with_commit(SHA, "Merge #7\n\n7: Add widget r=bob a=alice\n")
            .with_pr(7, AUTHOR)
            .with_comment(7, REVIEWER, "bors r+");
        let connector = MockConnector::new(github.clone());

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert_eq!(reported_state(&outcome), StatusState::Success);
        assert_eq!(
            github.statuses(),
            vec![(
                Sha::new(SHA),
                StatusState::Success,
                SUCCESS_DESCRIPTION.to_string(),
                "four-eyes".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn self_approved_pr_publishes_error() {
        let github = MockGitHub::new()
            .with_commit(SHA, "Merge #7\n\n7: Add widget r=alice a=alice\n")
            .with_pr(7, AUTHOR)
            .with_comment(7, AUTHOR, "bors r+");
        let connector = MockConnector::new(github.clone());

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert_eq!(reported_state(&outcome), StatusState::Error);
        let statuses = github.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(
            statuses[0].2,
            "The following pull requests were not approved by a second peer: #7"
        );
    }

    #[tokio::test]
    async fn rejected_prs_listed_in_message_order() {
        let github = MockGitHub::new()
            .with_commit(
                SHA,
                "Merge #3 #1 #2\n\n3: c r=x a=y\n1: a r=x a=y\n2: b r=x a=y\n",
            )
            .with_pr(3, AUTHOR)
            .with_pr(1, AUTHOR)
            .with_pr(2, AUTHOR)
            .with_comment(2, REVIEWER, "bors r+");
        let connector = MockConnector::new(github.clone());
        let config = PipelineConfig {
            max_concurrent_checks: 2,
            ..PipelineConfig::default()
        };

        let outcome = run(&connector, &config).await;

        assert_eq!(reported_state(&outcome), StatusState::Error);
        assert!(github.statuses()[0].2.ends_with("#3,#1"));
    }

    #[tokio::test]
    async fn pr_lookup_error_rejects_only_that_pr() {
        let github = MockGitHub::new()
            .with_commit(SHA, "1: a r=x a=y\n2: b r=x a=y\n")
            .with_pr(1, AUTHOR)
            .with_comment(1, REVIEWER, "bors r+")
            .failing_when(|e| matches!(e, GitHubEffect::GetPr { pr } if *pr == PrNumber(2)));
        let connector = MockConnector::new(github.clone());

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert_eq!(reported_state(&outcome), StatusState::Error);
        assert!(github.statuses()[0].2.ends_with(": #2"));
    }

    #[tokio::test]
    async fn duplicate_references_checked_once() {
        let github = MockGitHub::new()
            .with_commit(SHA, "5: a r=x a=y\n5: a again r=x a=y\n")
            .with_pr(5, AUTHOR)
            .with_comment(5, REVIEWER, "bors r+");
        let connector = MockConnector::new(github.clone());

        run(&connector, &PipelineConfig::default()).await.unwrap();

        let pr_lookups = github
            .effects()
            .into_iter()
            .filter(|e| matches!(e, GitHubEffect::GetPr { .. }))
            .count();
        assert_eq!(pr_lookups, 1);
    }

    #[tokio::test]
    async fn unreadable_commit_publishes_failure() {
        let github = MockGitHub::new();
        let connector = MockConnector::new(github.clone());

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert_eq!(reported_state(&outcome), StatusState::Failure);
        assert_eq!(github.statuses()[0].2, FAILURE_DESCRIPTION);
    }

    #[tokio::test]
    async fn deadline_expiry_publishes_failure() {
        let github = MockGitHub::new()
            .with_commit(SHA, "7: a r=x a=y")
            .with_pr(7, AUTHOR)
            .with_delay(Duration::from_millis(200));
        let connector = MockConnector::new(github.clone());
        let config = PipelineConfig {
            deadline: Duration::from_millis(20),
            ..PipelineConfig::default()
        };

        let outcome = run(&connector, &config).await;

        assert_eq!(reported_state(&outcome), StatusState::Failure);
        assert_eq!(github.statuses().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_publishes_failure() {
        let github = MockGitHub::new()
            .with_commit(SHA, "7: a r=x a=y")
            .with_pr(7, AUTHOR)
            .with_comment(7, REVIEWER, "bors r+");
        let connector = MockConnector::new(github.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = handle_push(
            &connector,
            &ProtectedRefs::default(),
            &PipelineConfig::default(),
            &push("refs/heads/trying"),
            &cancel,
        )
        .await;

        assert_eq!(reported_state(&outcome), StatusState::Failure);
        assert!(
            !github
                .effects()
                .iter()
                .any(|e| matches!(e, GitHubEffect::GetPr { .. }))
        );
    }

    #[tokio::test]
    async fn connect_failure_is_an_error() {
        let connector = MockConnector::failing();

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert!(matches!(outcome, Err(PipelineError::Connect { .. })));
    }

    #[tokio::test]
    async fn fetched_message_wins_over_payload_message() {
        let github = MockGitHub::new().with_commit(SHA, "No annotations here");
        let connector = MockConnector::new(github.clone());
        let event = PushEvent {
            head_message: "7: sneaky r=x a=y".to_string(),
            ..push("refs/heads/staging")
        };

        let outcome = handle_push(
            &connector,
            &ProtectedRefs::default(),
            &PipelineConfig::default(),
            &event,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(reported_state(&outcome), StatusState::Success);
        assert!(
            !github
                .effects()
                .iter()
                .any(|e| matches!(e, GitHubEffect::GetPr { .. }))
        );
    }

    #[tokio::test]
    async fn hung_connection_is_bounded_by_deadline() {
        let connector = MockConnector::hanging();
        let config = PipelineConfig {
            deadline: Duration::from_millis(50),
            publish_timeout: Duration::from_millis(50),
            ..PipelineConfig::default()
        };

        let outcome = tokio::time::timeout(Duration::from_secs(2), run(&connector, &config))
            .await
            .expect("handle_push should give up once the deadline passes");

        match outcome {
            Err(PipelineError::Connect { message, .. }) => {
                assert!(message.contains("deadline"), "{}", message)
            }
            other => panic!("expected a connect error, got {:?}", other),
        }
        assert!(connector.github.effects().is_empty());
    }

    #[tokio::test]
    async fn hung_connection_is_abandoned_on_shutdown() {
        let connector = MockConnector::hanging();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            handle_push(
                &connector,
                &ProtectedRefs::default(),
                &PipelineConfig::default(),
                &push("refs/heads/staging"),
                &cancel,
            ),
        )
        .await
        .expect("handle_push should return promptly after shutdown");

        assert!(matches!(outcome, Err(PipelineError::Connect { .. })));
    }

    #[tokio::test]
    async fn publish_failure_is_an_error_and_not_retried() {
        let github = MockGitHub::new()
            .with_commit(SHA, "no annotations")
            .failing_when(|e| matches!(e, GitHubEffect::CreateStatus { .. }));
        let connector = MockConnector::new(github.clone());

        let outcome = run(&connector, &PipelineConfig::default()).await;

        assert!(matches!(outcome, Err(PipelineError::Publish { .. })));
        assert_eq!(github.statuses().len(), 1);
    }

    #[tokio::test]
    async fn custom_status_context() {
        let github = MockGitHub::new().with_commit(SHA, "nothing");
        let connector = MockConnector::new(github.clone());
        let config = PipelineConfig {
            status_context: "acme/four-eyes".to_string(),
            ..PipelineConfig::default()
        };

        run(&connector, &config).await.unwrap();

        assert_eq!(github.statuses()[0].3, "acme/four-eyes");
    }

    #[tokio::test]
    async fn check_all_keeps_order_under_concurrency() {
        let mut github = MockGitHub::new();
        let prs: Vec<PrNumber> = (1..=12).map(PrNumber).collect();
        for pr in &prs {
            github = github.with_pr(pr.0, AUTHOR);
            if pr.0 % 3 == 0 {
                github = github.with_comment(pr.0, REVIEWER, "bors r+");
            }
        }
        let config = PipelineConfig {
            max_concurrent_checks: 3,
            ..PipelineConfig::default()
        };

        let repo = RepoId::new("acme", "widgets");
        let verdicts = check_all(&github, &repo, prs.clone(), &config).await;

        assert_eq!(verdicts.iter().map(|v| v.pr).collect::<Vec<_>>(), prs);
        for verdict in verdicts {
            assert_eq!(verdict.approved, verdict.pr.0 % 3 == 0);
        }
    }
}
