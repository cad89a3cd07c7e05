//! Parser for merge-queue annotations in merge commit messages.
//!
//! When bors merges a batch, the merge commit message carries one line per
//! pull request in the batch:
//!
//! ```text
//! Merge #12 #15
//!
//! 12: Fix the frobnicator r=alice a=bob
//! 15: Document the frobnicator r=carol a=dave
//! ```
//!
//! Each line names the PR number, its title, the reviewer who issued the merge
//! command (`r=`) and the PR author (`a=`). Only the PR number feeds the
//! approval decision; the reviewer and author tokens are written by the bot
//! and are kept for logging only.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::types::PrNumber;

/// `<digits>: <anything> r=<token> a=<token>`, within a single line.
static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+): .* r=(\S+) a=(\S+)").expect("annotation regex is valid")
});

/// A pull request referenced by a merge-queue annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestReference {
    /// The referenced PR.
    pub number: PrNumber,
    /// The `r=` token. Advisory only.
    pub reviewer_hint: String,
    /// The `a=` token. Advisory only.
    pub author_hint: String,
}

/// Extracts every merge-queue annotation from a commit message.
///
/// Matches are non-overlapping and returned in order of appearance. A message
/// with no annotations yields an empty vector. A number too large for a PR
/// number is skipped.
///
/// # Examples
///
/// ```
/// use four_eyes::policy::extract_pr_references;
/// use four_eyes::types::PrNumber;
///
/// let refs = extract_pr_references("42: merge r=alice a=bob");
/// assert_eq!(refs.len(), 1);
/// assert_eq!(refs[0].number, PrNumber(42));
/// assert_eq!(refs[0].reviewer_hint, "alice");
/// assert_eq!(refs[0].author_hint, "bob");
///
/// assert!(extract_pr_references("Fix typo in README").is_empty());
/// ```
pub fn extract_pr_references(message: &str) -> Vec<PullRequestReference> {
    ANNOTATION
        .captures_iter(message)
        .filter_map(|caps| {
            let digits = &caps[1];
            match digits.parse::<u64>() {
                Ok(n) => Some(PullRequestReference {
                    number: PrNumber(n),
                    reviewer_hint: caps[2].to_string(),
                    author_hint: caps[3].to_string(),
                }),
                Err(e) => {
                    warn!(digits, error = %e, "Skipping unparseable PR number in annotation");
                    None
                }
            }
        })
        .collect()
}

/// Returns the distinct PR numbers in `refs`, in order of first appearance.
pub fn distinct_pr_numbers(refs: &[PullRequestReference]) -> Vec<PrNumber> {
    let mut seen = HashSet::new();
    refs.iter()
        .map(|r| r.number)
        .filter(|n| seen.insert(*n))
        .collect()
}
