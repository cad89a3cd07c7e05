//! Which pushed refs the four-eyes policy applies to.

use std::collections::BTreeSet;

/// Ref that bors builds merge batches on before fast-forwarding the target.
pub const STAGING_REF: &str = "refs/heads/staging";

/// Ref that bors uses for `bors try` builds.
pub const TRYING_REF: &str = "refs/heads/trying";

/// The set of refs subject to the policy.
///
/// Membership is an exact string match on the full ref name. There is no prefix
/// or glob matching, so pushes to any other branch (including the merge target
/// itself) never reach the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRefs {
    refs: BTreeSet<String>,
}

impl ProtectedRefs {
    pub fn new<I, S>(refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProtectedRefs {
            refs: refs.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma-separated list of refs, ignoring blanks.
    ///
    /// Returns `None` if the list contains no refs at all.
    pub fn parse_list(list: &str) -> Option<Self> {
        let refs: BTreeSet<String> = list
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();

        if refs.is_empty() {
            None
        } else {
            Some(ProtectedRefs { refs })
        }
    }

    /// Returns true if a push to `git_ref` must be checked.
    ///
    /// An empty ref (from a payload with no `ref` field) is never relevant.
    pub fn is_relevant(&self, git_ref: &str) -> bool {
        !git_ref.is_empty() && self.refs.contains(git_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.refs.iter().map(String::as_str)
    }
}

impl Default for ProtectedRefs {
    fn default() -> Self {
        ProtectedRefs::new([STAGING_REF, TRYING_REF])
    }
}
