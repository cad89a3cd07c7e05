//! The four-eyes policy: which pushes are checked, which PRs they merge, and
//! whether each PR was approved by someone other than its author.

pub mod annotations;
pub mod approval;
pub mod refs;
pub mod report;

pub use annotations::{PullRequestReference, distinct_pr_numbers, extract_pr_references};
pub use approval::{ApprovalPolicy, CommentPager, approved_by_non_author, is_approval_comment};
pub use refs::ProtectedRefs;
pub use report::{ApprovalVerdict, StatusReport};
