//! Four Eyes - a GitHub App that checks every pull request in a merge-queue
//! batch was approved by someone other than its author.
//!
//! A push to a protected ref (`staging` or `trying`) triggers a check of the
//! head commit's message for PR annotations; each referenced PR must carry an
//! approval comment from a non-author. The result is published as a commit
//! status on the pushed SHA.

pub mod config;
pub mod effects;
pub mod github;
pub mod pipeline;
pub mod policy;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
