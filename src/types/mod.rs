//! Core domain types for the four-eyes checker.

pub mod ids;
pub mod status;

pub use ids::{CommentId, DeliveryId, PrNumber, RepoId, Sha, UserId};
pub use status::StatusState;
