//! Errors from executing effects.

use thiserror::Error;

/// Errors from executing a single effect.
#[derive(Debug, Error)]
pub enum EffectError<E> {
    /// The interpreter failed.
    #[error("GitHub API error: {0}")]
    GitHub(E),

    /// The interpreter answered with a response of the wrong kind.
    #[error("unexpected response to {effect}")]
    UnexpectedResponse { effect: &'static str },
}
