//! Error taxonomy of the difficulty loop.
//!
//! None of these errors is fatal to the player: scorer failures degrade to
//! [`Hold`](crate::evaluator::EvaluationDecision::Hold), invalid summaries are clamped on the
//! production path, and dial bounds are enforced by construction.

use thiserror::Error;

/// Errors produced by the difficulty loop.
#[derive(Debug, Error)]
pub enum DifficultyError {
    /// The external scorer could not be reached, timed out, or answered garbage.
    #[error("scorer unavailable: {0}")]
    ScorerUnavailable(String),

    /// A session summary was built from inconsistent counters.
    #[error("invalid session summary: {0}")]
    InvalidSummary(String),

    /// A lifecycle operation was called in the wrong state.
    #[error("invalid transition: cannot {action} while {state}")]
    InvalidTransition {
        /// What the caller tried to do.
        action: &'static str,
        /// The state the lifecycle was in.
        state: &'static str,
    },
}
