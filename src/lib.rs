//! # Adaptive Difficulty
//!
//! The difficulty loop of a cops and robbers game in which a human plays one side against
//! reinforcement-learning agents trained to several skill tiers.
//!
//! It provides:
//! - Per-session performance recording (`SessionRecorder`, `SessionSummary`)
//! - Pluggable scoring via the `DifficultyEvaluator` trait
//! - Built-in evaluators: `RuleBasedEvaluator`, `ScoreCardEvaluator` and the out-of-process
//!   `ExternalScorer`
//! - A bounded dial of agent tier and populations (`DifficultyDial`, `DifficultySelector`)
//! - The session state machine tying it all together (`SessionLifecycle`)
//!
//! After every session the human's performance is frozen into a summary, scored as
//! `Increase`, `Decrease` or `Hold`, and applied to the agents of the side the human fought.
//! The dial lives for the whole process run.
//!
//! # Documentation Overview
//!
//! - For the session state machine, see the [`lifecycle`] module.
//! - For scoring, see the [`DifficultyEvaluator`](crate::evaluator::DifficultyEvaluator) trait
//!   and the [`scorer`] module for the child-process protocol.
//! - For dial bounds and movement rules, see [`dial`] and [`selector`].
//! - For runtime settings, see [`Configuration`](crate::configuration::Configuration) and
//!   [`tuning`].
//!
//! # Usage Example
//!
//! ```
//! use adaptive_difficulty::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let tuning = TuningBuilder::new().with_seed(7).build()?;
//!     let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);
//!
//!     // the host spawns `config.opponent_count` robbers of tier `config.opponent_tier`
//!     let config = lifecycle.start_session(Role::Cop)?;
//!     for _ in 0..config.targets_total {
//!         lifecycle.record(GameplayEvent::Tag)?;
//!     }
//!     let report = lifecycle.end_session(Outcome::Win, 42.0)?;
//!     assert_eq!(report.decision, EvaluationDecision::Increase);
//!
//!     lifecycle.shutdown();
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;
pub mod configuration;
pub mod dial;
pub mod error;
pub mod evaluator;
pub mod lifecycle;
mod logger;
pub mod scorer;
pub mod selector;
pub mod session;
mod shutdown;
pub mod tuning;

pub use logger::init_logger;
pub use shutdown::ShutdownSignal;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use adaptive_difficulty::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::dial::DifficultyDial;
    pub use crate::error::DifficultyError;
    pub use crate::evaluator::{
        DifficultyEvaluator, EvaluationDecision, FixedEvaluator, RuleBasedEvaluator,
        ScoreCardEvaluator,
    };
    pub use crate::lifecycle::{LifecycleState, SessionConfig, SessionLifecycle, SessionReport};
    pub use crate::scorer::ExternalScorer;
    pub use crate::selector::DifficultySelector;
    pub use crate::session::{GameplayEvent, Outcome, Role, SessionRecorder, SessionSummary};
    pub use crate::tuning::{Tuning, TuningBuilder};
    pub use crate::ShutdownSignal;
}
