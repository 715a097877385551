//! Scoring functions that turn a session summary into a difficulty decision.
//!
//! This module defines the [`DifficultyEvaluator`] trait and two in-process implementations.
//! The out-of-process classifier lives in [`scorer`](crate::scorer).
//!
//! # Provided Evaluators
//! - [`RuleBasedEvaluator`]: a small threshold heuristic. Fast wins raise the difficulty,
//!   heavy losses lower it.
//! - [`ScoreCardEvaluator`]: tallies one vote per feature, the way the offline dataset used to
//!   train the classifier was labelled.
//! - [`ExternalScorer`](crate::scorer::ExternalScorer): asks a child process, falling back to
//!   [`EvaluationDecision::Hold`] on any failure.
//!
//! # Implementing a Custom Evaluator
//! Implement [`DifficultyEvaluator`]. `evaluate` must depend only on the summary it receives so
//! that a given session always yields the same decision, and it must not panic or block
//! indefinitely: the lifecycle calls it synchronously between two sessions.

use std::{fmt::Display, str::FromStr, time::Duration};

use anyhow::bail;
use tracing::debug;

use crate::session::{Outcome, SessionSummary};

/// What to do with the opponents of the next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationDecision {
    /// Stronger and possibly more numerous opponents.
    Increase,
    /// Weaker and possibly fewer opponents.
    Decrease,
    /// Leave the dial untouched.
    Hold,
}

impl Display for EvaluationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EvaluationDecision::Increase => "Increase",
            EvaluationDecision::Decrease => "Decrease",
            EvaluationDecision::Hold => "Hold",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EvaluationDecision {
    type Err = anyhow::Error;

    /// Accepts the dial vocabulary (`Increase`, `Decrease`, `Hold`) as well as the labels the
    /// classifier is trained on (`Harder`, `Easier`, `Same`). Case and surrounding whitespace are
    /// ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("increase") || token.eq_ignore_ascii_case("harder") {
            Ok(EvaluationDecision::Increase)
        } else if token.eq_ignore_ascii_case("decrease") || token.eq_ignore_ascii_case("easier") {
            Ok(EvaluationDecision::Decrease)
        } else if token.eq_ignore_ascii_case("hold") || token.eq_ignore_ascii_case("same") {
            Ok(EvaluationDecision::Hold)
        } else {
            bail!("unknown decision token '{token}'")
        }
    }
}

/// A scoring function over a finished session.
pub trait DifficultyEvaluator {
    /// Decide how the next session's opponents should change.
    fn evaluate(&self, summary: &SessionSummary) -> EvaluationDecision;
}

impl<E: DifficultyEvaluator + ?Sized> DifficultyEvaluator for Box<E> {
    fn evaluate(&self, summary: &SessionSummary) -> EvaluationDecision {
        (**self).evaluate(summary)
    }
}

/// Reference heuristic.
///
/// - a win with every target completed faster than `skill_threshold` gives `Increase`
/// - a loss with less than `struggle_ratio` of the targets completed gives `Decrease`
/// - anything else gives `Hold`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleBasedEvaluator {
    skill_threshold: Duration,
    struggle_ratio: f64,
}

impl RuleBasedEvaluator {
    /// Default time under which a perfect win counts as too easy.
    pub const DEFAULT_SKILL_THRESHOLD: Duration = Duration::from_secs(60);
    /// Default completion ratio under which a loss counts as too hard.
    pub const DEFAULT_STRUGGLE_RATIO: f64 = 0.3;

    /// Heuristic with the default thresholds.
    pub fn new() -> Self {
        Self {
            skill_threshold: Self::DEFAULT_SKILL_THRESHOLD,
            struggle_ratio: Self::DEFAULT_STRUGGLE_RATIO,
        }
    }

    /// Change the time under which a perfect win raises the difficulty.
    pub fn with_skill_threshold(mut self, threshold: Duration) -> Self {
        self.skill_threshold = threshold;
        self
    }

    /// Change the completion ratio under which a loss lowers the difficulty.
    pub fn with_struggle_ratio(mut self, ratio: f64) -> Self {
        self.struggle_ratio = ratio;
        self
    }
}

impl Default for RuleBasedEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl DifficultyEvaluator for RuleBasedEvaluator {
    fn evaluate(&self, summary: &SessionSummary) -> EvaluationDecision {
        let fast = summary.elapsed_seconds() < self.skill_threshold.as_secs_f64();
        let decision = match summary.outcome() {
            Outcome::Win if summary.completion_ratio() >= 1.0 && fast => {
                EvaluationDecision::Increase
            }
            Outcome::Loss if summary.completion_ratio() < self.struggle_ratio => {
                EvaluationDecision::Decrease
            }
            _ => EvaluationDecision::Hold,
        };
        debug!(%summary, %decision, "rule-based evaluation");
        decision
    }
}

/// Vote tally over the session features.
///
/// Every feature casts +1 when it suggests the player struggled, -1 when it suggests the
/// player cruised, and 0 in the neutral band in between:
///
/// | feature                          | +1 (struggling) | -1 (cruising) |
/// |----------------------------------|-----------------|---------------|
/// | outcome                          | loss            | win           |
/// | elapsed time                     | >= 90 s         | <= 60 s       |
/// | human completion ratio           | <= 0.4          | >= 0.6        |
/// | human power-ups                  | >= 10           | <= 5          |
/// | agents completion ratio          | >= 0.6          | <= 0.4        |
/// | agents power-ups                 | <= 5            | >= 10         |
///
/// Power-ups are speed boosts for cops and hides for robbers. The agents' completion ratio is
/// skipped when their target count is unknown.
///
/// A positive total gives `Decrease`, a negative one `Increase`, zero gives `Hold`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreCardEvaluator;

impl ScoreCardEvaluator {
    const SLOW_SECS: f64 = 90.0;
    const FAST_SECS: f64 = 60.0;
    const LOW_RATIO: f64 = 0.4;
    const HIGH_RATIO: f64 = 0.6;
    const MANY_POWER_UPS: u32 = 10;
    const FEW_POWER_UPS: u32 = 5;

    /// Sum of the per-feature votes.
    pub fn score(&self, summary: &SessionSummary) -> i32 {
        let mut score = match summary.outcome() {
            Outcome::Loss => 1,
            Outcome::Win => -1,
        };

        let elapsed = summary.elapsed_seconds();
        if elapsed >= Self::SLOW_SECS {
            score += 1;
        } else if elapsed <= Self::FAST_SECS {
            score -= 1;
        }

        score += Self::ratio_vote(summary.completion_ratio());
        score += Self::power_up_vote(summary.power_up_activations());

        // agents doing well means the human is doing badly
        if let Some(ratio) = summary.opponent_completion_ratio() {
            score -= Self::ratio_vote(ratio);
        }
        score -= Self::power_up_vote(summary.opponent_power_up_activations());

        score
    }

    fn ratio_vote(ratio: f64) -> i32 {
        if ratio <= Self::LOW_RATIO {
            1
        } else if ratio >= Self::HIGH_RATIO {
            -1
        } else {
            0
        }
    }

    fn power_up_vote(power_ups: u32) -> i32 {
        if power_ups >= Self::MANY_POWER_UPS {
            1
        } else if power_ups <= Self::FEW_POWER_UPS {
            -1
        } else {
            0
        }
    }
}

impl DifficultyEvaluator for ScoreCardEvaluator {
    fn evaluate(&self, summary: &SessionSummary) -> EvaluationDecision {
        let score = self.score(summary);
        let decision = match score {
            s if s > 0 => EvaluationDecision::Decrease,
            s if s < 0 => EvaluationDecision::Increase,
            _ => EvaluationDecision::Hold,
        };
        debug!(%summary, score, %decision, "score card evaluation");
        decision
    }
}

/// Always answers the same decision. Handy for hosts that want to pin the difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEvaluator(pub EvaluationDecision);

impl DifficultyEvaluator for FixedEvaluator {
    fn evaluate(&self, _summary: &SessionSummary) -> EvaluationDecision {
        self.0
    }
}
