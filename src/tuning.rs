//! Numeric parameters of the difficulty loop.
//!
//! The main entry point is [`TuningBuilder`], which uses a builder pattern to configure:
//!
//! - **Scorer timing**: per-call timeout and the grace period left at shutdown
//! - **Selection**: chance of moving the agent population along with the tier, RNG seed
//! - **Evaluation**: time under which a perfect win counts as too easy
//! - **Session setup**: diamonds to steal, starting tier
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use adaptive_difficulty::tuning::TuningBuilder;
//!
//! let tuning = TuningBuilder::new()
//!     .with_scorer_timeout(Duration::from_secs(2))
//!     .with_population_shift_chance(0.25)
//!     .with_seed(42)
//!     .build()
//!     .unwrap();
//! ```
//!
//! You may also read the values from environment variables using [`TuningBuilder::from_env()`].

use std::{env, time::Duration};

use anyhow::bail;
use tracing::warn;

use crate::dial::{DifficultyDial, MAX_OPPONENTS, MAX_TIER, MIN_OPPONENTS};
use crate::evaluator::RuleBasedEvaluator;
use crate::scorer::ExternalScorer;
use crate::selector::DEFAULT_POPULATION_SHIFT_CHANCE;

/// A builder for the numeric parameters of the loop.
///
/// Every unset value falls back to the default documented on its setter.
#[derive(Debug, Default, Clone)]
pub struct TuningBuilder {
    scorer_timeout: Option<Duration>,
    shutdown_grace: Option<Duration>,
    population_shift_chance: Option<f64>,
    skill_time_threshold: Option<Duration>,
    diamonds: Option<u8>,
    initial_tier: Option<u8>,
    seed: Option<u64>,
}

impl TuningBuilder {
    /// Creates a new `TuningBuilder` with every value at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `TuningBuilder` configured from environment variables.
    ///
    /// Read environment variables are:
    /// - `SCORER_TIMEOUT_MS` (u64): limit on one scorer call, in milliseconds
    /// - `SHUTDOWN_GRACE_MS` (u64): time left to a running scorer at shutdown, in milliseconds
    /// - `POPULATION_SHIFT_CHANCE` (f64): chance of moving the agent count with the tier
    /// - `SKILL_TIME_THRESHOLD_SECS` (u64): perfect wins faster than this raise the difficulty
    /// - `DIAMONDS` (u8): diamonds a human robber has to steal
    /// - `INITIAL_TIER` (u8): tier the run starts at
    /// - `RNG_SEED` (u64): seed for reproducible selection
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(var: &str) -> Option<T> {
            let raw = env::var(var).ok()?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring {var}={raw:?}: not a valid value");
                    None
                }
            }
        }

        TuningBuilder {
            scorer_timeout: parse("SCORER_TIMEOUT_MS").map(Duration::from_millis),
            shutdown_grace: parse("SHUTDOWN_GRACE_MS").map(Duration::from_millis),
            population_shift_chance: parse("POPULATION_SHIFT_CHANCE"),
            skill_time_threshold: parse("SKILL_TIME_THRESHOLD_SECS").map(Duration::from_secs),
            diamonds: parse("DIAMONDS"),
            initial_tier: parse("INITIAL_TIER"),
            seed: parse("RNG_SEED"),
        }
    }

    /// Sets the limit on a single scorer call. Default is 5 seconds.
    #[must_use]
    pub fn with_scorer_timeout(self, timeout: Duration) -> Self {
        Self {
            scorer_timeout: Some(timeout),
            ..self
        }
    }

    /// Sets the time left to a running scorer once shutdown is requested. Default is 1 second.
    #[must_use]
    pub fn with_shutdown_grace(self, grace: Duration) -> Self {
        Self {
            shutdown_grace: Some(grace),
            ..self
        }
    }

    /// Sets the chance that a tier change also moves the number of agents. Default is 0.2.
    #[must_use]
    pub fn with_population_shift_chance(self, chance: f64) -> Self {
        Self {
            population_shift_chance: Some(chance),
            ..self
        }
    }

    /// Sets the time under which a perfect win raises the difficulty. Default is 60 seconds.
    #[must_use]
    pub fn with_skill_time_threshold(self, threshold: Duration) -> Self {
        Self {
            skill_time_threshold: Some(threshold),
            ..self
        }
    }

    /// Sets how many diamonds a human robber has to steal. Default is 2.
    #[must_use]
    pub fn with_diamonds(self, diamonds: u8) -> Self {
        Self {
            diamonds: Some(diamonds),
            ..self
        }
    }

    /// Sets the tier the run starts at. Default is 5.
    #[must_use]
    pub fn with_initial_tier(self, tier: u8) -> Self {
        Self {
            initial_tier: Some(tier),
            ..self
        }
    }

    /// Seeds the selection RNG. Default is an OS-provided seed.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    /// Consumes the builder and returns the validated `Tuning`.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is out of range, e.g. a zero timeout or a probability
    /// outside `[0, 1]`.
    pub fn build(self) -> anyhow::Result<Tuning> {
        let scorer_timeout = self
            .scorer_timeout
            .unwrap_or(ExternalScorer::DEFAULT_TIMEOUT);
        if scorer_timeout.is_zero() {
            bail!("scorer timeout must be positive");
        }
        // a deadline is computed as `now + timeout`
        if scorer_timeout > Duration::from_secs(3600) {
            bail!("scorer timeout of {scorer_timeout:?} would stall the game");
        }

        let shutdown_grace = self
            .shutdown_grace
            .unwrap_or(ExternalScorer::DEFAULT_SHUTDOWN_GRACE);
        if shutdown_grace > scorer_timeout {
            warn!("shutdown grace {shutdown_grace:?} exceeds the scorer timeout, it has no effect");
        }

        let population_shift_chance = self
            .population_shift_chance
            .unwrap_or(DEFAULT_POPULATION_SHIFT_CHANCE);
        if !(0.0..=1.0).contains(&population_shift_chance) {
            bail!("population shift chance must be within [0, 1], got {population_shift_chance}");
        }

        let diamonds = self.diamonds.unwrap_or(Tuning::DEFAULT_DIAMONDS);
        if !(MIN_OPPONENTS..=MAX_OPPONENTS).contains(&diamonds) {
            bail!("diamonds must be within [{MIN_OPPONENTS}, {MAX_OPPONENTS}], got {diamonds}");
        }

        let initial_tier = self.initial_tier.unwrap_or(DifficultyDial::DEFAULT_TIER);
        if initial_tier > MAX_TIER {
            bail!("initial tier must be at most {MAX_TIER}, got {initial_tier}");
        }

        Ok(Tuning {
            scorer_timeout,
            shutdown_grace,
            population_shift_chance,
            skill_time_threshold: self
                .skill_time_threshold
                .unwrap_or(RuleBasedEvaluator::DEFAULT_SKILL_THRESHOLD),
            diamonds,
            initial_tier,
            seed: self.seed,
        })
    }
}

/// Obtained using [`TuningBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub(crate) scorer_timeout: Duration,
    pub(crate) shutdown_grace: Duration,
    pub(crate) population_shift_chance: f64,
    pub(crate) skill_time_threshold: Duration,
    pub(crate) diamonds: u8,
    pub(crate) initial_tier: u8,
    pub(crate) seed: Option<u64>,
}

impl Tuning {
    /// Diamonds a human robber has to steal when nothing else is configured.
    pub const DEFAULT_DIAMONDS: u8 = 2;

    /// create a TuningBuilder
    pub fn builder() -> TuningBuilder {
        TuningBuilder::new()
    }

    /// Dial every session of the run starts from.
    pub fn initial_dial(&self) -> DifficultyDial {
        DifficultyDial::new(
            self.initial_tier,
            DifficultyDial::DEFAULT_COP_AGENTS,
            DifficultyDial::DEFAULT_ROBBER_AGENTS,
        )
    }

    /// Reference heuristic using the configured skill threshold.
    pub fn rule_based_evaluator(&self) -> RuleBasedEvaluator {
        RuleBasedEvaluator::new().with_skill_threshold(self.skill_time_threshold)
    }

    /// Diamonds a human robber has to steal.
    pub fn diamonds(&self) -> u8 {
        self.diamonds
    }

    /// Chance of moving the agent count along with the tier.
    pub fn population_shift_chance(&self) -> f64 {
        self.population_shift_chance
    }

    /// Seed of the selection RNG, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            scorer_timeout: ExternalScorer::DEFAULT_TIMEOUT,
            shutdown_grace: ExternalScorer::DEFAULT_SHUTDOWN_GRACE,
            population_shift_chance: DEFAULT_POPULATION_SHIFT_CHANCE,
            skill_time_threshold: RuleBasedEvaluator::DEFAULT_SKILL_THRESHOLD,
            diamonds: Self::DEFAULT_DIAMONDS,
            initial_tier: DifficultyDial::DEFAULT_TIER,
            seed: None,
        }
    }
}

/// Parse an argument list the way a shell would split it on whitespace.
///
/// Quoting is not supported.
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_default_impl() {
        assert_eq!(TuningBuilder::new().build().unwrap(), Tuning::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(TuningBuilder::new()
            .with_scorer_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(TuningBuilder::new()
            .with_population_shift_chance(1.5)
            .build()
            .is_err());
        assert!(TuningBuilder::new().with_diamonds(0).build().is_err());
        assert!(TuningBuilder::new().with_diamonds(5).build().is_err());
        assert!(TuningBuilder::new().with_initial_tier(10).build().is_err());
    }

    #[test]
    fn initial_dial_uses_initial_tier() {
        let tuning = TuningBuilder::new().with_initial_tier(0).build().unwrap();
        let dial = tuning.initial_dial();
        assert_eq!(dial.tier_index(), 0);
        assert_eq!(dial.opponent_count(crate::session::Role::Robber), 3);
    }

    #[test]
    fn splits_arguments() {
        assert_eq!(split_args("  scorer.py --model  m.pkl "), vec!["scorer.py", "--model", "m.pkl"]);
        assert!(split_args("").is_empty());
    }
}
