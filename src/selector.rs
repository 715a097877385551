//! Turns evaluation decisions into dial movements.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::dial::DifficultyDial;
use crate::evaluator::EvaluationDecision;
use crate::session::Role;

/// Default chance that a tier change also changes the number of agents.
pub const DEFAULT_POPULATION_SHIFT_CHANCE: f64 = 0.2;

/// Owner and sole writer of the [`DifficultyDial`].
///
/// `Increase` and `Decrease` always move the shared tier by one. With probability
/// `population_shift_chance` the agent count of the side the human fought moves by one in the
/// same direction as well: a human cop changes the robber count, a human robber the cop count.
#[derive(Debug)]
pub struct DifficultySelector<R: Rng = StdRng> {
    dial: DifficultyDial,
    population_shift_chance: f64,
    rng: R,
}

impl DifficultySelector<StdRng> {
    /// Selector over `dial`, seeded from the OS or from `seed` when given.
    pub fn new(dial: DifficultyDial, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(dial, rng)
    }
}

impl<R: Rng> DifficultySelector<R> {
    /// Selector drawing from `rng`.
    pub fn with_rng(dial: DifficultyDial, rng: R) -> Self {
        Self {
            dial,
            population_shift_chance: DEFAULT_POPULATION_SHIFT_CHANCE,
            rng,
        }
    }

    /// Change the chance of moving the population. Values are clamped into `[0, 1]`.
    pub fn with_population_shift_chance(mut self, chance: f64) -> Self {
        self.population_shift_chance = if chance.is_nan() {
            0.0
        } else {
            chance.clamp(0.0, 1.0)
        };
        self
    }

    /// Current dial.
    pub fn dial(&self) -> &DifficultyDial {
        &self.dial
    }

    /// Apply `decision` to the opponents of a human who played `role`.
    pub fn apply(&mut self, decision: EvaluationDecision, role: Role) -> DifficultyDial {
        let target = role.opponent();
        let before = self.dial;

        match decision {
            EvaluationDecision::Increase => {
                self.dial.raise_tier();
                if self.roll_population_shift() {
                    self.dial.add_opponent(target);
                }
            }
            EvaluationDecision::Decrease => {
                self.dial.lower_tier();
                if self.roll_population_shift() {
                    self.dial.remove_opponent(target);
                }
            }
            EvaluationDecision::Hold => {}
        }

        info!(
            %decision,
            agents = %target,
            tier = %format!("{} -> {}", before.tier_index(), self.dial.tier_index()),
            count = %format!(
                "{} -> {}",
                before.opponent_count(target),
                self.dial.opponent_count(target)
            ),
            "dial updated"
        );
        self.dial
    }

    fn roll_population_shift(&mut self) -> bool {
        let shift = self.rng.random_bool(self.population_shift_chance);
        debug!(shift, "population shift roll");
        shift
    }
}
