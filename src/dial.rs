//! Bounded difficulty parameters for the AI side of the next session.

use std::fmt::Display;

use crate::session::Role;

/// Highest trained skill tier.
pub const MAX_TIER: u8 = 9;
/// Fewest AI agents of one role in a session.
pub const MIN_OPPONENTS: u8 = 1;
/// Most AI agents of one role in a session.
pub const MAX_OPPONENTS: u8 = 4;

/// Difficulty settings of the AI agents, kept for the whole process run.
///
/// A single skill tier is shared by every agent: tier `n` loads the `n`-th trained model of
/// whichever side the agents play. Agent counts are kept per role.
///
/// Fields can only be changed through clamping methods, so they never leave `[0, MAX_TIER]` and
/// `[MIN_OPPONENTS, MAX_OPPONENTS]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyDial {
    tier_index: u8,
    cop_agents: u8,
    robber_agents: u8,
}

impl DifficultyDial {
    /// Tier the run starts at.
    pub const DEFAULT_TIER: u8 = 5;
    /// Cop agents hunting a human robber.
    pub const DEFAULT_COP_AGENTS: u8 = 2;
    /// Robber agents fleeing a human cop.
    pub const DEFAULT_ROBBER_AGENTS: u8 = 3;

    /// Dial with the given values, clamped into range.
    pub fn new(tier_index: u8, cop_agents: u8, robber_agents: u8) -> Self {
        Self {
            tier_index: tier_index.min(MAX_TIER),
            cop_agents: clamp_count(cop_agents),
            robber_agents: clamp_count(robber_agents),
        }
    }

    /// Index of the trained model to load, for either side.
    pub fn tier_index(&self) -> u8 {
        self.tier_index
    }

    /// Number of agents to spawn when they play `role`.
    pub fn opponent_count(&self, role: Role) -> u8 {
        match role {
            Role::Cop => self.cop_agents,
            Role::Robber => self.robber_agents,
        }
    }

    pub(crate) fn raise_tier(&mut self) {
        self.tier_index = (self.tier_index + 1).min(MAX_TIER);
    }

    pub(crate) fn lower_tier(&mut self) {
        self.tier_index = self.tier_index.saturating_sub(1);
    }

    pub(crate) fn add_opponent(&mut self, role: Role) {
        let count = self.count_mut(role);
        *count = (*count + 1).min(MAX_OPPONENTS);
    }

    pub(crate) fn remove_opponent(&mut self, role: Role) {
        let count = self.count_mut(role);
        *count = count.saturating_sub(1).max(MIN_OPPONENTS);
    }

    fn count_mut(&mut self, role: Role) -> &mut u8 {
        match role {
            Role::Cop => &mut self.cop_agents,
            Role::Robber => &mut self.robber_agents,
        }
    }
}

fn clamp_count(count: u8) -> u8 {
    count.clamp(MIN_OPPONENTS, MAX_OPPONENTS)
}

impl Default for DifficultyDial {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_TIER,
            Self::DEFAULT_COP_AGENTS,
            Self::DEFAULT_ROBBER_AGENTS,
        )
    }
}

impl Display for DifficultyDial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tier {}, {} cops, {} robbers",
            self.tier_index, self.cop_agents, self.robber_agents
        )
    }
}
