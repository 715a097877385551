//! Per-session bookkeeping.
//!
//! A [`SessionRecorder`] counts gameplay events while the human plays, and freezes them into a
//! [`SessionSummary`] when the session ends. The summary is the only thing evaluators ever see.

use std::fmt::Display;
use std::str::FromStr;

use anyhow::bail;
use tracing::{trace, warn};

use crate::error::DifficultyError;

/// Side played in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Tags robbers.
    Cop,
    /// Collects and deposits diamonds.
    Robber,
}

impl Role {
    /// The side the AI agents play when the human plays `self`.
    pub fn opponent(self) -> Role {
        match self {
            Role::Cop => Role::Robber,
            Role::Robber => Role::Cop,
        }
    }

    /// Numeric code used by the scorer payload (cop = 0, robber = 1).
    pub fn code(self) -> u8 {
        match self {
            Role::Cop => 0,
            Role::Robber => 1,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Cop => write!(f, "cop"),
            Role::Robber => write!(f, "robber"),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cop" => Ok(Role::Cop),
            "robber" => Ok(Role::Robber),
            other => bail!("unknown role '{other}'"),
        }
    }
}

/// How the session ended, from the human's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Objective completed.
    Win,
    /// Caught, or every objective denied.
    Loss,
}

impl Outcome {
    /// Numeric code used by the scorer payload (win = 1, loss = 0).
    pub fn code(self) -> u8 {
        match self {
            Outcome::Win => 1,
            Outcome::Loss => 0,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Win => write!(f, "win"),
            Outcome::Loss => write!(f, "loss"),
        }
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(Outcome::Win),
            "loss" | "lose" => Ok(Outcome::Loss),
            other => bail!("unknown outcome '{other}'"),
        }
    }
}

/// Events the host reports while a session is running.
///
/// Events are counted whoever caused them: a tag made by a cop agent counts as much as one made
/// by the human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameplayEvent {
    /// A robber was tagged.
    Tag,
    /// A diamond was deposited.
    Collect,
    /// A cop activated its speed boost.
    SpeedUp,
    /// A robber activated its hiding power-up.
    Hide,
}

impl GameplayEvent {
    /// The power-up event of `role`.
    pub fn power_up(role: Role) -> GameplayEvent {
        match role {
            Role::Cop => GameplayEvent::SpeedUp,
            Role::Robber => GameplayEvent::Hide,
        }
    }
}

/// Frozen record of one session. Immutable once built.
///
/// The human's side is described by `targets_*`, `completion_ratio` and
/// `power_up_activations`. The agents' side by the `opponent_*` accessors: diamonds collected
/// by robber agents against a human cop, tags on the human robber against cop agents.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    outcome: Outcome,
    role: Role,
    elapsed_seconds: f64,
    targets_total: u32,
    targets_completed: u32,
    completion_ratio: f64,
    tags: u32,
    collects: u32,
    speed_ups: u32,
    hides: u32,
    opponent_targets_total: u32,
}

impl SessionSummary {
    /// Strict constructor: rejects inconsistent input instead of repairing it.
    ///
    /// `power_up_activations` are the human's own. The opponent side starts empty, see
    /// [`with_opponent_activity`](Self::with_opponent_activity).
    ///
    /// # Errors
    /// [`DifficultyError::InvalidSummary`] when `targets_completed > targets_total` or when
    /// `elapsed_seconds` is negative or not finite.
    pub fn new(
        outcome: Outcome,
        role: Role,
        elapsed_seconds: f64,
        targets_total: u32,
        targets_completed: u32,
        power_up_activations: u32,
    ) -> Result<SessionSummary, DifficultyError> {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(DifficultyError::InvalidSummary(format!(
                "elapsed time must be a non-negative number of seconds, got {elapsed_seconds}"
            )));
        }
        if targets_completed > targets_total {
            return Err(DifficultyError::InvalidSummary(format!(
                "{targets_completed} targets completed out of {targets_total}"
            )));
        }
        let mut counters = SessionRecorder::new();
        counters.set_objective(role, targets_completed);
        counters.set_power_ups(role, power_up_activations);
        Ok(counters.summarize(outcome, role, elapsed_seconds, targets_total, targets_completed))
    }

    /// Strict setter for what the agents achieved: `completed` of their `targets_total`
    /// objectives, using `power_ups` power-ups.
    ///
    /// # Errors
    /// [`DifficultyError::InvalidSummary`] when `completed > targets_total`.
    pub fn with_opponent_activity(
        self,
        targets_total: u32,
        completed: u32,
        power_ups: u32,
    ) -> Result<SessionSummary, DifficultyError> {
        if completed > targets_total {
            return Err(DifficultyError::InvalidSummary(format!(
                "opponents completed {completed} targets out of {targets_total}"
            )));
        }
        let mut counters = SessionRecorder {
            tags: self.tags,
            collects: self.collects,
            speed_ups: self.speed_ups,
            hides: self.hides,
        };
        let opponent = self.role.opponent();
        counters.set_objective(opponent, completed);
        counters.set_power_ups(opponent, power_ups);
        Ok(SessionSummary {
            tags: counters.tags,
            collects: counters.collects,
            speed_ups: counters.speed_ups,
            hides: counters.hides,
            opponent_targets_total: targets_total,
            ..self
        })
    }

    /// Number of objectives the agents had: diamonds for robber agents, the human robber for
    /// cop agents. Zero when unknown.
    #[must_use]
    pub fn with_opponent_targets(self, targets_total: u32) -> SessionSummary {
        SessionSummary {
            opponent_targets_total: targets_total,
            ..self
        }
    }

    /// Win or loss.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Side the human played.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Wall-clock duration of the session.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Number of objectives available to the human.
    pub fn targets_total(&self) -> u32 {
        self.targets_total
    }

    /// Number of objectives the human completed.
    pub fn targets_completed(&self) -> u32 {
        self.targets_completed
    }

    /// `targets_completed / targets_total`, or 0 without targets.
    pub fn completion_ratio(&self) -> f64 {
        self.completion_ratio
    }

    /// Successful power-up uses of the human's side.
    pub fn power_up_activations(&self) -> u32 {
        self.power_ups_of(self.role)
    }

    /// Objectives available to the agents, 0 when unknown.
    pub fn opponent_targets_total(&self) -> u32 {
        self.opponent_targets_total
    }

    /// Objectives the agents completed.
    pub fn opponent_targets_completed(&self) -> u32 {
        match self.role.opponent() {
            Role::Cop => self.tags,
            Role::Robber => self.collects,
        }
    }

    /// Share of their objectives the agents completed, capped at 1. `None` when their target
    /// count is unknown.
    pub fn opponent_completion_ratio(&self) -> Option<f64> {
        if self.opponent_targets_total == 0 {
            return None;
        }
        let completed = self
            .opponent_targets_completed()
            .min(self.opponent_targets_total);
        Some(completion_ratio(completed, self.opponent_targets_total))
    }

    /// Successful power-up uses of the agents' side.
    pub fn opponent_power_up_activations(&self) -> u32 {
        self.power_ups_of(self.role.opponent())
    }

    /// Every tag recorded during the session.
    pub fn tags(&self) -> u32 {
        self.tags
    }

    /// Every diamond collection recorded during the session.
    pub fn collects(&self) -> u32 {
        self.collects
    }

    /// Every cop speed boost recorded during the session.
    pub fn speed_ups(&self) -> u32 {
        self.speed_ups
    }

    /// Every robber hide recorded during the session.
    pub fn hides(&self) -> u32 {
        self.hides
    }

    fn power_ups_of(&self, role: Role) -> u32 {
        match role {
            Role::Cop => self.speed_ups,
            Role::Robber => self.hides,
        }
    }
}

impl Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} as {} in {:.3}s, {}/{} targets ({:.1}%), {} power-ups",
            self.outcome,
            self.role,
            self.elapsed_seconds,
            self.targets_completed,
            self.targets_total,
            self.completion_ratio * 100.0,
            self.power_up_activations()
        )?;
        match self.opponent_completion_ratio() {
            Some(ratio) => write!(
                f,
                ", opponents {:.1}% with {} power-ups",
                ratio * 100.0,
                self.opponent_power_up_activations()
            ),
            None => write!(
                f,
                ", opponents {} power-ups",
                self.opponent_power_up_activations()
            ),
        }
    }
}

fn completion_ratio(completed: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(completed) / f64::from(total)
    }
}

/// Counts gameplay events of the current session.
#[derive(Debug, Default, Clone)]
pub struct SessionRecorder {
    tags: u32,
    collects: u32,
    speed_ups: u32,
    hides: u32,
}

impl SessionRecorder {
    /// Recorder with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one tag.
    pub fn record_tag(&mut self) {
        self.tags = self.tags.saturating_add(1);
    }

    /// Count one diamond collection.
    pub fn record_collect(&mut self) {
        self.collects = self.collects.saturating_add(1);
    }

    /// Count one successful power-up activation by a `role` player: a speed boost for cops, a
    /// hide for robbers.
    pub fn record_power_up(&mut self, role: Role) {
        match role {
            Role::Cop => self.speed_ups = self.speed_ups.saturating_add(1),
            Role::Robber => self.hides = self.hides.saturating_add(1),
        }
    }

    /// Dispatch an event to the matching counter.
    pub fn record(&mut self, event: GameplayEvent) {
        trace!(?event);
        match event {
            GameplayEvent::Tag => self.record_tag(),
            GameplayEvent::Collect => self.record_collect(),
            GameplayEvent::SpeedUp => self.record_power_up(Role::Cop),
            GameplayEvent::Hide => self.record_power_up(Role::Robber),
        }
    }

    /// Objective progress of `role`: tags for a cop, collections for a robber.
    pub fn targets_completed(&self, role: Role) -> u32 {
        match role {
            Role::Cop => self.tags,
            Role::Robber => self.collects,
        }
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Freeze the counters into a summary, then reset them.
    ///
    /// Unlike [`SessionSummary::new`], inconsistent input is clamped rather than rejected:
    /// completions above `targets_total` are capped and a bad elapsed time becomes zero.
    /// The agents' target count is left unknown, see
    /// [`with_opponent_targets`](SessionSummary::with_opponent_targets).
    ///
    /// Calling this twice without recording in between yields a summary with zero counters.
    pub fn finish(
        &mut self,
        outcome: Outcome,
        role: Role,
        elapsed_seconds: f64,
        targets_total: u32,
    ) -> SessionSummary {
        let mut completed = self.targets_completed(role);
        if completed > targets_total {
            warn!("{completed} targets completed out of {targets_total}, clamping");
            completed = targets_total;
        }
        let elapsed = if elapsed_seconds.is_finite() && elapsed_seconds >= 0.0 {
            elapsed_seconds
        } else {
            warn!("invalid elapsed time {elapsed_seconds}, using 0");
            0.0
        };

        let summary = self.summarize(outcome, role, elapsed, targets_total, completed);
        self.reset();
        summary
    }

    fn summarize(
        &self,
        outcome: Outcome,
        role: Role,
        elapsed_seconds: f64,
        targets_total: u32,
        targets_completed: u32,
    ) -> SessionSummary {
        SessionSummary {
            outcome,
            role,
            elapsed_seconds,
            targets_total,
            targets_completed,
            completion_ratio: completion_ratio(targets_completed, targets_total),
            tags: self.tags,
            collects: self.collects,
            speed_ups: self.speed_ups,
            hides: self.hides,
            opponent_targets_total: 0,
        }
    }

    fn set_objective(&mut self, role: Role, count: u32) {
        match role {
            Role::Cop => self.tags = count,
            Role::Robber => self.collects = count,
        }
    }

    fn set_power_ups(&mut self, role: Role, count: u32) {
        match role {
            Role::Cop => self.speed_ups = count,
            Role::Robber => self.hides = count,
        }
    }
}
