//! Session orchestration.
//!
//! [`SessionLifecycle`] is what a host game talks to. It owns the recorder, the evaluator and the
//! selector (and through it the dial), and sequences them:
//!
//! ```text
//!          start_session            end_session
//!   Idle ----------------> InSession -----------> Evaluating --+
//!    ^                         |                               |
//!    +-------------------------|-------------------------------+
//!    |                         | shutdown
//!    +-- shutdown --> Terminated <-+
//! ```
//!
//! `Evaluating` only exists during `end_session`: evaluation and selection run synchronously
//! and the lifecycle is back to `Idle` before the call returns, so the next session always
//! starts with an up-to-date dial.
//!
//! Wins and losses share the same path; the host only reports which one happened.

use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{error, info, instrument, warn};

use crate::dial::DifficultyDial;
use crate::error::DifficultyError;
use crate::evaluator::{DifficultyEvaluator, EvaluationDecision};
use crate::selector::DifficultySelector;
use crate::session::{GameplayEvent, Outcome, Role, SessionRecorder, SessionSummary};
use crate::shutdown::ShutdownSignal;
use crate::tuning::Tuning;

/// Where the lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Between sessions.
    Idle,
    /// A session is being played.
    InSession {
        /// Parameters the session was started with.
        config: SessionConfig,
    },
    /// The last session is being scored.
    Evaluating,
    /// The process is exiting. No further session can start.
    Terminated,
}

impl LifecycleState {
    fn name(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::InSession { .. } => "in session",
            LifecycleState::Evaluating => "evaluating",
            LifecycleState::Terminated => "terminated",
        }
    }
}

/// What the host needs to set up a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Side the human plays.
    pub human_role: Role,
    /// Side the agents play.
    pub opponent_role: Role,
    /// Trained model index for the agents, shared by both sides.
    pub opponent_tier: u8,
    /// Number of agents to spawn.
    pub opponent_count: u8,
    /// Objectives available to the human: robbers to tag, or diamonds to steal.
    pub targets_total: u32,
}

impl Display for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vs {} {}s (tier {}), {} targets",
            self.human_role,
            self.opponent_count,
            self.opponent_role,
            self.opponent_tier,
            self.targets_total
        )
    }
}

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Frozen performance of the human.
    pub summary: SessionSummary,
    /// What the evaluator decided.
    pub decision: EvaluationDecision,
    /// Dial the next session will be configured from.
    pub dial: DifficultyDial,
}

impl Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {} ({})", self.summary, self.decision, self.dial)
    }
}

/// Drives sessions one after another for the whole process run.
pub struct SessionLifecycle<E: DifficultyEvaluator, R: Rng = StdRng> {
    state: LifecycleState,
    recorder: SessionRecorder,
    evaluator: E,
    selector: DifficultySelector<R>,
    diamonds: u8,
    shutdown: ShutdownSignal,
    sessions_played: usize,
}

impl<E: DifficultyEvaluator, R: Rng> std::fmt::Debug for SessionLifecycle<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycle")
            .field("state", &self.state)
            .field("recorder", &self.recorder)
            .field("dial", self.selector.dial())
            .field("diamonds", &self.diamonds)
            .field("shutdown", &self.shutdown)
            .field("sessions_played", &self.sessions_played)
            .finish_non_exhaustive()
    }
}

impl<E: DifficultyEvaluator> SessionLifecycle<E, StdRng> {
    /// Lifecycle with a selector built from `tuning`.
    pub fn from_tuning(evaluator: E, tuning: &Tuning) -> Self {
        let selector = DifficultySelector::new(tuning.initial_dial(), tuning.seed())
            .with_population_shift_chance(tuning.population_shift_chance());
        Self::new(evaluator, selector, tuning.diamonds())
    }
}

impl<E: DifficultyEvaluator, R: Rng> SessionLifecycle<E, R> {
    /// Lifecycle starting idle, with `diamonds` objectives for a human robber.
    pub fn new(evaluator: E, selector: DifficultySelector<R>, diamonds: u8) -> Self {
        Self {
            state: LifecycleState::Idle,
            recorder: SessionRecorder::new(),
            evaluator,
            selector,
            diamonds,
            shutdown: ShutdownSignal::new(),
            sessions_played: 0,
        }
    }

    /// Use `signal` as the shutdown signal. Share it with an
    /// [`ExternalScorer`](crate::scorer::ExternalScorer) so that shutting down cancels a
    /// running evaluation.
    pub fn with_shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current dial.
    pub fn dial(&self) -> &DifficultyDial {
        self.selector.dial()
    }

    /// Number of sessions that went through evaluation.
    pub fn sessions_played(&self) -> usize {
        self.sessions_played
    }

    /// A clone of the signal [`shutdown`](Self::shutdown) triggers.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// What a session played as `role` would look like with the current dial.
    pub fn next_session_config(&self, role: Role) -> SessionConfig {
        let opponent_role = role.opponent();
        let dial = self.dial();
        let opponent_count = dial.opponent_count(opponent_role);
        let targets_total = match role {
            Role::Cop => u32::from(opponent_count),
            Role::Robber => u32::from(self.diamonds),
        };
        SessionConfig {
            human_role: role,
            opponent_role,
            opponent_tier: dial.tier_index(),
            opponent_count,
            targets_total,
        }
    }

    /// Start a session with the human playing `role`.
    ///
    /// # Errors
    /// [`DifficultyError::InvalidTransition`] unless idle.
    #[instrument(skip(self))]
    pub fn start_session(&mut self, role: Role) -> Result<SessionConfig, DifficultyError> {
        self.expect_idle("start a session")?;
        self.recorder.reset();
        let config = self.next_session_config(role);
        info!(%config, "session started");
        self.state = LifecycleState::InSession { config };
        Ok(config)
    }

    /// Report a gameplay event of the running session.
    ///
    /// # Errors
    /// [`DifficultyError::InvalidTransition`] outside a session.
    pub fn record(&mut self, event: GameplayEvent) -> Result<(), DifficultyError> {
        match self.state {
            LifecycleState::InSession { .. } => {
                self.recorder.record(event);
                Ok(())
            }
            state => Err(DifficultyError::InvalidTransition {
                action: "record an event",
                state: state.name(),
            }),
        }
    }

    /// End the running session, evaluate it and update the dial.
    ///
    /// Only the first end trigger of a session is accepted. Later ones get an error, and leave
    /// the dial untouched.
    ///
    /// A panicking evaluator counts as `Hold`: the lifecycle is idle again either way.
    ///
    /// # Errors
    /// [`DifficultyError::InvalidTransition`] outside a session.
    #[instrument(skip(self))]
    pub fn end_session(
        &mut self,
        outcome: Outcome,
        elapsed_seconds: f64,
    ) -> Result<SessionReport, DifficultyError> {
        let config = match self.state {
            LifecycleState::InSession { config } => config,
            state => {
                warn!("session end ignored while {}", state.name());
                return Err(DifficultyError::InvalidTransition {
                    action: "end a session",
                    state: state.name(),
                });
            }
        };

        self.state = LifecycleState::Evaluating;
        let summary = self
            .recorder
            .finish(
                outcome,
                config.human_role,
                elapsed_seconds,
                config.targets_total,
            )
            .with_opponent_targets(self.opponent_targets(config.human_role));
        let decision = self.evaluate(&summary);
        let dial = self.selector.apply(decision, config.human_role);
        self.sessions_played += 1;
        self.state = LifecycleState::Idle;

        let report = SessionReport {
            summary,
            decision,
            dial,
        };
        info!(%report, sessions = self.sessions_played, "session evaluated");
        Ok(report)
    }

    /// Stop for good. A running session is abandoned without evaluation.
    pub fn shutdown(&mut self) {
        if let LifecycleState::InSession { config } = self.state {
            warn!(%config, "session abandoned at shutdown");
        }
        self.shutdown.trigger();
        self.state = LifecycleState::Terminated;
        info!(sessions = self.sessions_played, "lifecycle terminated");
    }

    /// Diamonds for robber agents, the human robber for cop agents.
    fn opponent_targets(&self, role: Role) -> u32 {
        match role {
            Role::Cop => u32::from(self.diamonds),
            Role::Robber => 1,
        }
    }

    fn evaluate(&self, summary: &SessionSummary) -> EvaluationDecision {
        match catch_unwind(AssertUnwindSafe(|| self.evaluator.evaluate(summary))) {
            Ok(decision) => decision,
            Err(panic) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                error!("evaluator panicked: {message}, holding difficulty");
                EvaluationDecision::Hold
            }
        }
    }

    fn expect_idle(&self, action: &'static str) -> Result<(), DifficultyError> {
        match self.state {
            LifecycleState::Idle => Ok(()),
            state => Err(DifficultyError::InvalidTransition {
                action,
                state: state.name(),
            }),
        }
    }
}
