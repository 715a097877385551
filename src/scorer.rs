//! Out-of-process difficulty classifier.
//!
//! The [`ExternalScorer`] launches a child process for every evaluation, writes the session
//! summary to its stdin as one line of JSON, and reads the decision token from its stdout.
//!
//! # Protocol
//!
//! ```text
//! host -> scorer (stdin):  {"outcome":1,"role":0,"elapsedSeconds":45.0,"completionRatio":1.0,"powerUpActivations":2}
//! scorer -> host (stdout): Increase
//! ```
//!
//! `outcome` is 1 for a win and 0 for a loss, `role` is 0 for cop and 1 for robber. The last
//! non-empty line of stdout is parsed as an [`EvaluationDecision`], so scorers may print
//! progress before answering. The classifier's training labels (`Harder`, `Easier`, `Same`)
//! are accepted too.
//!
//! # Failure
//!
//! The scorer never blocks the game for longer than its timeout. Spawn errors, timeouts,
//! non-zero exits, unknown tokens and shutdown cancellation all end in
//! [`EvaluationDecision::Hold`], with a warning in the logs.
//!
//! On unix the scorer runs in its own process group, and the whole group is killed when the
//! call is abandoned, so wrapper scripts do not leave their children running.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::configuration::Configuration;
use crate::error::DifficultyError;
use crate::evaluator::{DifficultyEvaluator, EvaluationDecision};
use crate::session::SessionSummary;
use crate::shutdown::ShutdownSignal;
use crate::tuning::Tuning;

/// What the scorer receives on stdin.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScorerPayload {
    outcome: u8,
    role: u8,
    elapsed_seconds: f64,
    completion_ratio: f64,
    power_up_activations: u32,
}

impl From<&SessionSummary> for ScorerPayload {
    fn from(summary: &SessionSummary) -> Self {
        ScorerPayload {
            outcome: summary.outcome().code(),
            role: summary.role().code(),
            elapsed_seconds: summary.elapsed_seconds(),
            completion_ratio: summary.completion_ratio(),
            power_up_activations: summary.power_up_activations(),
        }
    }
}

/// Evaluator delegating to a child process.
#[derive(Debug, Clone)]
pub struct ExternalScorer {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    shutdown_grace: Duration,
    allow_stderr: bool,
    shutdown: ShutdownSignal,
}

impl ExternalScorer {
    const POLL_INTERVAL: Duration = Duration::from_millis(10);
    /// Default limit on a single scorer call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default time left to a running scorer once shutdown is requested.
    pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

    /// Scorer running `command` with no arguments and default timings.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            timeout: Self::DEFAULT_TIMEOUT,
            shutdown_grace: Self::DEFAULT_SHUTDOWN_GRACE,
            allow_stderr: false,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Scorer configured from the numeric tuning and the behavior flags.
    pub fn from_settings(
        command: impl Into<String>,
        args: Vec<String>,
        tuning: &Tuning,
        config: &Configuration,
    ) -> Self {
        Self::new(command)
            .with_args(args)
            .with_timeout(tuning.scorer_timeout)
            .with_shutdown_grace(tuning.shutdown_grace)
            .with_stderr(config.debug_scorer_stderr)
    }

    /// Arguments passed to the command.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Limit on a single call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Time left to a running call once the shutdown signal fires.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Forward the scorer's stderr to ours (debug purposes only).
    pub fn with_stderr(mut self, value: bool) -> Self {
        self.allow_stderr = value;
        self
    }

    /// Share a shutdown signal with the scorer.
    pub fn with_shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    /// The signal this scorer watches.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Ask the child process, without the fail-open fallback.
    ///
    /// # Errors
    /// [`DifficultyError::ScorerUnavailable`] on any failure, including timeout and
    /// cancellation.
    pub fn try_score(&self, summary: &SessionSummary) -> Result<EvaluationDecision, DifficultyError> {
        let output = self
            .invoke(summary)
            .map_err(|e| DifficultyError::ScorerUnavailable(format!("{e:#}")))?;

        let token = output
            .lines()
            .map(str::trim)
            .rev()
            .find(|line| !line.is_empty())
            .ok_or_else(|| DifficultyError::ScorerUnavailable("empty answer".to_string()))?;

        token
            .parse()
            .map_err(|e| DifficultyError::ScorerUnavailable(format!("{e:#}")))
    }

    #[instrument(skip_all, fields(scorer = %self.command))]
    fn invoke(&self, summary: &SessionSummary) -> anyhow::Result<String> {
        let payload = serde_json::to_string(&ScorerPayload::from(summary))
            .context("could not serialize session summary")?;
        trace!(%payload);

        let mut child = self.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(format!("{payload}\n").as_bytes()) {
                Ok(()) => {}
                // the scorer may answer without reading its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => debug!("scorer closed its stdin"),
                Err(e) => {
                    kill_child(&mut child);
                    return Err(e).context("I/O error while sending summary");
                }
            }
        }

        let Some(mut stdout) = child.stdout.take() else {
            kill_child(&mut child);
            bail!("scorer stdout was not captured");
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = String::new();
            let read = stdout.read_to_string(&mut buf).map(|_| buf);
            // receiver is gone when the call already timed out
            let _ = tx.send(read);
        });

        let mut deadline = Instant::now() + self.timeout;
        let mut cancelled = false;
        let output = loop {
            match rx.recv_timeout(Self::POLL_INTERVAL) {
                Ok(Ok(output)) => break output,
                Ok(Err(e)) => {
                    kill_child(&mut child);
                    return Err(e).context("error while reading scorer output");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    kill_child(&mut child);
                    bail!("scorer output reader stopped unexpectedly");
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            if !cancelled && self.shutdown.is_triggered() {
                cancelled = true;
                deadline = deadline.min(Instant::now() + self.shutdown_grace);
                warn!("shutdown requested, scorer has {:?} left", self.shutdown_grace);
            }

            if Instant::now() >= deadline {
                kill_child(&mut child);
                if cancelled {
                    bail!("scorer cancelled by shutdown");
                }
                bail!("no answer within {:?}", self.timeout);
            }
        };

        // stdout is closed, the process should be exiting
        loop {
            if let Some(status) = child.try_wait().context("could not wait for scorer")? {
                if !status.success() {
                    bail!("scorer exited with {status}");
                }
                break;
            }
            if Instant::now() >= deadline {
                kill_child(&mut child);
                return Err(anyhow!("scorer closed stdout but did not exit"));
            }
            thread::sleep(Self::POLL_INTERVAL);
        }

        debug!(output = output.trim(), "scorer answered");
        Ok(output)
    }

    fn spawn(&self) -> anyhow::Result<Child> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        if !self.allow_stderr {
            cmd.stderr(Stdio::null());
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd.spawn()
            .with_context(|| format!("could not start scorer '{}'", self.command))
    }
}

impl DifficultyEvaluator for ExternalScorer {
    fn evaluate(&self, summary: &SessionSummary) -> EvaluationDecision {
        match self.try_score(summary) {
            Ok(decision) => {
                debug!(%summary, %decision, "external evaluation");
                decision
            }
            Err(e) => {
                warn!("{e}, holding difficulty");
                EvaluationDecision::Hold
            }
        }
    }
}

fn kill_child(child: &mut Child) {
    #[cfg(unix)]
    kill_process_group(child);
    if let Err(e) = child.kill() {
        // already exited
        trace!("could not kill scorer: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("could not reap scorer process: {e}");
    }
}

/// The child leads its own group, so its pid is the group id.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    // SAFETY: plain syscall, a negative pid targets the process group
    let res = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if res != 0 {
        trace!(
            "could not kill scorer group {pgid}: {}",
            std::io::Error::last_os_error()
        );
    }
}
