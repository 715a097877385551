//! Feed recorded sessions through the difficulty loop.
//!
//! ```text
//! session_replay [FILE]
//! ```
//!
//! Reads one session per line from `FILE` (or stdin):
//!
//! ```text
//! # role   outcome elapsed tags collects speed_ups hides
//! cop      win     45.2    3    0        2         0
//! robber   loss    130     1    1        4         11
//! ```
//!
//! Counts cover both sides: a human cop's `collects` and `hides` are what the robber agents did.
//!
//! The evaluator is picked with `DIFFICULTY_EVALUATOR` (`rules`, the default, or `scorecard`),
//! unless `DIFFICULTY_SCORER` names an external scorer command, whose arguments are read from
//! `DIFFICULTY_SCORER_ARGS`. See the library documentation for the other variables.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use adaptive_difficulty::init_logger;
use adaptive_difficulty::prelude::*;
use adaptive_difficulty::tuning::split_args;
use anyhow::{bail, Context};
use tracing::{error, info};

struct Record {
    role: Role,
    outcome: Outcome,
    elapsed_seconds: f64,
    tags: u32,
    collects: u32,
    speed_ups: u32,
    hides: u32,
}

fn parse_record(line: &str) -> anyhow::Result<Record> {
    let fields = line.split_whitespace().collect::<Vec<_>>();
    if fields.len() != 7 {
        bail!("expected 7 fields, got {}", fields.len());
    }
    Ok(Record {
        role: fields[0].parse()?,
        outcome: fields[1].parse()?,
        elapsed_seconds: fields[2]
            .parse()
            .with_context(|| format!("invalid elapsed time '{}'", fields[2]))?,
        tags: fields[3]
            .parse()
            .with_context(|| format!("invalid tag count '{}'", fields[3]))?,
        collects: fields[4]
            .parse()
            .with_context(|| format!("invalid collect count '{}'", fields[4]))?,
        speed_ups: fields[5]
            .parse()
            .with_context(|| format!("invalid speed-up count '{}'", fields[5]))?,
        hides: fields[6]
            .parse()
            .with_context(|| format!("invalid hide count '{}'", fields[6]))?,
    })
}

fn build_evaluator(
    tuning: &Tuning,
    config: &Configuration,
    signal: &ShutdownSignal,
) -> anyhow::Result<Box<dyn DifficultyEvaluator>> {
    if let Ok(command) = std::env::var("DIFFICULTY_SCORER") {
        let args = std::env::var("DIFFICULTY_SCORER_ARGS")
            .map(|a| split_args(&a))
            .unwrap_or_default();
        info!(%command, ?args, "using external scorer");
        let scorer = ExternalScorer::from_settings(command, args, tuning, config)
            .with_shutdown_signal(signal.clone());
        return Ok(Box::new(scorer));
    }

    let kind = std::env::var("DIFFICULTY_EVALUATOR").unwrap_or_else(|_| "rules".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "rules" => Ok(Box::new(tuning.rule_based_evaluator())),
        "scorecard" => Ok(Box::new(ScoreCardEvaluator)),
        other => bail!("unknown evaluator '{other}', expected 'rules' or 'scorecard'"),
    }
}

fn replay<E: DifficultyEvaluator>(
    lifecycle: &mut SessionLifecycle<E>,
    input: impl BufRead,
    verbose: bool,
) -> anyhow::Result<()> {
    for (number, line) in input.lines().enumerate() {
        let line = line.context("could not read input")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = match parse_record(line) {
            Ok(record) => record,
            Err(e) => {
                error!("line {}: {e:#}", number + 1);
                if verbose {
                    println!("\x1b[31mline {}: {e:#}\x1b[39m", number + 1);
                }
                continue;
            }
        };

        let config = lifecycle.start_session(record.role)?;
        for _ in 0..record.tags {
            lifecycle.record(GameplayEvent::Tag)?;
        }
        for _ in 0..record.collects {
            lifecycle.record(GameplayEvent::Collect)?;
        }
        for _ in 0..record.speed_ups {
            lifecycle.record(GameplayEvent::SpeedUp)?;
        }
        for _ in 0..record.hides {
            lifecycle.record(GameplayEvent::Hide)?;
        }
        let report = lifecycle.end_session(record.outcome, record.elapsed_seconds)?;

        if verbose {
            // green session, default decision
            println!(
                "\x1b[32m[{config}]\x1b[39m {} => {} | next: {}",
                report.summary, report.decision, report.dial
            );
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = Configuration::from_env();
    if config.log() {
        let path = init_logger(".")?;
        if config.verbose() {
            println!("logging to {}", path.display());
        }
    }

    let tuning = TuningBuilder::from_env().build()?;
    info!(?config, ?tuning);

    let signal = ShutdownSignal::new();
    let evaluator = build_evaluator(&tuning, &config, &signal)?;
    let mut lifecycle =
        SessionLifecycle::from_tuning(evaluator, &tuning).with_shutdown_signal(signal);

    let result = match std::env::args().nth(1) {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("could not open '{path}'"))?;
            replay(&mut lifecycle, BufReader::new(file), config.verbose())
        }
        None => replay(&mut lifecycle, io::stdin().lock(), config.verbose()),
    };

    lifecycle.shutdown();
    if config.verbose() {
        println!(
            "{} sessions, final dial: {}",
            lifecycle.sessions_played(),
            lifecycle.dial()
        );
    }
    result
}
