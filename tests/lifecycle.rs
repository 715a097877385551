use adaptive_difficulty::dial::{MAX_OPPONENTS, MAX_TIER, MIN_OPPONENTS};
use adaptive_difficulty::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::{Duration, Instant};
use time::format_description;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_test_logger() {
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        time::UtcOffset::UTC,
        format_description::parse("[hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_timer(timer)
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn tuning(initial_tier: u8) -> Tuning {
    TuningBuilder::new()
        .with_initial_tier(initial_tier)
        .with_population_shift_chance(0.0)
        .with_seed(11)
        .build()
        .unwrap()
}

fn play<E: DifficultyEvaluator>(
    lifecycle: &mut SessionLifecycle<E>,
    role: Role,
    outcome: Outcome,
    elapsed: f64,
    targets_done: u32,
) -> SessionReport {
    lifecycle.start_session(role).unwrap();
    let event = match role {
        Role::Cop => GameplayEvent::Tag,
        Role::Robber => GameplayEvent::Collect,
    };
    for _ in 0..targets_done {
        lifecycle.record(event).unwrap();
    }
    lifecycle.end_session(outcome, elapsed).unwrap()
}

#[test]
fn quick_perfect_win_raises_opponents() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);

    let report = play(&mut lifecycle, Role::Cop, Outcome::Win, 45.0, 3);
    assert_eq!(report.decision, EvaluationDecision::Increase);
    assert_eq!(report.summary.completion_ratio(), 1.0);
    assert_eq!(report.dial.tier_index(), 6);
    assert_eq!(lifecycle.next_session_config(Role::Cop).opponent_tier, 6);
}

#[test]
fn tier_carries_over_when_switching_roles() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);

    play(&mut lifecycle, Role::Cop, Outcome::Win, 45.0, 3);
    let config = lifecycle.start_session(Role::Robber).unwrap();
    assert_eq!(config.opponent_role, Role::Cop);
    assert_eq!(config.opponent_tier, 6);
    assert_eq!(config.opponent_count, 2);
    lifecycle.end_session(Outcome::Loss, 120.0).unwrap();

    // beaten as a robber: back down for everyone
    let config = lifecycle.start_session(Role::Cop).unwrap();
    assert_eq!(config.opponent_tier, 5);
    assert_eq!(config.opponent_count, 3);
}

#[test]
fn increase_stops_at_highest_tier() {
    init_test_logger();
    let tuning = tuning(MAX_TIER);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);

    for _ in 0..3 {
        let report = play(&mut lifecycle, Role::Cop, Outcome::Win, 30.0, 3);
        assert_eq!(report.decision, EvaluationDecision::Increase);
        assert_eq!(report.dial.tier_index(), MAX_TIER);
    }
    assert_eq!(lifecycle.sessions_played(), 3);
}

#[test]
fn struggling_loss_lowers_opponents() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);

    let report = play(&mut lifecycle, Role::Robber, Outcome::Loss, 120.0, 0);
    assert_eq!(report.summary.targets_total(), 2);
    assert_eq!(report.decision, EvaluationDecision::Decrease);
    assert_eq!(report.summary.opponent_targets_total(), 1);
    assert_eq!(report.dial.tier_index(), 4);
}

#[test]
fn decrease_stops_at_lowest_tier() {
    init_test_logger();
    let tuning = tuning(0);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);

    let report = play(&mut lifecycle, Role::Robber, Outcome::Loss, 120.0, 0);
    assert_eq!(report.decision, EvaluationDecision::Decrease);
    assert_eq!(report.dial.tier_index(), 0);
}

#[test]
fn unremarkable_sessions_hold() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);
    let before = *lifecycle.dial();

    // slow perfect win
    let report = play(&mut lifecycle, Role::Cop, Outcome::Win, 200.0, 3);
    assert_eq!(report.decision, EvaluationDecision::Hold);
    // close loss
    let report = play(&mut lifecycle, Role::Robber, Outcome::Loss, 100.0, 1);
    assert_eq!(report.decision, EvaluationDecision::Hold);

    assert_eq!(*lifecycle.dial(), before);
}

#[test]
fn unavailable_scorer_leaves_dial_unchanged() {
    init_test_logger();
    let tuning = tuning(5);
    let scorer = ExternalScorer::new("sh")
        .with_args(vec!["tests/scorers/slow.sh".to_string()])
        .with_timeout(Duration::from_millis(300));
    let mut lifecycle = SessionLifecycle::from_tuning(scorer, &tuning);
    let before = *lifecycle.dial();

    let start = Instant::now();
    let report = play(&mut lifecycle, Role::Cop, Outcome::Win, 10.0, 3);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(report.decision, EvaluationDecision::Hold);
    assert_eq!(report.dial, before);
    assert_eq!(lifecycle.state(), LifecycleState::Idle);
}

#[test]
fn second_end_trigger_is_rejected() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(FixedEvaluator(EvaluationDecision::Increase), &tuning);

    play(&mut lifecycle, Role::Cop, Outcome::Loss, 50.0, 1);
    let after_first = *lifecycle.dial();
    assert_eq!(after_first.tier_index(), 6);

    assert!(matches!(
        lifecycle.end_session(Outcome::Win, 51.0),
        Err(DifficultyError::InvalidTransition { .. })
    ));
    assert_eq!(*lifecycle.dial(), after_first);
    assert_eq!(lifecycle.sessions_played(), 1);
}

#[test]
fn counters_start_fresh_each_session() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(FixedEvaluator(EvaluationDecision::Hold), &tuning);

    let first = play(&mut lifecycle, Role::Cop, Outcome::Win, 40.0, 3);
    assert_eq!(first.summary.tags(), 3);

    lifecycle.start_session(Role::Cop).unwrap();
    lifecycle.record(GameplayEvent::SpeedUp).unwrap();
    let second = lifecycle.end_session(Outcome::Loss, 40.0).unwrap();
    assert_eq!(second.summary.tags(), 0);
    assert_eq!(second.summary.power_up_activations(), 1);
    assert_eq!(second.summary.completion_ratio(), 0.0);
}

#[test]
fn dial_stays_in_bounds_over_long_runs() {
    init_test_logger();
    let tuning = TuningBuilder::new()
        .with_population_shift_chance(0.5)
        .with_seed(2024)
        .build()
        .unwrap();
    let mut lifecycle = SessionLifecycle::from_tuning(ScoreCardEvaluator, &tuning);
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..500 {
        let role = if rng.random_bool(0.5) { Role::Cop } else { Role::Robber };
        let outcome = if rng.random_bool(0.5) { Outcome::Win } else { Outcome::Loss };
        let config = lifecycle.start_session(role).unwrap();
        let done = rng.random_range(0..=config.targets_total);
        let event = match role {
            Role::Cop => GameplayEvent::Tag,
            Role::Robber => GameplayEvent::Collect,
        };
        for _ in 0..done {
            lifecycle.record(event).unwrap();
        }
        for _ in 0..rng.random_range(0..15) {
            lifecycle.record(GameplayEvent::power_up(role)).unwrap();
        }
        let report = lifecycle
            .end_session(outcome, rng.random_range(10.0..150.0))
            .unwrap();

        assert!(report.dial.tier_index() <= MAX_TIER);
        for side in [Role::Cop, Role::Robber] {
            let count = report.dial.opponent_count(side);
            assert!((MIN_OPPONENTS..=MAX_OPPONENTS).contains(&count));
        }
    }
    assert_eq!(lifecycle.sessions_played(), 500);
}

#[test]
fn shutdown_ends_the_run() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(tuning.rule_based_evaluator(), &tuning);
    play(&mut lifecycle, Role::Robber, Outcome::Win, 20.0, 2);

    lifecycle.start_session(Role::Cop).unwrap();
    lifecycle.shutdown();
    assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    assert!(lifecycle.shutdown_signal().is_triggered());
    assert!(lifecycle.start_session(Role::Robber).is_err());
    assert!(lifecycle.record(GameplayEvent::Tag).is_err());
    assert_eq!(lifecycle.sessions_played(), 1);
}

#[test]
fn score_card_counts_what_the_agents_achieved() {
    init_test_logger();
    let tuning = tuning(5);
    let mut lifecycle = SessionLifecycle::from_tuning(ScoreCardEvaluator, &tuning);

    // every robber tagged, but only after they deposited both diamonds
    lifecycle.start_session(Role::Cop).unwrap();
    for event in [
        GameplayEvent::Collect,
        GameplayEvent::Tag,
        GameplayEvent::Collect,
        GameplayEvent::Tag,
        GameplayEvent::Tag,
    ] {
        lifecycle.record(event).unwrap();
    }
    let report = lifecycle.end_session(Outcome::Loss, 75.0).unwrap();
    assert_eq!(report.summary.completion_ratio(), 1.0);
    assert_eq!(report.summary.opponent_completion_ratio(), Some(1.0));
    assert_eq!(report.decision, EvaluationDecision::Decrease);
    assert_eq!(report.dial.tier_index(), 4);

    // a robber hiding constantly while barely escaping the cops
    lifecycle.start_session(Role::Robber).unwrap();
    lifecycle.record(GameplayEvent::Collect).unwrap();
    for _ in 0..12 {
        lifecycle.record(GameplayEvent::Hide).unwrap();
    }
    lifecycle.record(GameplayEvent::Tag).unwrap();
    let report = lifecycle.end_session(Outcome::Loss, 95.0).unwrap();
    assert_eq!(report.summary.power_up_activations(), 12);
    assert_eq!(report.decision, EvaluationDecision::Decrease);
    assert_eq!(report.dial.tier_index(), 3);
}
