use adaptive_difficulty::prelude::*;
use std::thread;
use std::time::{Duration, Instant};

fn script(name: &str) -> ExternalScorer {
    ExternalScorer::new("sh").with_args(vec![format!("tests/scorers/{name}.sh")])
}

fn inline(body: &str) -> ExternalScorer {
    ExternalScorer::new("sh").with_args(vec!["-c".to_string(), body.to_string()])
}

/// Running and not a zombie.
#[cfg(target_os = "linux")]
fn is_running(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn read_pid(path: &std::path::Path) -> String {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let pid = std::fs::read_to_string(path).unwrap_or_default();
        if !pid.trim().is_empty() || Instant::now() > deadline {
            return pid.trim().to_string();
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn win() -> SessionSummary {
    SessionSummary::new(Outcome::Win, Role::Cop, 42.0, 3, 3, 1).unwrap()
}

fn loss() -> SessionSummary {
    SessionSummary::new(Outcome::Loss, Role::Robber, 120.0, 2, 0, 4).unwrap()
}

#[test]
fn reads_decision_token() {
    let scorer = inline("cat > /dev/null; echo Increase");
    assert_eq!(scorer.try_score(&win()).unwrap(), EvaluationDecision::Increase);
    assert_eq!(scorer.evaluate(&loss()), EvaluationDecision::Increase);
}

#[test]
fn understands_classifier_labels() {
    let scorer = script("by_outcome");
    assert_eq!(scorer.evaluate(&win()), EvaluationDecision::Increase);
    assert_eq!(scorer.evaluate(&loss()), EvaluationDecision::Decrease);

    let same = inline("read -r payload; echo '  same '");
    assert_eq!(same.evaluate(&win()), EvaluationDecision::Hold);
}

#[test]
fn last_line_wins() {
    let scorer = script("chatty");
    assert_eq!(scorer.try_score(&win()).unwrap(), EvaluationDecision::Decrease);
}

#[test]
fn payload_reaches_the_scorer() {
    let scorer = inline(
        r#"read -r payload; case "$payload" in *'"elapsedSeconds":120'*'"powerUpActivations":4'*) echo Hold ;; *) echo Increase ;; esac"#,
    );
    assert_eq!(scorer.try_score(&loss()).unwrap(), EvaluationDecision::Hold);
}

#[test]
fn unknown_token_holds() {
    let scorer = script("garbage");
    assert!(matches!(
        scorer.try_score(&win()),
        Err(DifficultyError::ScorerUnavailable(_))
    ));
    assert_eq!(scorer.evaluate(&win()), EvaluationDecision::Hold);

    let silent = inline("cat > /dev/null");
    assert_eq!(silent.evaluate(&win()), EvaluationDecision::Hold);
}

#[test]
fn failing_scorer_holds() {
    let scorer = script("crashing");
    assert!(scorer.try_score(&win()).is_err());
    assert_eq!(scorer.evaluate(&win()), EvaluationDecision::Hold);

    let missing = ExternalScorer::new("definitely-not-a-scorer-binary");
    assert_eq!(missing.evaluate(&win()), EvaluationDecision::Hold);
}

#[test]
fn slow_scorer_times_out() {
    let scorer = script("slow").with_timeout(Duration::from_millis(200));
    let start = Instant::now();
    assert_eq!(scorer.evaluate(&win()), EvaluationDecision::Hold);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn shutdown_cancels_running_scorer() {
    let signal = ShutdownSignal::new();
    let scorer = script("slow")
        .with_timeout(Duration::from_secs(30))
        .with_shutdown_grace(Duration::from_millis(100))
        .with_shutdown_signal(signal.clone());

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        signal.trigger();
    });

    let start = Instant::now();
    assert!(matches!(
        scorer.try_score(&win()),
        Err(DifficultyError::ScorerUnavailable(_))
    ));
    assert!(start.elapsed() < Duration::from_secs(10));
    trigger.join().unwrap();
}

#[test]
fn answer_within_grace_is_kept() {
    let signal = ShutdownSignal::new();
    signal.trigger();
    let scorer = inline("read -r payload; echo Decrease")
        .with_shutdown_grace(Duration::from_secs(3))
        .with_shutdown_signal(signal);
    assert_eq!(scorer.try_score(&loss()).unwrap(), EvaluationDecision::Decrease);
}

#[cfg(target_os = "linux")]
#[test]
fn timeout_kills_scorer_children() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("sleeper.pid");
    let scorer = ExternalScorer::new("sh")
        .with_args(vec![
            "-c".to_string(),
            r#"read -r payload; sleep 30 & echo $! > "$1"; wait; echo Increase"#.to_string(),
            "scorer".to_string(),
            pid_file.display().to_string(),
        ])
        .with_timeout(Duration::from_millis(300));

    assert_eq!(scorer.evaluate(&win()), EvaluationDecision::Hold);

    let pid = read_pid(&pid_file);
    assert!(!pid.is_empty(), "scorer never started its child");
    let deadline = Instant::now() + Duration::from_secs(3);
    while is_running(&pid) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(!is_running(&pid), "sleep {pid} outlived its scorer");
}
