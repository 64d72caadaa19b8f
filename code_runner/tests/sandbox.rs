use std::collections::BTreeMap;
use std::time::Duration;

use code_runner::{ScriptInputs, ScriptRequest, ScriptState, run_script, validate_script};
use util::execution_config::ScriptLimits;

fn request(script: &str, answer: &str) -> ScriptRequest {
    ScriptRequest {
        script: script.to_string(),
        inputs: ScriptInputs {
            answer: answer.to_string(),
            answers: BTreeMap::from([("Q1".to_string(), answer.to_string())]),
            question_id: "Q1".to_string(),
            max_points: 10.0,
        },
    }
}

fn limits(timeout_ms: u64) -> ScriptLimits {
    ScriptLimits {
        timeout_ms,
        ..ScriptLimits::default()
    }
}

#[test]
fn scores_are_clamped_to_the_rule_maximum() {
    let high = run_script(request("score = 15", ""), &ScriptLimits::default()).unwrap();
    assert_eq!(high.state, ScriptState::Completed);
    assert_eq!(high.score, 10.0);

    let low = run_script(request("score = -3", ""), &ScriptLimits::default()).unwrap();
    assert_eq!(low.score, 0.0);
}

#[test]
fn reads_the_answer_and_sets_feedback() {
    let script = r#"
        let hits = 0
        for word in words(lower(answer)) {
            if word in ["mitochondria", "atp"] { hits += 1 }
        }
        score = max_points * hits / 2
        feedback = "found " + str(hits) + " term(s)"
    "#;
    let outcome = run_script(
        request(script, "The Mitochondria produce ATP"),
        &ScriptLimits::default(),
    )
    .unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.score, 10.0);
    assert_eq!(outcome.feedback, "found 2 term(s)");
}

#[test]
fn infinite_loops_time_out_within_the_grace_period() {
    let limits = ScriptLimits {
        max_steps: u64::MAX,
        ..limits(100)
    };
    let outcome = run_script(request("while true { }", ""), &limits).unwrap();
    assert_eq!(outcome.state, ScriptState::TimedOut);
    assert_eq!(outcome.score, 0.0);
    assert!(
        outcome.elapsed < Duration::from_millis(100 + limits.teardown_grace_ms + 500),
        "took {:?}",
        outcome.elapsed
    );
}

#[test]
fn workers_stop_themselves_when_builtins_do_the_heavy_lifting() {
    let limits = ScriptLimits {
        max_steps: u64::MAX,
        ..limits(200)
    };
    let script = "let l = range(200000)\nwhile true { l = reverse(sort(l)) }";
    let outcome = run_script(request(script, ""), &limits).unwrap();
    assert_eq!(outcome.state, ScriptState::TimedOut);
    // only a worker that wound down on its own reports a step count
    assert!(outcome.steps.is_some(), "worker was abandoned: {outcome:?}");
    assert!(
        outcome.elapsed < Duration::from_millis(200 + limits.teardown_grace_ms),
        "took {:?}",
        outcome.elapsed
    );
}

#[test]
fn step_budget_counts_as_a_timeout() {
    let limits = ScriptLimits {
        max_steps: 1_000,
        ..ScriptLimits::default()
    };
    let outcome = run_script(request("let i = 0\nwhile true { i += 1 }", ""), &limits).unwrap();
    assert_eq!(outcome.state, ScriptState::TimedOut);
    assert_eq!(outcome.score, 0.0);
}

#[test]
fn runaway_allocation_hits_the_memory_limit() {
    let limits = ScriptLimits {
        memory_kb: 64,
        ..ScriptLimits::default()
    };
    let outcome = run_script(request("let s = 'x'\nwhile true { s = s + s }", ""), &limits).unwrap();
    assert_eq!(outcome.state, ScriptState::MemoryExceeded);
    assert_eq!(outcome.score, 0.0);
    assert!(outcome.feedback.contains("memory limit"));
}

#[test]
fn runtime_errors_score_zero() {
    let outcome = run_script(request("score = 1 / 0", ""), &ScriptLimits::default()).unwrap();
    assert_eq!(outcome.state, ScriptState::RuntimeError);
    assert_eq!(outcome.score, 0.0);
    assert!(outcome.feedback.starts_with("Script error"));

    let silent = run_script(request("feedback = 'done'", ""), &ScriptLimits::default()).unwrap();
    assert_eq!(silent.state, ScriptState::RuntimeError);
}

#[test]
fn host_capabilities_do_not_exist() {
    let limits = ScriptLimits::default();
    for script in ["open('/etc/passwd')", "score = env('HOME')", "exec('ls')"] {
        assert!(validate_script(script, &limits).is_err(), "{script} validated");
        let outcome = run_script(request(script, ""), &limits).unwrap();
        assert_eq!(outcome.state, ScriptState::RuntimeError);
        assert_eq!(outcome.score, 0.0);
    }
}

#[test]
fn identical_runs_give_identical_results() {
    let script = "score = len(trim(answer)) % 7\nfeedback = upper(answer)";
    let a = run_script(request(script, " hello world "), &ScriptLimits::default()).unwrap();
    let b = run_script(request(script, " hello world "), &ScriptLimits::default()).unwrap();
    assert_eq!(a.state, b.state);
    assert_eq!(a.score, b.score);
    assert_eq!(a.feedback, b.feedback);
    assert_eq!(a.steps, b.steps);
}
