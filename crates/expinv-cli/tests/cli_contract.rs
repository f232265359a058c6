use serde_json::Value;
use std::process::Command;

fn expinv() -> Command {
    Command::new(env!("CARGO_BIN_EXE_expinv"))
}

#[test]
fn cases_json_lists_every_builtin_case() {
    let output = expinv()
        .args(["cases", "--format", "json", "--pre", "x", "--post", "n"])
        .output()
        .expect("failed to execute cases command");
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let cases: Value = serde_json::from_slice(&output.stdout).expect("cases output should be JSON");
    let cases = cases.as_array().expect("a JSON array");
    assert_eq!(cases.len(), 13);
    let walk = cases
        .iter()
        .find(|c| c["name"] == "random-walk-v2")
        .expect("random-walk-v2 is listed");
    assert_eq!(walk["variables"], serde_json::json!(["x", "y", "n"]));
    assert!(walk["rule"].as_str().unwrap_or("").contains("(x)"));
}

#[test]
fn unknown_case_exits_with_an_error() {
    let output = expinv()
        .args(["synth", "--case", "coin-toss", "--quiet"])
        .output()
        .expect("failed to execute synth command");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "no report on failure");
    assert!(String::from_utf8_lossy(&output.stderr).contains("coin-toss"));
}

#[test]
fn invalid_skewness_is_rejected_before_any_solver_runs() {
    let output = expinv()
        .args(["synth", "--skewness", "1.5", "--reduce-cmd", "/nonexistent/reduce"])
        .output()
        .expect("failed to execute synth command");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("skewness"));
}

#[test]
fn unknown_output_format_is_rejected() {
    let output = expinv()
        .args(["cases", "--format", "yaml"])
        .output()
        .expect("failed to execute cases command");
    assert_eq!(output.status.code(), Some(1));
}
