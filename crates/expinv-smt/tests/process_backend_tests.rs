//! Process-level tests for the SMT backend using shell stand-ins, so no
//! solver binary is required.

#![cfg(unix)]

use std::time::Duration;

use expinv_smt::backends::process_backend::{ProcessSolver, SolverBackendError, SolverKind};
use expinv_smt::process::{ExternalCommand, ProcessError};
use expinv_smt::solver::{SatResult, SmtSolver};
use expinv_smt::sorts::SmtSort;
use expinv_smt::terms::SmtTerm;

fn scripted(reply: &str) -> ProcessSolver {
    // Extra solver flags land after `-c <script> sh`, where the shell ignores them.
    let command = ExternalCommand::new("sh").args([
        "-c".to_string(),
        format!("cat >/dev/null; printf '{reply}'"),
        "sh".to_string(),
    ]);
    ProcessSolver::with_command(SolverKind::Z3, command).with_timeout(Some(Duration::from_secs(10)))
}

#[test]
fn sat_with_model_is_parsed() {
    let mut solver = scripted("sat\\n((I_1_ 3)\\n (I_2_ (- 1)))\\n");
    solver.declare_var("I_1_", &SmtSort::Int).unwrap();
    solver.declare_var("I_2_", &SmtSort::Int).unwrap();
    solver
        .assert(&SmtTerm::var("I_1_").gt(SmtTerm::var("I_2_")))
        .unwrap();
    let (result, model) = solver
        .check_sat_with_model(&[("I_1_", &SmtSort::Int), ("I_2_", &SmtSort::Int)])
        .unwrap();
    assert_eq!(result, SatResult::Sat);
    let model = model.unwrap();
    assert_eq!(model.get_int("I_1_"), Some(3));
    assert_eq!(model.get_int("I_2_"), Some(-1));
}

#[test]
fn unsat_has_no_model() {
    let mut solver = scripted("unsat\\n(error \"model is not available\")\\n");
    solver.declare_var("x", &SmtSort::Int).unwrap();
    let (result, model) = solver
        .check_sat_with_model(&[("x", &SmtSort::Int)])
        .unwrap();
    assert_eq!(result, SatResult::Unsat);
    assert!(model.is_none());
}

#[test]
fn solver_error_is_reported_verbatim() {
    let mut solver = scripted("(error \"line 4 column 10: unknown constant y\")\\n");
    let err = solver.check_sat().unwrap_err();
    match err {
        SolverBackendError::Solver { message, .. } => {
            assert!(message.contains("unknown constant y"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn hung_solver_hits_the_deadline() {
    let command = ExternalCommand::new("sh").args(["-c", "sleep 5", "sh"]);
    let mut solver = ProcessSolver::with_command(SolverKind::Cvc5, command)
        .with_timeout(Some(Duration::from_millis(100)));
    let err = solver.check_sat().unwrap_err();
    assert!(matches!(
        err,
        SolverBackendError::Process(ProcessError::Timeout { .. })
    ));
}
