//! Scripted collaborators for driving the synthesis loop without
//! external programs.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use expinv_algebra::AdjugateBasis;
use expinv_engine::services::{
    Assignment, BasisRequest, ConstraintSolver, LinearAlgebraOracle, NativeEvaluator,
    NativeLinearAlgebra, QuantifierEliminator, ServiceError, Services, SolveOutcome, SolverQuery,
};
use expinv_smt::backends::redlog_backend::{QeVerdict, Theory};

type Answer = Box<dyn FnMut(&SolverQuery) -> Result<SolveOutcome, ServiceError>>;

/// Answers every query with a closure and keeps the queries.
pub struct ScriptedSolver {
    answer: Answer,
    pub queries: Vec<SolverQuery>,
}

impl ScriptedSolver {
    pub fn new(answer: impl FnMut(&SolverQuery) -> Result<SolveOutcome, ServiceError> + 'static) -> Self {
        Self {
            answer: Box::new(answer),
            queries: Vec::new(),
        }
    }

    /// Satisfiable with an empty model, so every coefficient is zero.
    pub fn always_sat() -> Self {
        Self::new(|_| Ok(SolveOutcome::Sat(Assignment::new())))
    }

    pub fn guesses(&self) -> usize {
        self.queries
            .iter()
            .filter(|q| !q.unknowns.is_empty() && !q.nonlinear)
            .count()
    }
}

impl ConstraintSolver for ScriptedSolver {
    fn solve(&mut self, query: &SolverQuery, _timeout: Option<Duration>) -> Result<SolveOutcome, ServiceError> {
        self.queries.push(query.clone());
        (self.answer)(query)
    }
}

/// Pops verdicts and transcripts; `Valid` and an empty transcript once
/// the scripts run dry.
#[derive(Default)]
pub struct ScriptedEliminator {
    pub verdicts: VecDeque<QeVerdict>,
    pub transcripts: VecDeque<String>,
    pub decided: Vec<String>,
    pub searched: Vec<String>,
}

impl ScriptedEliminator {
    pub fn refuting(times: usize, transcripts: &[&str]) -> Self {
        Self {
            verdicts: (0..times)
                .map(|_| QeVerdict::Invalid {
                    residual: "false".into(),
                })
                .collect(),
            transcripts: transcripts.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl QuantifierEliminator for ScriptedEliminator {
    fn decide(&mut self, formula: &str, _theory: Theory, _timeout: Option<Duration>) -> Result<QeVerdict, ServiceError> {
        self.decided.push(formula.to_string());
        Ok(self.verdicts.pop_front().unwrap_or(QeVerdict::Valid))
    }

    fn counterexample(&mut self, formula: &str, _theory: Theory, _timeout: Option<Duration>) -> Result<String, ServiceError> {
        self.searched.push(formula.to_string());
        Ok(self.transcripts.pop_front().unwrap_or_default())
    }
}

/// Times out on the first `failures` calls, then computes natively.
pub struct FlakyLinearAlgebra {
    pub failures: usize,
}

impl LinearAlgebraOracle for FlakyLinearAlgebra {
    fn basis(&mut self, request: &BasisRequest<'_>, timeout: Option<Duration>) -> Result<Option<AdjugateBasis>, ServiceError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ServiceError::Timeout {
                context: "linear algebra".into(),
            });
        }
        NativeLinearAlgebra.basis(request, timeout)
    }
}

/// Run `f` with the scripted solver and eliminator plus native algebra.
pub fn with_services<T>(
    solver: &mut ScriptedSolver,
    eliminator: &mut ScriptedEliminator,
    f: impl FnOnce(&mut Services<'_>) -> T,
) -> T {
    let mut linear_algebra = NativeLinearAlgebra;
    let mut evaluator = NativeEvaluator;
    let mut services = Services {
        solver,
        eliminator,
        linear_algebra: &mut linear_algebra,
        evaluator: &mut evaluator,
    };
    f(&mut services)
}
