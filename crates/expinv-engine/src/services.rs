//! External collaborators of the synthesis loop.
//!
//! The engine only talks to these traits. Process-backed implementations
//! wrap the z3/cvc5 and REDUCE backends of `expinv-smt`; native ones
//! cover linear algebra and arithmetic in-process. Tests substitute mocks.

use std::time::Duration;

use expinv_algebra::{interpolation_basis, AdjugateBasis, Monomial};
use expinv_smt::backends::process_backend::{ProcessSolver, SolverBackendError, SolverKind};
use expinv_smt::backends::redlog_backend::{QeVerdict, RedlogBackend, RedlogError, Theory};
use expinv_smt::process::{ExternalCommand, ProcessError};
use expinv_smt::solver::{SatResult, SmtSolver};
use expinv_smt::sorts::SmtSort;
use expinv_smt::terms::SmtTerm;
use indexmap::IndexMap;
use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Zero};
use thiserror::Error;
use tracing::{debug, trace};

use crate::expr::parse_expr;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{context}: time budget exhausted")]
    Timeout { context: String },
    #[error("{service} failed: {message}")]
    Failed { service: String, message: String },
}

impl ServiceError {
    pub fn failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Failed {
            service: service.into(),
            message: message.into(),
        }
    }

    fn from_process(service: &str, err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { .. } => ServiceError::Timeout {
                context: service.to_string(),
            },
            other => ServiceError::failed(service, other.to_string()),
        }
    }
}

impl From<SolverBackendError> for ServiceError {
    fn from(err: SolverBackendError) -> Self {
        match err {
            SolverBackendError::Process(inner) => ServiceError::from_process("constraint solver", inner),
            other => ServiceError::failed("constraint solver", other.to_string()),
        }
    }
}

impl From<RedlogError> for ServiceError {
    fn from(err: RedlogError) -> Self {
        match err {
            RedlogError::Process(inner) => ServiceError::from_process("quantifier eliminator", inner),
            other => ServiceError::failed("quantifier eliminator", other.to_string()),
        }
    }
}

/// Coefficient (or variable) name to integer value, in declaration order.
pub type Assignment = IndexMap<String, i64>;

/// A conjunction of integer constraints and the unknowns to report.
#[derive(Debug, Clone, Default)]
pub struct SolverQuery {
    pub unknowns: Vec<String>,
    pub assertions: Vec<SmtTerm>,
    /// Nonlinear integer arithmetic is needed.
    pub nonlinear: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Sat(Assignment),
    Unsat,
}

impl SolveOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolveOutcome::Sat(_))
    }
}

pub trait ConstraintSolver {
    fn solve(&mut self, query: &SolverQuery, timeout: Option<Duration>) -> Result<SolveOutcome, ServiceError>;
}

pub trait QuantifierEliminator {
    /// Decide a closed formula.
    fn decide(&mut self, formula: &str, theory: Theory, timeout: Option<Duration>) -> Result<QeVerdict, ServiceError>;

    /// Run the witness search on an existential formula and return the raw
    /// transcript, which echoes the formula and carries the answer.
    fn counterexample(&mut self, formula: &str, theory: Theory, timeout: Option<Duration>) -> Result<String, ServiceError>;
}

/// Input of one basis computation.
#[derive(Debug, Clone, Copy)]
pub struct BasisRequest<'a> {
    pub degree: u32,
    pub points: &'a [Vec<i64>],
    pub monomials: &'a [Monomial],
}

impl BasisRequest<'_> {
    pub fn num_vars(&self) -> usize {
        self.monomials.first().map(Monomial::arity).unwrap_or(0)
    }
}

pub trait LinearAlgebraOracle {
    /// Determinant and adjugate entries of the Vandermonde matrix, or
    /// `None` when the points are singular for the monomials.
    fn basis(&mut self, request: &BasisRequest<'_>, timeout: Option<Duration>) -> Result<Option<AdjugateBasis>, ServiceError>;
}

pub trait ArithmeticEvaluator {
    /// Exact value of a closed arithmetic expression.
    fn evaluate(&mut self, expression: &str, timeout: Option<Duration>) -> Result<BigRational, ServiceError>;
}

/// The four collaborators of one run, borrowed so callers keep ownership.
pub struct Services<'a> {
    pub solver: &'a mut dyn ConstraintSolver,
    pub eliminator: &'a mut dyn QuantifierEliminator,
    pub linear_algebra: &'a mut dyn LinearAlgebraOracle,
    pub evaluator: &'a mut dyn ArithmeticEvaluator,
}

/// z3 or cvc5, one fresh process per query.
#[derive(Debug, Clone)]
pub struct SmtConstraintSolver {
    kind: SolverKind,
    command: Option<ExternalCommand>,
}

impl SmtConstraintSolver {
    pub fn new(kind: SolverKind) -> Self {
        Self { kind, command: None }
    }

    pub fn with_command(kind: SolverKind, command: ExternalCommand) -> Self {
        Self {
            kind,
            command: Some(command),
        }
    }
}

impl ConstraintSolver for SmtConstraintSolver {
    fn solve(&mut self, query: &SolverQuery, timeout: Option<Duration>) -> Result<SolveOutcome, ServiceError> {
        let solver = match &self.command {
            Some(command) => ProcessSolver::with_command(self.kind, command.clone()),
            None => ProcessSolver::new(self.kind),
        };
        let mut solver = solver
            .with_logic(if query.nonlinear { "QF_NIA" } else { "QF_LIA" })
            .with_timeout(timeout);

        let mut declared: Vec<String> = query.unknowns.clone();
        for term in &query.assertions {
            for name in term.variables() {
                if !declared.contains(&name) {
                    declared.push(name);
                }
            }
        }
        for name in &declared {
            solver.declare_var(name, &SmtSort::Int)?;
        }
        for term in &query.assertions {
            solver.assert(term)?;
        }
        let wanted: Vec<(&str, &SmtSort)> = query
            .unknowns
            .iter()
            .map(|n| (n.as_str(), &SmtSort::Int))
            .collect();
        let (result, model) = solver.check_sat_with_model(&wanted)?;
        match result {
            SatResult::Sat => {
                let model = model.unwrap_or_default();
                // Unreported unknowns are unconstrained; zero is as good as any.
                let assignment = query
                    .unknowns
                    .iter()
                    .map(|n| (n.clone(), model.get_int(n).unwrap_or(0)))
                    .collect();
                Ok(SolveOutcome::Sat(assignment))
            }
            SatResult::Unsat => Ok(SolveOutcome::Unsat),
            // Under a deadline the solver's own limit is what gives up.
            SatResult::Unknown(reason) if timeout.is_some() => {
                debug!(solver = %self.kind, reason = %reason, "solver gave up inside the budget");
                Err(ServiceError::Timeout {
                    context: format!("constraint solver ({})", self.kind),
                })
            }
            SatResult::Unknown(reason) => Err(ServiceError::failed(
                format!("constraint solver ({})", self.kind),
                format!("returned unknown: {reason}"),
            )),
        }
    }
}

impl QuantifierEliminator for RedlogBackend {
    fn decide(&mut self, formula: &str, theory: Theory, timeout: Option<Duration>) -> Result<QeVerdict, ServiceError> {
        Ok(RedlogBackend::decide(self, theory, formula, timeout)?)
    }

    fn counterexample(&mut self, formula: &str, theory: Theory, timeout: Option<Duration>) -> Result<String, ServiceError> {
        Ok(RedlogBackend::counterexample(self, theory, formula, timeout)?)
    }
}

/// Exact Gauss-Jordan elimination in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLinearAlgebra;

impl LinearAlgebraOracle for NativeLinearAlgebra {
    fn basis(&mut self, request: &BasisRequest<'_>, _timeout: Option<Duration>) -> Result<Option<AdjugateBasis>, ServiceError> {
        interpolation_basis(request.points, request.monomials)
            .map_err(|e| ServiceError::failed("linear algebra", e.to_string()))
    }
}

/// An external script called as
/// `<cmd> <degree> <vars> <samples> "[p1; p2; ...]" "[m1; m2; ...]"`
/// that prints `det e11 e12 ...` or `singular`.
#[derive(Debug, Clone)]
pub struct ScriptLinearAlgebra {
    command: ExternalCommand,
}

impl ScriptLinearAlgebra {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }

    fn matrix_arg<'a>(rows: impl Iterator<Item = &'a [u32]>) -> String {
        let rows: Vec<String> = rows
            .map(|r| r.iter().map(u32::to_string).collect::<Vec<_>>().join(" "))
            .collect();
        format!("[{}]", rows.join("; "))
    }

    fn points_arg(points: &[Vec<i64>]) -> String {
        let rows: Vec<String> = points
            .iter()
            .map(|p| p.iter().map(i64::to_string).collect::<Vec<_>>().join(" "))
            .collect();
        format!("[{}]", rows.join("; "))
    }
}

impl LinearAlgebraOracle for ScriptLinearAlgebra {
    fn basis(&mut self, request: &BasisRequest<'_>, timeout: Option<Duration>) -> Result<Option<AdjugateBasis>, ServiceError> {
        let size = request.points.len();
        let command = self.command.clone().args([
            request.degree.to_string(),
            request.num_vars().to_string(),
            size.to_string(),
            Self::points_arg(request.points),
            Self::matrix_arg(request.monomials.iter().map(Monomial::exponents)),
        ]);
        let output = command
            .run("", timeout)
            .map_err(|e| ServiceError::from_process("linear algebra", e))?;
        trace!(stdout = %output.stdout, "linear algebra script output");
        parse_basis_output(&output.stdout, size)
    }
}

/// Parse `det e11 e12 ...` or `singular`.
pub fn parse_basis_output(stdout: &str, size: usize) -> Result<Option<AdjugateBasis>, ServiceError> {
    let text = stdout.trim();
    if text.starts_with("singular") {
        return Ok(None);
    }
    let malformed = || ServiceError::failed("linear algebra", format!("invalid basis output: {text}"));
    let numbers = text
        .split_whitespace()
        .map(|t| t.parse::<BigInt>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    let Some((determinant, entries)) = numbers.split_first() else {
        return Err(malformed());
    };
    if determinant.is_zero() || entries.len() != size * size {
        return Err(malformed());
    }
    Ok(Some(AdjugateBasis {
        determinant: determinant.clone(),
        entries: entries.to_vec(),
    }))
}

/// Exact rational evaluation in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEvaluator;

impl ArithmeticEvaluator for NativeEvaluator {
    fn evaluate(&mut self, expression: &str, _timeout: Option<Duration>) -> Result<BigRational, ServiceError> {
        let expr = parse_expr(expression).map_err(|e| ServiceError::failed("arithmetic evaluator", e.to_string()))?;
        expr.eval(&|_| None)
            .map_err(|e| ServiceError::failed("arithmetic evaluator", e.to_string()))
    }
}

/// An external calculator reading one expression on stdin and printing its
/// value, e.g. `bc -l`.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    command: ExternalCommand,
}

impl CommandEvaluator {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl ArithmeticEvaluator for CommandEvaluator {
    fn evaluate(&mut self, expression: &str, timeout: Option<Duration>) -> Result<BigRational, ServiceError> {
        let output = self
            .command
            .run(&format!("{expression}\n"), timeout)
            .map_err(|e| ServiceError::from_process("arithmetic evaluator", e))?;
        let token = output
            .stdout
            .lines()
            .rev()
            .find_map(|l| l.split_whitespace().last())
            .unwrap_or("");
        let value = parse_number(token).ok_or_else(|| {
            ServiceError::failed(
                "arithmetic evaluator",
                format!("cannot read a number from `{}`", output.stdout.trim()),
            )
        })?;
        debug!(expression, value = %value, "evaluated externally");
        Ok(value)
    }
}

/// Read `7`, `-7`, `3.500` or `7/2` exactly.
pub fn parse_number(token: &str) -> Option<BigRational> {
    if let Some((num, den)) = token.split_once('/') {
        let den: BigInt = den.trim().parse().ok()?;
        if den.is_zero() {
            return None;
        }
        return Some(BigRational::new(num.trim().parse().ok()?, den));
    }
    if let Some((int, frac)) = token.split_once('.') {
        let negative = int.starts_with('-');
        let whole: BigInt = match int.trim_start_matches('-') {
            "" => BigInt::zero(),
            digits => digits.parse().ok()?,
        };
        let mut scale = BigInt::one();
        for _ in 0..frac.len() {
            scale *= 10;
        }
        let fraction: BigInt = if frac.is_empty() {
            BigInt::zero()
        } else if frac.chars().all(|c| c.is_ascii_digit()) {
            frac.parse().ok()?
        } else {
            return None;
        };
        let magnitude = BigRational::new(whole * &scale + fraction, scale);
        return Some(if negative { -magnitude } else { magnitude });
    }
    token.parse::<BigInt>().ok().map(BigRational::from_integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expinv_algebra::enumerate_monomials;

    fn q(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn numbers_are_read_exactly() {
        assert_eq!(parse_number("7"), Some(q(7, 1)));
        assert_eq!(parse_number("-7"), Some(q(-7, 1)));
        assert_eq!(parse_number("3.500"), Some(q(7, 2)));
        assert_eq!(parse_number("-.25"), Some(q(-1, 4)));
        assert_eq!(parse_number("7/2"), Some(q(7, 2)));
        assert_eq!(parse_number("7/0"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn basis_output_is_validated() {
        assert_eq!(parse_basis_output("singular\n", 2).unwrap(), None);
        let basis = parse_basis_output("-1 -1 1 1 0 \n", 2).unwrap().unwrap();
        assert_eq!(basis.determinant, BigInt::from(-1));
        assert_eq!(basis.entries.len(), 4);
        assert!(parse_basis_output("0 1 2 3 4", 2).is_err());
        assert!(parse_basis_output("1 2 3", 2).is_err());
        assert!(parse_basis_output("x y", 1).is_err());
    }

    #[test]
    fn native_evaluator_is_exact() {
        let mut evaluator = NativeEvaluator;
        assert_eq!(evaluator.evaluate("4*((1/2)+(3/4))", None).unwrap(), q(5, 1));
        assert!(evaluator.evaluate("x+1", None).is_err());
    }

    #[test]
    fn native_linear_algebra_answers_requests() {
        let monomials = enumerate_monomials(1, 1);
        let points = vec![vec![0], vec![1]];
        let mut oracle = NativeLinearAlgebra;
        let request = BasisRequest {
            degree: 1,
            points: &points,
            monomials: &monomials,
        };
        assert_eq!(request.num_vars(), 1);
        assert!(oracle.basis(&request, None).unwrap().is_some());
        let singular = vec![vec![2], vec![2]];
        let request = BasisRequest {
            points: &singular,
            ..request
        };
        assert!(oracle.basis(&request, None).unwrap().is_none());
    }

    #[test]
    fn process_timeouts_become_budget_timeouts() {
        let err: ServiceError = SolverBackendError::Process(ProcessError::Timeout {
            program: "z3".into(),
            timeout: Duration::from_secs(1),
        })
        .into();
        assert!(matches!(err, ServiceError::Timeout { .. }));
        let err: ServiceError = RedlogError::Reduce("***** oops".into()).into();
        assert!(matches!(err, ServiceError::Failed { ref message, .. } if message.contains("oops")));
    }

    #[cfg(unix)]
    #[test]
    fn solver_giving_up_under_a_deadline_is_a_budget_timeout() {
        let command = ExternalCommand::new("sh").args(["-c", "cat >/dev/null; echo unknown"]);
        let mut solver = SmtConstraintSolver::with_command(SolverKind::Z3, command);
        let query = SolverQuery {
            unknowns: vec!["I_1_".into()],
            assertions: vec![SmtTerm::var("I_1_").ge(SmtTerm::int(0))],
            nonlinear: false,
        };
        let err = solver.solve(&query, Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }), "{err}");
        assert!(crate::error::EngineError::from(err).is_retryable());

        let err = solver.solve(&query, None).unwrap_err();
        assert!(matches!(err, ServiceError::Failed { ref message, .. } if message.contains("unknown")));
    }

    #[cfg(unix)]
    #[test]
    fn script_linear_algebra_passes_matrices_as_arguments() {
        // Echo the arguments back so the layout is visible, then answer.
        let script = "printf '%s|' \"$@\" >&2; echo '-1 -1 1 1 0'";
        let command = ExternalCommand::new("sh").args(["-c", script, "sh"]);
        let mut oracle = ScriptLinearAlgebra::new(command);
        let monomials = enumerate_monomials(1, 1);
        let points = vec![vec![0], vec![1]];
        let request = BasisRequest {
            degree: 1,
            points: &points,
            monomials: &monomials,
        };
        let basis = oracle.basis(&request, Some(Duration::from_secs(10))).unwrap().unwrap();
        assert_eq!(basis.entries, vec![-1, 1, 1, 0].into_iter().map(BigInt::from).collect::<Vec<_>>());
        assert_eq!(ScriptLinearAlgebra::points_arg(&points), "[0; 1]");
        assert_eq!(
            ScriptLinearAlgebra::matrix_arg(monomials.iter().map(Monomial::exponents)),
            "[1; 0]"
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_evaluator_reads_the_last_number() {
        let command = ExternalCommand::new("sh").args(["-c", "cat >/dev/null; echo 'result:'; echo '  2.0000'"]);
        let mut evaluator = CommandEvaluator::new(command);
        assert_eq!(evaluator.evaluate("4*(1/2)", Some(Duration::from_secs(10))).unwrap(), q(2, 1));
    }
}
