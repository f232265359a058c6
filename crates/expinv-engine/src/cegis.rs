//! Counterexample-guided refinement of the invariant coefficients.
//!
//! Each round asks the constraint solver for coefficients, checks the
//! instantiated rule at finitely many ground points and, when those all
//! pass, asks the quantifier eliminator to certify the rule for every
//! point of the domain. A failing ground point becomes a learned
//! constraint; a counterexample from certification joins the sample
//! space and is ground-checked from then on.

use std::time::Instant;

use expinv_algebra::Polynomial;
use expinv_smt::backends::redlog_backend::{QeVerdict, Theory};
use expinv_smt::terms::SmtTerm;
use num::traits::ToPrimitive;
use tracing::{debug, info, warn};

use crate::budget::Budget;
use crate::error::EngineError;
use crate::expr::{parse_relation, Expr, ExprError, Relation};
use crate::formula::Formula;
use crate::normalize::{Mode, Normalizer, SymbolTable};
use crate::oracle::RecurrenceOracle;
use crate::report::{millis, StageTimings, Verdict};
use crate::sample::{box_points, Sample};
use crate::services::{
    ArithmeticEvaluator, Assignment, ConstraintSolver, Services, SolveOutcome, SolverQuery,
};
use crate::template::{coefficient_name, Template};
use crate::translate::formula_to_smt;
use crate::witness::{back_translate, pasf_witness, PasfWitness};

/// A `pasf` witness search issues at most this many queries, each
/// conjoining the relaxations of the ones before it.
const MAX_WITNESS_QUERIES: usize = 3;

/// A ground formula over the coefficients that every later guess must
/// satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedConstraint {
    /// The point whose instantiated rule produced it.
    pub point: Vec<i64>,
    pub text: String,
    pub term: SmtTerm,
}

/// The state owned by one refinement loop.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Anchor coefficients followed by free ones.
    pub coefficients: Vec<String>,
    /// Counterexamples are prepended as they are found.
    pub samples: Vec<Sample>,
    pub learned: Vec<LearnedConstraint>,
    pub counterexamples: Vec<Vec<i64>>,
    pub budget: Budget,
}

/// Where the loop stands between two steps.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    NeedGuess,
    HaveGuess(Assignment),
    VerifiedGround(Assignment),
    FailedGround(LearnedConstraint),
    Certifying(Assignment),
    Proved(Assignment),
    RefutedWithCex(Vec<i64>),
    RefutedNoCex(Assignment),
}

/// Inputs that stay fixed for the whole loop.
pub struct CegisInput<'a> {
    pub oracle: &'a dyn RecurrenceOracle,
    pub rule: &'a Formula,
    pub template: &'a Template,
    /// Samples of the basis anchors, in coefficient order.
    pub basis_samples: &'a [Sample],
    pub bounds: (i64, i64),
    pub theory: Theory,
    pub max_rounds: usize,
}

/// How the loop ended.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub verdict: Verdict,
    pub rounds: usize,
    /// The last guess, if any was made.
    pub guess: Option<Assignment>,
    /// The certified invariant, or the last refuted candidate.
    pub candidate: Option<Polynomial>,
    pub state: RunState,
    pub timings: StageTimings,
}

/// Run the refinement loop to a verdict.
pub fn guess_invariant(
    input: &CegisInput<'_>,
    samples: Vec<Sample>,
    services: &mut Services<'_>,
    budget: Budget,
) -> Result<LoopOutcome, EngineError> {
    Refinement::new(input, samples, budget)?.run(services)
}

struct Refinement<'i, 'a> {
    input: &'i CegisInput<'a>,
    variables: Vec<String>,
    free_points: Vec<Vec<i64>>,
    ground_symbols: SymbolTable,
    program_symbols: SymbolTable,
    state: RunState,
    timings: StageTimings,
}

impl<'i, 'a> Refinement<'i, 'a> {
    fn new(input: &'i CegisInput<'a>, samples: Vec<Sample>, budget: Budget) -> Result<Self, EngineError> {
        let variables: Vec<String> = input.template.variables().to_vec();
        let (coefficients, free_points) = coefficient_names(input.template, input.basis_samples)?;
        Ok(Self {
            input,
            free_points,
            ground_symbols: SymbolTable::new(coefficients.clone(), Vec::new()),
            program_symbols: SymbolTable::new(Vec::new(), variables.clone()),
            variables,
            state: RunState {
                coefficients,
                samples,
                learned: Vec::new(),
                counterexamples: Vec::new(),
                budget,
            },
            timings: StageTimings::default(),
        })
    }

    fn run(mut self, services: &mut Services<'_>) -> Result<LoopOutcome, EngineError> {
        let started = Instant::now();
        let basis_constraints = self.basis_constraints(services)?;
        self.timings.guessing_ms += millis(started.elapsed());

        let mut rounds = 0;
        let mut last_guess: Option<Assignment> = None;
        let mut state = LoopState::NeedGuess;
        loop {
            state = match state {
                LoopState::NeedGuess => {
                    if rounds == self.input.max_rounds {
                        info!(rounds, "round limit reached");
                        return Ok(self.finish(Verdict::Exhausted, rounds, last_guess));
                    }
                    rounds += 1;
                    info!(round = rounds, learned = self.state.learned.len(), "round");
                    match self.guess(&basis_constraints, services)? {
                        Some(guess) => LoopState::HaveGuess(guess),
                        None => {
                            info!(rounds, "no coefficients satisfy the constraints");
                            return Ok(self.finish(Verdict::NoInvariantExists, rounds, last_guess));
                        }
                    }
                }
                LoopState::HaveGuess(guess) => {
                    last_guess = Some(guess.clone());
                    match self.ground_check(&guess, services)? {
                        Some(failure) => LoopState::FailedGround(failure),
                        None => LoopState::VerifiedGround(guess),
                    }
                }
                LoopState::FailedGround(constraint) => {
                    debug!(point = ?constraint.point, constraint = %constraint.text, "learned constraint");
                    if !self.state.learned.iter().any(|c| c.term == constraint.term) {
                        self.state.learned.push(constraint);
                    }
                    LoopState::NeedGuess
                }
                LoopState::VerifiedGround(guess) => LoopState::Certifying(guess),
                LoopState::Certifying(guess) => self.certify(guess, services)?,
                LoopState::Proved(guess) => {
                    info!(rounds, "invariant certified");
                    return Ok(self.finish(Verdict::Proved, rounds, Some(guess)));
                }
                LoopState::RefutedWithCex(point) => {
                    info!(point = ?point, "counterexample joins the sample space");
                    self.state.counterexamples.push(point.clone());
                    self.state.samples.insert(0, Sample::unbounded(point));
                    LoopState::NeedGuess
                }
                LoopState::RefutedNoCex(guess) => {
                    warn!(rounds, "candidate refuted without a counterexample");
                    return Ok(self.finish(Verdict::Unknown, rounds, Some(guess)));
                }
            };
        }
    }

    fn finish(self, verdict: Verdict, rounds: usize, guess: Option<Assignment>) -> LoopOutcome {
        let candidate = guess.as_ref().map(|g| self.input.template.instantiate(g));
        LoopOutcome {
            verdict,
            rounds,
            guess,
            candidate,
            state: self.state,
            timings: self.timings,
        }
    }

    /// The basis samples' constraints over coefficient unknowns.
    fn basis_constraints(&mut self, services: &mut Services<'_>) -> Result<Vec<SmtTerm>, EngineError> {
        let normalizer = Normalizer::new(&self.ground_symbols, Mode::Ground);
        let template = self.input.template;
        let free_points = &self.free_points;
        let mut terms = Vec::new();
        for sample in self.input.basis_samples {
            for constraint in &sample.constraints {
                let relation = parse_relation(constraint)?.try_map(|side| {
                    side.replace_invariants(&mut |args| {
                        let point = integer_point(args)?;
                        coefficient_for(template, free_points, &point)
                            .map(Expr::var)
                            .ok_or_else(|| ExprError::Malformed(format!("no coefficient for {point:?}")))
                    })
                })?;
                let text = normalize(
                    &normalizer,
                    &relation,
                    &mut self.state.budget,
                    &mut *services.evaluator,
                )?;
                terms.push(formula_to_smt(&Formula::atom(text))?);
            }
        }
        debug!(constraints = terms.len(), coefficients = ?self.state.coefficients, "basis constraints");
        Ok(terms)
    }

    fn guess(
        &mut self,
        basis_constraints: &[SmtTerm],
        services: &mut Services<'_>,
    ) -> Result<Option<Assignment>, EngineError> {
        let started = Instant::now();
        let query = SolverQuery {
            unknowns: self.state.coefficients.clone(),
            assertions: basis_constraints
                .iter()
                .cloned()
                .chain(self.state.learned.iter().map(|c| c.term.clone()))
                .collect(),
            nonlinear: false,
        };
        let outcome = solve(&mut *services.solver, &mut self.state.budget, &query)?;
        self.timings.guessing_ms += millis(started.elapsed());
        Ok(match outcome {
            SolveOutcome::Sat(mut assignment) => {
                for name in &self.state.coefficients {
                    assignment.entry(name.clone()).or_insert(0);
                }
                debug!(guess = ?assignment, "guess");
                Some(assignment)
            }
            SolveOutcome::Unsat => None,
        })
    }

    /// Points the rule is checked at: the filtered box when the oracle has
    /// a filter, the sample space otherwise. Counterexamples always count.
    fn ground_points(&self) -> Vec<Vec<i64>> {
        let oracle = self.input.oracle;
        if oracle.has_filter() {
            let (lower, upper) = self.input.bounds;
            let mut points: Vec<Vec<i64>> = self.state.counterexamples.iter().rev().cloned().collect();
            for point in box_points(self.variables.len(), lower, upper) {
                if oracle.admits(&point) && !points.contains(&point) {
                    points.push(point);
                }
            }
            points
        } else {
            self.state.samples.iter().map(|s| s.point.clone()).collect()
        }
    }

    /// The first ground point whose instantiated rule the guess violates.
    fn ground_check(
        &mut self,
        guess: &Assignment,
        services: &mut Services<'_>,
    ) -> Result<Option<LearnedConstraint>, EngineError> {
        let started = Instant::now();
        let anchors: Vec<SmtTerm> = self.input.template.coefficients()
            .into_iter()
            .map(|name| {
                let value = guess.get(&name).copied().unwrap_or(0);
                SmtTerm::var(name).eq(SmtTerm::int(value))
            })
            .collect();
        let points = self.ground_points();
        let mut failure = None;
        for point in points {
            let instance = self.ground_instance(&point, services)?;
            let term = formula_to_smt(&instance)?;
            let holds = match term.as_bool_lit() {
                Some(truth) => truth,
                None => {
                    let query = SolverQuery {
                        unknowns: Vec::new(),
                        assertions: std::iter::once(term.clone()).chain(anchors.iter().cloned()).collect(),
                        nonlinear: false,
                    };
                    solve(&mut *services.solver, &mut self.state.budget, &query)?.is_sat()
                }
            };
            if !holds {
                debug!(point = ?point, "ground check failed");
                failure = Some(LearnedConstraint {
                    point,
                    text: instance.to_string(),
                    term,
                });
                break;
            }
        }
        self.timings.ground_checks_ms += millis(started.elapsed());
        Ok(failure)
    }

    /// The rule at a ground point with every `I[...]` replaced by the
    /// template, linear in the anchor coefficients.
    fn ground_instance(&mut self, point: &[i64], services: &mut Services<'_>) -> Result<Formula, EngineError> {
        let normalizer = Normalizer::new(&self.ground_symbols, Mode::Ground);
        let template = self.input.template;
        let variables = &self.variables;
        let budget = &mut self.state.budget;
        let evaluator = &mut *services.evaluator;
        self.input.rule.try_map_atoms(&mut |atom: &str| -> Result<String, EngineError> {
            let relation = parse_relation(atom)?.try_map(|side| {
                side.substitute(&|name| {
                    variables
                        .iter()
                        .position(|v| v == name)
                        .map(|i| Expr::int(point[i]))
                })
                .replace_invariants(&mut |args| Ok::<_, ExprError>(template.linear_form_at(&integer_point(args)?)))
            })?;
            normalize(&normalizer, &relation, budget, evaluator)
        })
    }

    /// The rule with `I` replaced by the candidate polynomial.
    fn symbolic_instance(&mut self, candidate: &Expr, services: &mut Services<'_>) -> Result<Formula, EngineError> {
        let normalizer = Normalizer::new(&self.program_symbols, Mode::Symbolic);
        let variables = &self.variables;
        let budget = &mut self.state.budget;
        let evaluator = &mut *services.evaluator;
        self.input.rule.try_map_atoms(&mut |atom: &str| -> Result<String, EngineError> {
            let relation = parse_relation(atom)?
                .try_map(|side| side.replace_invariants(&mut |args| compose(candidate, variables, args)))?;
            normalize(&normalizer, &relation, budget, evaluator)
        })
    }

    fn certify(&mut self, guess: Assignment, services: &mut Services<'_>) -> Result<LoopState, EngineError> {
        let started = Instant::now();
        let result = self.certify_inner(guess, services);
        self.timings.certification_ms += millis(started.elapsed());
        result
    }

    fn certify_inner(&mut self, guess: Assignment, services: &mut Services<'_>) -> Result<LoopState, EngineError> {
        let polynomial = self.input.template.instantiate(&guess);
        let candidate = Expr::from_polynomial(&polynomial, &self.variables);
        info!(candidate = %polynomial.render(&self.variables), "certifying");
        let rule = self.symbolic_instance(&candidate, services)?.to_redlog();
        let domain = self.input.oracle.domain().to_string();
        let closed = quantify("all", &self.variables, &format!("({domain}) impl ({rule})"));
        debug!(formula = %closed, "certification query");

        let theory = self.input.theory;
        let eliminator = &mut *services.eliminator;
        let verdict = self
            .state
            .budget
            .invoke("quantifier eliminator", |timeout| eliminator.decide(&closed, theory, timeout))?;
        if let QeVerdict::Invalid { residual } = verdict {
            debug!(residual = %residual, "certification refuted the candidate");
            return Ok(match self.counterexample(&domain_and_negation(&domain, &rule), services)? {
                Some(point) => LoopState::RefutedWithCex(point),
                None => LoopState::RefutedNoCex(guess),
            });
        }
        Ok(LoopState::Proved(guess))
    }

    /// Search for a point of the domain where the rule fails.
    fn counterexample(&mut self, body: &str, services: &mut Services<'_>) -> Result<Option<Vec<i64>>, EngineError> {
        let theory = self.input.theory;
        let mut relaxations: Vec<String> = Vec::new();
        let mut first_transcript: Option<String> = None;
        loop {
            let conjuncts: Vec<String> = relaxations.iter().map(|r| format!("({r})")).collect();
            let body = if conjuncts.is_empty() {
                body.to_string()
            } else {
                format!("{} and {body}", conjuncts.join(" and "))
            };
            let query = quantify("ex", &self.variables, &body);
            let eliminator = &mut *services.eliminator;
            let transcript = self
                .state
                .budget
                .invoke("quantifier eliminator", |timeout| eliminator.counterexample(&query, theory, timeout))?;
            if theory != Theory::Pasf {
                first_transcript.get_or_insert(transcript);
                break;
            }
            let witness = pasf_witness(&transcript, &self.variables);
            first_transcript.get_or_insert(transcript);
            match witness {
                Some(PasfWitness::Point(point)) => return Ok(Some(point)),
                Some(PasfWitness::Relaxation(relaxation)) if relaxations.len() + 1 < MAX_WITNESS_QUERIES => {
                    debug!(relaxation = %relaxation, "relaxing the witness search");
                    relaxations.push(relaxation);
                }
                _ => break,
            }
        }
        match first_transcript {
            Some(transcript) => self.solve_echoed(&transcript, services),
            None => Ok(None),
        }
    }

    /// Ask the solver for a model of the echoed witness formula.
    fn solve_echoed(&mut self, transcript: &str, services: &mut Services<'_>) -> Result<Option<Vec<i64>>, EngineError> {
        let formula = match back_translate(transcript) {
            Ok(Some(formula)) => formula,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(error = %err, "witness formula could not be read back");
                return Ok(None);
            }
        };
        let term = match formula_to_smt(&formula) {
            Ok(term) => term,
            Err(err) => {
                warn!(error = %err, "witness formula has no integer form");
                return Ok(None);
            }
        };
        let query = SolverQuery {
            unknowns: self.variables.clone(),
            assertions: vec![term],
            nonlinear: true,
        };
        match solve(&mut *services.solver, &mut self.state.budget, &query)? {
            SolveOutcome::Sat(model) => Ok(Some(
                self.variables
                    .iter()
                    .map(|v| model.get(v).copied().unwrap_or(0))
                    .collect(),
            )),
            SolveOutcome::Unsat => {
                warn!("witness formula is unsatisfiable");
                Ok(None)
            }
        }
    }
}

/// Anchor coefficients, then one free coefficient per non-anchor point
/// referenced by a basis constraint, in order of first reference. The
/// second component lists those points.
fn coefficient_names(
    template: &Template,
    basis_samples: &[Sample],
) -> Result<(Vec<String>, Vec<Vec<i64>>), EngineError> {
    let mut names = template.coefficients();
    let mut free_points: Vec<Vec<i64>> = Vec::new();
    for sample in basis_samples {
        for constraint in &sample.constraints {
            let relation = parse_relation(constraint)?;
            for side in [&relation.lhs, &relation.rhs] {
                side.replace_invariants(&mut |args| {
                    let point = integer_point(args)?;
                    if template.anchor_coefficient(&point).is_none() && !free_points.contains(&point) {
                        free_points.push(point);
                    }
                    Ok::<_, ExprError>(Expr::int(0))
                })?;
            }
        }
    }
    let offset = names.len();
    names.extend((0..free_points.len()).map(|i| coefficient_name(offset + i)));
    Ok((names, free_points))
}

/// Coefficient of `point`: its anchor name, or the free name numbered
/// after the anchors in order of first reference.
fn coefficient_for(template: &Template, free_points: &[Vec<i64>], point: &[i64]) -> Option<String> {
    template.anchor_coefficient(point).or_else(|| {
        free_points
            .iter()
            .position(|p| p.as_slice() == point)
            .map(|i| coefficient_name(template.len() + i))
    })
}

fn integer_point(args: &[Expr]) -> Result<Vec<i64>, ExprError> {
    args.iter()
        .map(|arg| {
            arg.constant_value()
                .filter(|v| v.is_integer())
                .and_then(|v| v.to_integer().to_i64())
                .ok_or_else(|| ExprError::NonIntegralArgument(arg.to_string()))
        })
        .collect()
}

/// `candidate` with its variables replaced by `args`.
fn compose(candidate: &Expr, variables: &[String], args: &[Expr]) -> Result<Expr, ExprError> {
    if args.len() != variables.len() {
        return Err(ExprError::Malformed(format!(
            "invariant applied to {} arguments, expected {}",
            args.len(),
            variables.len()
        )));
    }
    Ok(candidate.substitute(&|name| {
        variables
            .iter()
            .position(|v| v == name)
            .map(|i| args[i].clone())
    }))
}

fn normalize(
    normalizer: &Normalizer<'_>,
    relation: &Relation,
    budget: &mut Budget,
    evaluator: &mut dyn ArithmeticEvaluator,
) -> Result<String, EngineError> {
    let mut evaluate = |expr: &str| budget.invoke("arithmetic evaluator", |timeout| evaluator.evaluate(expr, timeout));
    Ok(normalizer.normalize_relation(relation, &mut evaluate)?)
}

fn solve(
    solver: &mut dyn ConstraintSolver,
    budget: &mut Budget,
    query: &SolverQuery,
) -> Result<SolveOutcome, EngineError> {
    Ok(budget.invoke("constraint solver", |timeout| solver.solve(query, timeout))?)
}

/// `q(v1, q(v2, ... body))`.
fn quantify(quantifier: &str, variables: &[String], body: &str) -> String {
    variables
        .iter()
        .rev()
        .fold(body.to_string(), |inner, v| format!("{quantifier}({v}, {inner})"))
}

fn domain_and_negation(domain: &str, rule: &str) -> String {
    format!("({domain}) and not ({rule})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantifiers_nest_first_variable_outermost() {
        let vars = vec!["x".to_string(), "n".to_string()];
        assert_eq!(quantify("all", &vars, "x>=n"), "all(x, all(n, x>=n))");
        assert_eq!(quantify("ex", &[], "true"), "true");
    }

    #[test]
    fn composition_substitutes_simultaneously() {
        let candidate = crate::expr::parse_expr("x*n+x").unwrap();
        let vars = vec!["x".to_string(), "n".to_string()];
        let args = vec![
            crate::expr::parse_expr("n").unwrap(),
            crate::expr::parse_expr("x+1").unwrap(),
        ];
        let composed = compose(&candidate, &vars, &args).unwrap();
        assert_eq!(composed.to_string(), "n*(x+1)+n");
        assert!(compose(&candidate, &vars, &args[..1]).is_err());
    }

    #[test]
    fn invariant_arguments_must_be_integers() {
        let args = vec![crate::expr::parse_expr("3-1").unwrap(), Expr::int(-4)];
        assert_eq!(integer_point(&args).unwrap(), vec![2, -4]);
        let fractional = vec![crate::expr::parse_expr("1/2").unwrap()];
        assert!(matches!(
            integer_point(&fractional),
            Err(ExprError::NonIntegralArgument(_))
        ));
        assert!(integer_point(&[Expr::var("x")]).is_err());
    }
}
