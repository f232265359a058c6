//! End-to-end synthesis: sample space, basis search, template and the
//! refinement loop, retried on timeouts.

use std::time::Instant;

use expinv_algebra::{enumerate_monomials, Monomial};
use expinv_smt::backends::redlog_backend::RedlogBackend;
use expinv_smt::process::ExternalCommand;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::budget::Budget;
use crate::cases::{find_case, BuiltinCase};
use crate::cegis::{guess_invariant, CegisInput, LoopOutcome};
use crate::config::{ExternalTools, SynthesisConfig};
use crate::error::EngineError;
use crate::formula::Formula;
use crate::oracle::{Expectations, RecurrenceOracle};
use crate::report::{millis, Counters, StageTimings, SynthesisReport, Verdict};
use crate::sample::{build_sample_space, Sample};
use crate::sampler::{BasisSearch, BasisSelection};
use crate::services::{
    ArithmeticEvaluator, CommandEvaluator, LinearAlgebraOracle, NativeEvaluator,
    NativeLinearAlgebra, ScriptLinearAlgebra, Services, SmtConstraintSolver,
};
use crate::template::Template;

/// Owned process-backed collaborators built from [`ExternalTools`].
pub struct ExternalServices {
    solver: SmtConstraintSolver,
    eliminator: RedlogBackend,
    linear_algebra: Box<dyn LinearAlgebraOracle>,
    evaluator: Box<dyn ArithmeticEvaluator>,
}

impl ExternalServices {
    pub fn from_tools(tools: &ExternalTools) -> Result<Self, EngineError> {
        let solver = match &tools.solver_command {
            Some(line) => SmtConstraintSolver::with_command(tools.solver, command(line, "solver")?),
            None => SmtConstraintSolver::new(tools.solver),
        };
        let eliminator = RedlogBackend::with_command(command(&tools.reduce_command, "reduce")?);
        let linear_algebra: Box<dyn LinearAlgebraOracle> = match &tools.linalg_command {
            Some(line) => Box::new(ScriptLinearAlgebra::new(command(line, "linear algebra")?)),
            None => Box::new(NativeLinearAlgebra),
        };
        let evaluator: Box<dyn ArithmeticEvaluator> = match &tools.evaluator_command {
            Some(line) => Box::new(CommandEvaluator::new(command(line, "evaluator")?)),
            None => Box::new(NativeEvaluator),
        };
        Ok(Self {
            solver,
            eliminator,
            linear_algebra,
            evaluator,
        })
    }

    pub fn services(&mut self) -> Services<'_> {
        Services {
            solver: &mut self.solver,
            eliminator: &mut self.eliminator,
            linear_algebra: self.linear_algebra.as_mut(),
            evaluator: self.evaluator.as_mut(),
        }
    }
}

fn command(line: &str, what: &str) -> Result<ExternalCommand, EngineError> {
    ExternalCommand::parse(line)
        .ok_or_else(|| EngineError::InvalidConfiguration(format!("empty {what} command")))
}

/// Validate `config`, start the configured external programs and run.
pub fn run_synthesis(config: &SynthesisConfig, tools: &ExternalTools) -> Result<SynthesisReport, EngineError> {
    config.validate()?;
    let mut external = ExternalServices::from_tools(tools)?;
    synthesize(config, &mut external.services())
}

/// Run a synthesis with caller-supplied collaborators.
pub fn synthesize(config: &SynthesisConfig, services: &mut Services<'_>) -> Result<SynthesisReport, EngineError> {
    let started = Instant::now();
    config.validate()?;
    let case = find_case(&config.case)
        .ok_or_else(|| EngineError::InvalidConfiguration(format!("unknown case `{}`", config.case)))?;
    if let Some(vars) = &config.variables {
        if vars.iter().map(String::as_str).ne(case.variables.iter().copied()) {
            return Err(EngineError::InvalidConfiguration(format!(
                "case `{}` ranges over {}, not {}",
                case.name,
                case.variables.join(","),
                vars.join(",")
            )));
        }
    }
    let variables: Vec<String> = case.variables.iter().map(|v| v.to_string()).collect();
    let expectations = Expectations::new(&config.pre, &config.post, case.variables)?;
    let monomials = enumerate_monomials(variables.len(), config.degree);
    info!(
        case = case.name,
        degree = config.degree,
        monomials = monomials.len(),
        "synthesis started"
    );

    let mut timings = StageTimings::default();
    let sampling = Instant::now();
    let samples = build_sample_space(
        case,
        &expectations,
        (config.lower_bound, config.upper_bound),
        monomials.len(),
        config.ranking,
    )?;
    timings.sample_space_ms = millis(sampling.elapsed());

    let rule = case.rule(&config.pre, &config.post);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut counters = Counters::default();
    let run = Run {
        config,
        case,
        rule: &rule,
        monomials: &monomials,
        variables: &variables,
        samples: &samples,
    };

    let attempt = loop {
        counters.attempts += 1;
        match run.attempt(&mut rng, services) {
            Ok(attempt) => break attempt,
            Err(err) if err.is_retryable() && counters.attempts < config.attempts => {
                if let EngineError::BasisSearchTimeout { probes } = &err {
                    counters.basis_probes += probes;
                }
                warn!(attempt = counters.attempts, error = %err, "attempt abandoned, retrying");
            }
            Err(err) => return Err(err),
        }
    };

    let Attempt {
        selection,
        template,
        basis_samples,
        outcome,
        basis_ms,
    } = attempt;
    counters.basis_probes += selection.probes;
    counters.rounds = outcome.rounds;
    counters.learned_constraints = outcome.state.learned.len();
    counters.counterexamples = outcome.state.counterexamples.len();
    timings.basis_search_ms = basis_ms;
    timings.absorb(&outcome.timings);
    timings.total_ms = millis(started.elapsed());

    let rendered = outcome.candidate.as_ref().map(|p| p.render(&variables));
    let (invariant, candidate) = match outcome.verdict {
        Verdict::Proved => (rendered, None),
        _ => (None, rendered),
    };
    info!(verdict = %outcome.verdict, rounds = outcome.rounds, "synthesis finished");
    Ok(SynthesisReport {
        config: config.summary(),
        variables,
        rule: rule.to_string(),
        verdict: outcome.verdict,
        basis_points: basis_samples.iter().map(Sample::summary).collect(),
        template: Some(template.render()),
        coefficients: outcome.guess.unwrap_or_default(),
        invariant,
        candidate,
        counterexamples: outcome.state.counterexamples,
        timings,
        counters,
    })
}

/// Inputs shared by every attempt.
struct Run<'a> {
    config: &'a SynthesisConfig,
    case: &'static BuiltinCase,
    rule: &'a Formula,
    monomials: &'a [Monomial],
    variables: &'a [String],
    samples: &'a [Sample],
}

struct Attempt {
    selection: BasisSelection,
    template: Template,
    basis_samples: Vec<Sample>,
    outcome: LoopOutcome,
    basis_ms: u64,
}

impl Run<'_> {
    /// One basis search and refinement loop under a fresh budget.
    fn attempt(&self, rng: &mut StdRng, services: &mut Services<'_>) -> Result<Attempt, EngineError> {
        let config = self.config;
        let mut budget = Budget::from_timeout_secs(config.timeout_secs);
        let search = BasisSearch {
            degree: config.degree,
            monomials: self.monomials,
            skewness: config.skewness,
            max_probes: config.max_basis_probes,
        };
        let searching = Instant::now();
        let selection = search.run(self.samples, rng, &mut *services.linear_algebra, &mut budget)?;
        let basis_ms = millis(searching.elapsed());

        let template = Template::new(
            &selection.basis,
            self.monomials,
            selection.points.clone(),
            self.variables,
        )?;
        info!(template = %template.render(), "template built");
        let basis_samples: Vec<Sample> = selection
            .indices
            .iter()
            .map(|&i| self.samples[i].clone())
            .collect();

        let oracle: &dyn RecurrenceOracle = self.case;
        let input = CegisInput {
            oracle,
            rule: self.rule,
            template: &template,
            basis_samples: &basis_samples,
            bounds: (config.lower_bound, config.upper_bound),
            theory: config.theory,
            max_rounds: config.max_rounds,
        };
        let outcome = guess_invariant(&input, self.samples.to_vec(), services, budget)?;
        Ok(Attempt {
            selection,
            template,
            basis_samples,
            outcome,
            basis_ms,
        })
    }
}
