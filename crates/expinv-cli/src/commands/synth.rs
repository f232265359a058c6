// Command handler for: Synth

use clap::Args;
use miette::IntoDiagnostic;
use tracing::info;

use expinv_engine::config::{ExternalTools, SynthesisConfig};
use expinv_engine::pipeline::run_synthesis;
use expinv_engine::report::SynthesisReport;

use super::{parse_flag, parse_output_format};
use crate::OutputFormat;

#[derive(Debug, Args)]
pub(crate) struct SynthArgs {
    /// Built-in case (see `expinv cases`)
    #[arg(long, default_value = "random-walk-v2")]
    pub(crate) case: String,

    /// Pre-expectation over the case variables
    #[arg(long, default_value = "x*(y-x)")]
    pub(crate) pre: String,

    /// Post-expectation over the case variables
    #[arg(long, default_value = "n")]
    pub(crate) post: String,

    /// Comma-separated variable names; must match the case
    #[arg(long, value_delimiter = ',')]
    pub(crate) vars: Option<Vec<String>>,

    /// Degree of the invariant template
    #[arg(long, default_value_t = 2)]
    pub(crate) degree: u32,

    /// Lower end of the sampling box
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub(crate) lower: i64,

    /// Upper end of the sampling box
    #[arg(long, default_value_t = 3, allow_hyphen_values = true)]
    pub(crate) upper: i64,

    /// Bias of the basis search towards tight samples, in [0, 1)
    #[arg(long, default_value_t = 0.65)]
    pub(crate) skewness: f64,

    /// Redlog theory: ofsf or pasf
    #[arg(long, default_value = "ofsf")]
    pub(crate) theory: String,

    /// Sample ranking: tightest-first or unbounded-first
    #[arg(long, default_value = "tightest-first")]
    pub(crate) ranking: String,

    /// Refinement rounds per attempt
    #[arg(long, default_value_t = 100)]
    pub(crate) max_rounds: usize,

    /// Basis draws per attempt
    #[arg(long, default_value_t = 500)]
    pub(crate) max_basis_probes: usize,

    /// Wall-clock budget per attempt in seconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub(crate) timeout: u64,

    /// Attempts allowed after a timeout
    #[arg(long, default_value_t = 1)]
    pub(crate) repeat: usize,

    /// Seed of the basis sampler
    #[arg(long, default_value_t = 0)]
    pub(crate) seed: u64,

    /// SMT solver: z3 or cvc5
    #[arg(long, default_value = "z3")]
    pub(crate) solver: String,

    /// Command line overriding the solver program
    #[arg(long)]
    pub(crate) solver_cmd: Option<String>,

    /// REDUCE command line
    #[arg(long, default_value = "reduce")]
    pub(crate) reduce_cmd: String,

    /// Linear-algebra script (exact in-process elimination when absent)
    #[arg(long)]
    pub(crate) linalg_cmd: Option<String>,

    /// Arithmetic evaluator command (exact in-process evaluation when absent)
    #[arg(long)]
    pub(crate) evaluator_cmd: Option<String>,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub(crate) format: String,
}

impl SynthArgs {
    pub(crate) fn to_config(&self) -> miette::Result<SynthesisConfig> {
        Ok(SynthesisConfig {
            case: self.case.clone(),
            pre: self.pre.clone(),
            post: self.post.clone(),
            variables: self.vars.clone(),
            degree: self.degree,
            lower_bound: self.lower,
            upper_bound: self.upper,
            skewness: self.skewness,
            theory: parse_flag("theory", &self.theory)?,
            ranking: parse_flag("ranking", &self.ranking)?,
            max_rounds: self.max_rounds,
            max_basis_probes: self.max_basis_probes,
            timeout_secs: self.timeout,
            attempts: self.repeat,
            seed: self.seed,
        })
    }

    pub(crate) fn to_tools(&self) -> miette::Result<ExternalTools> {
        Ok(ExternalTools {
            solver: parse_flag("solver", &self.solver)?,
            solver_command: self.solver_cmd.clone(),
            reduce_command: self.reduce_cmd.clone(),
            linalg_command: self.linalg_cmd.clone(),
            evaluator_command: self.evaluator_cmd.clone(),
        })
    }
}

pub(crate) fn render_report(report: &SynthesisReport, format: OutputFormat) -> miette::Result<String> {
    match format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(report).into_diagnostic(),
    }
}

/// Run one synthesis and print its report. Returns the exit status.
pub(crate) fn run_synth_command(args: SynthArgs) -> miette::Result<i32> {
    let format = parse_output_format(&args.format)?;
    let config = args.to_config()?;
    let tools = args.to_tools()?;
    info!(case = %config.case, solver = %tools.solver, theory = %config.theory, "expinv synth");

    let report = run_synthesis(&config, &tools)?;
    println!("{}", render_report(&report, format)?);
    Ok(report.exit_code())
}
