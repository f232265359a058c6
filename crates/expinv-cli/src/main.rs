#![doc = include_str!("../README.md")]

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "expinv")]
#[command(about = "Synthesize polynomial expectation invariants for probabilistic loops")]
#[command(version)]
struct Cli {
    /// More log output on stderr (repeat for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors on stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the synthesis loop on a built-in case
    Synth(commands::synth::SynthArgs),

    /// List the built-in cases
    Cases {
        /// Pre-expectation used when printing each rule
        #[arg(long, default_value = "x*(y-x)")]
        pre: String,

        /// Post-expectation used when printing each rule
        #[arg(long, default_value = "n")]
        post: String,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn log_level(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose, cli.quiet))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Synth(args) => {
            let code = commands::synth::run_synth_command(args)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Cases { pre, post, format } => {
            commands::cases::run_cases_command(&pre, &post, commands::parse_output_format(&format)?)?;
        }
    }
    Ok(())
}
