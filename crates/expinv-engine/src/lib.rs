#![doc = include_str!("../README.md")]
#![allow(clippy::result_large_err)]

pub mod budget;
pub mod cases;
pub mod cegis;
pub mod config;
pub mod error;
pub mod expr;
pub mod formula;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod report;
pub mod sample;
pub mod sampler;
pub mod services;
pub mod template;
pub mod translate;
pub mod witness;

pub use config::{ExternalTools, SynthesisConfig};
pub use error::EngineError;
pub use pipeline::{run_synthesis, synthesize};
pub use report::{SynthesisReport, Verdict};
