//! Quantifier elimination through REDUCE/Redlog.
//!
//! Each call runs one REDUCE process on a short script of named
//! assignments and reads the printed values back from its transcript.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::process::{ExternalCommand, ProcessError};

#[derive(Debug, Error)]
pub enum RedlogError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("REDUCE reported an error: {0}")]
    Reduce(String),
    #[error("REDUCE transcript has no value for `{name}`")]
    MissingResult { name: String },
}

/// Redlog domain context selected with `rlset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theory {
    /// Ordered fields (real closed fields).
    #[default]
    Ofsf,
    /// Presburger arithmetic.
    Pasf,
}

impl Theory {
    pub fn as_str(self) -> &'static str {
        match self {
            Theory::Ofsf => "ofsf",
            Theory::Pasf => "pasf",
        }
    }
}

impl fmt::Display for Theory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ofsf" => Ok(Theory::Ofsf),
            "pasf" => Ok(Theory::Pasf),
            other => Err(format!("unknown theory `{other}` (expected ofsf or pasf)")),
        }
    }
}

/// Outcome of deciding a closed formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QeVerdict {
    Valid,
    /// Not provably true; `residual` is the simplified result.
    Invalid { residual: String },
}

/// A REDUCE executable with Redlog available.
#[derive(Debug, Clone)]
pub struct RedlogBackend {
    command: ExternalCommand,
}

impl Default for RedlogBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RedlogBackend {
    pub fn new() -> Self {
        Self::with_command(ExternalCommand::new("reduce"))
    }

    pub fn with_command(command: ExternalCommand) -> Self {
        Self { command }
    }

    /// Render a Redlog script assigning each `(name, expression)` in turn.
    pub fn script(theory: Theory, assignments: &[(&str, &str)]) -> String {
        let mut out = String::from("load_package redlog;\n");
        out.push_str(&format!("rlset {theory};\n"));
        for (name, expr) in assignments {
            out.push_str(&format!("{name} := {expr};\n"));
        }
        out.push_str("bye;\n");
        out
    }

    /// Run a script and return the raw transcript.
    pub fn run(
        &self,
        theory: Theory,
        assignments: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<String, RedlogError> {
        let script = Self::script(theory, assignments);
        let output = self.command.run(&script, timeout)?;
        if let Some(line) = output
            .stdout
            .lines()
            .find(|l| l.trim_start().starts_with("*****"))
        {
            return Err(RedlogError::Reduce(line.trim().to_string()));
        }
        Ok(output.stdout)
    }

    /// Decide a closed formula with `rlsimpl rlqe`.
    pub fn decide(
        &self,
        theory: Theory,
        formula: &str,
        timeout: Option<Duration>,
    ) -> Result<QeVerdict, RedlogError> {
        let transcript = self.run(
            theory,
            &[("invariant", formula), ("feasible", "rlsimpl rlqe invariant")],
            timeout,
        )?;
        let value = assignment_value(&transcript, "feasible").ok_or_else(|| {
            RedlogError::MissingResult {
                name: "feasible".to_string(),
            }
        })?;
        debug!(%theory, result = %value, "quantifier elimination finished");
        if value == "true" {
            Ok(QeVerdict::Valid)
        } else {
            Ok(QeVerdict::Invalid { residual: value })
        }
    }

    /// Run `rlqea` on an existential formula and return the transcript,
    /// which holds both the echoed `find_cex` formula and the `cex` answer.
    pub fn counterexample(
        &self,
        theory: Theory,
        formula: &str,
        timeout: Option<Duration>,
    ) -> Result<String, RedlogError> {
        self.run(
            theory,
            &[("find_cex", formula), ("cex", "rlqea find_cex")],
            timeout,
        )
    }
}

/// Value printed for `name := ...` in a REDUCE transcript, with
/// continuation lines joined and the trailing terminator removed.
pub fn assignment_value(transcript: &str, name: &str) -> Option<String> {
    let marker = format!("{name} :=");
    let mut lines = transcript.lines();
    let first = lines.find(|l| l.trim_start().starts_with(&marker))?;
    let mut value = first.trim_start()[marker.len()..].trim().to_string();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_assignment_line(trimmed) {
            break;
        }
        value.push(' ');
        value.push_str(trimmed);
    }
    Some(
        value
            .trim_end_matches(['$', ';'])
            .trim()
            .to_string(),
    )
}

fn is_assignment_line(line: &str) -> bool {
    line.split_once(":=")
        .map(|(lhs, _)| {
            let lhs = lhs.trim();
            !lhs.is_empty() && lhs.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .unwrap_or(false)
}
