//! z3 / cvc5 driven through one SMT-LIB script per satisfiability query.
//!
//! Declarations and assertions are buffered; `check_sat` sends the whole
//! script to a fresh solver process and reads back `sat`/`unsat` plus the
//! requested `get-value` block.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::backends::smtlib_printer::{quote_symbol, sort_to_smtlib, to_smtlib};
use crate::process::{ExternalCommand, ProcessError};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum SolverBackendError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("{solver} error: {message}")]
    Solver { solver: String, message: String },
    #[error("Failed to parse {solver} output: {output}")]
    Parse { solver: String, output: String },
}

/// Supported SMT solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    Z3,
    Cvc5,
}

impl SolverKind {
    pub fn default_program(self) -> &'static str {
        match self {
            SolverKind::Z3 => "z3",
            SolverKind::Cvc5 => "cvc5",
        }
    }

    /// Arguments for reading a script from stdin, with an optional
    /// solver-side time limit a tenth inside our own deadline.
    fn arguments(self, timeout: Option<Duration>) -> Vec<String> {
        let mut args: Vec<String> = match self {
            SolverKind::Z3 => vec!["-in".into(), "-smt2".into()],
            SolverKind::Cvc5 => vec![
                "--lang".into(),
                "smt2".into(),
                "--produce-models".into(),
            ],
        };
        if let Some(limit) = timeout {
            let ms = limit.as_millis();
            let ms = (ms - ms / 10).max(1);
            match self {
                SolverKind::Z3 => args.push(format!("-t:{ms}")),
                SolverKind::Cvc5 => args.push(format!("--tlimit={ms}")),
            }
        }
        args
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_program())
    }
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "z3" => Ok(SolverKind::Z3),
            "cvc5" => Ok(SolverKind::Cvc5),
            other => Err(format!("unknown solver `{other}` (expected z3 or cvc5)")),
        }
    }
}

/// A buffered SMT-LIB session executed by a fresh process per check.
pub struct ProcessSolver {
    kind: SolverKind,
    command: ExternalCommand,
    logic: String,
    timeout: Option<Duration>,
    script: Vec<String>,
    vars: HashMap<String, SmtSort>,
}

impl ProcessSolver {
    pub fn new(kind: SolverKind) -> Self {
        Self::with_command(kind, ExternalCommand::new(kind.default_program()))
    }

    /// Use a custom executable (a path, or a wrapper with extra flags).
    pub fn with_command(kind: SolverKind, command: ExternalCommand) -> Self {
        Self {
            kind,
            command,
            logic: "QF_LIA".to_string(),
            timeout: None,
            script: Vec::new(),
            vars: HashMap::new(),
        }
    }

    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = logic.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full script for the buffered session followed by `tail`.
    pub fn script_with(&self, tail: &[String]) -> String {
        let mut out = String::new();
        out.push_str("(set-option :produce-models true)\n");
        out.push_str(&format!("(set-logic {})\n", self.logic));
        for line in self.script.iter().chain(tail) {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("(exit)\n");
        out
    }

    fn execute(&self, tail: &[String]) -> Result<String, SolverBackendError> {
        let script = self.script_with(tail);
        let command = self.command.clone().args(self.kind.arguments(self.timeout));
        let output = command.run(&script, self.timeout)?;
        if output.stdout.trim().is_empty() && !output.success() {
            return Err(SolverBackendError::Solver {
                solver: self.kind.to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn parse_sat_line(&self, line: &str) -> Result<SatResult, SolverBackendError> {
        match line.trim() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown(format!("{} returned unknown", self.kind))),
            "timeout" => Ok(SatResult::Unknown(format!("{} timed out", self.kind))),
            other if other.starts_with("(error") => Err(SolverBackendError::Solver {
                solver: self.kind.to_string(),
                message: other.to_string(),
            }),
            other => Err(SolverBackendError::Parse {
                solver: self.kind.to_string(),
                output: other.to_string(),
            }),
        }
    }
}

impl SmtSolver for ProcessSolver {
    type Error = SolverBackendError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), SolverBackendError> {
        if self.vars.insert(name.to_string(), sort.clone()).is_none() {
            self.script.push(format!(
                "(declare-const {} {})",
                quote_symbol(name),
                sort_to_smtlib(sort)
            ));
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), SolverBackendError> {
        self.script.push(format!("(assert {})", to_smtlib(term)));
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, SolverBackendError> {
        let stdout = self.execute(&["(check-sat)".to_string()])?;
        let first = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        self.parse_sat_line(first)
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), SolverBackendError> {
        let mut tail = vec!["(check-sat)".to_string()];
        if !var_names.is_empty() {
            let names: Vec<String> = var_names.iter().map(|(n, _)| quote_symbol(n)).collect();
            tail.push(format!("(get-value ({}))", names.join(" ")));
        }
        let stdout = self.execute(&tail)?;
        let mut lines = stdout.lines().skip_while(|l| l.trim().is_empty());
        let first = lines.next().unwrap_or("");
        let result = self.parse_sat_line(first)?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        if var_names.is_empty() {
            return Ok((result, Some(Model::default())));
        }
        let rest: Vec<&str> = lines.collect();
        let values = parse_value_block(&rest.join("\n"), var_names).ok_or_else(|| {
            SolverBackendError::Parse {
                solver: self.kind.to_string(),
                output: stdout.clone(),
            }
        })?;
        debug!(solver = %self.kind, values = values.len(), "model extracted");
        Ok((result, Some(Model { values })))
    }
}

/// S-expression as printed by `get-value`.
#[derive(Debug, Clone, PartialEq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn parse_sexp(text: &str) -> Option<Sexp> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut quoted = false;
    for ch in text.chars() {
        match ch {
            '|' => {
                quoted = !quoted;
                if !quoted {
                    tokens.push(std::mem::take(&mut buf));
                }
            }
            _ if quoted => buf.push(ch),
            '(' | ')' => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
            }
            c => buf.push(c),
        }
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }
    let mut pos = 0;
    let sexp = read_sexp(&tokens, &mut pos)?;
    (pos == tokens.len()).then_some(sexp)
}

fn read_sexp(tokens: &[String], pos: &mut usize) -> Option<Sexp> {
    let token = tokens.get(*pos)?;
    *pos += 1;
    match token.as_str() {
        "(" => {
            let mut items = Vec::new();
            loop {
                if tokens.get(*pos)?.as_str() == ")" {
                    *pos += 1;
                    return Some(Sexp::List(items));
                }
                items.push(read_sexp(tokens, pos)?);
            }
        }
        ")" => None,
        atom => Some(Sexp::Atom(atom.to_string())),
    }
}

fn sexp_value(value: &Sexp, sort: &SmtSort) -> Option<ModelValue> {
    match (sort, value) {
        (SmtSort::Int, Sexp::Atom(n)) => n.parse::<i64>().ok().map(ModelValue::Int),
        (SmtSort::Int, Sexp::List(items)) => match items.as_slice() {
            [Sexp::Atom(op), inner] if op == "-" => match sexp_value(inner, sort)? {
                ModelValue::Int(n) => Some(ModelValue::Int(-n)),
                ModelValue::Bool(_) => None,
            },
            _ => None,
        },
        (SmtSort::Bool, Sexp::Atom(b)) => match b.as_str() {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
        (SmtSort::Bool, Sexp::List(_)) => None,
    }
}

/// Parse `((x 1) (y (- 2)))` for the requested variables.
fn parse_value_block(
    text: &str,
    var_names: &[(&str, &SmtSort)],
) -> Option<HashMap<String, ModelValue>> {
    let Sexp::List(pairs) = parse_sexp(text)? else {
        return None;
    };
    let sorts: HashMap<&str, &SmtSort> = var_names.iter().copied().collect();
    let mut values = HashMap::new();
    for pair in pairs {
        let Sexp::List(items) = pair else {
            return None;
        };
        let [Sexp::Atom(name), value] = items.as_slice() else {
            return None;
        };
        let sort = sorts.get(name.as_str())?;
        values.insert(name.clone(), sexp_value(value, sort)?);
    }
    Some(values)
}
