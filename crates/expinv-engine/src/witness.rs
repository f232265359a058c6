//! Reading counterexamples out of REDUCE transcripts.
//!
//! Two sources exist. Under `pasf`, `rlqea` answers with bindings such as
//! `{x = 1,y = g1,n = 0}` that either name a point or mention auxiliary
//! parameters `g1, g2, ...`. Otherwise the echoed `find_cex` formula is
//! recovered from its two-dimensional layout and handed to a solver.

use expinv_smt::backends::redlog_backend::assignment_value;
use num::traits::ToPrimitive;
use regex::Regex;

use crate::expr::{parse_expr, ExprError};
use crate::formula::{parse_redlog, Formula};

/// What a `pasf` answer contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasfWitness {
    /// A concrete point; variables the answer omits are zero.
    Point(Vec<i64>),
    /// The answer depends on auxiliary parameters. The next query conjoins
    /// this existential constraint.
    Relaxation(String),
}

/// Interpret the `cex := ...` answer of a `pasf` witness search.
pub fn pasf_witness<S: AsRef<str>>(transcript: &str, variables: &[S]) -> Option<PasfWitness> {
    let answer = assignment_value(transcript, "cex")?;
    let after_true = &answer[answer.find("true")?..];
    let open = after_true.find('{')?;
    let body = &after_true[open + 1..];
    let body = &body[..body.find('}').unwrap_or(body.len())];
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let auxiliaries = auxiliary_parameters(body);
    if !auxiliaries.is_empty() {
        let bindings = body.replace('!', "1=1").replace(',', " and ");
        return Some(PasfWitness::Relaxation(format!(
            "ex({{{}}}, {bindings})",
            auxiliaries.join(",")
        )));
    }

    let mut point = vec![0i64; variables.len()];
    for binding in body.split(',') {
        let (name, value) = binding.split_once('=')?;
        let Some(index) = variables.iter().position(|v| v.as_ref() == name.trim()) else {
            continue;
        };
        let value = parse_expr(value.trim()).ok()?.constant_value()?;
        if !value.is_integer() {
            return None;
        }
        point[index] = value.to_integer().to_i64()?;
    }
    Some(PasfWitness::Point(point))
}

/// Identifiers `g<digits>` in order of first appearance.
fn auxiliary_parameters(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"\bg\d+\b") else {
        return Vec::new();
    };
    let mut found: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        if !found.iter().any(|f| f == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}

/// Fold REDUCE's raised exponents back into the text.
///
/// A line of only digits and blanks carries the exponents of the line
/// below it; each digit run is inserted as `^k` at the same column.
pub fn reinsert_exponents<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut out: Vec<String> = lines.iter().map(|l| l.as_ref().to_string()).collect();
    for i in 0..out.len() {
        if !is_exponent_line(&out[i]) || i + 1 >= out.len() {
            continue;
        }
        let exponents = digit_runs(&out[i]);
        let mut target = out[i + 1].clone();
        let mut shift = 0;
        for (column, digits) in exponents {
            let at = (column + shift).min(target.len());
            let insertion = format!("^{digits}");
            target.insert_str(at, &insertion);
            shift += insertion.len();
        }
        out[i + 1] = target;
        out[i].clear();
    }
    out
}

fn is_exponent_line(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit()) && line.chars().all(|c| c.is_ascii_digit() || c == ' ')
}

fn digit_runs(line: &str) -> Vec<(usize, String)> {
    let mut runs = Vec::new();
    let mut current: Option<(usize, String)> = None;
    for (column, c) in line.char_indices() {
        if c.is_ascii_digit() {
            current.get_or_insert_with(|| (column, String::new())).1.push(c);
        } else if let Some(run) = current.take() {
            runs.push(run);
        }
    }
    runs.extend(current);
    runs
}

/// The `find_cex` formula as REDUCE echoed it, exponents restored and
/// leading quantifier prefixes removed.
pub fn echoed_formula(transcript: &str) -> Option<String> {
    let lines: Vec<&str> = transcript.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with("find_cex"))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim_start().starts_with("cex"))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());
    // The exponent line of the first row sits above the `find_cex` line.
    let first = if start > 0 && is_exponent_line(lines[start - 1]) {
        start - 1
    } else {
        start
    };
    let joined = reinsert_exponents(&lines[first..end]).join("");
    let body = joined.trim();
    let body = body.strip_prefix("find_cex").unwrap_or(body).trim_start();
    let body = body.strip_prefix(":=").unwrap_or(body);
    let mut body = body.trim().trim_end_matches(['$', ';']).trim();
    while let Some(rest) = strip_prefix_quantifier(body) {
        body = rest;
    }
    (!body.is_empty()).then(|| body.to_string())
}

/// `ex x rest` or `all x rest` in Redlog's prefix layout.
fn strip_prefix_quantifier(text: &str) -> Option<&str> {
    let rest = text
        .strip_prefix("ex ")
        .or_else(|| text.strip_prefix("all "))?
        .trim_start();
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    Some(rest[name_len..].trim_start())
}

/// Recover the `find_cex` formula from a transcript as a quantifier-free
/// formula over the program variables.
pub fn back_translate(transcript: &str) -> Result<Option<Formula>, ExprError> {
    match echoed_formula(transcript) {
        Some(text) => parse_redlog(&text).map(Some),
        None => Ok(None),
    }
}
