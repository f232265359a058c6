//! The recurrence oracle: what one analysed program contributes.
//!
//! An oracle names the program variables, states the Redlog domain,
//! optionally restricts which points are ground-checked, bounds the
//! invariant at each point of the box and builds the inference rule that
//! a certified invariant must satisfy.

use num::bigint::BigInt;
use num::rational::BigRational;

use crate::expr::{parse_expr, Expr, ExprError};
use crate::formula::Formula;

/// Pre- and post-expectation, parsed once and evaluated exactly.
#[derive(Debug, Clone)]
pub struct Expectations {
    pre_text: String,
    post_text: String,
    pre: Expr,
    post: Expr,
    variables: Vec<String>,
}

impl Expectations {
    /// Parse both expectations; every variable they mention must be one of
    /// `variables`.
    pub fn new<S: AsRef<str>>(pre: &str, post: &str, variables: &[S]) -> Result<Self, ExprError> {
        let variables: Vec<String> = variables.iter().map(|v| v.as_ref().to_string()).collect();
        let parsed_pre = parse_expr(pre)?;
        let parsed_post = parse_expr(post)?;
        for expr in [&parsed_pre, &parsed_post] {
            if expr.contains_invariant() {
                return Err(ExprError::UnexpectedInvariant(expr.to_string()));
            }
            if let Some(unknown) = expr.variables().into_iter().find(|v| !variables.contains(v)) {
                return Err(ExprError::Unbound(unknown));
            }
        }
        Ok(Self {
            pre_text: pre.trim().to_string(),
            post_text: post.trim().to_string(),
            pre: parsed_pre,
            post: parsed_post,
            variables,
        })
    }

    pub fn pre(&self) -> &str {
        &self.pre_text
    }

    pub fn post(&self) -> &str {
        &self.post_text
    }

    pub fn pre_at(&self, point: &[i64]) -> Result<BigRational, ExprError> {
        self.eval_at(&self.pre, point)
    }

    pub fn post_at(&self, point: &[i64]) -> Result<BigRational, ExprError> {
        self.eval_at(&self.post, point)
    }

    fn eval_at(&self, expr: &Expr, point: &[i64]) -> Result<BigRational, ExprError> {
        expr.eval(&|name| {
            let index = self.variables.iter().position(|v| v == name)?;
            point
                .get(index)
                .map(|v| BigRational::from_integer(BigInt::from(*v)))
        })
    }
}

/// Bounds on the invariant at one point plus the constraints the
/// recurrence imposes there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCheck {
    pub lower: Option<BigRational>,
    pub upper: Option<BigRational>,
    pub constraints: Vec<String>,
}

impl PointCheck {
    pub fn new(lower: Option<BigRational>) -> Self {
        Self {
            lower,
            upper: None,
            constraints: Vec::new(),
        }
    }

    pub fn push(&mut self, constraint: impl Into<String>) {
        self.constraints.push(constraint.into());
    }

    /// `None` when the bounds contradict each other.
    pub fn finish(self) -> Option<Self> {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) if lower > upper => None,
            _ => Some(self),
        }
    }
}

/// Render a value the way constraint strings spell it: `n` or `(n/d)`.
pub fn render_value(value: &BigRational) -> String {
    if value.is_integer() {
        value.numer().to_string()
    } else {
        format!("({}/{})", value.numer(), value.denom())
    }
}

/// The invariant application `I[p1,...,pk]` at a point.
pub fn invariant_at(point: &[i64]) -> String {
    let args: Vec<String> = point.iter().map(i64::to_string).collect();
    format!("I[{}]", args.join(","))
}

/// One analysed probabilistic loop.
pub trait RecurrenceOracle {
    fn name(&self) -> &str;

    fn variables(&self) -> &[&'static str];

    /// Redlog predicate over the variables.
    fn domain(&self) -> &str;

    /// Whether only some box points are ground-checked.
    fn has_filter(&self) -> bool {
        false
    }

    /// Whether a box point passes the ground-check filter.
    fn admits(&self, _point: &[i64]) -> bool {
        true
    }

    /// Bounds and recurrence constraints at `point`, `None` when the point
    /// is infeasible.
    fn check(&self, point: &[i64], expectations: &Expectations) -> Result<Option<PointCheck>, ExprError>;

    /// The inference rule over invariant applications `I[...]` for the
    /// given pre- and post-expectation texts.
    fn rule(&self, pre: &str, post: &str) -> Formula;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> BigRational {
        BigRational::new(n.into(), d.into())
    }

    #[test]
    fn expectations_evaluate_exactly() {
        let e = Expectations::new("x*(y-x)", "n/2", &["x", "y", "n"]).unwrap();
        assert_eq!(e.pre_at(&[1, 3, 0]).unwrap(), q(2, 1));
        assert_eq!(e.post_at(&[0, 0, 3]).unwrap(), q(3, 2));
        assert_eq!(e.pre(), "x*(y-x)");
    }

    #[test]
    fn expectations_reject_foreign_names() {
        assert!(matches!(
            Expectations::new("z", "n", &["x", "n"]),
            Err(ExprError::Unbound(name)) if name == "z"
        ));
        assert!(Expectations::new("I[x]", "n", &["x"]).is_err());
    }

    #[test]
    fn contradicting_bounds_are_infeasible() {
        let mut check = PointCheck::new(Some(q(3, 1)));
        check.upper = Some(q(2, 1));
        assert!(check.finish().is_none());

        let mut check = PointCheck::new(Some(q(1, 1)));
        check.upper = Some(q(1, 1));
        assert!(check.finish().is_some());
        assert!(PointCheck::new(None).finish().is_some());
    }

    #[test]
    fn values_and_applications_render_compactly() {
        assert_eq!(render_value(&q(-3, 1)), "-3");
        assert_eq!(render_value(&q(-1, 2)), "(-1/2)");
        assert_eq!(invariant_at(&[1, -2, 0]), "I[1,-2,0]");
    }
}
