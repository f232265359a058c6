//! Lowering of expressions, relations and formulas to SMT terms.
//!
//! Closed subterms are folded to literals on the way, so an atom such as
//! `0<1` becomes `true` and a conjunction of literals becomes a literal.

use expinv_smt::terms::SmtTerm;
use num::traits::ToPrimitive;
use num::BigRational;

use crate::expr::{parse_relation, Expr, ExprError, RelOp, Relation};
use crate::formula::Formula;

fn literal(value: &BigRational, context: &Expr) -> Result<SmtTerm, ExprError> {
    if !value.is_integer() {
        return Err(ExprError::Unsupported(format!(
            "fractional value in integer query: `{context}`"
        )));
    }
    value
        .to_integer()
        .to_i64()
        .map(SmtTerm::IntLit)
        .ok_or_else(|| ExprError::Unsupported(format!("integer literal out of range: `{context}`")))
}

/// Lower an arithmetic expression to an integer SMT term.
pub fn expr_to_smt(expr: &Expr) -> Result<SmtTerm, ExprError> {
    if expr.is_ground() {
        let value = expr
            .constant_value()
            .ok_or_else(|| ExprError::DivisionByZero(expr.to_string()))?;
        return literal(&value, expr);
    }
    match expr {
        Expr::Num(value) => literal(value, expr),
        Expr::Var(name) => Ok(SmtTerm::var(name.clone())),
        Expr::Invariant(_) => Err(ExprError::UnexpectedInvariant(expr.to_string())),
        Expr::Neg(a) => Ok(expr_to_smt(a)?.neg()),
        Expr::Add(a, b) => Ok(expr_to_smt(a)?.add(expr_to_smt(b)?)),
        Expr::Sub(a, b) => Ok(expr_to_smt(a)?.sub(expr_to_smt(b)?)),
        Expr::Mul(a, b) => Ok(expr_to_smt(a)?.mul(expr_to_smt(b)?)),
        Expr::Div(..) => Err(ExprError::Unsupported(format!(
            "symbolic division in integer query: `{expr}`"
        ))),
        Expr::Pow(base, exponent) => {
            if *exponent == 0 {
                return Ok(SmtTerm::int(1));
            }
            let base = expr_to_smt(base)?;
            Ok((1..*exponent).fold(base.clone(), |acc, _| acc.mul(base.clone())))
        }
    }
}

pub fn relation_to_smt(relation: &Relation) -> Result<SmtTerm, ExprError> {
    if let Some(truth) = relation.ground_truth() {
        return Ok(SmtTerm::bool(truth));
    }
    let lhs = expr_to_smt(&relation.lhs)?;
    let rhs = expr_to_smt(&relation.rhs)?;
    Ok(match relation.op {
        RelOp::Le => lhs.le(rhs),
        RelOp::Ge => lhs.ge(rhs),
        RelOp::Lt => lhs.lt(rhs),
        RelOp::Gt => lhs.gt(rhs),
        RelOp::Eq => lhs.eq(rhs),
        RelOp::Ne => lhs.ne(rhs),
    })
}

/// Lower a formula whose atoms are relation strings.
pub fn formula_to_smt(formula: &Formula) -> Result<SmtTerm, ExprError> {
    match formula {
        Formula::Atom(text) => relation_to_smt(&parse_relation(text)?),
        Formula::Bool(b) => Ok(SmtTerm::bool(*b)),
        Formula::Not(inner) => {
            let inner = formula_to_smt(inner)?;
            Ok(match inner.as_bool_lit() {
                Some(b) => SmtTerm::bool(!b),
                None => inner.not(),
            })
        }
        Formula::And(children) => {
            let terms = lower_all(children)?;
            Ok(fold_literals(terms, true).unwrap_or_else(SmtTerm::and))
        }
        Formula::Or(children) => {
            let terms = lower_all(children)?;
            Ok(fold_literals(terms, false).unwrap_or_else(SmtTerm::or))
        }
        Formula::Implies(a, b) => {
            let premise = formula_to_smt(a)?;
            let conclusion = formula_to_smt(b)?;
            Ok(match (premise.as_bool_lit(), conclusion.as_bool_lit()) {
                (Some(p), Some(c)) => SmtTerm::bool(!p || c),
                _ => premise.implies(conclusion),
            })
        }
    }
}

fn lower_all(children: &[Formula]) -> Result<Vec<SmtTerm>, ExprError> {
    children.iter().map(formula_to_smt).collect()
}

/// Evaluate a junction whose operands are all literals; `conjunctive`
/// selects `and` over `or`. Symbolic operands are handed back untouched.
fn fold_literals(terms: Vec<SmtTerm>, conjunctive: bool) -> Result<SmtTerm, Vec<SmtTerm>> {
    let values: Option<Vec<bool>> = terms.iter().map(SmtTerm::as_bool_lit).collect();
    match values {
        Some(values) if conjunctive => Ok(SmtTerm::bool(values.iter().all(|v| *v))),
        Some(values) => Ok(SmtTerm::bool(values.iter().any(|v| *v))),
        None => Err(terms),
    }
}
