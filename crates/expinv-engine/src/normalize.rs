//! Denominator elimination for relations over coefficient unknowns.
//!
//! Both sides of a relation are read as `sum_k I_k_ * c_k + s`, where the
//! `c_k` and `s` are rationals (ground mode) or rational polynomials over
//! the program variables (symbolic mode). Multiplying through by the lcm
//! of every denominator keeps solver and Redlog input integral.

use expinv_algebra::{lcm_all, BigInt, BigRational, Polynomial};
use indexmap::IndexMap;
use num::traits::{One, Zero};
use thiserror::Error;
use tracing::trace;

use crate::expr::{parse_relation, Expr, ExprError, Relation};
use crate::services::ServiceError;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error("`{0}` is not linear in the coefficients")]
    NonLinear(String),
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    #[error("`{expression}` evaluated to the non-integer {value}")]
    NonIntegral { expression: String, value: String },
    #[error(transparent)]
    Evaluator(#[from] ServiceError),
}

/// Whether program variables may remain in the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only coefficient names are symbolic; every inner value is closed
    /// and is handed to the arithmetic evaluator.
    Ground,
    /// Inner values are polynomials over the program variables.
    Symbolic,
}

/// Names the normalizer may meet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    pub coefficients: Vec<String>,
    pub variables: Vec<String>,
}

impl SymbolTable {
    pub fn new(coefficients: Vec<String>, variables: Vec<String>) -> Self {
        Self {
            coefficients,
            variables,
        }
    }

    fn is_coefficient(&self, name: &str) -> bool {
        self.coefficients.iter().any(|c| c == name)
    }
}

/// One coefficient's factor (or the scalar part): its exact value and the
/// expression it was read from.
#[derive(Debug, Clone)]
struct Part {
    value: Polynomial,
    source: Expr,
}

impl Part {
    fn zero(arity: usize) -> Self {
        Self {
            value: Polynomial::zero(arity),
            source: Expr::int(0),
        }
    }

    fn plus(self, other: Part) -> Part {
        Part {
            value: &self.value + &other.value,
            source: self.source.add(other.source),
        }
    }

    fn minus(self, other: Part) -> Part {
        Part {
            value: &self.value - &other.value,
            source: self.source.sub(other.source),
        }
    }

    fn negated(self) -> Part {
        Part {
            value: -&self.value,
            source: Expr::Neg(Box::new(self.source)),
        }
    }

    fn times(self, factor: &Part) -> Part {
        Part {
            value: &self.value * &factor.value,
            source: self.source.mul(factor.source.clone()),
        }
    }

    fn divided(self, divisor: &BigRational, source: &Expr) -> Part {
        Part {
            value: self.value.scale(&divisor.recip()),
            source: Expr::Div(Box::new(self.source), Box::new(source.clone())),
        }
    }
}

/// `sum_k name_k * coefficients[name_k] + scalar`.
#[derive(Debug, Clone)]
struct LinearForm {
    coefficients: IndexMap<String, Part>,
    scalar: Part,
}

impl LinearForm {
    fn scalar(part: Part) -> Self {
        Self {
            coefficients: IndexMap::new(),
            scalar: part,
        }
    }

    fn is_scalar(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// `self + other`, or `self - other` when `subtract`. Coefficients keep
    /// their first-appearance order.
    fn combine(self, mut other: LinearForm, subtract: bool) -> LinearForm {
        let mut coefficients = IndexMap::new();
        for (name, mine) in self.coefficients {
            let merged = match other.coefficients.shift_remove(&name) {
                Some(theirs) if subtract => mine.minus(theirs),
                Some(theirs) => mine.plus(theirs),
                None => mine,
            };
            coefficients.insert(name, merged);
        }
        for (name, theirs) in other.coefficients {
            coefficients.insert(name, if subtract { theirs.negated() } else { theirs });
        }
        let scalar = if subtract {
            self.scalar.minus(other.scalar)
        } else {
            self.scalar.plus(other.scalar)
        };
        LinearForm {
            coefficients,
            scalar,
        }
    }

    fn map_parts(self, f: &dyn Fn(Part) -> Part) -> LinearForm {
        LinearForm {
            coefficients: self
                .coefficients
                .into_iter()
                .map(|(name, part)| (name, f(part)))
                .collect(),
            scalar: f(self.scalar),
        }
    }

    fn denominators(&self) -> Vec<BigInt> {
        self.coefficients
            .values()
            .chain(std::iter::once(&self.scalar))
            .map(|p| p.value.denominator_lcm())
            .collect()
    }
}

/// Clears denominators in one relation at a time.
pub struct Normalizer<'a> {
    symbols: &'a SymbolTable,
    mode: Mode,
}

impl<'a> Normalizer<'a> {
    pub fn new(symbols: &'a SymbolTable, mode: Mode) -> Self {
        Self { symbols, mode }
    }

    fn arity(&self) -> usize {
        match self.mode {
            Mode::Ground => 0,
            Mode::Symbolic => self.symbols.variables.len(),
        }
    }

    /// Normalize `input`. When every value is already integral the input
    /// is returned unchanged, so normalizing twice is a no-op.
    ///
    /// `evaluate` computes closed expressions in ground mode.
    pub fn normalize(
        &self,
        input: &str,
        evaluate: &mut dyn FnMut(&str) -> Result<BigRational, ServiceError>,
    ) -> Result<String, NormalizeError> {
        let relation = parse_relation(input)?;
        let lhs = self.linearize(&relation.lhs)?;
        let rhs = self.linearize(&relation.rhs)?;

        let denominators: Vec<BigInt> = lhs
            .denominators()
            .into_iter()
            .chain(rhs.denominators())
            .collect();
        let factor = lcm_all(&denominators);
        if factor.is_one() {
            return Ok(input.to_string());
        }
        trace!(input, lcm = %factor, "clearing denominators");

        let lhs = self.render_side(lhs, &factor, evaluate)?;
        let rhs = self.render_side(rhs, &factor, evaluate)?;
        Ok(format!("{lhs}{}{rhs}", relation.op.symbol()))
    }

    /// Same as [`Normalizer::normalize`] on a parsed relation.
    pub fn normalize_relation(
        &self,
        relation: &Relation,
        evaluate: &mut dyn FnMut(&str) -> Result<BigRational, ServiceError>,
    ) -> Result<String, NormalizeError> {
        self.normalize(&relation.to_string(), evaluate)
    }

    fn linearize(&self, expr: &Expr) -> Result<LinearForm, NormalizeError> {
        let arity = self.arity();
        match expr {
            Expr::Num(value) => Ok(LinearForm::scalar(Part {
                value: Polynomial::constant(arity, value.clone()),
                source: expr.clone(),
            })),
            Expr::Var(name) if self.symbols.is_coefficient(name) => {
                let mut coefficients = IndexMap::new();
                coefficients.insert(
                    name.clone(),
                    Part {
                        value: Polynomial::constant(arity, BigRational::one()),
                        source: Expr::int(1),
                    },
                );
                Ok(LinearForm {
                    coefficients,
                    scalar: Part::zero(arity),
                })
            }
            Expr::Var(name) => match self.mode {
                Mode::Symbolic => {
                    let index = self
                        .symbols
                        .variables
                        .iter()
                        .position(|v| v == name)
                        .ok_or_else(|| NormalizeError::UnknownSymbol(name.clone()))?;
                    Ok(LinearForm::scalar(Part {
                        value: Polynomial::variable(arity, index),
                        source: expr.clone(),
                    }))
                }
                Mode::Ground => Err(NormalizeError::UnknownSymbol(name.clone())),
            },
            Expr::Invariant(_) => Err(ExprError::UnexpectedInvariant(expr.to_string()).into()),
            Expr::Neg(inner) => Ok(self.linearize(inner)?.map_parts(&Part::negated)),
            Expr::Add(a, b) => Ok(self.linearize(a)?.combine(self.linearize(b)?, false)),
            Expr::Sub(a, b) => Ok(self.linearize(a)?.combine(self.linearize(b)?, true)),
            Expr::Mul(a, b) => {
                let left = self.linearize(a)?;
                let right = self.linearize(b)?;
                if right.is_scalar() {
                    let factor = right.scalar;
                    Ok(left.map_parts(&|p| p.times(&factor)))
                } else if left.is_scalar() {
                    let factor = left.scalar;
                    Ok(right.map_parts(&|p| factor.clone().times(&p)))
                } else {
                    Err(NormalizeError::NonLinear(expr.to_string()))
                }
            }
            Expr::Div(a, b) => {
                let divisor = self.linearize(b)?;
                let constant = divisor
                    .is_scalar()
                    .then(|| divisor.scalar.value.constant_value())
                    .flatten()
                    .ok_or_else(|| NormalizeError::NonLinear(expr.to_string()))?;
                if constant.is_zero() {
                    return Err(ExprError::DivisionByZero(expr.to_string()).into());
                }
                Ok(self
                    .linearize(a)?
                    .map_parts(&|p| p.divided(&constant, b)))
            }
            Expr::Pow(base, exponent) => {
                let base = self.linearize(base)?;
                if !base.is_scalar() && *exponent != 1 {
                    return Err(NormalizeError::NonLinear(expr.to_string()));
                }
                Ok(base.map_parts(&|p| Part {
                    value: p.value.pow(*exponent),
                    source: Expr::Pow(Box::new(p.source), *exponent),
                }))
            }
        }
    }

    fn render_side(
        &self,
        side: LinearForm,
        factor: &BigInt,
        evaluate: &mut dyn FnMut(&str) -> Result<BigRational, ServiceError>,
    ) -> Result<String, NormalizeError> {
        let factor_q = BigRational::from_integer(factor.clone());
        let mut terms: Vec<String> = Vec::new();
        for (name, part) in side.coefficients {
            if part.value.is_zero() {
                continue;
            }
            let inner = self.render_part(&part, &factor_q, evaluate)?;
            if inner != "0" {
                terms.push(format!("{name}*({inner})"));
            }
        }
        if !side.scalar.value.is_zero() {
            let scalar = self.render_part(&side.scalar, &factor_q, evaluate)?;
            if scalar != "0" {
                terms.push(scalar);
            }
        }
        if terms.is_empty() {
            return Ok("0".to_string());
        }
        let mut out = String::new();
        for term in terms {
            if !out.is_empty() && !term.starts_with('-') {
                out.push('+');
            }
            out.push_str(&term);
        }
        Ok(out)
    }

    fn render_part(
        &self,
        part: &Part,
        factor: &BigRational,
        evaluate: &mut dyn FnMut(&str) -> Result<BigRational, ServiceError>,
    ) -> Result<String, NormalizeError> {
        match self.mode {
            Mode::Ground => {
                let token = Expr::Num(factor.clone()).mul(part.source.clone()).to_string();
                let value = evaluate(&token)?;
                if !value.is_integer() {
                    return Err(NormalizeError::NonIntegral {
                        expression: token,
                        value: value.to_string(),
                    });
                }
                Ok(value.to_integer().to_string())
            }
            Mode::Symbolic => Ok(part.value.scale(factor).render(&self.symbols.variables)),
        }
    }
}
