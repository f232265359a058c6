//! Typed arithmetic expressions and relations.
//!
//! Every arithmetic string the engine handles (expectations, oracle
//! constraints, rule atoms, solver echoes) is parsed into [`Expr`] and
//! evaluated exactly over the rationals. Nothing is ever handed to a
//! general-purpose interpreter.

#![allow(clippy::result_large_err)]

use std::fmt;

use expinv_algebra::{format_rational, Polynomial};
use miette::{Diagnostic, NamedSource, SourceSpan};
use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Signed, ToPrimitive, Zero};
use pest::iterators::Pairs;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub(crate) struct ExprParser;

pub(crate) type Pair<'a> = pest::iterators::Pair<'a, Rule>;

#[derive(Debug, Error, Diagnostic)]
pub enum ExprError {
    #[error("Syntax error: {message}")]
    #[diagnostic(code(expinv::expr::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Malformed parse tree: {0}")]
    #[diagnostic(code(expinv::expr::malformed))]
    Malformed(String),

    #[error("Unbound variable `{0}`")]
    #[diagnostic(code(expinv::expr::unbound))]
    Unbound(String),

    #[error("Division by zero in `{0}`")]
    #[diagnostic(code(expinv::expr::division_by_zero))]
    DivisionByZero(String),

    #[error("Exponent must be a small non-negative integer constant, found `{0}`")]
    #[diagnostic(code(expinv::expr::exponent))]
    BadExponent(String),

    #[error("Invariant application `{0}` cannot appear here")]
    #[diagnostic(code(expinv::expr::invariant))]
    UnexpectedInvariant(String),

    #[error("`{0}` is not a polynomial over the program variables")]
    #[diagnostic(code(expinv::expr::not_polynomial))]
    NotPolynomial(String),

    #[error("Invariant argument `{0}` does not evaluate to an integer")]
    #[diagnostic(code(expinv::expr::argument))]
    NonIntegralArgument(String),

    #[error("Unsupported construct: {0}")]
    #[diagnostic(code(expinv::expr::unsupported))]
    Unsupported(String),
}

impl ExprError {
    pub(crate) fn syntax(err: pest::error::Error<Rule>, source: &str) -> Self {
        let (start, end) = match err.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        let start = start.min(source.len());
        let len = end.min(source.len()).saturating_sub(start);
        ExprError::Syntax {
            message: err.variant.message().into_owned(),
            span: (start, len).into(),
            src: NamedSource::new("expression", source.to_string()),
        }
    }
}

/// Arithmetic expression over rationals, program variables, coefficient
/// names and invariant applications `I[...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Num(BigRational),
    Var(String),
    Invariant(Vec<Expr>),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, u32),
}

/// Relational operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
    Ne,
}

impl RelOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<=" => Some(RelOp::Le),
            ">=" => Some(RelOp::Ge),
            "<" => Some(RelOp::Lt),
            ">" => Some(RelOp::Gt),
            "=" | "==" => Some(RelOp::Eq),
            "!=" | "<>" => Some(RelOp::Ne),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Le => "<=",
            RelOp::Ge => ">=",
            RelOp::Lt => "<",
            RelOp::Gt => ">",
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
        }
    }

    /// Operator spelling in Redlog.
    pub fn redlog_symbol(self) -> &'static str {
        match self {
            RelOp::Eq => "=",
            RelOp::Ne => "<>",
            other => other.symbol(),
        }
    }

    pub fn holds(self, lhs: &BigRational, rhs: &BigRational) -> bool {
        match self {
            RelOp::Le => lhs <= rhs,
            RelOp::Ge => lhs >= rhs,
            RelOp::Lt => lhs < rhs,
            RelOp::Gt => lhs > rhs,
            RelOp::Eq => lhs == rhs,
            RelOp::Ne => lhs != rhs,
        }
    }
}

/// `lhs op rhs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub lhs: Expr,
    pub op: RelOp,
    pub rhs: Expr,
}

pub fn parse_expr(source: &str) -> Result<Expr, ExprError> {
    let mut pairs = ExprParser::parse(Rule::expr_input, source)
        .map_err(|e| ExprError::syntax(e, source))?;
    let input = next_pair(&mut pairs, "expression input")?;
    build_expr(next_pair(&mut input.into_inner(), "expression")?)
}

pub fn parse_relation(source: &str) -> Result<Relation, ExprError> {
    let mut pairs = ExprParser::parse(Rule::relation_input, source)
        .map_err(|e| ExprError::syntax(e, source))?;
    let input = next_pair(&mut pairs, "relation input")?;
    build_relation(next_pair(&mut input.into_inner(), "relation")?)
}

pub(crate) fn next_pair<'a>(pairs: &mut Pairs<'a, Rule>, what: &str) -> Result<Pair<'a>, ExprError> {
    pairs
        .next()
        .ok_or_else(|| ExprError::Malformed(format!("missing {what}")))
}

pub(crate) fn build_relation(pair: Pair<'_>) -> Result<Relation, ExprError> {
    let mut inner = pair.into_inner();
    let lhs = build_expr(next_pair(&mut inner, "left-hand side")?)?;
    let op_pair = next_pair(&mut inner, "relational operator")?;
    let op = RelOp::from_symbol(op_pair.as_str())
        .ok_or_else(|| ExprError::Malformed(format!("operator `{}`", op_pair.as_str())))?;
    let rhs = build_expr(next_pair(&mut inner, "right-hand side")?)?;
    Ok(Relation { lhs, op, rhs })
}

pub(crate) fn build_expr(pair: Pair<'_>) -> Result<Expr, ExprError> {
    match pair.as_rule() {
        Rule::expr => build_chain(pair, build_term),
        Rule::term => build_chain(pair, build_unary),
        Rule::unary => build_unary(pair),
        other => Err(ExprError::Malformed(format!("unexpected {other:?}"))),
    }
}

/// Left-associative `operand (op operand)*` chain.
fn build_chain(
    pair: Pair<'_>,
    operand: fn(Pair<'_>) -> Result<Expr, ExprError>,
) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let mut acc = operand(next_pair(&mut inner, "operand")?)?;
    while let Some(op) = inner.next() {
        let rhs = operand(next_pair(&mut inner, "operand")?)?;
        acc = match op.as_str() {
            "+" => Expr::Add(Box::new(acc), Box::new(rhs)),
            "-" => Expr::Sub(Box::new(acc), Box::new(rhs)),
            "*" => Expr::Mul(Box::new(acc), Box::new(rhs)),
            "/" => Expr::Div(Box::new(acc), Box::new(rhs)),
            other => return Err(ExprError::Malformed(format!("operator `{other}`"))),
        };
    }
    Ok(acc)
}

fn build_term(pair: Pair<'_>) -> Result<Expr, ExprError> {
    build_chain(pair, build_unary)
}

fn build_unary(pair: Pair<'_>) -> Result<Expr, ExprError> {
    let mut negations = 0usize;
    let mut body = None;
    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::neg => negations += 1,
            Rule::power => body = Some(build_power(item)?),
            other => return Err(ExprError::Malformed(format!("unexpected {other:?}"))),
        }
    }
    let mut expr = body.ok_or_else(|| ExprError::Malformed("empty unary".into()))?;
    for _ in 0..negations {
        expr = Expr::Neg(Box::new(expr));
    }
    Ok(expr)
}

fn build_power(pair: Pair<'_>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let base = build_primary(next_pair(&mut inner, "power base")?)?;
    let Some(exponent) = inner.next() else {
        return Ok(base);
    };
    let text = exponent.as_str().trim().to_string();
    let exponent = build_unary(exponent)?;
    let value = exponent
        .constant_value()
        .filter(|v| v.is_integer() && !v.is_negative())
        .and_then(|v| v.to_integer().to_u32())
        .filter(|e| *e <= 64)
        .ok_or(ExprError::BadExponent(text))?;
    Ok(Expr::Pow(Box::new(base), value))
}

fn build_primary(pair: Pair<'_>) -> Result<Expr, ExprError> {
    match pair.as_rule() {
        Rule::number => {
            let n: BigInt = pair
                .as_str()
                .parse()
                .map_err(|_| ExprError::Malformed(format!("number `{}`", pair.as_str())))?;
            Ok(Expr::Num(BigRational::from_integer(n)))
        }
        Rule::ident => Ok(Expr::Var(pair.as_str().to_string())),
        Rule::invariant => {
            let args = pair
                .into_inner()
                .map(build_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Invariant(args))
        }
        Rule::expr => build_expr(pair),
        other => Err(ExprError::Malformed(format!("unexpected {other:?}"))),
    }
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn int(n: i64) -> Self {
        Expr::Num(BigRational::from_integer(BigInt::from(n)))
    }

    pub fn num(value: BigRational) -> Self {
        Expr::Num(value)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Expr) -> Self {
        Expr::Mul(Box::new(self), Box::new(other))
    }

    /// Sum of `terms`, `0` when empty.
    pub fn sum(terms: Vec<Expr>) -> Self {
        let mut iter = terms.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, Expr::add),
            None => Expr::int(0),
        }
    }

    /// Evaluate exactly; `env` resolves variable names.
    pub fn eval(&self, env: &dyn Fn(&str) -> Option<BigRational>) -> Result<BigRational, ExprError> {
        match self {
            Expr::Num(n) => Ok(n.clone()),
            Expr::Var(name) => env(name).ok_or_else(|| ExprError::Unbound(name.clone())),
            Expr::Invariant(_) => Err(ExprError::UnexpectedInvariant(self.to_string())),
            Expr::Neg(inner) => Ok(-inner.eval(env)?),
            Expr::Add(a, b) => Ok(a.eval(env)? + b.eval(env)?),
            Expr::Sub(a, b) => Ok(a.eval(env)? - b.eval(env)?),
            Expr::Mul(a, b) => Ok(a.eval(env)? * b.eval(env)?),
            Expr::Div(a, b) => {
                let denominator = b.eval(env)?;
                if denominator.is_zero() {
                    return Err(ExprError::DivisionByZero(self.to_string()));
                }
                Ok(a.eval(env)? / denominator)
            }
            Expr::Pow(base, e) => Ok(num::pow(base.eval(env)?, *e as usize)),
        }
    }

    /// Value of a closed expression.
    pub fn constant_value(&self) -> Option<BigRational> {
        self.eval(&|_| None).ok()
    }

    /// No variables and no invariant applications.
    pub fn is_ground(&self) -> bool {
        match self {
            Expr::Num(_) => true,
            Expr::Var(_) | Expr::Invariant(_) => false,
            Expr::Neg(a) | Expr::Pow(a, _) => a.is_ground(),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.is_ground() && b.is_ground()
            }
        }
    }

    /// Variable names in first-occurrence order, including those inside
    /// invariant arguments.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Invariant(args) => args.iter().for_each(|a| a.collect_variables(out)),
            Expr::Neg(a) | Expr::Pow(a, _) => a.collect_variables(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
        }
    }

    pub fn contains_invariant(&self) -> bool {
        match self {
            Expr::Invariant(_) => true,
            Expr::Num(_) | Expr::Var(_) => false,
            Expr::Neg(a) | Expr::Pow(a, _) => a.contains_invariant(),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.contains_invariant() || b.contains_invariant()
            }
        }
    }

    /// Simultaneously replace variables for which `f` answers.
    pub fn substitute(&self, f: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        match self {
            Expr::Num(_) => self.clone(),
            Expr::Var(name) => f(name).unwrap_or_else(|| self.clone()),
            Expr::Invariant(args) => Expr::Invariant(args.iter().map(|a| a.substitute(f)).collect()),
            Expr::Neg(a) => Expr::Neg(Box::new(a.substitute(f))),
            Expr::Pow(a, e) => Expr::Pow(Box::new(a.substitute(f)), *e),
            Expr::Add(a, b) => Expr::Add(Box::new(a.substitute(f)), Box::new(b.substitute(f))),
            Expr::Sub(a, b) => Expr::Sub(Box::new(a.substitute(f)), Box::new(b.substitute(f))),
            Expr::Mul(a, b) => Expr::Mul(Box::new(a.substitute(f)), Box::new(b.substitute(f))),
            Expr::Div(a, b) => Expr::Div(Box::new(a.substitute(f)), Box::new(b.substitute(f))),
        }
    }

    /// Replace every invariant application by `f(args)`.
    pub fn replace_invariants<E>(
        &self,
        f: &mut dyn FnMut(&[Expr]) -> Result<Expr, E>,
    ) -> Result<Expr, E> {
        Ok(match self {
            Expr::Num(_) | Expr::Var(_) => self.clone(),
            Expr::Invariant(args) => f(args)?,
            Expr::Neg(a) => Expr::Neg(Box::new(a.replace_invariants(f)?)),
            Expr::Pow(a, e) => Expr::Pow(Box::new(a.replace_invariants(f)?), *e),
            Expr::Add(a, b) => Expr::Add(
                Box::new(a.replace_invariants(f)?),
                Box::new(b.replace_invariants(f)?),
            ),
            Expr::Sub(a, b) => Expr::Sub(
                Box::new(a.replace_invariants(f)?),
                Box::new(b.replace_invariants(f)?),
            ),
            Expr::Mul(a, b) => Expr::Mul(
                Box::new(a.replace_invariants(f)?),
                Box::new(b.replace_invariants(f)?),
            ),
            Expr::Div(a, b) => Expr::Div(
                Box::new(a.replace_invariants(f)?),
                Box::new(b.replace_invariants(f)?),
            ),
        })
    }

    /// Expand into a polynomial over `vars`. Division is only allowed by
    /// nonzero constants.
    pub fn to_polynomial<S: AsRef<str>>(&self, vars: &[S]) -> Result<Polynomial, ExprError> {
        let arity = vars.len();
        match self {
            Expr::Num(n) => Ok(Polynomial::constant(arity, n.clone())),
            Expr::Var(name) => vars
                .iter()
                .position(|v| v.as_ref() == name)
                .map(|i| Polynomial::variable(arity, i))
                .ok_or_else(|| ExprError::NotPolynomial(name.clone())),
            Expr::Invariant(_) => Err(ExprError::UnexpectedInvariant(self.to_string())),
            Expr::Neg(a) => Ok(-&a.to_polynomial(vars)?),
            Expr::Add(a, b) => Ok(&a.to_polynomial(vars)? + &b.to_polynomial(vars)?),
            Expr::Sub(a, b) => Ok(&a.to_polynomial(vars)? - &b.to_polynomial(vars)?),
            Expr::Mul(a, b) => Ok(&a.to_polynomial(vars)? * &b.to_polynomial(vars)?),
            Expr::Div(a, b) => {
                let divisor = b
                    .to_polynomial(vars)?
                    .constant_value()
                    .ok_or_else(|| ExprError::NotPolynomial(self.to_string()))?;
                if divisor.is_zero() {
                    return Err(ExprError::DivisionByZero(self.to_string()));
                }
                Ok(a.to_polynomial(vars)?.scale(&divisor.recip()))
            }
            Expr::Pow(a, e) => Ok(a.to_polynomial(vars)?.pow(*e)),
        }
    }

    /// Expression form of a polynomial over `vars`.
    pub fn from_polynomial<S: AsRef<str>>(poly: &Polynomial, vars: &[S]) -> Expr {
        let terms = poly
            .terms()
            .into_iter()
            .map(|(monomial, coefficient)| {
                let factors: Vec<Expr> = monomial
                    .exponents()
                    .iter()
                    .zip(vars)
                    .filter(|(e, _)| **e > 0)
                    .map(|(e, v)| {
                        let var = Expr::var(v.as_ref());
                        if *e == 1 {
                            var
                        } else {
                            Expr::Pow(Box::new(var), *e)
                        }
                    })
                    .collect();
                let product = factors.into_iter().reduce(Expr::mul);
                match product {
                    None => Expr::Num(coefficient),
                    Some(p) if coefficient.is_one() => p,
                    Some(p) => Expr::Num(coefficient).mul(p),
                }
            })
            .collect();
        Expr::sum(terms)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Pow(..) => 4,
            Expr::Num(n) if !n.is_integer() => 2,
            Expr::Num(n) if n.is_negative() => 3,
            Expr::Num(_) | Expr::Var(_) | Expr::Invariant(_) => 5,
        }
    }

    /// Whether the rendering starts with a minus sign.
    fn leading_minus(&self) -> bool {
        match self {
            Expr::Neg(_) => true,
            Expr::Num(n) => n.is_negative(),
            Expr::Add(a, _) | Expr::Sub(a, _) => a.leading_minus(),
            Expr::Mul(a, _) | Expr::Div(a, _) => a.precedence() >= 2 && a.leading_minus(),
            Expr::Pow(..) | Expr::Var(_) | Expr::Invariant(_) => false,
        }
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    expr: &Expr,
    min_precedence: u8,
    right_operand: bool,
) -> fmt::Result {
    if expr.precedence() < min_precedence || (right_operand && expr.leading_minus()) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => f.write_str(&format_rational(n)),
            Expr::Var(name) => f.write_str(name),
            Expr::Invariant(args) => {
                f.write_str("I[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
            Expr::Neg(a) => {
                f.write_str("-")?;
                write_operand(f, a, 3, true)
            }
            Expr::Add(a, b) => {
                write_operand(f, a, 1, false)?;
                f.write_str("+")?;
                write_operand(f, b, 1, true)
            }
            Expr::Sub(a, b) => {
                write_operand(f, a, 1, false)?;
                f.write_str("-")?;
                write_operand(f, b, 2, true)
            }
            Expr::Mul(a, b) => {
                write_operand(f, a, 2, false)?;
                f.write_str("*")?;
                write_operand(f, b, 3, true)
            }
            Expr::Div(a, b) => {
                write_operand(f, a, 2, false)?;
                f.write_str("/")?;
                write_operand(f, b, 3, true)
            }
            Expr::Pow(a, e) => {
                write_operand(f, a, 5, true)?;
                write!(f, "^{e}")
            }
        }
    }
}

impl Relation {
    pub fn new(lhs: Expr, op: RelOp, rhs: Expr) -> Self {
        Self { lhs, op, rhs }
    }

    /// Apply `f` to both sides.
    pub fn try_map<E>(&self, mut f: impl FnMut(&Expr) -> Result<Expr, E>) -> Result<Relation, E> {
        Ok(Relation {
            lhs: f(&self.lhs)?,
            op: self.op,
            rhs: f(&self.rhs)?,
        })
    }

    /// Truth value when both sides are closed.
    pub fn ground_truth(&self) -> Option<bool> {
        let lhs = self.lhs.constant_value()?;
        let rhs = self.rhs.constant_value()?;
        Some(self.op.holds(&lhs, &rhs))
    }

    /// Redlog rendering: `=` and `<>` for equality operators.
    pub fn to_redlog(&self) -> String {
        format!("{}{}{}", self.lhs, self.op.redlog_symbol(), self.rhs)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.lhs, self.op.symbol(), self.rhs)
    }
}
