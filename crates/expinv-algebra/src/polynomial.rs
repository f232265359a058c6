use std::collections::BTreeMap;
use std::ops::{Add, Mul, Neg, Sub};

use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Signed, Zero};

use crate::arith::{format_rational, lcm_all};
use crate::monomial::Monomial;

/// A sparse multivariate polynomial with exact rational coefficients.
///
/// Terms are keyed by exponent vector; zero coefficients are never stored,
/// so structural equality is polynomial equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    arity: usize,
    terms: BTreeMap<Vec<u32>, BigRational>,
}

impl Polynomial {
    pub fn zero(arity: usize) -> Self {
        Self {
            arity,
            terms: BTreeMap::new(),
        }
    }

    pub fn constant(arity: usize, value: BigRational) -> Self {
        let mut p = Self::zero(arity);
        p.add_term(vec![0; arity], value);
        p
    }

    /// The polynomial `x_index`.
    pub fn variable(arity: usize, index: usize) -> Self {
        let mut exponents = vec![0; arity];
        if let Some(slot) = exponents.get_mut(index) {
            *slot = 1;
        }
        let mut p = Self::zero(arity);
        p.add_term(exponents, BigRational::one());
        p
    }

    pub fn from_monomial(monomial: &Monomial, coefficient: BigRational) -> Self {
        let mut p = Self::zero(monomial.arity());
        p.add_term(monomial.exponents().to_vec(), coefficient);
        p
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// The value of a polynomial without any variable term.
    pub fn constant_value(&self) -> Option<BigRational> {
        match self.terms.len() {
            0 => Some(BigRational::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(e, _)| e.iter().all(|d| *d == 0))
                .map(|(_, c)| c.clone()),
            _ => None,
        }
    }

    pub fn coefficient(&self, exponents: &[u32]) -> BigRational {
        self.terms
            .get(exponents)
            .cloned()
            .unwrap_or_else(BigRational::zero)
    }

    /// Terms in graded, lexicographically descending order.
    pub fn terms(&self) -> Vec<(Monomial, BigRational)> {
        let mut out: Vec<(Monomial, BigRational)> = self
            .terms
            .iter()
            .map(|(e, c)| (Monomial::new(e.clone()), c.clone()))
            .collect();
        out.sort_by(|(a, _), (b, _)| b.degree().cmp(&a.degree()).then_with(|| b.cmp(a)));
        out
    }

    pub fn degree(&self) -> u32 {
        self.terms
            .keys()
            .map(|e| e.iter().sum::<u32>())
            .max()
            .unwrap_or(0)
    }

    fn add_term(&mut self, exponents: Vec<u32>, coefficient: BigRational) {
        if coefficient.is_zero() {
            return;
        }
        let slot = self
            .terms
            .entry(exponents)
            .or_insert_with(BigRational::zero);
        *slot += coefficient;
        if slot.is_zero() {
            self.terms.retain(|_, c| !c.is_zero());
        }
    }

    pub fn scale(&self, factor: &BigRational) -> Self {
        if factor.is_zero() {
            return Self::zero(self.arity);
        }
        Self {
            arity: self.arity,
            terms: self
                .terms
                .iter()
                .map(|(e, c)| (e.clone(), c * factor))
                .collect(),
        }
    }

    pub fn pow(&self, exponent: u32) -> Self {
        let mut result = Self::constant(self.arity, BigRational::one());
        for _ in 0..exponent {
            result = &result * self;
        }
        result
    }

    /// Evaluate at a rational point.
    pub fn eval(&self, point: &[BigRational]) -> BigRational {
        self.terms
            .iter()
            .map(|(e, c)| c * Monomial::new(e.clone()).eval(point))
            .fold(BigRational::zero(), |acc, v| acc + v)
    }

    /// LCM of every coefficient denominator (1 for the zero polynomial).
    pub fn denominator_lcm(&self) -> BigInt {
        let dens: Vec<BigInt> = self.terms.values().map(|c| c.denom().clone()).collect();
        lcm_all(&dens)
    }

    /// Render as an arithmetic expression over `vars`, e.g.
    /// `(1/2)*x^2-3*x*y+1`. The zero polynomial renders as `0`.
    pub fn render<S: AsRef<str>>(&self, vars: &[S]) -> String {
        let mut out = String::new();
        for (monomial, coefficient) in self.terms() {
            let negative = coefficient.is_negative();
            let magnitude = coefficient.abs();
            let piece = if monomial.is_constant() {
                wrap_fraction(&magnitude)
            } else if magnitude.is_one() {
                monomial.render(vars)
            } else {
                format!("{}*{}", wrap_fraction(&magnitude), monomial.render(vars))
            };
            if negative {
                out.push('-');
            } else if !out.is_empty() {
                out.push('+');
            }
            out.push_str(&piece);
        }
        if out.is_empty() {
            "0".to_string()
        } else {
            out
        }
    }
}

fn wrap_fraction(value: &BigRational) -> String {
    if value.is_integer() {
        format_rational(value)
    } else {
        format!("({})", format_rational(value))
    }
}

impl<'a, 'b> Add<&'b Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn add(self, other: &'b Polynomial) -> Polynomial {
        debug_assert_eq!(self.arity, other.arity);
        let mut result = self.clone();
        for (e, c) in &other.terms {
            result.add_term(e.clone(), c.clone());
        }
        result
    }
}

impl<'a, 'b> Sub<&'b Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn sub(self, other: &'b Polynomial) -> Polynomial {
        self + &(-other)
    }
}

impl<'a, 'b> Mul<&'b Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn mul(self, other: &'b Polynomial) -> Polynomial {
        debug_assert_eq!(self.arity, other.arity);
        let mut result = Polynomial::zero(self.arity);
        for (ea, ca) in &self.terms {
            for (eb, cb) in &other.terms {
                let exponents: Vec<u32> = ea.iter().zip(eb).map(|(a, b)| a + b).collect();
                result.add_term(exponents, ca * cb);
            }
        }
        result
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial {
            arity: self.arity,
            terms: self.terms.iter().map(|(e, c)| (e.clone(), -c)).collect(),
        }
    }
}
