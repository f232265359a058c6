use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::One;

use crate::arith::binomial;

/// A monomial as an exponent vector over the program variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Monomial {
    exponents: Vec<u32>,
}

impl Monomial {
    pub fn new(exponents: Vec<u32>) -> Self {
        Self { exponents }
    }

    /// The degree-0 monomial over `arity` variables.
    pub fn constant(arity: usize) -> Self {
        Self {
            exponents: vec![0; arity],
        }
    }

    pub fn exponents(&self) -> &[u32] {
        &self.exponents
    }

    pub fn arity(&self) -> usize {
        self.exponents.len()
    }

    /// Total degree.
    pub fn degree(&self) -> u32 {
        self.exponents.iter().sum()
    }

    pub fn is_constant(&self) -> bool {
        self.exponents.iter().all(|e| *e == 0)
    }

    /// Value at an integer point.
    pub fn eval_int(&self, point: &[i64]) -> BigInt {
        self.exponents
            .iter()
            .zip(point)
            .fold(BigInt::one(), |acc, (e, v)| acc * num::pow(BigInt::from(*v), *e as usize))
    }

    /// Value at a rational point.
    pub fn eval(&self, point: &[BigRational]) -> BigRational {
        self.exponents
            .iter()
            .zip(point)
            .fold(BigRational::one(), |acc, (e, v)| acc * num::pow(v.clone(), *e as usize))
    }

    /// Render as a product of variable powers, e.g. `x^2*y`.
    ///
    /// Degree-0 factors are omitted; the constant monomial renders as `1`.
    pub fn render<S: AsRef<str>>(&self, vars: &[S]) -> String {
        let factors: Vec<String> = self
            .exponents
            .iter()
            .zip(vars)
            .filter(|(e, _)| **e > 0)
            .map(|(e, v)| {
                if *e == 1 {
                    v.as_ref().to_string()
                } else {
                    format!("{}^{}", v.as_ref(), e)
                }
            })
            .collect();
        if factors.is_empty() {
            "1".to_string()
        } else {
            factors.join("*")
        }
    }
}

/// Number of monomials of degree at most `degree` over `num_vars`
/// variables: `C(num_vars + degree, degree)`.
pub fn monomial_count(num_vars: usize, degree: u32) -> BigInt {
    binomial(num_vars as u64 + u64::from(degree), u64::from(degree))
}

/// Enumerate every monomial of total degree at most `degree`.
///
/// Order: total degree descending, then exponent vectors in descending
/// lexicographic order. For two variables and degree 2 this yields
/// `[2,0] [1,1] [0,2] [1,0] [0,1] [0,0]`.
pub fn enumerate_monomials(num_vars: usize, degree: u32) -> Vec<Monomial> {
    let mut out = Vec::new();
    let mut prefix = Vec::with_capacity(num_vars);
    for total in (0..=degree).rev() {
        compositions(total, num_vars, &mut prefix, &mut out);
    }
    out
}

fn compositions(total: u32, slots: usize, prefix: &mut Vec<u32>, out: &mut Vec<Monomial>) {
    match slots {
        0 => {
            if total == 0 {
                out.push(Monomial::new(prefix.clone()));
            }
        }
        1 => {
            prefix.push(total);
            out.push(Monomial::new(prefix.clone()));
            prefix.pop();
        }
        _ => {
            for e in (0..=total).rev() {
                prefix.push(e);
                compositions(total - e, slots - 1, prefix, out);
                prefix.pop();
            }
        }
    }
}
