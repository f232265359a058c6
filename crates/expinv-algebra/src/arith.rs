use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Signed, ToPrimitive, Zero};
use num::Integer;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlgebraError {
    #[error("Zero denominator in fraction {numerator}/0")]
    ZeroDenominator { numerator: BigInt },
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Adjugate entry {entry} is not an integer multiple of the determinant")]
    NonIntegralAdjugate { entry: String },
}

/// Greatest common divisor, always non-negative.
///
/// `gcd(0, 0)` is 0; otherwise the result divides both arguments.
pub fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let mut a = a.abs();
    let mut b = b.abs();
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple, always non-negative. `lcm(0, x)` is 0.
pub fn lcm(a: &BigInt, b: &BigInt) -> BigInt {
    if a.is_zero() || b.is_zero() {
        return BigInt::zero();
    }
    (a / gcd(a, b) * b).abs()
}

/// LCM of a sequence of integers, starting from 1.
///
/// Zero entries are skipped: they appear as denominators of nothing and
/// would otherwise collapse the multiple to 0.
pub fn lcm_all<'a, I>(values: I) -> BigInt
where
    I: IntoIterator<Item = &'a BigInt>,
{
    values
        .into_iter()
        .filter(|v| !v.is_zero())
        .fold(BigInt::one(), |acc, v| lcm(&acc, v))
}

/// Exact binomial coefficient C(n, k) using BigInt.
///
/// # Parameters
/// - `n`: Population count.
/// - `k`: Selection count.
///
/// # Returns
/// `C(n, k)`, or 0 when `k > n`.
pub fn binomial(n: u64, k: u64) -> BigInt {
    if k > n {
        return BigInt::zero();
    }
    let k = std::cmp::min(k, n - k);
    let mut result = BigInt::one();
    for i in 0..k {
        result *= BigInt::from(n - i);
        result /= BigInt::from(i + 1);
    }
    result
}

/// Reduce `numerator / denominator` to lowest terms.
///
/// The common factor is divided out explicitly and the sign is carried
/// on the numerator, so the resulting fraction never holds a negative
/// denominator.
///
/// # Returns
/// The reduced fraction, or [`AlgebraError::ZeroDenominator`].
pub fn reduce_fraction(numerator: &BigInt, denominator: &BigInt) -> Result<BigRational, AlgebraError> {
    if denominator.is_zero() {
        return Err(AlgebraError::ZeroDenominator {
            numerator: numerator.clone(),
        });
    }
    if numerator.is_zero() {
        return Ok(BigRational::zero());
    }
    let g = gcd(numerator, denominator);
    let mut num = numerator / &g;
    let mut den = denominator / &g;
    if den.is_negative() {
        num = -num;
        den = -den;
    }
    Ok(BigRational::new_raw(num, den))
}

/// Render a rational as `n` or `n/d`.
pub fn format_rational(value: &BigRational) -> String {
    if value.is_integer() {
        value.numer().to_string()
    } else {
        format!("{}/{}", value.numer(), value.denom())
    }
}

/// Approximate a rational as `f64`, `None` when either part overflows.
pub fn rational_to_f64(value: &BigRational) -> Option<f64> {
    let num = value.numer().to_f64()?;
    let den = value.denom().to_f64()?;
    let approx = num / den;
    approx.is_finite().then_some(approx)
}

/// Whether the rational has denominator 1.
pub fn is_integral(value: &BigRational) -> bool {
    value.denom().is_one()
}

/// Integer quotient `a / b` if `b` divides `a` exactly.
pub fn exact_div(a: &BigInt, b: &BigInt) -> Option<BigInt> {
    if b.is_zero() {
        return None;
    }
    let (q, r) = a.div_rem(b);
    r.is_zero().then_some(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: i64) -> BigInt {
        BigInt::from(n)
    }

    #[test]
    fn gcd_and_lcm_small_values() {
        assert_eq!(gcd(&big(12), &big(18)), big(6));
        assert_eq!(lcm(&big(4), &big(6)), big(12));
        assert_eq!(gcd(&big(-12), &big(18)), big(6));
        assert_eq!(gcd(&big(0), &big(7)), big(7));
        assert_eq!(gcd(&big(0), &big(0)), big(0));
        assert_eq!(lcm(&big(0), &big(5)), big(0));
        assert_eq!(lcm(&big(-4), &big(6)), big(12));
    }

    #[test]
    fn lcm_all_skips_zero_and_starts_at_one() {
        let values = vec![big(2), big(0), big(4), big(3)];
        assert_eq!(lcm_all(&values), big(12));
        let empty: Vec<BigInt> = Vec::new();
        assert_eq!(lcm_all(&empty), big(1));
    }

    #[test]
    fn binomial_basic() {
        assert_eq!(binomial(0, 0), BigInt::one());
        assert_eq!(binomial(5, 2), big(10));
        assert_eq!(binomial(5, 3), big(10));
        assert_eq!(binomial(3, 5), BigInt::zero());
        assert_eq!(binomial(4, 2), big(6));
    }

    #[test]
    fn reduce_fraction_moves_sign_to_numerator() {
        let q = reduce_fraction(&big(6), &big(-4)).unwrap();
        assert_eq!(q.numer(), &big(-3));
        assert_eq!(q.denom(), &big(2));
        let zero = reduce_fraction(&big(0), &big(-9)).unwrap();
        assert!(zero.is_zero());
    }

    #[test]
    fn reduce_fraction_rejects_zero_denominator() {
        let err = reduce_fraction(&big(3), &big(0)).unwrap_err();
        assert_eq!(err, AlgebraError::ZeroDenominator { numerator: big(3) });
    }

    #[test]
    fn format_rational_integer_and_fraction() {
        assert_eq!(format_rational(&BigRational::from_integer(big(-5))), "-5");
        assert_eq!(format_rational(&BigRational::new(big(3), big(-6))), "-1/2");
    }

    #[test]
    fn exact_div_requires_divisibility() {
        assert_eq!(exact_div(&big(12), &big(4)), Some(big(3)));
        assert_eq!(exact_div(&big(12), &big(5)), None);
        assert_eq!(exact_div(&big(12), &big(0)), None);
    }

    #[test]
    fn rational_to_f64_approximates() {
        let q = BigRational::new(big(1), big(4));
        assert_eq!(rational_to_f64(&q), Some(0.25));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn gcd_divides_both(a in -10_000i64..10_000, b in -10_000i64..10_000) {
                let g = gcd(&big(a), &big(b));
                prop_assume!(!g.is_zero());
                prop_assert!((big(a) % &g).is_zero());
                prop_assert!((big(b) % &g).is_zero());
            }

            #[test]
            fn gcd_times_lcm_is_product(a in 1i64..5_000, b in 1i64..5_000) {
                let product = big(a) * big(b);
                prop_assert_eq!(gcd(&big(a), &big(b)) * lcm(&big(a), &big(b)), product);
            }

            #[test]
            fn reduced_fraction_is_in_lowest_terms(n in -1_000i64..1_000, d in 1i64..1_000, sign in prop::bool::ANY) {
                let d = if sign { -d } else { d };
                let q = reduce_fraction(&big(n), &big(d)).unwrap();
                prop_assert!(q.denom().is_positive());
                prop_assert!(gcd(q.numer(), q.denom()).is_one() || q.numer().is_zero());
                prop_assert_eq!(q, BigRational::new(big(n), big(d)));
            }
        }
    }
}
