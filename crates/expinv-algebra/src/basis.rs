//! Exact Lagrange interpolation bases.
//!
//! For sample points `p_1..p_k` and monomials `m_1..m_k` the Vandermonde
//! matrix is `V[s][j] = m_j(p_s)`. When `det V != 0` the basis
//! `B = (V^-1)^T` satisfies `sum_j B[i][j] * m_j(p_s) = [i == s]`, so
//! `sum_i c_i * (sum_j B[i][j] * m_j)` interpolates `c_s` at `p_s`.
//!
//! Bases travel as the determinant plus the integer adjugate entries
//! `e_ij = adj(V)[j][i]`; [`Basis::from_adjugate`] turns those into
//! reduced fractions `e_ij / det`.

use num::bigint::{BigInt, Sign};
use num::rational::BigRational;
use num::traits::{One, Signed, Zero};

use crate::arith::{reduce_fraction, AlgebraError};
use crate::monomial::Monomial;

/// Determinant plus row-major adjugate entries `e_ij = adj(V)[j][i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjugateBasis {
    pub determinant: BigInt,
    pub entries: Vec<BigInt>,
}

/// A square interpolation basis of reduced fractions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basis {
    rows: Vec<Vec<BigRational>>,
    determinant: BigInt,
}

impl Basis {
    /// Build a basis from a nonzero determinant and `size * size`
    /// row-major adjugate entries.
    ///
    /// Each entry is divided by its gcd with the determinant magnitude;
    /// the determinant's sign moves onto the numerator.
    pub fn from_adjugate(raw: &AdjugateBasis, size: usize) -> Result<Self, AlgebraError> {
        if raw.entries.len() != size * size {
            return Err(AlgebraError::DimensionMismatch {
                expected: size * size,
                found: raw.entries.len(),
            });
        }
        let sign = match raw.determinant.sign() {
            Sign::Minus => BigInt::from(-1),
            _ => BigInt::one(),
        };
        let magnitude = raw.determinant.abs();
        let mut rows = Vec::with_capacity(size);
        for chunk in raw.entries.chunks(size) {
            let row = chunk
                .iter()
                .map(|e| reduce_fraction(&(e * &sign), &magnitude))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Ok(Self {
            rows,
            determinant: raw.determinant.clone(),
        })
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<BigRational>] {
        &self.rows
    }

    pub fn entry(&self, row: usize, col: usize) -> Option<&BigRational> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn determinant(&self) -> &BigInt {
        &self.determinant
    }

    pub fn determinant_sign(&self) -> Sign {
        self.determinant.sign()
    }

    pub fn determinant_magnitude(&self) -> BigInt {
        self.determinant.abs()
    }
}

/// Vandermonde matrix `V[s][j] = m_j(p_s)`.
pub fn vandermonde<P: AsRef<[i64]>>(
    points: &[P],
    monomials: &[Monomial],
) -> Result<Vec<Vec<BigRational>>, AlgebraError> {
    points
        .iter()
        .map(|p| {
            let p = p.as_ref();
            monomials
                .iter()
                .map(|m| {
                    if m.arity() != p.len() {
                        return Err(AlgebraError::DimensionMismatch {
                            expected: m.arity(),
                            found: p.len(),
                        });
                    }
                    Ok(BigRational::from_integer(m.eval_int(p)))
                })
                .collect()
        })
        .collect()
}

/// Compute the adjugate form of the interpolation basis by exact
/// Gauss-Jordan elimination over the rationals.
///
/// # Returns
/// `Ok(None)` when the Vandermonde matrix is singular.
pub fn interpolation_basis<P: AsRef<[i64]>>(
    points: &[P],
    monomials: &[Monomial],
) -> Result<Option<AdjugateBasis>, AlgebraError> {
    let n = monomials.len();
    if points.len() != n {
        return Err(AlgebraError::DimensionMismatch {
            expected: n,
            found: points.len(),
        });
    }
    let v = vandermonde(points, monomials)?;

    // Augmented [V | I].
    let mut m: Vec<Vec<BigRational>> = v
        .into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            row.extend((0..n).map(|j| {
                if i == j {
                    BigRational::one()
                } else {
                    BigRational::zero()
                }
            }));
            row
        })
        .collect();

    let mut det = BigRational::one();
    for col in 0..n {
        let Some(pivot) = (col..n).find(|r| !m[*r][col].is_zero()) else {
            return Ok(None);
        };
        if pivot != col {
            m.swap(pivot, col);
            det = -det;
        }
        let p = m[col][col].clone();
        det *= &p;
        for x in m[col].iter_mut() {
            *x /= &p;
        }
        for r in 0..n {
            if r == col || m[r][col].is_zero() {
                continue;
            }
            let factor = m[r][col].clone();
            let pivot_row = m[col].clone();
            for (x, y) in m[r].iter_mut().zip(pivot_row.iter()) {
                *x -= &factor * y;
            }
        }
    }

    if !det.is_integer() {
        return Err(AlgebraError::NonIntegralAdjugate {
            entry: det.to_string(),
        });
    }
    let determinant = det.to_integer();

    // e_ij = det * inv[j][i]
    let mut entries = Vec::with_capacity(n * n);
    for i in 0..n {
        for row in m.iter() {
            let scaled = &row[n + i] * &det;
            if !scaled.is_integer() {
                return Err(AlgebraError::NonIntegralAdjugate {
                    entry: scaled.to_string(),
                });
            }
            entries.push(scaled.to_integer());
        }
    }
    Ok(Some(AdjugateBasis {
        determinant,
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monomial::enumerate_monomials;
    use crate::polynomial::Polynomial;

    fn int(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn basis_for(points: &[Vec<i64>], monomials: &[Monomial]) -> Basis {
        let raw = interpolation_basis(points, monomials).unwrap().unwrap();
        Basis::from_adjugate(&raw, monomials.len()).unwrap()
    }

    fn lagrange_holds(points: &[Vec<i64>], monomials: &[Monomial]) -> bool {
        let basis = basis_for(points, monomials);
        let arity = monomials[0].arity();
        basis.rows().iter().enumerate().all(|(i, row)| {
            let term = row
                .iter()
                .zip(monomials)
                .fold(Polynomial::zero(arity), |acc, (b, m)| {
                    &acc + &Polynomial::from_monomial(m, b.clone())
                });
            points.iter().enumerate().all(|(s, p)| {
                let at: Vec<BigRational> = p.iter().map(|v| int(*v)).collect();
                term.eval(&at) == if i == s { int(1) } else { int(0) }
            })
        })
    }

    #[test]
    fn two_point_line_basis() {
        // Monomials [x, 1] at x = 0 and x = 1: V = [[0, 1], [1, 1]], det -1.
        let monomials = enumerate_monomials(1, 1);
        let points = vec![vec![0], vec![1]];
        let raw = interpolation_basis(&points, &monomials).unwrap().unwrap();
        assert_eq!(raw.determinant, BigInt::from(-1));
        let basis = Basis::from_adjugate(&raw, 2).unwrap();
        // Row 0 is 1 - x, row 1 is x.
        assert_eq!(basis.rows()[0], vec![int(-1), int(1)]);
        assert_eq!(basis.rows()[1], vec![int(1), int(0)]);
        assert_eq!(basis.determinant_sign(), Sign::Minus);
        assert_eq!(basis.determinant_magnitude(), BigInt::from(1));
    }

    #[test]
    fn quadratic_basis_has_reduced_fractions() {
        let monomials = enumerate_monomials(1, 2);
        let points = vec![vec![0], vec![1], vec![2]];
        let basis = basis_for(&points, &monomials);
        // Lagrange polynomial for x = 0 is (x-1)(x-2)/2 = x^2/2 - 3x/2 + 1.
        assert_eq!(
            basis.rows()[0],
            vec![
                BigRational::new(BigInt::from(1), BigInt::from(2)),
                BigRational::new(BigInt::from(-3), BigInt::from(2)),
                int(1)
            ]
        );
        assert!(lagrange_holds(&points, &monomials));
    }

    #[test]
    fn lagrange_property_in_two_variables() {
        let monomials = enumerate_monomials(2, 2);
        let points = vec![
            vec![0, 0],
            vec![1, 0],
            vec![0, 1],
            vec![2, 0],
            vec![1, 1],
            vec![0, 2],
        ];
        assert!(lagrange_holds(&points, &monomials));
    }

    #[test]
    fn singular_points_are_reported() {
        let monomials = enumerate_monomials(1, 1);
        assert_eq!(interpolation_basis(&[vec![3], vec![3]], &monomials), Ok(None));
        // Collinear points cannot carry a quadratic in two variables.
        let monomials = enumerate_monomials(2, 2);
        let points: Vec<Vec<i64>> = (0..6).map(|i| vec![i, i]).collect();
        assert_eq!(interpolation_basis(&points, &monomials), Ok(None));
    }

    #[test]
    fn dimension_mismatches_are_errors() {
        let monomials = enumerate_monomials(1, 1);
        assert!(matches!(
            interpolation_basis(&[vec![0]], &monomials),
            Err(AlgebraError::DimensionMismatch { .. })
        ));
        let raw = AdjugateBasis {
            determinant: BigInt::from(1),
            entries: vec![BigInt::from(1)],
        };
        assert!(Basis::from_adjugate(&raw, 2).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn lagrange_property_on_distinct_line_points(mut xs in prop::collection::hash_set(-6i64..6, 4)) {
                let points: Vec<Vec<i64>> = xs.drain().map(|x| vec![x]).collect();
                let monomials = enumerate_monomials(1, 3);
                prop_assert!(lagrange_holds(&points, &monomials));
            }
        }
    }
}
