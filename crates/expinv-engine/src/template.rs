//! The symbolic invariant template `sum_i I_i_ * r_i`.
//!
//! Row polynomial `r_i = sum_j basis[i][j] * m_j` is one at anchor `i`
//! and zero at every other anchor, so the template takes the value of
//! coefficient `I_i_` at anchor `i`.

use expinv_algebra::{Basis, BigInt, BigRational, Monomial, Polynomial};
use num::traits::Zero;

use crate::error::EngineError;
use crate::expr::Expr;
use crate::services::Assignment;

/// Name of the `index`-th coefficient (zero based): `I_1_`, `I_2_`, ...
pub fn coefficient_name(index: usize) -> String {
    format!("I_{}_", index + 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    variables: Vec<String>,
    anchors: Vec<Vec<i64>>,
    rows: Vec<Polynomial>,
}

impl Template {
    pub fn new<S: AsRef<str>>(
        basis: &Basis,
        monomials: &[Monomial],
        anchors: Vec<Vec<i64>>,
        variables: &[S],
    ) -> Result<Self, EngineError> {
        let arity = variables.len();
        if basis.size() != monomials.len() || anchors.len() != monomials.len() {
            return Err(EngineError::InvalidConfiguration(format!(
                "basis of size {} for {} monomials and {} anchors",
                basis.size(),
                monomials.len(),
                anchors.len()
            )));
        }
        let rows = basis
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(monomials)
                    .fold(Polynomial::zero(arity), |acc, (c, m)| {
                        &acc + &Polynomial::from_monomial(m, c.clone())
                    })
            })
            .collect();
        Ok(Self {
            variables: variables.iter().map(|v| v.as_ref().to_string()).collect(),
            anchors,
            rows,
        })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn anchors(&self) -> &[Vec<i64>] {
        &self.anchors
    }

    pub fn rows(&self) -> &[Polynomial] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Anchor coefficient names in order.
    pub fn coefficients(&self) -> Vec<String> {
        (0..self.rows.len()).map(coefficient_name).collect()
    }

    /// Coefficient bound to `point` when it is an anchor.
    pub fn anchor_coefficient(&self, point: &[i64]) -> Option<String> {
        self.anchors
            .iter()
            .position(|a| a.as_slice() == point)
            .map(coefficient_name)
    }

    /// The template at an integer point: `sum_k I_k_ * r_k(point)`, still
    /// linear in the coefficients.
    pub fn linear_form_at(&self, point: &[i64]) -> Expr {
        let values: Vec<BigRational> = point
            .iter()
            .map(|v| BigRational::from_integer(BigInt::from(*v)))
            .collect();
        let terms = self
            .rows
            .iter()
            .enumerate()
            .map(|(k, row)| Expr::var(coefficient_name(k)).mul(Expr::num(row.eval(&values))))
            .collect();
        Expr::sum(terms)
    }

    /// The candidate invariant `sum_k guess_k * r_k`. Missing coefficients
    /// count as zero.
    pub fn instantiate(&self, guess: &Assignment) -> Polynomial {
        self.rows
            .iter()
            .enumerate()
            .fold(Polynomial::zero(self.variables.len()), |acc, (k, row)| {
                let value = guess.get(&coefficient_name(k)).copied().unwrap_or(0);
                if value == 0 {
                    return acc;
                }
                &acc + &row.scale(&BigRational::from_integer(BigInt::from(value)))
            })
    }

    /// Symbolic rendering `I_1_*(r_1)+I_2_*(r_2)+...`.
    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_zero())
            .map(|(k, row)| format!("{}*({})", coefficient_name(k), row.render(&self.variables)))
            .collect();
        if parts.is_empty() {
            "0".to_string()
        } else {
            parts.join("+")
        }
    }

    /// Whether `r_i(anchor_s) == [i == s]` for every pair.
    pub fn interpolates_anchors(&self) -> bool {
        self.anchors.iter().enumerate().all(|(s, anchor)| {
            let point: Vec<BigRational> = anchor
                .iter()
                .map(|v| BigRational::from_integer(BigInt::from(*v)))
                .collect();
            self.rows.iter().enumerate().all(|(i, row)| {
                let value = row.eval(&point);
                if i == s {
                    value == BigRational::from_integer(BigInt::from(1))
                } else {
                    value.is_zero()
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expr;
    use expinv_algebra::{enumerate_monomials, interpolation_basis};
    use proptest::prelude::*;

    fn template_for(points: &[Vec<i64>], vars: &[&str], degree: u32) -> Option<Template> {
        let monomials = enumerate_monomials(vars.len(), degree);
        let raw = interpolation_basis(points, &monomials).unwrap()?;
        let basis = Basis::from_adjugate(&raw, monomials.len()).unwrap();
        Some(Template::new(&basis, &monomials, points.to_vec(), vars).unwrap())
    }

    #[test]
    fn linear_template_through_two_points() {
        let t = template_for(&[vec![0], vec![2]], &["x"], 1).unwrap();
        assert!(t.interpolates_anchors());
        assert_eq!(t.render(), "I_1_*(-(1/2)*x+1)+I_2_*((1/2)*x)");
        assert_eq!(t.coefficients(), vec!["I_1_", "I_2_"]);
        assert_eq!(t.anchor_coefficient(&[2]).as_deref(), Some("I_2_"));
        assert_eq!(t.anchor_coefficient(&[1]), None);
    }

    #[test]
    fn linear_form_at_a_non_anchor_mixes_coefficients() {
        let t = template_for(&[vec![0], vec![2]], &["x"], 1).unwrap();
        let value = t.linear_form_at(&[1]);
        let env = |name: &str| match name {
            "I_1_" => Some(BigRational::from_integer(4.into())),
            "I_2_" => Some(BigRational::from_integer(8.into())),
            _ => None,
        };
        assert_eq!(value.eval(&env).unwrap(), BigRational::from_integer(6.into()));
    }

    #[test]
    fn instantiation_reproduces_the_guess_at_anchors() {
        let points = vec![vec![0, 0], vec![1, 0], vec![0, 1]];
        let t = template_for(&points, &["x", "n"], 1).unwrap();
        let mut guess = Assignment::new();
        guess.insert("I_1_".into(), 3);
        guess.insert("I_2_".into(), 5);
        guess.insert("I_3_".into(), 0);
        let p = t.instantiate(&guess);
        assert_eq!(p.render(&["x", "n"]), "2*x-3*n+3");
        let expr = parse_expr(&p.render(&["x", "n"])).unwrap();
        assert_eq!(expr.to_polynomial(&["x", "n"]).unwrap(), p);
    }

    #[test]
    fn empty_guess_is_the_zero_polynomial() {
        let t = template_for(&[vec![0], vec![1]], &["x"], 1).unwrap();
        assert!(t.instantiate(&Assignment::new()).is_zero());
    }

    proptest! {
        #[test]
        fn lagrange_property_holds_on_random_points(
            raw in proptest::collection::vec((-3i64..=3, -3i64..=3), 6)
        ) {
            let points: Vec<Vec<i64>> = raw.iter().map(|(a, b)| vec![*a, *b]).collect();
            if let Some(t) = template_for(&points, &["x", "y"], 2) {
                prop_assert!(t.interpolates_anchors());
                for (s, anchor) in points.iter().enumerate() {
                    let form = t.linear_form_at(anchor);
                    let env = |name: &str| {
                        Some(BigRational::from_integer(BigInt::from(
                            i64::from(name == coefficient_name(s)),
                        )))
                    };
                    prop_assert_eq!(form.eval(&env).unwrap(), BigRational::from_integer(1.into()));
                }
            }
        }
    }
}
