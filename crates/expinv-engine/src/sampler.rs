//! Weighted random search for an interpolation basis.
//!
//! Subsets of the sample space are drawn without replacement, biased
//! towards tight samples, until the linear-algebra oracle reports a
//! nonsingular Vandermonde matrix.

use expinv_algebra::arith::rational_to_f64;
use expinv_algebra::{Basis, Monomial};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::budget::Budget;
use crate::error::EngineError;
use crate::sample::Sample;
use crate::services::{BasisRequest, LinearAlgebraOracle, ServiceError};

/// Selection weight of every sample: `(1-s)^tightness`, or
/// `(1-s)^(1/(1-s))` when the tightness is undefined.
pub fn sample_weights(samples: &[Sample], skewness: f64) -> Vec<f64> {
    let base = 1.0 - skewness;
    let fallback = base.powf(1.0 / base);
    samples
        .iter()
        .map(|s| match s.tightness() {
            Some(t) => rational_to_f64(&t).map_or(0.0, |t| base.powf(t)),
            None => fallback,
        })
        .collect()
}

/// One inverse-CDF draw: an index chosen with probability proportional
/// to its weight, uniformly when all weights vanish.
pub fn draw_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return rng.gen_range(0..weights.len());
    }
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if cumulative > target {
            return index;
        }
    }
    weights.len() - 1
}

/// `count` distinct indices drawn without replacement.
pub fn weighted_subset<R: Rng + ?Sized>(rng: &mut R, weights: &[f64], count: usize) -> Vec<usize> {
    let mut live: Vec<(usize, f64)> = weights.iter().copied().enumerate().collect();
    let mut chosen = Vec::with_capacity(count.min(weights.len()));
    while chosen.len() < count && !live.is_empty() {
        let live_weights: Vec<f64> = live.iter().map(|(_, w)| *w).collect();
        let picked = draw_index(rng, &live_weights);
        chosen.push(live.remove(picked).0);
    }
    chosen
}

/// A nonsingular basis and the samples it interpolates.
#[derive(Debug, Clone)]
pub struct BasisSelection {
    /// Indices into the sample space, in anchor order.
    pub indices: Vec<usize>,
    pub points: Vec<Vec<i64>>,
    pub basis: Basis,
    /// Draws spent, including the successful one.
    pub probes: usize,
}

/// Parameters of one basis search.
#[derive(Debug, Clone, Copy)]
pub struct BasisSearch<'a> {
    pub degree: u32,
    pub monomials: &'a [Monomial],
    pub skewness: f64,
    pub max_probes: usize,
}

impl BasisSearch<'_> {
    /// Draw subsets until one is nonsingular. Running out of draws or of
    /// budget is [`EngineError::BasisSearchTimeout`].
    pub fn run<R: Rng + ?Sized>(
        &self,
        samples: &[Sample],
        rng: &mut R,
        linear_algebra: &mut dyn LinearAlgebraOracle,
        budget: &mut Budget,
    ) -> Result<BasisSelection, EngineError> {
        let size = self.monomials.len();
        if samples.len() < size {
            return Err(EngineError::InsufficientSampleSpace {
                found: samples.len(),
                required: size,
            });
        }
        let weights = sample_weights(samples, self.skewness);

        let mut probes = 0;
        while probes < self.max_probes {
            probes += 1;
            let indices = weighted_subset(rng, &weights, size);
            let points: Vec<Vec<i64>> = indices.iter().map(|&i| samples[i].point.clone()).collect();
            let request = BasisRequest {
                degree: self.degree,
                points: &points,
                monomials: self.monomials,
            };
            let raw = match budget.invoke("linear algebra", |timeout| linear_algebra.basis(&request, timeout)) {
                Ok(raw) => raw,
                Err(ServiceError::Timeout { context }) => {
                    warn!(probes, context, "basis search ran out of time");
                    return Err(EngineError::BasisSearchTimeout { probes });
                }
                Err(other) => return Err(other.into()),
            };
            match raw {
                Some(raw) => {
                    let basis = Basis::from_adjugate(&raw, size)?;
                    info!(probes, determinant = %basis.determinant(), "basis found");
                    debug!(points = ?points, "basis anchors");
                    return Ok(BasisSelection {
                        indices,
                        points,
                        basis,
                        probes,
                    });
                }
                None => debug!(probe = probes, points = ?points, "singular draw"),
            }
        }
        warn!(probes, "basis search gave up");
        Err(EngineError::BasisSearchTimeout { probes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expinv_algebra::{enumerate_monomials, AdjugateBasis};
    use num::rational::BigRational;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    use crate::services::NativeLinearAlgebra;

    fn pinned(point: Vec<i64>, value: i64) -> Sample {
        let v = BigRational::from_integer(value.into());
        Sample::new(point, Some(v.clone()), Some(v), Vec::new())
    }

    struct AlwaysSingular {
        calls: usize,
    }

    impl LinearAlgebraOracle for AlwaysSingular {
        fn basis(
            &mut self,
            _request: &BasisRequest<'_>,
            _timeout: Option<Duration>,
        ) -> Result<Option<AdjugateBasis>, ServiceError> {
            self.calls += 1;
            Ok(None)
        }
    }

    #[test]
    fn zero_skewness_weights_are_uniform() {
        let samples = vec![
            pinned(vec![0], 0),
            Sample::new(vec![1], Some(BigRational::from_integer(0.into())), None, Vec::new()),
        ];
        assert_eq!(sample_weights(&samples, 0.0), vec![1.0, 1.0]);
    }

    #[test]
    fn undefined_tightness_sits_between_pinned_and_loose() {
        let zero = BigRational::from_integer(0.into());
        let loose = Sample::new(vec![0], Some(zero.clone()), Some(BigRational::from_integer(10.into())), Vec::new());
        let unbounded = Sample::new(vec![1], Some(zero), None, Vec::new());
        let w = sample_weights(&[pinned(vec![2], 1), unbounded, loose], 0.65);
        assert_eq!(w[0], 1.0);
        assert!(w[1] < w[0] && w[1] > w[2], "{w:?}");
    }

    #[test]
    fn subsets_have_distinct_indices() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = [0.1, 5.0, 0.0, 2.0, 1.0];
        for _ in 0..100 {
            let mut subset = weighted_subset(&mut rng, &weights, 4);
            subset.sort_unstable();
            subset.dedup();
            assert_eq!(subset.len(), 4);
        }
    }

    #[test]
    fn vanishing_weights_fall_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(1);
        let picks: Vec<usize> = (0..50).map(|_| draw_index(&mut rng, &[0.0, 0.0, 0.0])).collect();
        assert!(picks.iter().all(|&i| i < 3));
    }

    #[test]
    fn pinned_box_succeeds_on_first_draw() {
        let samples: Vec<Sample> = (0..4).map(|x| pinned(vec![x], x)).collect();
        for degree in 0..=3 {
            let monomials = enumerate_monomials(1, degree);
            let search = BasisSearch {
                degree,
                monomials: &monomials,
                skewness: 0.65,
                max_probes: 500,
            };
            let mut rng = StdRng::seed_from_u64(0);
            let selection = search
                .run(&samples, &mut rng, &mut NativeLinearAlgebra, &mut Budget::unlimited())
                .unwrap();
            assert_eq!(selection.probes, 1);
            assert_eq!(selection.points.len(), monomials.len());
        }
    }

    #[test]
    fn probe_limit_is_a_basis_timeout() {
        let samples: Vec<Sample> = (0..4).map(|x| pinned(vec![x], x)).collect();
        let monomials = enumerate_monomials(1, 1);
        let search = BasisSearch {
            degree: 1,
            monomials: &monomials,
            skewness: 0.65,
            max_probes: 5,
        };
        let mut oracle = AlwaysSingular { calls: 0 };
        let err = search
            .run(&samples, &mut StdRng::seed_from_u64(0), &mut oracle, &mut Budget::unlimited())
            .unwrap_err();
        assert!(matches!(err, EngineError::BasisSearchTimeout { probes: 5 }));
        assert_eq!(oracle.calls, 5);
    }

    #[test]
    fn exhausted_budget_is_a_basis_timeout() {
        let samples: Vec<Sample> = (0..4).map(|x| pinned(vec![x], x)).collect();
        let monomials = enumerate_monomials(1, 1);
        let search = BasisSearch {
            degree: 1,
            monomials: &monomials,
            skewness: 0.65,
            max_probes: 500,
        };
        let mut oracle = AlwaysSingular { calls: 0 };
        let err = search
            .run(
                &samples,
                &mut StdRng::seed_from_u64(0),
                &mut oracle,
                &mut Budget::new(Duration::ZERO),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::BasisSearchTimeout { probes: 1 }));
        assert_eq!(oracle.calls, 0);
    }
}
