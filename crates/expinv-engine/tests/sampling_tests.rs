//! Statistical and boundary behaviour of the basis sampler.

use expinv_algebra::enumerate_monomials;
use expinv_engine::budget::Budget;
use expinv_engine::cases::find_case;
use expinv_engine::expr::ExprError;
use expinv_engine::formula::Formula;
use expinv_engine::oracle::{Expectations, PointCheck, RecurrenceOracle};
use expinv_engine::sample::{build_sample_space, RankingPolicy};
use expinv_engine::sampler::{draw_index, sample_weights, BasisSearch};
use expinv_engine::services::NativeLinearAlgebra;
use num::rational::BigRational;
use num::traits::Zero;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn equal_weights_are_drawn_uniformly() {
    let mut rng = StdRng::seed_from_u64(2024);
    let weights = [1.0; 4];
    let draws = 40_000;
    let mut counts = [0usize; 4];
    for _ in 0..draws {
        counts[draw_index(&mut rng, &weights)] += 1;
    }
    for count in counts {
        let frequency = count as f64 / draws as f64;
        assert!((frequency - 0.25).abs() < 0.02, "{counts:?}");
    }
}

#[test]
fn heavier_weights_are_drawn_more_often() {
    let mut rng = StdRng::seed_from_u64(5);
    let weights = [1.0, 3.0];
    let heavy = (0..10_000).filter(|_| draw_index(&mut rng, &weights) == 1).count();
    assert!((7_000..8_000).contains(&heavy), "{heavy}");
}

#[test]
fn default_case_sample_space_supports_a_basis() {
    let case = find_case("random-walk-v2").unwrap();
    let expectations = Expectations::new("x*(y-x)", "n", case.variables).unwrap();
    let monomials = enumerate_monomials(3, 2);
    let samples = build_sample_space(
        case,
        &expectations,
        (0, 3),
        monomials.len(),
        RankingPolicy::TightestFirst,
    )
    .unwrap();
    assert!(samples.len() >= monomials.len());
    assert!(samples[0].is_pinned() || samples[0].tightness().is_some());
    let weights = sample_weights(&samples, 0.65);
    assert!(weights.iter().all(|w| *w > 0.0 && *w <= 1.0), "{weights:?}");

    let search = BasisSearch {
        degree: 2,
        monomials: &monomials,
        skewness: 0.65,
        max_probes: 500,
    };
    let selection = search
        .run(
            &samples,
            &mut StdRng::seed_from_u64(3),
            &mut NativeLinearAlgebra,
            &mut Budget::unlimited(),
        )
        .unwrap();
    assert_eq!(selection.points.len(), 10);
    assert!(!selection.basis.determinant().is_zero());
    assert!(selection.probes >= 1);
}

/// Pins the invariant to the value of the single variable.
struct Pinned;

impl RecurrenceOracle for Pinned {
    fn name(&self) -> &str {
        "pinned"
    }

    fn variables(&self) -> &[&'static str] {
        &["x"]
    }

    fn domain(&self) -> &str {
        "x>=0"
    }

    fn check(&self, point: &[i64], _expectations: &Expectations) -> Result<Option<PointCheck>, ExprError> {
        let value = BigRational::from_integer(point[0].into());
        let mut check = PointCheck::new(Some(value.clone()));
        check.upper = Some(value);
        Ok(Some(check))
    }

    fn rule(&self, _pre: &str, _post: &str) -> Formula {
        Formula::atom("I[x]==x")
    }
}

#[test]
fn pinned_oracle_gives_a_first_draw_basis() {
    let expectations = Expectations::new("x", "x", &["x"]).unwrap();
    let samples = build_sample_space(&Pinned, &expectations, (0, 3), 1, RankingPolicy::TightestFirst).unwrap();
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| s.tightness() == Some(BigRational::zero())));

    for degree in 0..=3 {
        let monomials = enumerate_monomials(1, degree);
        let search = BasisSearch {
            degree,
            monomials: &monomials,
            skewness: 0.65,
            max_probes: 1,
        };
        let selection = search
            .run(
                &samples,
                &mut StdRng::seed_from_u64(u64::from(degree)),
                &mut NativeLinearAlgebra,
                &mut Budget::unlimited(),
            )
            .unwrap();
        assert_eq!(selection.probes, 1);
    }
}
