//! Sample points and the ranked sample space.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use expinv_algebra::format_rational;
use num::rational::BigRational;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::oracle::{invariant_at, render_value, Expectations, RecurrenceOracle};

/// A point of the box with the invariant bounds the oracle derived there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub point: Vec<i64>,
    pub lower: Option<BigRational>,
    pub upper: Option<BigRational>,
    pub constraints: Vec<String>,
}

impl Sample {
    /// A sample whose equal bounds pin the invariant collapses to the
    /// single constraint `I[p]==v`.
    pub fn new(
        point: Vec<i64>,
        lower: Option<BigRational>,
        upper: Option<BigRational>,
        constraints: Vec<String>,
    ) -> Self {
        let constraints = match (&lower, &upper) {
            (Some(l), Some(u)) if l == u => vec![format!("{}=={}", invariant_at(&point), render_value(l))],
            _ => constraints,
        };
        Self {
            point,
            lower,
            upper,
            constraints,
        }
    }

    /// A counterexample point: no bounds, no constraints.
    pub fn unbounded(point: Vec<i64>) -> Self {
        Self {
            point,
            lower: None,
            upper: None,
            constraints: Vec::new(),
        }
    }

    /// `upper - lower` when both bounds are known.
    pub fn tightness(&self) -> Option<BigRational> {
        match (&self.lower, &self.upper) {
            (Some(l), Some(u)) => Some(u - l),
            _ => None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.lower.is_some() && self.lower == self.upper
    }

    pub fn summary(&self) -> SampleSummary {
        SampleSummary {
            point: self.point.clone(),
            lower: self.lower.as_ref().map(format_rational),
            upper: self.upper.as_ref().map(format_rational),
        }
    }
}

/// Report form of a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleSummary {
    pub point: Vec<i64>,
    pub lower: Option<String>,
    pub upper: Option<String>,
}

impl fmt::Display for SampleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coords: Vec<String> = self.point.iter().map(|c| format!("{c:>2}")).collect();
        write!(
            f,
            "[{} ]  lower={} upper={}",
            coords.join(" "),
            self.lower.as_deref().unwrap_or("-"),
            self.upper.as_deref().unwrap_or("-")
        )
    }
}

/// Order in which the sample space is offered to the basis sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingPolicy {
    /// Ascending tightness; samples without a defined tightness last.
    #[default]
    TightestFirst,
    /// Samples without a defined tightness first, then ascending tightness.
    UnboundedFirst,
}

impl RankingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingPolicy::TightestFirst => "tightest-first",
            RankingPolicy::UnboundedFirst => "unbounded-first",
        }
    }
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tightest-first" => Ok(RankingPolicy::TightestFirst),
            "unbounded-first" => Ok(RankingPolicy::UnboundedFirst),
            other => Err(format!(
                "unknown ranking `{other}` (expected tightest-first or unbounded-first)"
            )),
        }
    }
}

/// Stable sort of `samples` under `policy`.
pub fn rank(samples: &mut [Sample], policy: RankingPolicy) {
    samples.sort_by(|a, b| match (a.tightness(), b.tightness()) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => match policy {
            RankingPolicy::TightestFirst => Ordering::Less,
            RankingPolicy::UnboundedFirst => Ordering::Greater,
        },
        (None, Some(_)) => match policy {
            RankingPolicy::TightestFirst => Ordering::Greater,
            RankingPolicy::UnboundedFirst => Ordering::Less,
        },
        (None, None) => Ordering::Equal,
    });
}

/// Every integer point of `[lower, upper]^num_vars`, first coordinate
/// varying slowest.
pub fn box_points(num_vars: usize, lower: i64, upper: i64) -> Vec<Vec<i64>> {
    let mut points = vec![Vec::with_capacity(num_vars)];
    if lower > upper {
        return if num_vars == 0 { points } else { Vec::new() };
    }
    for _ in 0..num_vars {
        points = points
            .into_iter()
            .flat_map(|prefix| {
                (lower..=upper).map(move |v| {
                    let mut point = prefix.clone();
                    point.push(v);
                    point
                })
            })
            .collect();
    }
    points
}

/// Query the oracle on every box point, keep the feasible ones and rank
/// them. Fails when fewer than `required` points survive.
pub fn build_sample_space(
    oracle: &dyn RecurrenceOracle,
    expectations: &Expectations,
    bounds: (i64, i64),
    required: usize,
    policy: RankingPolicy,
) -> Result<Vec<Sample>, EngineError> {
    let num_vars = oracle.variables().len();
    let mut samples = Vec::new();
    for point in box_points(num_vars, bounds.0, bounds.1) {
        let Some(check) = oracle.check(&point, expectations)? else {
            continue;
        };
        if check.lower.is_none() && check.upper.is_none() {
            continue;
        }
        samples.push(Sample::new(point, check.lower, check.upper, check.constraints));
    }
    if samples.len() < required {
        return Err(EngineError::InsufficientSampleSpace {
            found: samples.len(),
            required,
        });
    }
    rank(&mut samples, policy);
    info!(
        case = oracle.name(),
        samples = samples.len(),
        pinned = samples.iter().filter(|s| s.is_pinned()).count(),
        "sample space built"
    );
    for sample in &samples {
        debug!(sample = %sample.summary(), constraints = ?sample.constraints, "sample");
    }
    Ok(samples)
}
