//! Outcome of a synthesis run, for humans and for `--format json`.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::ConfigSummary;
use crate::sample::SampleSummary;
use crate::services::Assignment;

/// How a completed attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The candidate was certified by quantifier elimination.
    Proved,
    /// A candidate was refuted but no counterexample could be extracted.
    Unknown,
    /// The learned constraints admit no coefficients at all.
    NoInvariantExists,
    /// The round limit was reached first.
    Exhausted,
}

impl Verdict {
    /// Process exit status for this verdict.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Proved => 0,
            Verdict::Unknown => 2,
            Verdict::NoInvariantExists => 3,
            Verdict::Exhausted => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Proved => "proved",
            Verdict::Unknown => "unknown",
            Verdict::NoInvariantExists => "no_invariant_exists",
            Verdict::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time per stage, in milliseconds, summed over attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub sample_space_ms: u64,
    pub basis_search_ms: u64,
    pub guessing_ms: u64,
    pub ground_checks_ms: u64,
    pub certification_ms: u64,
    pub total_ms: u64,
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl StageTimings {
    pub fn absorb(&mut self, other: &StageTimings) {
        self.sample_space_ms += other.sample_space_ms;
        self.basis_search_ms += other.basis_search_ms;
        self.guessing_ms += other.guessing_ms;
        self.ground_checks_ms += other.ground_checks_ms;
        self.certification_ms += other.certification_ms;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub attempts: usize,
    pub rounds: usize,
    pub basis_probes: usize,
    pub learned_constraints: usize,
    pub counterexamples: usize,
}

/// Everything `expinv synth` prints.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisReport {
    pub config: ConfigSummary,
    pub variables: Vec<String>,
    /// The inference rule for the configured expectations.
    pub rule: String,
    pub verdict: Verdict,
    /// Anchors of the last basis, in coefficient order.
    pub basis_points: Vec<SampleSummary>,
    pub template: Option<String>,
    /// The last guess, zero-valued coefficients included.
    pub coefficients: Assignment,
    /// The certified invariant.
    pub invariant: Option<String>,
    /// The last refuted candidate when nothing was certified.
    pub candidate: Option<String>,
    pub counterexamples: Vec<Vec<i64>>,
    pub timings: StageTimings,
    pub counters: Counters,
}

impl SynthesisReport {
    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }
}

impl fmt::Display for SynthesisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Case:        {}", self.config.case)?;
        writeln!(f, "Variables:   {}", self.variables.join(","))?;
        writeln!(f, "Pre:         {}", self.config.pre)?;
        writeln!(f, "Post:        {}", self.config.post)?;
        writeln!(f, "Rule:        {}", self.rule)?;
        writeln!(
            f,
            "Sampling:    degree {}, bounds [{}, {}], skewness {}, theory {}",
            self.config.degree,
            self.config.bounds.0,
            self.config.bounds.1,
            self.config.skewness,
            self.config.theory
        )?;
        if !self.basis_points.is_empty() {
            writeln!(f, "Basis points:")?;
            for (i, sample) in self.basis_points.iter().enumerate() {
                writeln!(f, "  I_{}_  {sample}", i + 1)?;
            }
        }
        if let Some(template) = &self.template {
            writeln!(f, "Template:    {template}")?;
        }
        if !self.coefficients.is_empty() {
            let coefficients: Vec<String> = self
                .coefficients
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            writeln!(f, "Coefficients: {}", coefficients.join(" "))?;
        }
        for point in &self.counterexamples {
            writeln!(f, "Counterexample: {point:?}")?;
        }
        match (self.verdict, &self.invariant, &self.candidate) {
            (Verdict::Proved, Some(invariant), _) => writeln!(f, "Invariant:   {invariant}")?,
            (Verdict::NoInvariantExists, _, _) => writeln!(f, "Invariant:   None")?,
            (Verdict::Unknown, _, candidate) => {
                writeln!(f, "Invariant:   Unknown")?;
                if let Some(candidate) = candidate {
                    writeln!(f, "Unproved:    {candidate}")?;
                }
            }
            (_, _, candidate) => {
                writeln!(f, "Invariant:   not found")?;
                if let Some(candidate) = candidate {
                    writeln!(f, "Unproved:    {candidate}")?;
                }
            }
        }
        writeln!(f, "Verdict:     {}", self.verdict)?;
        writeln!(
            f,
            "Counters:    {} attempt(s), {} round(s), {} basis probe(s), {} learned constraint(s), {} counterexample(s)",
            self.counters.attempts,
            self.counters.rounds,
            self.counters.basis_probes,
            self.counters.learned_constraints,
            self.counters.counterexamples
        )?;
        write!(
            f,
            "Timings:     sample space {}ms, basis {}ms, guessing {}ms, ground checks {}ms, certification {}ms, total {}ms",
            self.timings.sample_space_ms,
            self.timings.basis_search_ms,
            self.timings.guessing_ms,
            self.timings.ground_checks_ms,
            self.timings.certification_ms,
            self.timings.total_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;

    fn report(verdict: Verdict) -> SynthesisReport {
        let mut coefficients = Assignment::new();
        coefficients.insert("I_1_".into(), 0);
        coefficients.insert("I_2_".into(), 3);
        SynthesisReport {
            config: SynthesisConfig::default().summary(),
            variables: vec!["x".into(), "y".into(), "n".into()],
            rule: "And(...)".into(),
            verdict,
            basis_points: vec![SampleSummary {
                point: vec![0, 1, 2],
                lower: Some("0".into()),
                upper: Some("2".into()),
            }],
            template: Some("I_1_*(x)".into()),
            coefficients,
            invariant: (verdict == Verdict::Proved).then(|| "x*y-x^2+n".to_string()),
            candidate: None,
            counterexamples: Vec::new(),
            timings: StageTimings::default(),
            counters: Counters::default(),
        }
    }

    #[test]
    fn exit_codes_distinguish_every_verdict() {
        let codes: Vec<i32> = [
            Verdict::Proved,
            Verdict::Unknown,
            Verdict::NoInvariantExists,
            Verdict::Exhausted,
        ]
        .iter()
        .map(|v| v.exit_code())
        .collect();
        assert_eq!(codes, vec![0, 2, 3, 4]);
    }

    #[test]
    fn text_report_lists_zero_coefficients() {
        let text = report(Verdict::Proved).to_string();
        assert!(text.contains("Coefficients: I_1_=0 I_2_=3"), "{text}");
        assert!(text.contains("Invariant:   x*y-x^2+n"));
        assert!(text.contains("I_1_  [ 0  1  2 ]  lower=0 upper=2"), "{text}");
    }

    #[test]
    fn negative_outcomes_are_spelled_distinctly() {
        assert!(report(Verdict::NoInvariantExists).to_string().contains("Invariant:   None"));
        assert!(report(Verdict::Unknown).to_string().contains("Invariant:   Unknown"));
    }

    #[test]
    fn json_uses_snake_case_verdicts() {
        let json = serde_json::to_value(report(Verdict::NoInvariantExists)).unwrap();
        assert_eq!(json["verdict"], "no_invariant_exists");
        assert_eq!(json["coefficients"]["I_1_"], 0);
        assert_eq!(json["config"]["ranking"], "tightest-first");
    }
}
