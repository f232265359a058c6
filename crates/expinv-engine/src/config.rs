use expinv_smt::backends::process_backend::SolverKind;
use expinv_smt::backends::redlog_backend::Theory;
use serde::Serialize;

use crate::cases::DEFAULT_CASE;
use crate::error::EngineError;
use crate::sample::RankingPolicy;

/// Everything one synthesis run needs besides the external programs.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    /// Built-in case name.
    pub case: String,
    pub pre: String,
    pub post: String,
    /// Optional variable names; when given they must match the case.
    pub variables: Option<Vec<String>>,
    pub degree: u32,
    /// Shared sampling box `[lower, upper]` for every variable.
    pub lower_bound: i64,
    pub upper_bound: i64,
    pub skewness: f64,
    pub theory: Theory,
    pub ranking: RankingPolicy,
    pub max_rounds: usize,
    pub max_basis_probes: usize,
    /// Wall-clock budget per attempt in seconds; `0` is unlimited.
    pub timeout_secs: u64,
    /// Attempts allowed after timeouts, at least one.
    pub attempts: usize,
    pub seed: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            case: DEFAULT_CASE.to_string(),
            pre: "x*(y-x)".to_string(),
            post: "n".to_string(),
            variables: None,
            degree: 2,
            lower_bound: 0,
            upper_bound: 3,
            skewness: 0.65,
            theory: Theory::Ofsf,
            ranking: RankingPolicy::TightestFirst,
            max_rounds: 100,
            max_basis_probes: 500,
            timeout_secs: 0,
            attempts: 1,
            seed: 0,
        }
    }
}

impl SynthesisConfig {
    /// Reject settings no run could use. Called before any external
    /// program is started.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: String| Err(EngineError::InvalidConfiguration(message));
        if !(0.0..1.0).contains(&self.skewness) {
            return invalid(format!("skewness must lie in [0, 1), got {}", self.skewness));
        }
        if self.pre.trim().is_empty() {
            return invalid("pre-expectation is empty".into());
        }
        if self.post.trim().is_empty() {
            return invalid("post-expectation is empty".into());
        }
        if self.lower_bound > self.upper_bound {
            return invalid(format!(
                "sampling bounds [{}, {}] are empty",
                self.lower_bound, self.upper_bound
            ));
        }
        if self.max_rounds == 0 {
            return invalid("max rounds must be positive".into());
        }
        if self.max_basis_probes == 0 {
            return invalid("max basis probes must be positive".into());
        }
        if self.attempts == 0 {
            return invalid("at least one attempt is required".into());
        }
        if let Some(vars) = &self.variables {
            if vars.is_empty() || vars.iter().any(|v| v.trim().is_empty()) {
                return invalid("variable names must be non-empty".into());
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            case: self.case.clone(),
            pre: self.pre.clone(),
            post: self.post.clone(),
            degree: self.degree,
            bounds: (self.lower_bound, self.upper_bound),
            skewness: self.skewness,
            theory: self.theory.to_string(),
            ranking: self.ranking,
            seed: self.seed,
        }
    }
}

/// The settings echoed in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub case: String,
    pub pre: String,
    pub post: String,
    pub degree: u32,
    pub bounds: (i64, i64),
    pub skewness: f64,
    pub theory: String,
    pub ranking: RankingPolicy,
    pub seed: u64,
}

/// Command lines of the external programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTools {
    pub solver: SolverKind,
    /// Overrides the solver's default program.
    pub solver_command: Option<String>,
    pub reduce_command: String,
    /// Linear-algebra script; exact in-process elimination when absent.
    pub linalg_command: Option<String>,
    /// Arithmetic evaluator; exact in-process evaluation when absent.
    pub evaluator_command: Option<String>,
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self {
            solver: SolverKind::Z3,
            solver_command: None,
            reduce_command: "reduce".to_string(),
            linalg_command: None,
            evaluator_command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SynthesisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.case, "random-walk-v2");
        assert_eq!((config.lower_bound, config.upper_bound), (0, 3));
        assert_eq!(config.theory, Theory::Ofsf);
    }

    #[test]
    fn skewness_outside_unit_interval_is_rejected() {
        for skewness in [1.0, -0.1, f64::NAN] {
            let config = SynthesisConfig {
                skewness,
                ..SynthesisConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(EngineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn empty_settings_are_rejected() {
        let cases = [
            SynthesisConfig {
                pre: " ".into(),
                ..SynthesisConfig::default()
            },
            SynthesisConfig {
                lower_bound: 4,
                ..SynthesisConfig::default()
            },
            SynthesisConfig {
                attempts: 0,
                ..SynthesisConfig::default()
            },
            SynthesisConfig {
                variables: Some(vec![]),
                ..SynthesisConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }
}
