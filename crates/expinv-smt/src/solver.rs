use std::collections::HashMap;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A model (variable assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the script and answers from a fixed model.
    struct MockSolver {
        script: Vec<String>,
        answer: SatResult,
        model: Model,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock failure")]
    struct MockError;

    impl SmtSolver for MockSolver {
        type Error = MockError;

        fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), MockError> {
            self.script.push(format!("declare {name} {sort}"));
            Ok(())
        }

        fn assert(&mut self, term: &SmtTerm) -> Result<(), MockError> {
            self.script.push(format!("assert {term:?}"));
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, MockError> {
            Ok(self.answer.clone())
        }

        fn check_sat_with_model(
            &mut self,
            var_names: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), MockError> {
            let result = self.check_sat()?;
            if result != SatResult::Sat {
                return Ok((result, None));
            }
            let mut values = HashMap::new();
            for (name, _) in var_names {
                if let Some(v) = self.model.values.get(*name) {
                    values.insert(name.to_string(), v.clone());
                }
            }
            Ok((SatResult::Sat, Some(Model { values })))
        }
    }

    #[test]
    fn model_lookup_by_sort() {
        let mut model = Model::default();
        model.values.insert("x".into(), ModelValue::Int(-4));
        model.values.insert("p".into(), ModelValue::Bool(true));
        assert_eq!(model.get_int("x"), Some(-4));
        assert_eq!(model.get_int("p"), None);
        assert_eq!(model.get_int("missing"), None);
    }

    #[test]
    fn trait_object_flow_returns_requested_values_only() {
        let mut model = Model::default();
        model.values.insert("a".into(), ModelValue::Int(1));
        model.values.insert("b".into(), ModelValue::Int(2));
        let mut solver = MockSolver {
            script: Vec::new(),
            answer: SatResult::Sat,
            model,
        };
        solver.declare_var("a", &SmtSort::Int).unwrap();
        solver.assert(&SmtTerm::var("a").ge(SmtTerm::int(0))).unwrap();
        let (result, model) = solver.check_sat_with_model(&[("a", &SmtSort::Int)]).unwrap();
        assert_eq!(result, SatResult::Sat);
        let model = model.unwrap();
        assert_eq!(model.get_int("a"), Some(1));
        assert_eq!(model.get_int("b"), None);
        assert_eq!(solver.script.len(), 2);
    }
}
