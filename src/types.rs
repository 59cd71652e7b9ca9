//! # Types
//!
//! Shared types for the solver.

use std::fmt;

use rustsat::types::{Assignment, Clause, Lit, TernaryVal};

/// A soft clause of the working formula.
///
/// After standardisation every soft clause has a unit body and, while its
/// weight is positive, an assumption literal guarding it in the oracle. A
/// weight of 0 marks the clause as hardened or subsumed; its assumption
/// literal is cleared at the same time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftClause {
    /// The remaining weight of the clause
    pub weight: usize,
    /// The assumption literal guarding the clause
    pub assump: Option<Lit>,
    /// The clause body
    pub clause: Clause,
}

impl SoftClause {
    /// Whether the clause still takes part in the search
    pub fn active(&self) -> bool {
        self.weight > 0
    }
}

/// Whether all soft clauses carry unit weight
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemType {
    Weighted,
    Unweighted,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::Weighted => write!(f, "weighted"),
            ProblemType::Unweighted => write!(f, "unweighted"),
        }
    }
}

/// Checks whether a literal is satisfied by a model.
///
/// Variables outside the range of the model read as unassigned, so the check
/// returns false instead of aborting for a model that is too short.
pub fn lit_true_in_model(model: &Assignment, lit: Lit) -> bool {
    model.lit_value(lit) == TernaryVal::True
}

/// Checks whether a model assigns a value to a literal's variable at all
pub fn lit_covered_by_model(model: &Assignment, lit: Lit) -> bool {
    model.lit_value(lit) != TernaryVal::DontCare
}

#[cfg(test)]
mod tests {
    use rustsat::{lit, types::Assignment, var};

    use super::{lit_covered_by_model, lit_true_in_model};

    #[test]
    fn model_queries() {
        let mut model = Assignment::default();
        model.assign_var(var![0], rustsat::types::TernaryVal::True);
        model.assign_var(var![1], rustsat::types::TernaryVal::False);
        assert!(lit_true_in_model(&model, lit![0]));
        assert!(!lit_true_in_model(&model, !lit![0]));
        assert!(lit_true_in_model(&model, !lit![1]));
        assert!(lit_covered_by_model(&model, lit![1]));
    }

    #[test]
    fn short_model_reads_unassigned() {
        let model = Assignment::default();
        assert!(!lit_true_in_model(&model, lit![5]));
        assert!(!lit_covered_by_model(&model, lit![5]));
    }
}
