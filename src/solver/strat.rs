//! # Weight Stratification
//!
//! Strategies for choosing the working weight: stepping to the next-smaller
//! distinct soft clause weight, stepping further until enough clause/weight
//! diversity is reached, and varying resolution, which takes soft clauses in
//! power-of-factor weight slices.

use rustsat::{instances::ManageVars, types::RsHashSet};

use crate::formula::Formula;

/// Required ratio between the number of considered clauses and the number of
/// distinct weights among them
const ALPHA: f32 = 1.25;

/// Finds the greatest soft clause weight strictly smaller than `weight`, or 1
/// if there is none.
pub(crate) fn find_next_weight<VM: ManageVars>(formula: &Formula<VM>, weight: usize) -> usize {
    let mut next_weight = 1;
    for soft in formula.softs() {
        if soft.weight > next_weight && soft.weight < weight {
            next_weight = soft.weight;
        }
    }
    next_weight
}

/// Finds the next working weight that satisfies the diversity heuristic:
/// starting from the current weight, steps to the next-smaller distinct
/// weight until the clause/weight ratio exceeds [`ALPHA`] and the number of
/// considered clauses grew beyond `nb_current_soft`, or until all remaining
/// soft clauses are considered.
///
/// The very first call after the initial satisfiability check skips the
/// initial step so that the topmost stratum is considered on its own.
pub(crate) fn find_next_weight_diversity<VM: ManageVars>(
    formula: &Formula<VM>,
    weight: usize,
    nb_satisfiable: usize,
    nb_current_soft: usize,
    n_real_soft: usize,
) -> usize {
    debug_assert!(nb_satisfiable > 0);

    let mut next_weight = weight;
    let mut step = nb_satisfiable > 1;
    loop {
        if step {
            next_weight = find_next_weight(formula, next_weight);
        }
        let (nb_clauses, nb_weights) = count_at_least(formula, next_weight);
        if (nb_clauses as f32 / nb_weights as f32 > ALPHA && nb_clauses > nb_current_soft)
            || nb_clauses == n_real_soft
        {
            return next_weight;
        }
        step = true;
    }
}

/// Whether a weight candidate admits enough soft clauses for the diversity
/// heuristic
pub(crate) fn enough_softs_above<VM: ManageVars>(
    formula: &Formula<VM>,
    weight_cand: usize,
    n_real_soft: usize,
) -> bool {
    let (nb_clauses, nb_weights) = count_at_least(formula, weight_cand);
    nb_clauses as f32 / nb_weights as f32 > ALPHA || nb_clauses == n_real_soft
}

/// The number of soft clauses at weight >= `weight_cand`
pub(crate) fn more_than_weight<VM: ManageVars>(formula: &Formula<VM>, weight_cand: usize) -> usize {
    formula
        .softs()
        .filter(|soft| soft.weight >= weight_cand)
        .count()
}

fn count_at_least<VM: ManageVars>(formula: &Formula<VM>, weight_cand: usize) -> (usize, usize) {
    let mut nb_clauses = 0;
    let mut weights = RsHashSet::default();
    for soft in formula.softs() {
        if soft.weight >= weight_cand {
            nb_clauses += 1;
            weights.insert(soft.weight);
        }
    }
    (nb_clauses, weights.len())
}

/// Resets the working weight to the maximum weight currently present among
/// the soft clauses
pub(crate) fn reset_max_weight<VM: ManageVars>(formula: &mut Formula<VM>) {
    let mut max_weight = 1;
    for soft in formula.softs() {
        if soft.weight > max_weight {
            max_weight = soft.weight;
        }
    }
    formula.set_max_weight(max_weight);
}

/// Initialises the varying-resolution working weight: the largest power of
/// the division factor not exceeding the maximum soft clause weight, divided
/// down until the diversity predicate holds.
pub(crate) fn init_division_factor<VM: ManageVars>(
    formula: &mut Formula<VM>,
    factor: usize,
    n_real_soft: usize,
) {
    debug_assert!(factor >= 2);
    reset_max_weight(formula);

    let mut max_weight = formula.max_weight();
    let mut exponent = 0u32;
    while max_weight > 0 {
        exponent += 1;
        max_weight /= factor;
    }
    let mut weight_cand = factor.pow(exponent - 1);
    while !enough_softs_above(formula, weight_cand, n_real_soft) && weight_cand > 1 {
        weight_cand /= factor;
    }
    formula.set_max_weight(weight_cand);
}

/// Advances the varying-resolution working weight by one or more divisions
/// until the diversity predicate holds
pub(crate) fn update_division_factor<VM: ManageVars>(
    formula: &mut Formula<VM>,
    factor: usize,
    n_real_soft: usize,
) {
    let mut next_factor = formula.max_weight() / factor;
    while !enough_softs_above(formula, next_factor, n_real_soft) && next_factor > 1 {
        next_factor /= factor;
    }
    formula.set_max_weight(std::cmp::max(next_factor, 1));
}

/// Advances the varying-resolution working weight for the linear phase:
/// divides while the division does not bring any new soft clause into the
/// objective
pub(crate) fn update_division_factor_linear<VM: ManageVars>(
    formula: &mut Formula<VM>,
    factor: usize,
    nb_current_soft: usize,
) {
    let mut next_factor = formula.max_weight() / factor;
    while more_than_weight(formula, next_factor) == nb_current_soft && next_factor > 1 {
        next_factor /= factor;
    }
    formula.set_max_weight(std::cmp::max(next_factor, 1));
}

#[cfg(test)]
mod tests {
    use rustsat::{
        clause,
        instances::{BasicVarManager, Cnf},
        types::Lit,
        var,
    };

    use super::*;
    use crate::formula::Formula;

    fn formula_with_weights(weights: &[usize]) -> Formula<BasicVarManager> {
        let softs: Vec<_> = weights
            .iter()
            .enumerate()
            .map(|(idx, &w)| (clause![Lit::positive(idx as u32)], w))
            .collect();
        let vm = BasicVarManager::from_next_free(var![weights.len() as u32]);
        Formula::standardized(Cnf::new(), softs, vm)
    }

    #[test]
    fn next_weight_steps_through_distinct_weights() {
        let formula = formula_with_weights(&[100, 100, 50, 50, 50, 10, 10, 10, 10, 10]);
        assert_eq!(find_next_weight(&formula, 101), 100);
        assert_eq!(find_next_weight(&formula, 100), 50);
        assert_eq!(find_next_weight(&formula, 50), 10);
        assert_eq!(find_next_weight(&formula, 10), 1);
    }

    #[test]
    fn diversity_sequence() {
        let formula = formula_with_weights(&[100, 100, 50, 50, 50, 10, 10, 10, 10, 10]);

        // first call after the initial satisfiability check stays at the top
        // stratum: 2 clauses over 1 weight
        let first = find_next_weight_diversity(&formula, 100, 1, 0, 10);
        assert_eq!(first, 100);
        // 5 clauses over 2 weights
        let second = find_next_weight_diversity(&formula, first, 2, 2, 10);
        assert_eq!(second, 50);
        // 10 clauses over 3 weights, ratio 10/3 > 1.25
        let third = find_next_weight_diversity(&formula, second, 3, 5, 10);
        assert_eq!(third, 10);
    }

    #[test]
    fn diversity_skips_sparse_strata() {
        // a lone top weight fails the ratio test until more strata are pulled in
        let formula = formula_with_weights(&[64, 32, 32, 16, 16]);
        let first = find_next_weight_diversity(&formula, 64, 1, 0, 5);
        assert_eq!(first, 32);
    }

    #[test]
    fn division_factor_initialisation() {
        let formula = &mut formula_with_weights(&[100, 100, 50, 50, 50, 10, 10, 10, 10, 10]);
        init_division_factor(formula, 2, 10);
        // 64 admits only the two weight-100 clauses: 2 / 1 > 1.25 holds
        assert_eq!(formula.max_weight(), 64);

        // the top power 9 admits a single clause and fails the ratio test
        let formula = &mut formula_with_weights(&[9, 3, 3, 1, 1, 1]);
        init_division_factor(formula, 3, 6);
        assert_eq!(formula.max_weight(), 3);
    }

    #[test]
    fn division_factor_advances() {
        let formula = &mut formula_with_weights(&[9, 3, 3, 1, 1, 1]);
        formula.set_max_weight(9);
        update_division_factor(formula, 3, 6);
        assert_eq!(formula.max_weight(), 3);
        update_division_factor(formula, 3, 6);
        assert_eq!(formula.max_weight(), 1);
    }

    #[test]
    fn linear_division_skips_empty_slices() {
        let formula = &mut formula_with_weights(&[8, 8, 1, 1]);
        formula.set_max_weight(8);
        // dividing to 4 and 2 brings in no new clause, so the update drops
        // straight to 1
        update_division_factor_linear(formula, 2, 2);
        assert_eq!(formula.max_weight(), 1);
    }

    #[test]
    fn reset_restores_maximum() {
        let formula = &mut formula_with_weights(&[7, 3]);
        formula.set_max_weight(3);
        reset_max_weight(formula);
        assert_eq!(formula.max_weight(), 7);
    }
}
