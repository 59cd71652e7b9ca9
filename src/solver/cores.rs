//! # Core Management
//!
//! Cost computation and relaxation of unsatisfiable cores. A core is the set
//! of assumption literals the oracle reports as jointly unsatisfiable; the
//! relaxation charges the core's cost against the weights of the involved
//! soft clauses and applies the MaxSAT resolution transformation to the
//! formula store. Clauses produced here only reach the oracle on the next
//! solver update.

use rustsat::{
    clause,
    instances::ManageVars,
    types::{Clause, Lit, RsHashMap},
};

use crate::{formula::Formula, options::SearchMode, types::ProblemType};

/// Mapping from assumption literals to the index of the guarded soft clause
pub(crate) type CoreMap = RsHashMap<Lit, usize>;

/// Computes the cost of a core: the minimum weight of the soft clauses that
/// appear in it, or 1 for an unweighted formula.
pub(crate) fn core_cost<VM: ManageVars>(
    formula: &Formula<VM>,
    core_map: &CoreMap,
    conflict: &[Lit],
) -> usize {
    debug_assert!(!conflict.is_empty());

    if formula.problem_type() == ProblemType::Unweighted {
        return 1;
    }

    conflict.iter().fold(usize::MAX, |cost, lit| {
        std::cmp::min(cost, formula.soft(core_map[lit]).weight)
    })
}

/// Relaxes a core of the given cost.
///
/// The cost is subtracted from the weight of every soft clause in the core;
/// clauses whose weight reaches 0 lose their assumption literal and count as
/// subsumed. Afterwards the MaxSAT resolution transformation is applied with
/// the core's cost as the weight of the replacement soft clauses. Returns the
/// number of subsumed clauses.
pub(crate) fn relax_core<VM: ManageVars>(
    formula: &mut Formula<VM>,
    core_map: &mut CoreMap,
    conflict: &[Lit],
    core_weight: usize,
    mode: SearchMode,
) -> usize {
    debug_assert!(!conflict.is_empty());
    debug_assert!(core_weight > 0);

    let mut subsumed = 0;
    for lit in conflict {
        let soft = formula.soft_mut(core_map[lit]);
        debug_assert!(soft.weight >= core_weight);
        soft.weight -= core_weight;
        if soft.weight == 0 {
            soft.assump = None;
            subsumed += 1;
        }
    }
    encode_max_res(formula, core_map, conflict, core_weight, mode);
    subsumed
}

/// The MaxSAT resolution transformation.
///
/// For core literals `b_0 .. b_{n-1}`, introduces fresh d-variables
/// `d_0 .. d_{n-2}` encoding `d_i <-> (b_{i+1} v d_{i+1})` (with `d_{n-1}`
/// read as constant false) and one new soft clause `!b_i v !d_i` per
/// d-variable, each carrying the core's weight. In the pure core-guided mode
/// the core itself becomes a hard clause and the chain equivalences are
/// encoded in both directions; the hybrid modes drop the
/// `d_i -> (b_{i+1} v d_{i+1})` direction, which is not needed for the lower
/// bound to be sound when linear search finishes the job.
fn encode_max_res<VM: ManageVars>(
    formula: &mut Formula<VM>,
    core_map: &mut CoreMap,
    core: &[Lit],
    core_weight: usize,
    mode: SearchMode,
) {
    debug_assert!(!core.is_empty());

    let n = core.len();
    let full_encoding = mode == SearchMode::CoreGuided;
    let d_vars: Vec<Lit> = (0..n - 1).map(|_| formula.new_lit()).collect();

    if full_encoding {
        formula.add_hard(Clause::from_iter(core.iter().copied()));
    }

    if n > 2 {
        for i in 0..n - 2 {
            if full_encoding {
                formula.add_hard(clause![!d_vars[i], d_vars[i + 1], core[i + 1]]);
            }
            formula.add_hard(clause![d_vars[i], !core[i + 1]]);
            formula.add_hard(clause![d_vars[i], !d_vars[i + 1]]);
        }
    }

    if n > 1 {
        // last chain link degenerates to d_{n-2} <-> b_{n-1}
        formula.add_hard(clause![d_vars[n - 2], !core[n - 1]]);
        formula.add_hard(clause![!d_vars[n - 2], core[n - 1]]);
    }

    for i in 0..n - 1 {
        let assump = formula.add_soft(core_weight, clause![!core[i], !d_vars[i]]);
        core_map.insert(assump, formula.n_soft() - 1);
    }
}

#[cfg(test)]
mod tests {
    use rustsat::{
        clause,
        instances::{BasicVarManager, Cnf},
        types::{Lit, RsHashMap},
        var,
    };

    use super::{core_cost, relax_core, CoreMap};
    use crate::{formula::Formula, options::SearchMode};

    fn weighted_formula(weights: &[usize]) -> (Formula<BasicVarManager>, CoreMap) {
        let softs: Vec<_> = weights
            .iter()
            .enumerate()
            .map(|(idx, &w)| (clause![Lit::positive(idx as u32)], w))
            .collect();
        let vm = BasicVarManager::from_next_free(var![weights.len() as u32]);
        let formula = Formula::standardized(Cnf::new(), softs, vm);
        let mut core_map = RsHashMap::default();
        for (idx, soft) in formula.softs().enumerate() {
            core_map.insert(soft.assump.unwrap(), idx);
        }
        (formula, core_map)
    }

    fn assumps(formula: &Formula<BasicVarManager>, idxs: &[usize]) -> Vec<Lit> {
        idxs.iter()
            .map(|&idx| formula.soft(idx).assump.unwrap())
            .collect()
    }

    #[test]
    fn cost_is_minimum_weight() {
        let (formula, core_map) = weighted_formula(&[4, 7, 2]);
        let conflict = assumps(&formula, &[0, 1, 2]);
        assert_eq!(core_cost(&formula, &core_map, &conflict), 2);
        let conflict = assumps(&formula, &[0, 1]);
        assert_eq!(core_cost(&formula, &core_map, &conflict), 4);
    }

    #[test]
    fn cost_is_one_for_unweighted() {
        let (formula, core_map) = weighted_formula(&[1, 1]);
        let conflict = assumps(&formula, &[0, 1]);
        assert_eq!(core_cost(&formula, &core_map, &conflict), 1);
    }

    #[test]
    fn relax_decrements_and_subsumes() {
        let (mut formula, mut core_map) = weighted_formula(&[4, 7, 2]);
        let conflict = assumps(&formula, &[0, 1, 2]);
        let subsumed = relax_core(&mut formula, &mut core_map, &conflict, 2, SearchMode::Hybrid);

        assert_eq!(subsumed, 1);
        assert_eq!(formula.soft(0).weight, 2);
        assert_eq!(formula.soft(1).weight, 5);
        assert_eq!(formula.soft(2).weight, 0);
        assert_eq!(formula.soft(2).assump, None);

        // two replacement softs carrying the core weight
        assert_eq!(formula.n_soft(), 5);
        for idx in 3..5 {
            let soft = formula.soft(idx);
            assert_eq!(soft.weight, 2);
            assert_eq!(soft.clause.len(), 1);
            assert_eq!(core_map[&soft.assump.unwrap()], idx);
        }
    }

    #[test]
    fn maxres_clause_counts() {
        // hybrid: per inner chain link 2 clauses, 2 final clauses, and one
        // reified hard per new soft
        let (mut formula, mut core_map) = weighted_formula(&[3, 3, 3]);
        let n_hard_before = formula.n_hard();
        let conflict = assumps(&formula, &[0, 1, 2]);
        relax_core(&mut formula, &mut core_map, &conflict, 3, SearchMode::Hybrid);
        assert_eq!(formula.n_hard() - n_hard_before, 2 + 2 + 2);

        // core-guided-only additionally emits the core clause and the reverse
        // chain direction
        let (mut formula, mut core_map) = weighted_formula(&[3, 3, 3]);
        let n_hard_before = formula.n_hard();
        let conflict = assumps(&formula, &[0, 1, 2]);
        relax_core(
            &mut formula,
            &mut core_map,
            &conflict,
            3,
            SearchMode::CoreGuided,
        );
        assert_eq!(formula.n_hard() - n_hard_before, 1 + 3 + 2 + 2);
    }

    #[test]
    fn unit_core_only_subsumes() {
        let (mut formula, mut core_map) = weighted_formula(&[5]);
        let n_hard_before = formula.n_hard();
        let conflict = assumps(&formula, &[0]);
        let subsumed = relax_core(&mut formula, &mut core_map, &conflict, 5, SearchMode::Hybrid);

        assert_eq!(subsumed, 1);
        assert_eq!(formula.n_soft(), 1);
        assert_eq!(formula.n_hard(), n_hard_before);

        // pure core-guided mode pins the unit core as a hard clause
        let (mut formula, mut core_map) = weighted_formula(&[5]);
        let conflict = assumps(&formula, &[0]);
        relax_core(
            &mut formula,
            &mut core_map,
            &conflict,
            5,
            SearchMode::CoreGuided,
        );
        assert_eq!(formula.n_hard(), n_hard_before + 1);
    }

    #[test]
    fn binary_core_shape() {
        let (mut formula, mut core_map) = weighted_formula(&[2, 6]);
        let conflict = assumps(&formula, &[0, 1]);
        relax_core(&mut formula, &mut core_map, &conflict, 2, SearchMode::Hybrid);

        // d_0 <-> b_1 plus the reified soft !b_0 v !d_0
        assert_eq!(formula.n_soft(), 3);
        assert_eq!(formula.soft(0).weight, 0);
        assert_eq!(formula.soft(1).weight, 4);
        assert_eq!(formula.soft(2).weight, 2);
        assert!(core_map.contains_key(&formula.soft(2).assump.unwrap()));
    }
}
