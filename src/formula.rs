//! # Working Formula Store
//!
//! The store owns the hard clauses, the soft clauses with their weights and
//! assumption literals, and the variable manager. It is built once from the
//! input by [`Formula::standardized`] and afterwards only mutated in place:
//! soft clause weights decrease, assumption literals are cleared on
//! hardening, and the relaxation step appends new clauses. Soft clause
//! indices stay stable for the entire search.

use rustsat::{
    clause,
    instances::{Cnf, ManageVars},
    types::{Clause, Lit, Var},
};

use crate::types::{ProblemType, SoftClause};

pub struct Formula<VM> {
    /// The variable manager keeping track of variables
    var_manager: VM,
    /// The hard clauses
    hards: Vec<Clause>,
    /// The soft clauses, all with unit bodies
    softs: Vec<SoftClause>,
    /// The summed weight of the input soft clauses. Not updated by
    /// [`Formula::add_soft`]: relaxation conserves total weight.
    sum_weights: usize,
    /// The working weight threshold of the current stratum
    max_weight: usize,
    /// Weight reserved for hard clauses in the input format
    hard_weight: usize,
    problem_type: ProblemType,
}

impl<VM: ManageVars> Formula<VM> {
    /// Builds a standardised working formula from hard clauses and weighted
    /// soft clauses.
    ///
    /// Every soft clause `C` is rewritten by introducing a fresh relaxation
    /// literal `l`, pushing `C v l` to the hard clauses and keeping the unit
    /// `!l` as the soft body with `l` as its assumption literal.
    pub fn standardized(
        hards: Cnf,
        softs: impl IntoIterator<Item = (Clause, usize)>,
        var_manager: VM,
    ) -> Self {
        let mut formula = Formula {
            var_manager,
            hards: hards.into_iter().collect(),
            softs: Vec::new(),
            sum_weights: 0,
            max_weight: 1,
            hard_weight: 0,
            problem_type: ProblemType::Unweighted,
        };
        for (clause, weight) in softs {
            debug_assert!(weight > 0);
            formula.add_soft(weight, clause);
            formula.sum_weights += weight;
            if weight > formula.max_weight {
                formula.max_weight = weight;
            }
            if weight > 1 {
                formula.problem_type = ProblemType::Weighted;
            }
        }
        formula.hard_weight = formula.sum_weights + 1;
        formula
    }

    /// Adds a soft clause, standardising it on the way in. Returns the fresh
    /// assumption literal guarding the clause.
    pub fn add_soft(&mut self, weight: usize, mut clause: Clause) -> Lit {
        let relax = self.new_lit();
        clause.add(relax);
        self.add_hard(clause);
        self.softs.push(SoftClause {
            weight,
            assump: Some(relax),
            clause: clause![!relax],
        });
        relax
    }

    /// Gets a fresh variable from the variable manager
    pub fn new_var(&mut self) -> Var {
        self.var_manager.new_var()
    }

    /// Gets the positive literal of a fresh variable
    pub fn new_lit(&mut self) -> Lit {
        self.var_manager.new_var().pos_lit()
    }

    pub fn n_vars(&self) -> u32 {
        self.var_manager.n_used()
    }

    pub fn max_var(&self) -> Option<Var> {
        self.var_manager.max_var()
    }

    pub fn var_manager_mut(&mut self) -> &mut VM {
        &mut self.var_manager
    }
}

impl<VM> Formula<VM> {
    /// Adds a hard clause
    pub fn add_hard(&mut self, clause: Clause) {
        self.hards.push(clause);
    }

    pub fn hard(&self, idx: usize) -> &Clause {
        &self.hards[idx]
    }

    pub fn soft(&self, idx: usize) -> &SoftClause {
        &self.softs[idx]
    }

    pub fn soft_mut(&mut self, idx: usize) -> &mut SoftClause {
        &mut self.softs[idx]
    }

    pub fn softs(&self) -> std::slice::Iter<'_, SoftClause> {
        self.softs.iter()
    }

    pub fn n_hard(&self) -> usize {
        self.hards.len()
    }

    pub fn n_soft(&self) -> usize {
        self.softs.len()
    }

    /// The summed weight of the input soft clauses
    pub fn sum_weights(&self) -> usize {
        self.sum_weights
    }

    /// The working weight threshold of the current stratum
    pub fn max_weight(&self) -> usize {
        self.max_weight
    }

    pub fn set_max_weight(&mut self, weight: usize) {
        debug_assert!(weight >= 1);
        self.max_weight = weight;
    }

    /// The weight that marks a clause as hard in the input format
    pub fn hard_weight(&self) -> usize {
        self.hard_weight
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn set_problem_type(&mut self, problem_type: ProblemType) {
        self.problem_type = problem_type;
    }
}

#[cfg(test)]
mod tests {
    use rustsat::{
        clause,
        instances::{BasicVarManager, Cnf},
        lit, var,
    };

    use super::Formula;
    use crate::types::ProblemType;

    fn var_manager(n_vars: u32) -> BasicVarManager {
        BasicVarManager::from_next_free(var![n_vars])
    }

    #[test]
    fn standardize_rewrites_softs_to_units() {
        let mut hards = Cnf::new();
        hards.add_clause(clause![!lit![0], !lit![1]]);
        let softs = vec![
            (clause![lit![0]], 3),
            (clause![lit![1], lit![2]], 5),
        ];
        let formula = Formula::standardized(hards, softs, var_manager(3));

        assert_eq!(formula.n_soft(), 2);
        // one relaxed copy per input soft clause
        assert_eq!(formula.n_hard(), 3);
        assert_eq!(formula.n_vars(), 5);
        assert_eq!(formula.sum_weights(), 8);
        assert_eq!(formula.max_weight(), 5);
        assert_eq!(formula.hard_weight(), 9);
        assert_eq!(formula.problem_type(), ProblemType::Weighted);

        for soft in formula.softs() {
            assert_eq!(soft.clause.len(), 1);
            let assump = soft.assump.unwrap();
            assert_eq!(soft.clause[0], !assump);
            // the relaxed hard copy ends with the relaxation literal
            assert!(soft.active());
        }
        assert_eq!(formula.hard(1)[formula.hard(1).len() - 1], lit![3]);
        assert_eq!(formula.hard(2)[formula.hard(2).len() - 1], lit![4]);
    }

    #[test]
    fn unit_weights_make_unweighted() {
        let softs = vec![(clause![lit![0]], 1), (clause![!lit![0]], 1)];
        let formula = Formula::standardized(Cnf::new(), softs, var_manager(1));
        assert_eq!(formula.problem_type(), ProblemType::Unweighted);
        assert_eq!(formula.max_weight(), 1);
    }

    #[test]
    fn added_softs_leave_sum_untouched() {
        let softs = vec![(clause![lit![0]], 4)];
        let mut formula = Formula::standardized(Cnf::new(), softs, var_manager(1));
        let assump = formula.add_soft(2, clause![!lit![0]]);
        assert_eq!(formula.sum_weights(), 4);
        assert_eq!(formula.n_soft(), 2);
        assert_eq!(formula.soft(1).assump, Some(assump));
        assert_eq!(formula.soft(1).clause[0], !assump);
    }
}
