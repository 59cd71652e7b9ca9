//! # Linear Search Phase
//!
//! Solution-improving search over a pseudo-boolean encoding of the residual
//! objective. The objective collects, for every active soft clause, its
//! assumption literal with the clause weight divided by the working weight.
//! Under varying resolution the working weight steps down through powers of
//! the division factor, with the encoding rebuilt at each resolution; at
//! working weight 1 the encoding is exact and the search concludes the
//! optimum.

use rustsat::{
    encodings::{card, pb, CollectClauses},
    instances::ManageVars,
    solvers::{
        Interrupt, PhaseLit, SolveIncremental, SolveStats, SolverResult, Terminate,
    },
    types::{Assignment, Lit, TernaryVal, Var},
};

use super::{strat, ObjEncoding, PMRes};
use crate::{
    types::{lit_covered_by_model, ProblemType},
    ExitStatus, Termination,
};

impl<PBE, CE, VM, O> PMRes<PBE, CE, VM, O>
where
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
    VM: ManageVars,
    O: SolveIncremental
        + SolveStats
        + PhaseLit
        + CollectClauses
        + Default
        + Interrupt
        + Terminate<'static>,
    <O as Interrupt>::Interrupter: Send + 'static,
{
    /// Runs the linear search phase to optimality
    pub(crate) fn linear_search(&mut self) -> Result<ExitStatus, Termination> {
        self.in_lin_search = true;
        self.log_phase_change()?;
        let (lb, ub) = self.bounds();
        self.log_message(&format!(
            "starting linear search with bounds {}/{} over {} soft clauses",
            lb,
            ub,
            self.n_real_soft()
        ))?;
        self.budget_off();
        let mut assumps = Vec::new();

        self.save_phase()?;
        if self.opts.delete_before_lin {
            self.reset_oracle()?;
        }
        self.init_division_factor_linear()?;
        self.set_pb_encodings(&mut assumps)?;

        loop {
            if !self.opts.incremental_varres {
                assumps.clear();
            }
            match self.solve_assumps(&assumps)? {
                SolverResult::Interrupted => unreachable!("no budget in the linear phase"),
                SolverResult::Sat => {
                    self.stats.n_satisfiable += 1;
                    let model = self.oracle.solution(self.max_var())?;
                    let model = self.extended_model(model)?;
                    let reduced = self.reduced_cost(&model);
                    let cost = self.compute_cost_model(&model);
                    if self.update_best(cost, model)? {
                        self.save_phase()?;
                    }
                    if self.ub_cost == self.lb_cost {
                        self.log_message("lower bound meets upper bound")?;
                        return Ok(ExitStatus::Optimum);
                    }
                    if reduced > 0 {
                        self.update_bound_lin_search(reduced - 1, &mut assumps)?;
                    } else if self.formula.max_weight() == 1 {
                        return Ok(ExitStatus::Optimum);
                    } else {
                        // the bound is exhausted at this resolution
                        if !self.opts.incremental_varres {
                            self.reset_oracle()?;
                        }
                        self.update_division_factor_linear()?;
                        self.set_pb_encodings(&mut assumps)?;
                    }
                }
                SolverResult::Unsat => {
                    if self.formula.max_weight() == 1 {
                        return Ok(ExitStatus::Optimum);
                    }
                    if !self.opts.incremental_varres {
                        self.reset_oracle()?;
                    }
                    self.update_division_factor_linear()?;
                    self.set_pb_encodings(&mut assumps)?;
                }
            }
        }
    }

    /// Initialises the working weight for the linear phase; without varying
    /// resolution the residual objective is taken at full precision
    fn init_division_factor_linear(&mut self) -> Result<(), Termination> {
        if self.opts.varres_lin {
            let n_real_soft = self.n_real_soft();
            strat::init_division_factor(
                &mut self.formula,
                self.opts.varres_factor,
                n_real_soft,
            );
        } else {
            self.formula.set_max_weight(1);
        }
        self.log_stratum()
    }

    fn update_division_factor_linear(&mut self) -> Result<(), Termination> {
        strat::update_division_factor_linear(
            &mut self.formula,
            self.opts.varres_factor,
            self.nb_current_soft,
        );
        self.log_stratum()
    }

    /// Builds the objective encoding for the current working weight, first
    /// skipping resolutions at which the best known model already has reduced
    /// cost 0
    fn set_pb_encodings(&mut self, assumps: &mut Vec<Lit>) -> Result<(), Termination> {
        loop {
            let best = self
                .best_model
                .clone()
                .expect("linear phase requires a model");
            let best = self.extended_model(best)?;
            let reduced = self.reduced_cost(&best);
            if reduced == 0 && self.formula.max_weight() > 1 {
                self.update_division_factor_linear()?;
                continue;
            }
            return self.initialize_pb_constraint(reduced, assumps);
        }
    }

    /// Builds a fresh objective encoding enforcing `sum <= rhs` over the
    /// reduced weights of the active soft clauses, replacing any previous
    /// encoding
    fn initialize_pb_constraint(
        &mut self,
        rhs: usize,
        assumps: &mut Vec<Lit>,
    ) -> Result<(), Termination> {
        let max_weight = self.formula.max_weight();
        let mut obj_lits: Vec<Lit> = Vec::new();
        let mut coeffs: Vec<usize> = Vec::new();
        self.nb_current_soft = 0;
        let mut unweighted = true;
        let mut common_weight = 0;
        for soft in self.formula.softs() {
            let reduced = soft.weight / max_weight;
            if reduced == 0 {
                continue;
            }
            let assump = soft
                .assump
                .expect("active soft clause without assumption literal");
            obj_lits.push(assump);
            coeffs.push(reduced);
            self.nb_current_soft += 1;
            if common_weight == 0 {
                common_weight = reduced;
            } else if common_weight != reduced {
                unweighted = false;
            }
        }
        if self.opts.incremental_varres {
            // assumption-based tightening always goes through the weighted
            // encoding
            unweighted = false;
        }
        self.formula.set_problem_type(if unweighted {
            ProblemType::Unweighted
        } else {
            ProblemType::Weighted
        });
        self.log_message(&format!(
            "encoding {} objective over {} of {} soft clauses, bound {}",
            self.formula.problem_type(),
            self.nb_current_soft,
            self.n_real_soft(),
            rhs
        ))?;

        let bound_on_vars = self.oracle.max_var();
        let enc: ObjEncoding<PBE, CE> = if obj_lits.is_empty() {
            ObjEncoding::Constant
        } else if unweighted {
            ObjEncoding::new_unweighted(obj_lits.iter().copied())
        } else {
            ObjEncoding::new_weighted(obj_lits.iter().copied().zip(coeffs.iter().copied()))
        };
        self.obj_enc = Some(enc);
        self.update_bound_lin_search(rhs, assumps)?;
        self.set_card_vars(bound_on_vars)
    }

    /// Tightens the objective bound, either by asserting the encoding
    /// outputs as units or, in the incremental mode, through assumptions
    fn update_bound_lin_search(
        &mut self,
        new_bound: usize,
        assumps: &mut Vec<Lit>,
    ) -> Result<(), Termination> {
        self.log_message(&format!(
            "{} objective bound {}",
            self.formula.problem_type(),
            new_bound
        ))?;
        let mut enc = self.obj_enc.take().expect("bound update without encoding");
        debug_assert!(!self.opts.incremental_varres || enc.is_weighted());
        enc.encode_ub_change(
            new_bound..new_bound + 1,
            &mut self.oracle,
            self.formula.var_manager_mut(),
        );
        if self.opts.incremental_varres {
            assumps.clear();
            assumps.extend(enc.enforce_ub(new_bound).expect("invalid encoding usage"));
        } else {
            for unit in enc.enforce_ub(new_bound).expect("invalid encoding usage") {
                self.oracle.add_unit(unit)?;
            }
        }
        self.obj_enc = Some(enc);
        Ok(())
    }

    /// Seeds the fresh encoding's auxiliary variables with phases consistent
    /// with the best known model by solving under the model as assumptions
    fn set_card_vars(&mut self, bound: Option<Var>) -> Result<(), Termination> {
        self.log_message("seeding encoding variables from the best model")?;
        let best = self
            .best_model
            .clone()
            .expect("linear phase requires a model");
        let assumps: Vec<Lit> = match bound {
            Some(bound) => best.into_iter().filter(|lit| lit.var() <= bound).collect(),
            None => Vec::new(),
        };
        let res = self.solve_assumps(&assumps)?;
        if res != SolverResult::Sat {
            self.log_message("warning: best model inconsistent while seeding the encoding")?;
        }
        debug_assert_eq!(res, SolverResult::Sat);
        let model = self.oracle.solution(self.max_var())?;
        let cost = self.compute_cost_model(&model);
        self.update_best(cost, model)?;
        self.save_phase()
    }

    /// The cost of a model in terms of the reduced weights of the current
    /// resolution
    fn reduced_cost(&self, model: &Assignment) -> usize {
        let max_weight = self.formula.max_weight();
        self.formula.softs().fold(0, |cost, soft| {
            debug_assert_eq!(soft.clause.len(), 1);
            if model.lit_value(soft.clause[0]) == TernaryVal::False {
                cost + soft.weight / max_weight
            } else {
                cost
            }
        })
    }

    /// Extends a model that does not cover all soft clause variables, by
    /// solving under the model as assumptions. Models can come up short when
    /// they were recorded before the formula grew.
    fn extended_model(&mut self, model: Assignment) -> Result<Assignment, Termination> {
        let covered = match self.formula.softs().last() {
            Some(soft) => lit_covered_by_model(&model, soft.clause[0]),
            None => true,
        };
        if covered {
            return Ok(model);
        }
        self.log_message("extending a partial model")?;
        let assumps: Vec<Lit> = model.into_iter().collect();
        let res = self.solve_assumps(&assumps)?;
        debug_assert_eq!(res, SolverResult::Sat);
        Ok(self.oracle.solution(self.max_var())?)
    }
}
