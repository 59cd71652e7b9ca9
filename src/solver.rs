//! # Search Driver
//!
//! The driver owns the working formula, the SAT oracle and the objective
//! encoder, and orchestrates the search: an initial satisfiability check on
//! the hard clauses, the stratified core-guided phase, and, depending on the
//! configured strategy, the transition into linear search.

use std::{
    ops::Range,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use rustsat::{
    encodings::{card, pb, CollectClauses},
    instances::{Cnf, ManageVars, OptInstance},
    solvers::{
        ControlSignal, Interrupt, InterruptSolver, PhaseLit, SolveIncremental, SolveStats,
        SolverResult, SolverStats, Terminate,
    },
    types::{Assignment, Clause, Lit, LitIter, Var, WLitIter},
};

use crate::{
    formula::Formula,
    options::{SearchMode, WeightStrategy},
    types::lit_true_in_model,
    ExitStatus, Options, Phase, Stats, Termination, WriteSolverLog,
};

pub(crate) mod cores;
mod linear;
pub(crate) mod strat;

use cores::CoreMap;

/// Handle for interrupting the solver asynchronously
pub struct Interrupter {
    /// Termination flag of the solver
    term_flag: Arc<AtomicBool>,
    /// The interrupter of the underlying SAT oracle
    oracle_interrupter: Arc<Mutex<Box<dyn InterruptSolver + Send>>>,
}

impl Interrupter {
    /// Interrupts the solver asynchronously
    pub fn interrupt(&mut self) {
        self.term_flag.store(true, Ordering::Relaxed);
        self.oracle_interrupter.lock().unwrap().interrupt();
    }
}

/// The core-guided MaxSAT solver.
///
/// Generics select the pseudo-boolean objective encoding `PBE`, the
/// cardinality encoding `CE` used when all reduced weights coincide, the
/// variable manager `VM` and the SAT oracle `O`.
pub struct PMRes<PBE, CE, VM, O> {
    /// The SAT oracle
    oracle: O,
    /// The standardised working formula
    formula: Formula<VM>,
    /// The input soft clauses, used for evaluating model costs
    orig_softs: Vec<(Clause, usize)>,
    /// Offset between internal and external objective values
    offset: isize,
    /// Mapping from assumption literals to soft clause indices
    core_map: CoreMap,
    /// The objective encoding of the linear phase
    obj_enc: Option<ObjEncoding<PBE, CE>>,
    /// The best known model
    best_model: Option<Assignment>,
    /// Lower bound on the optimum cost, monotonically non-decreasing
    lb_cost: usize,
    /// Upper bound on the optimum cost, monotonically non-increasing
    ub_cost: usize,
    /// The smallest bound gap observed so far
    known_gap: usize,
    /// The largest weight among soft clauses that escaped the last hardening
    /// round; hardening triggers once the gap falls below it
    maxw_not_hardened: usize,
    /// The number of soft clauses guarded by the current assumptions
    nb_current_soft: usize,
    /// High-water marks of what has been delivered to the oracle
    vars_added: u32,
    clauses_added: usize,
    softs_added: usize,
    /// Whether the search is in the linear phase
    in_lin_search: bool,
    /// Start of the current `search` call
    start_time: Instant,
    /// Wall-clock deadline checked by the oracle's terminator callback
    deadline: Arc<Mutex<Option<Instant>>>,
    /// Configuration options
    opts: Options,
    /// Running statistics
    stats: Stats,
    /// Logger to log with
    logger: Option<Box<dyn WriteSolverLog>>,
    /// Termination flag
    term_flag: Arc<AtomicBool>,
    /// The oracle interrupter
    oracle_interrupter: Arc<Mutex<Box<dyn InterruptSolver + Send>>>,
}

impl<PBE, CE, VM, O> PMRes<PBE, CE, VM, O>
where
    VM: ManageVars,
    O: SolveIncremental + Default + Interrupt + Terminate<'static>,
    <O as Interrupt>::Interrupter: Send + 'static,
{
    /// Initializes the solver from hard clauses and weighted soft clauses.
    /// The `offset` is added to all externally reported costs.
    pub fn new(
        hards: Cnf,
        softs: impl IntoIterator<Item = (Clause, usize)>,
        offset: isize,
        var_manager: VM,
        opts: Options,
    ) -> Result<Self, Termination> {
        let orig_softs: Vec<(Clause, usize)> = softs.into_iter().collect();
        let stats = Stats {
            n_orig_hards: hards.len(),
            n_orig_softs: orig_softs.len(),
            ..Default::default()
        };
        let formula = Formula::standardized(hards, orig_softs.iter().cloned(), var_manager);
        if formula.max_var().is_none() {
            return Err(Termination::NoVars);
        }
        let mut core_map = CoreMap::default();
        for (idx, soft) in formula.softs().enumerate() {
            core_map.insert(soft.assump.unwrap(), idx);
        }
        let term_flag = Arc::new(AtomicBool::new(false));
        let deadline = Arc::new(Mutex::new(None));
        let mut oracle = O::default();
        oracle.attach_terminator(terminator(&term_flag, &deadline));
        let oracle_interrupter: Arc<Mutex<Box<dyn InterruptSolver + Send>>> =
            Arc::new(Mutex::new(Box::new(oracle.interrupter())));
        Ok(Self {
            oracle,
            formula,
            orig_softs,
            offset,
            core_map,
            obj_enc: None,
            best_model: None,
            lb_cost: 0,
            ub_cost: usize::MAX,
            known_gap: usize::MAX,
            maxw_not_hardened: 0,
            nb_current_soft: 0,
            vars_added: 0,
            clauses_added: 0,
            softs_added: 0,
            in_lin_search: false,
            start_time: Instant::now(),
            deadline,
            opts,
            stats,
            logger: None,
            term_flag,
            oracle_interrupter,
        })
    }

    /// Initializes the solver from a parsed optimization instance
    pub fn from_instance(inst: OptInstance<VM>, opts: Options) -> Result<Self, Termination> {
        let (constr, obj) = inst.decompose();
        let (cnf, var_manager) = constr.as_cnf();
        if obj.constant() {
            let offset = obj.offset();
            return Self::new(cnf, Vec::new(), offset, var_manager, opts);
        }
        let (soft_cls, offset) = obj.as_soft_cls();
        Self::new(cnf, soft_cls, offset, var_manager, opts)
    }
}

impl<PBE, CE, VM, O> PMRes<PBE, CE, VM, O> {
    /// Attaches a logger to the solver
    pub fn attach_logger<L: WriteSolverLog + 'static>(&mut self, logger: L) {
        self.logger = Some(Box::new(logger));
    }

    /// Detaches the logger from the solver
    pub fn detach_logger(&mut self) -> Option<Box<dyn WriteSolverLog>> {
        self.logger.take()
    }

    /// Gets an interrupter to the solver
    pub fn interrupter(&mut self) -> Interrupter {
        Interrupter {
            term_flag: self.term_flag.clone(),
            oracle_interrupter: self.oracle_interrupter.clone(),
        }
    }

    /// Gets the best known model, if any
    pub fn best_model(&self) -> Option<&Assignment> {
        self.best_model.as_ref()
    }

    /// Gets the cost of the best known model without the external offset
    pub fn best_cost(&self) -> Option<usize> {
        self.best_model.as_ref().map(|_| self.ub_cost)
    }

    /// Gets the current bounds on the optimum cost
    pub fn bounds(&self) -> (usize, usize) {
        (self.lb_cost, self.ub_cost)
    }

    /// Gets tracked statistics from the solver
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The number of soft clauses still taking part in the search
    fn n_real_soft(&self) -> usize {
        self.formula.n_soft() - self.stats.n_hardened
    }

    /// Whether hard clauses are pending delivery to the oracle
    fn should_update(&self) -> bool {
        self.clauses_added < self.formula.n_hard()
    }

    fn phase(&self) -> Phase {
        if self.in_lin_search {
            Phase::Linear
        } else {
            Phase::CoreGuided
        }
    }

    fn externalize(&self, cost: usize) -> isize {
        isize::try_from(cost).expect("cost exceeds `isize`") + self.offset
    }

    /// Checks the termination flag and terminates if appropriate
    fn check_termination(&self) -> Result<(), Termination> {
        if self.term_flag.load(Ordering::Relaxed) {
            Err(Termination::Interrupted)
        } else {
            Ok(())
        }
    }

    fn set_time_budget(&mut self, budget: Duration) {
        *self.deadline.lock().unwrap() = Some(Instant::now() + budget);
    }

    fn budget_off(&mut self) {
        *self.deadline.lock().unwrap() = None;
    }

    fn log_bound(&mut self) -> Result<(), Termination> {
        let cost = self.externalize(self.ub_cost);
        if let Some(logger) = &mut self.logger {
            logger.log_bound(cost)?;
        }
        Ok(())
    }

    fn log_core(&mut self, core_weight: usize, core_size: usize) -> Result<(), Termination> {
        if let Some(logger) = &mut self.logger {
            logger.log_core(core_weight, core_size, self.lb_cost)?;
        }
        Ok(())
    }

    fn log_stratum(&mut self) -> Result<(), Termination> {
        let weight = self.formula.max_weight();
        let phase = self.phase();
        if let Some(logger) = &mut self.logger {
            logger.log_stratum(weight, phase)?;
        }
        Ok(())
    }

    fn log_hardened(&mut self, n_hardened: usize) -> Result<(), Termination> {
        let next_trigger = self.maxw_not_hardened;
        if let Some(logger) = &mut self.logger {
            logger.log_hardened(n_hardened, next_trigger)?;
        }
        Ok(())
    }

    fn log_phase_change(&mut self) -> Result<(), Termination> {
        let phase = self.phase();
        if let Some(logger) = &mut self.logger {
            logger.log_phase_change(phase)?;
        }
        Ok(())
    }

    fn log_oracle_call(&mut self, result: SolverResult) -> Result<(), Termination> {
        if let Some(logger) = &mut self.logger {
            logger.log_oracle_call(result)?;
        }
        Ok(())
    }

    fn log_message(&mut self, msg: &str) -> Result<(), Termination> {
        if let Some(logger) = &mut self.logger {
            logger.log_message(msg)?;
        }
        Ok(())
    }

    /// Updates the known gap between the bounds and logs improvements
    fn check_gap(&mut self) -> Result<(), Termination> {
        let current_gap = self.ub_cost - self.lb_cost;
        if current_gap < self.known_gap {
            self.known_gap = current_gap;
            let phase = self.phase();
            if let Some(logger) = &mut self.logger {
                logger.log_gap(current_gap, phase)?;
            }
        }
        Ok(())
    }

    /// Evaluates a model against the input soft clauses
    fn compute_cost_model(&self, model: &Assignment) -> usize {
        self.orig_softs.iter().fold(0, |cost, (clause, weight)| {
            if clause.iter().any(|&lit| lit_true_in_model(model, lit)) {
                cost
            } else {
                cost + weight
            }
        })
    }

    /// Records a model if it does not lose against the best known one. At
    /// equal cost the later model is retained. Returns whether the upper
    /// bound improved.
    fn update_best(&mut self, cost: usize, model: Assignment) -> Result<bool, Termination> {
        let improved = cost < self.ub_cost;
        if cost <= self.ub_cost {
            self.best_model = Some(model);
            self.ub_cost = cost;
        }
        if improved {
            self.log_bound()?;
            self.check_gap()?;
        }
        Ok(improved)
    }
}

impl<PBE, CE, VM, O> PMRes<PBE, CE, VM, O>
where
    VM: ManageVars,
    O: SolveIncremental,
{
    /// Wrapper around the oracle with call logging and interrupt detection. A
    /// budget expiry surfaces as [`SolverResult::Interrupted`], an external
    /// interrupt as [`Termination::Interrupted`].
    fn solve(&mut self) -> Result<SolverResult, Termination> {
        let res = self.oracle.solve()?;
        self.stats.n_oracle_calls += 1;
        if res == SolverResult::Interrupted {
            self.check_termination()?;
        }
        self.log_oracle_call(res)?;
        Ok(res)
    }

    /// Like [`PMRes::solve`], under assumptions
    fn solve_assumps(&mut self, assumps: &[Lit]) -> Result<SolverResult, Termination> {
        let res = self.oracle.solve_assumps(assumps)?;
        self.stats.n_oracle_calls += 1;
        if res == SolverResult::Interrupted {
            self.check_termination()?;
        }
        self.log_oracle_call(res)?;
        Ok(res)
    }

    fn max_var(&self) -> Var {
        self.formula.max_var().unwrap()
    }

    /// Delivers new variables and hard clauses to the oracle, in insertion
    /// order, starting from the recorded high-water marks
    fn update_oracle(&mut self) -> Result<(), Termination> {
        if self.vars_added < self.formula.n_vars() {
            self.oracle.reserve(self.max_var())?;
            self.vars_added = self.formula.n_vars();
        }
        for idx in self.clauses_added..self.formula.n_hard() {
            self.oracle.add_clause(self.formula.hard(idx).clone())?;
        }
        self.clauses_added = self.formula.n_hard();
        self.softs_added = self.formula.n_soft();
        Ok(())
    }

    /// Builds the assumption vector for the current stratum. Only soft
    /// clauses already known to the oracle are considered, which keeps the
    /// cores extracted between two solver updates disjoint.
    fn set_assumptions(&mut self, assumps: &mut Vec<Lit>) {
        assumps.clear();
        self.nb_current_soft = 0;
        let max_weight = self.formula.max_weight();
        for idx in 0..self.softs_added {
            let soft = self.formula.soft(idx);
            debug_assert_eq!(soft.clause.len(), 1);
            let in_stratum = if self.opts.varres_cg {
                soft.weight / max_weight > 0
            } else {
                soft.weight >= max_weight
            };
            if in_stratum {
                let assump = soft
                    .assump
                    .expect("soft clause in stratum without assumption literal");
                assumps.push(!assump);
                self.nb_current_soft += 1;
            }
        }
    }
}

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
    /// Solves the instance to optimality. Returns the terminal status, or an
    /// early termination reason.
    pub fn search(&mut self) -> Result<ExitStatus, Termination> {
        if self.opts.weight_strategy == WeightStrategy::None {
            self.log_message("no weight strategy selected, falling back to normal")?;
            self.opts.weight_strategy = WeightStrategy::Normal;
        }
        if self.opts.search_mode != SearchMode::Hybrid && self.opts.core_time_limit.is_some() {
            self.log_message("core budget only applies to the hybrid strategy, ignoring it")?;
            self.opts.core_time_limit = None;
        }
        self.start_time = Instant::now();
        self.maxw_not_hardened = self.formula.sum_weights();
        if self.opts.search_mode == SearchMode::LinearOnly {
            self.in_lin_search = true;
        }

        if let Some(status) = self.setup()? {
            return Ok(status);
        }

        match self.opts.search_mode {
            SearchMode::CoreGuided => self.weight_search(),
            SearchMode::Hybrid => self.core_guided_linear_search(),
            SearchMode::LinearOnly => self.linear_search(),
        }
    }

    /// Builds the oracle and checks that the hard clauses are satisfiable.
    /// Every other search routine assumes this has run. On success the first
    /// model is recorded and the working weight is initialised.
    fn setup(&mut self) -> Result<Option<ExitStatus>, Termination> {
        match self.unsat_search()? {
            SolverResult::Unsat => return Ok(Some(ExitStatus::Unsatisfiable)),
            SolverResult::Sat => (),
            SolverResult::Interrupted => unreachable!("no budget during the initial check"),
        }
        if self.opts.varres_cg {
            let n_real_soft = self.n_real_soft();
            strat::init_division_factor(
                &mut self.formula,
                self.opts.varres_factor,
                n_real_soft,
            );
            self.log_stratum()?;
        } else {
            self.update_current_weight()?;
        }
        Ok(None)
    }

    /// Runs the oracle on the hard clauses alone, with polarities hinted
    /// towards satisfying the soft clauses
    fn unsat_search(&mut self) -> Result<SolverResult, Termination> {
        self.update_oracle()?;
        self.softs_satisfied()?;
        let res = self.solve()?;
        if res == SolverResult::Sat {
            self.stats.n_satisfiable += 1;
            let model = self.oracle.solution(self.max_var())?;
            let cost = self.compute_cost_model(&model);
            self.update_best(cost, model)?;
        }
        Ok(res)
    }

    /// Repeatedly runs the oracle on the current stratum, extracting and
    /// relaxing cores, without rebuilding the oracle, advancing the stratum
    /// or hardening. Exits on a satisfiable call, a proven optimum, or an
    /// expired core budget.
    fn weight_disjoint_cores(
        &mut self,
        assumps: &mut Vec<Lit>,
    ) -> Result<CoreLoopResult, Termination> {
        loop {
            if let Some(limit) = self.opts.core_time_limit {
                let elapsed = self.start_time.elapsed();
                if elapsed >= limit {
                    return Ok(CoreLoopResult::Unknown);
                }
                self.set_time_budget(limit - elapsed);
            }
            self.set_assumptions(assumps);
            match self.solve_assumps(assumps)? {
                SolverResult::Sat => return Ok(CoreLoopResult::Sat),
                SolverResult::Interrupted => return Ok(CoreLoopResult::Unknown),
                SolverResult::Unsat => {
                    let core = self.oracle.core()?;
                    debug_assert!(!core.is_empty());
                    let core_weight = cores::core_cost(&self.formula, &self.core_map, &core);
                    self.lb_cost += core_weight;
                    self.stats.n_cores += 1;
                    self.stats.sum_core_sizes += core.len();
                    self.check_gap()?;
                    self.log_core(core_weight, core.len())?;
                    let subsumed = cores::relax_core(
                        &mut self.formula,
                        &mut self.core_map,
                        &core,
                        core_weight,
                        self.opts.search_mode,
                    );
                    self.stats.n_hardened += subsumed;
                    if self.lb_cost > self.ub_cost {
                        panic!(
                            "lower bound {} exceeds upper bound {}",
                            self.lb_cost, self.ub_cost
                        );
                    }
                    if self.lb_cost == self.ub_cost {
                        return Ok(CoreLoopResult::Optimum);
                    }
                }
            }
        }
    }

    /// Pure core-guided search: stays in the core loop, interleaved with
    /// stratum advances, solver updates and hardening, until an optimum is
    /// proven
    fn weight_search(&mut self) -> Result<ExitStatus, Termination> {
        let mut assumps = Vec::new();
        loop {
            match self.weight_disjoint_cores(&mut assumps)? {
                CoreLoopResult::Optimum => return self.get_model_after_cg(),
                CoreLoopResult::Unknown => {
                    unreachable!("no time budget in pure core-guided search")
                }
                CoreLoopResult::Sat => (),
            }
            self.stats.n_satisfiable += 1;
            let model = self.oracle.solution(self.max_var())?;
            let cost = self.compute_cost_model(&model);
            self.update_best(cost, model)?;

            if self.lb_cost == self.ub_cost {
                self.log_message("lower bound meets upper bound")?;
                return Ok(ExitStatus::Optimum);
            }
            if self.nb_current_soft == self.n_real_soft() {
                // the stratum covers every active soft clause, so this model
                // is optimal for the whole formula
                debug_assert_eq!(cost, self.lb_cost);
                return Ok(ExitStatus::Optimum);
            }
            if self.ub_cost - self.lb_cost < self.maxw_not_hardened {
                self.harden_clauses()?;
            }
            if self.should_update() {
                self.update_oracle()?;
            } else {
                self.update_current_weight()?;
            }
        }
    }

    /// Hybrid search: core-guided phase until an optimum is proven, the core
    /// budget expires, or the working weight reaches 1, then linear search
    fn core_guided_linear_search(&mut self) -> Result<ExitStatus, Termination> {
        let mut assumps = Vec::new();
        loop {
            match self.weight_disjoint_cores(&mut assumps)? {
                CoreLoopResult::Optimum => return self.get_model_after_cg(),
                CoreLoopResult::Unknown => {
                    self.log_message("core budget expired, leaving the core-guided phase")?;
                    if self.should_update() {
                        self.update_oracle()?;
                    }
                    return self.linear_search();
                }
                CoreLoopResult::Sat => (),
            }
            self.stats.n_satisfiable += 1;
            let model = self.oracle.solution(self.max_var())?;
            let cost = self.compute_cost_model(&model);
            self.update_best(cost, model)?;

            if self.lb_cost == self.ub_cost {
                self.log_message("lower bound meets upper bound")?;
                return Ok(ExitStatus::Optimum);
            }
            if self.nb_current_soft == self.n_real_soft() {
                debug_assert_eq!(cost, self.lb_cost);
                return Ok(ExitStatus::Optimum);
            }
            if self.ub_cost - self.lb_cost < self.maxw_not_hardened {
                self.harden_clauses()?;
            }

            if self.opts.relax_before_strat {
                if self.should_update() {
                    self.update_oracle()?;
                } else if self.formula.max_weight() > 1 {
                    self.update_current_weight()?;
                    if self.formula.max_weight() == 1 {
                        self.log_message("working weight reached 1")?;
                        return self.linear_search();
                    }
                } else {
                    unreachable!("exhausted strata with no pending clauses");
                }
            } else {
                if self.formula.max_weight() > 1 {
                    self.update_current_weight()?;
                }
                if self.formula.max_weight() == 1 {
                    if self.should_update() {
                        self.update_oracle()?;
                    }
                    return self.linear_search();
                }
            }
        }
    }

    /// Recovers a model witnessing the optimum after the core loop alone
    /// proved it
    fn get_model_after_cg(&mut self) -> Result<ExitStatus, Termination> {
        self.log_message("lower bound meets upper bound")?;
        if !self.should_update() {
            self.log_message("warning: optimum proven without new cores")?;
        }
        self.budget_off();
        self.update_oracle()?;
        let mut assumps = Vec::new();
        self.set_assumptions(&mut assumps);
        let res = self.solve_assumps(&assumps)?;
        debug_assert_eq!(res, SolverResult::Sat);
        let model = self.oracle.solution(self.max_var())?;
        let cost = self.compute_cost_model(&model);
        debug_assert_eq!(cost, self.lb_cost);
        self.update_best(cost, model)?;
        Ok(ExitStatus::Optimum)
    }

    /// Advances the working weight according to the configured strategy
    fn update_current_weight(&mut self) -> Result<(), Termination> {
        if self.opts.varres_cg {
            let n_real_soft = self.n_real_soft();
            strat::update_division_factor(
                &mut self.formula,
                self.opts.varres_factor,
                n_real_soft,
            );
        } else {
            let next = match self.opts.weight_strategy {
                WeightStrategy::Diversify => strat::find_next_weight_diversity(
                    &self.formula,
                    self.formula.max_weight(),
                    self.stats.n_satisfiable,
                    self.nb_current_soft,
                    self.n_real_soft(),
                ),
                _ => strat::find_next_weight(&self.formula, self.formula.max_weight()),
            };
            self.formula.set_max_weight(next);
        }
        self.log_stratum()
    }

    /// Hardens soft clauses that can no longer be falsified in any solution
    /// improving on the best known one
    fn harden_clauses(&mut self) -> Result<(), Termination> {
        let gap = self.ub_cost - self.lb_cost;
        let model = self.best_model.clone().expect("hardening requires a model");
        let mut hardened_round = 0;
        self.maxw_not_hardened = 0;
        for idx in 0..self.softs_added {
            let (weight, assump, body) = {
                let soft = self.formula.soft(idx);
                debug_assert_eq!(soft.clause.len(), 1);
                (soft.weight, soft.assump, soft.clause[0])
            };
            let satisfied = weight == gap && lit_true_in_model(&model, body);
            if weight > gap || (weight == gap && satisfied) {
                let assump = assump.expect("active soft clause without assumption literal");
                self.oracle.add_unit(!assump)?;
                if !self.opts.harden_lazily() {
                    self.formula.add_hard(rustsat::clause![!assump]);
                }
                let soft = self.formula.soft_mut(idx);
                soft.weight = 0;
                soft.assump = None;
                self.stats.n_hardened += 1;
                hardened_round += 1;
            } else if weight > self.maxw_not_hardened {
                self.maxw_not_hardened = weight;
            }
        }
        self.log_hardened(hardened_round)
    }

    /// Hints the oracle's polarities towards satisfying all soft clauses
    fn softs_satisfied(&mut self) -> Result<(), Termination> {
        for idx in 0..self.formula.n_soft() {
            let body = self.formula.soft(idx).clause[0];
            self.oracle.phase_lit(body)?;
        }
        Ok(())
    }

    /// Phases the best known model in the oracle
    fn save_phase(&mut self) -> Result<(), Termination> {
        if let Some(model) = self.best_model.clone() {
            for lit in model.into_iter() {
                self.oracle.phase_lit(lit)?;
            }
        }
        Ok(())
    }

    /// Replaces the oracle by a fresh one holding the current formula. All
    /// high-water marks restart from zero.
    fn reset_oracle(&mut self) -> Result<(), Termination> {
        self.log_message("rebuilding the oracle")?;
        self.oracle = O::default();
        self.oracle
            .attach_terminator(terminator(&self.term_flag, &self.deadline));
        *self.oracle_interrupter.lock().unwrap() = Box::new(self.oracle.interrupter());
        self.vars_added = 0;
        self.clauses_added = 0;
        self.softs_added = 0;
        self.stats.n_oracle_resets += 1;
        self.update_oracle()
    }
}

impl<PBE, CE, VM, O> PMRes<PBE, CE, VM, O>
where
    O: SolveStats,
{
    /// Gets statistics from the internal oracle
    pub fn oracle_stats(&self) -> SolverStats {
        self.oracle.stats()
    }
}

/// Outcome of the disjoint-core loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CoreLoopResult {
    /// The oracle found a model of the current stratum
    Sat,
    /// The lower bound reached the upper bound
    Optimum,
    /// The core budget expired
    Unknown,
}

/// Terminator callback combining the external termination flag with the
/// wall-clock deadline of the core budget
fn terminator(
    term_flag: &Arc<AtomicBool>,
    deadline: &Arc<Mutex<Option<Instant>>>,
) -> impl FnMut() -> ControlSignal + 'static {
    let term_flag = term_flag.clone();
    let deadline = deadline.clone();
    move || {
        if term_flag.load(Ordering::Relaxed) {
            return ControlSignal::Terminate;
        }
        if let Some(deadline) = *deadline.lock().unwrap() {
            if Instant::now() >= deadline {
                return ControlSignal::Terminate;
            }
        }
        ControlSignal::Continue
    }
}

/// An objective encoding for either a weighted or an unweighted residual
/// objective
pub(crate) enum ObjEncoding<PBE, CE> {
    Weighted(PBE),
    Unweighted(CE),
    Constant,
}

impl<PBE, CE> ObjEncoding<PBE, CE>
where
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
{
    /// Initializes a new encoding for a weighted objective
    pub fn new_weighted<LI: WLitIter>(lits: LI) -> Self {
        ObjEncoding::Weighted(PBE::from_iter(lits))
    }
}

impl<PBE, CE> ObjEncoding<PBE, CE>
where
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    /// Initializes a new encoding for a uniform objective
    pub fn new_unweighted<LI: LitIter>(lits: LI) -> Self {
        ObjEncoding::Unweighted(CE::from_iter(lits))
    }
}

impl<PBE, CE> ObjEncoding<PBE, CE>
where
    PBE: pb::BoundUpperIncremental,
    CE: card::BoundUpperIncremental,
{
    /// Whether the encoding is a weighted pseudo-boolean one
    pub fn is_weighted(&self) -> bool {
        matches!(self, ObjEncoding::Weighted(_))
    }

    /// Encodes the given range
    pub fn encode_ub_change<Col>(
        &mut self,
        range: Range<usize>,
        collector: &mut Col,
        var_manager: &mut dyn ManageVars,
    ) where
        Col: CollectClauses,
    {
        match self {
            ObjEncoding::Weighted(enc) => enc.encode_ub_change(range, collector, var_manager),
            ObjEncoding::Unweighted(enc) => enc.encode_ub_change(range, collector, var_manager),
            ObjEncoding::Constant => (),
        }
    }

    /// Enforces the given upper bound
    pub fn enforce_ub(&mut self, ub: usize) -> Result<Vec<Lit>, rustsat::encodings::Error> {
        match self {
            ObjEncoding::Weighted(enc) => enc.enforce_ub(ub),
            ObjEncoding::Unweighted(enc) => enc.enforce_ub(ub),
            ObjEncoding::Constant => Ok(vec![]),
        }
    }
}
