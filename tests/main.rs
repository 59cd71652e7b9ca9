use std::sync::{Arc, Mutex};

use maxres::{
    ExitStatus, LoggerError, Options, PMRes, Phase, SearchMode, WeightStrategy, WriteSolverLog,
};
use rustsat::{
    clause,
    encodings::{card, pb},
    instances::{BasicVarManager, Cnf},
    lit,
    solvers::SolverResult,
    types::{Assignment, Clause, Lit, TernaryVal},
    var,
};
use rustsat_cadical::CaDiCaL;

type Oracle = CaDiCaL<'static, 'static>;
type Solver = PMRes<pb::GeneralizedTotalizer, card::Totalizer, BasicVarManager, Oracle>;
type DpwSolver = PMRes<pb::DynamicPolyWatchdog, card::Totalizer, BasicVarManager, Oracle>;

fn max_var_in(hards: &[Clause], softs: &[(Clause, usize)]) -> u32 {
    let mut max = 0;
    let mut update = |cl: &Clause| {
        for lit in cl.iter() {
            max = std::cmp::max(max, lit.var().idx32() + 1);
        }
    };
    hards.iter().for_each(&mut update);
    softs.iter().for_each(|(cl, _)| update(cl));
    max
}

fn solve(
    hards: &[Clause],
    softs: &[(Clause, usize)],
    opts: Options,
) -> (ExitStatus, Option<usize>, Option<Assignment>) {
    let mut cnf = Cnf::new();
    hards.iter().cloned().for_each(|cl| cnf.add_clause(cl));
    let vm = BasicVarManager::from_next_free(var![max_var_in(hards, softs)]);
    let mut solver = Solver::new(cnf, softs.to_vec(), 0, vm, opts).unwrap();
    let status = solver.search().unwrap();
    let cost = solver.best_cost();
    let model = solver.best_model().cloned();
    (status, cost, model)
}

/// Checks that a claimed optimum is consistent: the model satisfies all hard
/// clauses and the falsified soft weight matches the reported cost
fn verify_optimum(
    hards: &[Clause],
    softs: &[(Clause, usize)],
    expected_cost: usize,
    cost: Option<usize>,
    model: Option<Assignment>,
) {
    assert_eq!(cost, Some(expected_cost));
    let model = model.expect("optimum without model");
    for cl in hards {
        assert!(
            cl.iter().any(|&l| model.lit_value(l) == TernaryVal::True),
            "hard clause {:?} violated",
            cl
        );
    }
    let falsified: usize = softs
        .iter()
        .filter(|(cl, _)| cl.iter().all(|&l| model.lit_value(l) != TernaryVal::True))
        .map(|(_, w)| w)
        .sum();
    assert_eq!(falsified, expected_cost);
}

/// Option sets covering the three search strategies, both weight strategies
/// and the varying-resolution configurations
fn all_configs() -> Vec<Options> {
    let mut configs = Vec::new();
    for mode in [
        SearchMode::CoreGuided,
        SearchMode::Hybrid,
        SearchMode::LinearOnly,
    ] {
        configs.push(Options {
            search_mode: mode,
            ..Default::default()
        });
        configs.push(Options {
            search_mode: mode,
            weight_strategy: WeightStrategy::Normal,
            ..Default::default()
        });
    }
    configs.push(Options {
        search_mode: SearchMode::Hybrid,
        relax_before_strat: false,
        ..Default::default()
    });
    configs.push(Options {
        search_mode: SearchMode::Hybrid,
        varres_cg: true,
        ..Default::default()
    });
    configs.push(Options {
        search_mode: SearchMode::Hybrid,
        varres_lin: true,
        delete_before_lin: true,
        ..Default::default()
    });
    configs.push(Options {
        search_mode: SearchMode::LinearOnly,
        varres_lin: true,
        ..Default::default()
    });
    configs.push(Options {
        search_mode: SearchMode::LinearOnly,
        varres_lin: true,
        incremental_varres: true,
        ..Default::default()
    });
    configs
}

#[test]
fn unsatisfiable_hards() {
    let hards = vec![clause![lit![0]], clause![!lit![0]]];
    for opts in all_configs() {
        let (status, _, _) = solve(&hards, &[], opts);
        assert_eq!(status, ExitStatus::Unsatisfiable);
    }
}

#[test]
fn hards_only() {
    let hards = vec![clause![lit![0], lit![1]]];
    for opts in all_configs() {
        let (status, cost, model) = solve(&hards, &[], opts);
        assert_eq!(status, ExitStatus::Optimum);
        verify_optimum(&hards, &[], 0, cost, model);
    }
}

#[test]
fn single_soft() {
    let softs = vec![(clause![lit![0]], 5)];
    for opts in all_configs() {
        let (status, cost, model) = solve(&[], &softs, opts);
        assert_eq!(status, ExitStatus::Optimum);
        verify_optimum(&[], &softs, 0, cost, model.clone());
        assert_eq!(model.unwrap().lit_value(lit![0]), TernaryVal::True);
    }
}

#[test]
fn conflicting_unit_softs() {
    let softs = vec![(clause![lit![0]], 1), (clause![!lit![0]], 1)];
    for opts in all_configs() {
        let (status, cost, model) = solve(&[], &softs, opts);
        assert_eq!(status, ExitStatus::Optimum);
        verify_optimum(&[], &softs, 1, cost, model);
    }
}

#[test]
fn weighted_choice() {
    let softs = vec![(clause![lit![0]], 3), (clause![!lit![0]], 5)];
    for opts in all_configs() {
        let (status, cost, model) = solve(&[], &softs, opts);
        assert_eq!(status, ExitStatus::Optimum);
        verify_optimum(&[], &softs, 3, cost, model.clone());
        assert_eq!(model.unwrap().lit_value(lit![0]), TernaryVal::False);
    }
}

#[test]
fn three_way_core() {
    let hards = vec![
        clause![!lit![0], !lit![1]],
        clause![!lit![1], !lit![2]],
        clause![!lit![0], !lit![2]],
    ];
    let softs = vec![
        (clause![lit![0]], 1),
        (clause![lit![1]], 1),
        (clause![lit![2]], 1),
    ];
    for opts in all_configs() {
        let (status, cost, model) = solve(&hards, &softs, opts);
        assert_eq!(status, ExitStatus::Optimum);
        verify_optimum(&hards, &softs, 1, cost, model);
    }
}

#[test]
fn diversify_threshold() {
    // weights {100, 100, 50, 50, 50, 10, 10, 10, 10, 10}; the hard unit
    // forces one weight-10 soft false, so the optimum is 10
    let hards = vec![clause![!lit![5]]];
    let softs: Vec<(Clause, usize)> = [100, 100, 50, 50, 50, 10, 10, 10, 10, 10]
        .iter()
        .enumerate()
        .map(|(idx, &w)| (clause![Lit::positive(idx as u32)], w))
        .collect();
    for opts in all_configs() {
        let (status, cost, model) = solve(&hards, &softs, opts);
        assert_eq!(status, ExitStatus::Optimum);
        verify_optimum(&hards, &softs, 10, cost, model);
    }
}

#[test]
fn dpw_encoding() {
    let softs = vec![(clause![lit![0]], 3), (clause![!lit![0]], 5)];
    let vm = BasicVarManager::from_next_free(var![1]);
    let mut solver = DpwSolver::new(
        Cnf::new(),
        softs.clone(),
        0,
        vm,
        Options {
            search_mode: SearchMode::LinearOnly,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(solver.search().unwrap(), ExitStatus::Optimum);
    assert_eq!(solver.best_cost(), Some(3));
}

#[derive(Default)]
struct BoundRecorder {
    bounds: Arc<Mutex<Vec<isize>>>,
}

impl WriteSolverLog for BoundRecorder {
    fn log_bound(&mut self, cost: isize) -> Result<(), LoggerError> {
        self.bounds.lock().unwrap().push(cost);
        Ok(())
    }
    fn log_core(&mut self, _: usize, _: usize, _: usize) -> Result<(), LoggerError> {
        Ok(())
    }
    fn log_stratum(&mut self, _: usize, _: Phase) -> Result<(), LoggerError> {
        Ok(())
    }
    fn log_gap(&mut self, _: usize, _: Phase) -> Result<(), LoggerError> {
        Ok(())
    }
    fn log_hardened(&mut self, _: usize, _: usize) -> Result<(), LoggerError> {
        Ok(())
    }
    fn log_phase_change(&mut self, _: Phase) -> Result<(), LoggerError> {
        Ok(())
    }
    fn log_oracle_call(&mut self, _: SolverResult) -> Result<(), LoggerError> {
        Ok(())
    }
    fn log_message(&mut self, _: &str) -> Result<(), LoggerError> {
        Ok(())
    }
}

#[test]
fn upper_bound_is_monotone() {
    let hards = vec![clause![!lit![5]]];
    let softs: Vec<(Clause, usize)> = [100, 100, 50, 50, 50, 10, 10, 10, 10, 10]
        .iter()
        .enumerate()
        .map(|(idx, &w)| (clause![Lit::positive(idx as u32)], w))
        .collect();

    let mut cnf = Cnf::new();
    hards.iter().cloned().for_each(|cl| cnf.add_clause(cl));
    let vm = BasicVarManager::from_next_free(var![max_var_in(&hards, &softs)]);
    let mut solver = Solver::new(cnf, softs, 0, vm, Options::default()).unwrap();

    let recorder = BoundRecorder::default();
    let bounds = recorder.bounds.clone();
    solver.attach_logger(recorder);

    assert_eq!(solver.search().unwrap(), ExitStatus::Optimum);
    let bounds = bounds.lock().unwrap();
    assert!(!bounds.is_empty());
    assert!(bounds.windows(2).all(|w| w[1] < w[0]));
    assert_eq!(*bounds.last().unwrap(), 10);

    let (lb, ub) = solver.bounds();
    assert_eq!(lb, ub);
}

#[test]
fn empty_instance_is_rejected() {
    let vm = BasicVarManager::default();
    let res = Solver::new(Cnf::new(), Vec::new(), 0, vm, Options::default());
    assert!(res.is_err());
}
