use std::thread;

use anyhow::anyhow;
use maxres::{
    cli::{Cli, PbEncoding},
    PMRes, Termination,
};
use rustsat::{
    encodings::{card, pb},
    instances::{BasicVarManager, ManageVars, OptInstance},
    types::Lit,
};
use rustsat_cadical::CaDiCaL;

/// The SAT oracle used
type Oracle = CaDiCaL<'static, 'static>;

/// Solver instantiation for a given objective encoding
type Solver<PBE> = PMRes<PBE, card::Totalizer, BasicVarManager, Oracle>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::init()?;

    cli.print_header()?;
    cli.print_solver_config()?;
    cli.info(&format!("solving instance {:?}", cli.inst_path))?;

    let inst: OptInstance =
        OptInstance::from_dimacs_path(&cli.inst_path).map_err(|err| anyhow!("{}", err))?;

    match cli.pb_encoding {
        PbEncoding::Gte => sub_main::<pb::GeneralizedTotalizer>(inst, &cli),
        PbEncoding::Dpw => sub_main::<pb::DynamicPolyWatchdog>(inst, &cli),
    }
}

fn sub_main<PBE>(inst: OptInstance, cli: &Cli) -> anyhow::Result<()>
where
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
{
    let (constr, obj) = inst.decompose();
    let (cnf, var_manager) = constr.as_cnf();
    let max_orig_var = var_manager.max_var();
    let (soft_cls, offset) = if obj.constant() {
        (Vec::new(), obj.offset())
    } else {
        let (soft_cls, offset) = obj.as_soft_cls();
        (soft_cls.into_iter().collect(), offset)
    };

    let mut solver: Solver<PBE> = PMRes::new(cnf, soft_cls, offset, var_manager, cli.options)
        .map_err(|term| anyhow!("{}", term))?;
    solver.attach_logger(cli.new_cli_logger());
    setup_interrupts(&mut solver)?;

    match solver.search() {
        Ok(status) => {
            cli.info("finished solving the instance")?;
            cli.print_stats(solver.stats())?;
            cli.print_oracle_stats(solver.oracle_stats())?;
            cli.print_answer(status, solver.best_model(), max_orig_var)?;
        }
        Err(Termination::Interrupted) => {
            cli.info("interrupted, reporting the best known bounds")?;
            let (lb, ub) = solver.bounds();
            cli.info(&format!("lower bound {}, upper bound {}", lb, ub))?;
            cli.print_stats(solver.stats())?;
            cli.print_unknown()?;
        }
        Err(term) => {
            cli.error(&format!("{}", term))?;
            cli.print_unknown()?;
            return Err(anyhow!("{}", term));
        }
    }

    Ok(())
}

fn setup_interrupts<PBE>(solver: &mut Solver<PBE>) -> anyhow::Result<()> {
    let mut interrupter = solver.interrupter();
    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGXCPU,
        signal_hook::consts::SIGABRT,
    ])?;
    // Thread for catching incoming signals
    thread::spawn(move || {
        for _ in signals.forever() {
            interrupter.interrupt();
        }
    });
    Ok(())
}
