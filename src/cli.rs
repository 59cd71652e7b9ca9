//! # Command Line Interface for the Solver Binary

use std::io::Error as IOError;
use std::{fmt, io::Write, path::PathBuf, time::Duration};

use clap::{crate_authors, crate_name, crate_version, Parser, ValueEnum};
use cpu_time::ProcessTime;
use rustsat::{
    solvers::{SolverResult, SolverStats},
    types::{Assignment, TernaryVal, Var},
};
use termcolor::{Buffer, BufferWriter, Color, ColorSpec, WriteColor};

use crate::{
    ExitStatus, LoggerError, Options, Phase, SearchMode, Stats, WeightStrategy, WriteSolverLog,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// The path to the WCNF instance file to load
    inst_path: PathBuf,
    /// The top-level search strategy: 0 is pure core-guided search, 1 runs
    /// the core-guided phase followed by linear search, 2 is linear search
    /// only
    #[arg(long, default_value_t = 1)]
    linear_strategy: u8,
    /// The stratification strategy for the core-guided phase
    #[arg(long, value_enum, default_value_t = WeightStrategy::Diversify)]
    weight_strategy: WeightStrategy,
    /// Use varying-resolution stratification in the core-guided phase
    #[arg(long)]
    varres_cg: bool,
    /// Use varying-resolution bound refinement in the linear phase
    #[arg(long)]
    varres_lin: bool,
    /// The divisor used by varying resolution
    #[arg(long, default_value_t = 2)]
    varres_factor: usize,
    /// Wall-clock budget in seconds for the core-guided phase of a hybrid
    /// search (negative values disable the budget)
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    core_time_limit: f64,
    /// Deliver pending relaxation clauses to the oracle before advancing the
    /// stratum
    #[arg(long, default_value_t = Bool::True)]
    relax_before_strat: Bool,
    /// Tighten the objective bound through assumptions instead of unit
    /// clauses
    #[arg(long)]
    incremental_varres: bool,
    /// Rebuild the oracle from scratch when entering the linear phase
    #[arg(long)]
    delete_before_lin: bool,
    /// The pseudo-boolean encoding for the objective
    #[arg(long, value_enum, default_value_t = PbEncoding::Gte)]
    pb_encoding: PbEncoding,
    /// Verbosity of the comment lines: 0 prints bounds only, 1 adds search
    /// progress, 2 adds individual oracle calls
    #[arg(short, long, default_value_t = 0)]
    verbosity: u8,
    #[command(flatten)]
    color: concolor_clap::Color,
    /// Print the solver configuration
    #[arg(long)]
    print_solver_config: bool,
    /// Don't print statistics
    #[arg(long)]
    no_print_stats: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
enum CliError {
    #[error("invalid linear strategy {0}, expected 0, 1 or 2")]
    InvalidLinearStrategy(u8),
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Bool {
    /// Turn on feature
    True,
    /// Turn off feature
    False,
}

impl Bool {
    fn is_true(&self) -> bool {
        self == &Bool::True
    }
}

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bool::True => write!(f, "true"),
            Bool::False => write!(f, "false"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum PbEncoding {
    /// The generalized totalizer encoding
    Gte,
    /// The dynamic poly watchdog encoding
    Dpw,
}

impl fmt::Display for PbEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PbEncoding::Gte => write!(f, "gte"),
            PbEncoding::Dpw => write!(f, "dpw"),
        }
    }
}

pub struct Cli {
    pub options: Options,
    pub pb_encoding: PbEncoding,
    pub inst_path: PathBuf,
    stdout: BufferWriter,
    stderr: BufferWriter,
    verbosity: u8,
    print_solver_config: bool,
    print_stats: bool,
    color: concolor_clap::Color,
}

impl Cli {
    pub fn init() -> anyhow::Result<Self> {
        let args = CliArgs::parse();
        let search_mode = match SearchMode::from_index(args.linear_strategy) {
            Some(mode) => mode,
            None => return Err(CliError::InvalidLinearStrategy(args.linear_strategy).into()),
        };
        let core_time_limit = if args.core_time_limit > 0.0 {
            Some(Duration::from_secs_f64(args.core_time_limit))
        } else {
            None
        };
        Ok(Self {
            options: Options {
                weight_strategy: args.weight_strategy,
                search_mode,
                varres_cg: args.varres_cg,
                varres_lin: args.varres_lin,
                varres_factor: std::cmp::max(args.varres_factor, 2),
                core_time_limit,
                relax_before_strat: args.relax_before_strat.is_true(),
                incremental_varres: args.incremental_varres,
                delete_before_lin: args.delete_before_lin,
            },
            pb_encoding: args.pb_encoding,
            inst_path: args.inst_path,
            stdout: BufferWriter::stdout(color_choice(args.color.color, atty::Stream::Stdout)),
            stderr: BufferWriter::stderr(color_choice(args.color.color, atty::Stream::Stderr)),
            verbosity: args.verbosity,
            print_solver_config: args.print_solver_config,
            print_stats: !args.no_print_stats,
            color: args.color,
        })
    }

    pub fn new_cli_logger(&self) -> CliLogger {
        CliLogger {
            stdout: BufferWriter::stdout(color_choice(self.color.color, atty::Stream::Stdout)),
            verbosity: self.verbosity,
        }
    }

    pub fn warning(&self, msg: &str) -> Result<(), IOError> {
        let mut buffer = self.stderr.buffer();
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Yellow)))?;
        write!(&mut buffer, "warning")?;
        buffer.reset()?;
        writeln!(&mut buffer, ": {}", msg)?;
        self.stderr.print(&buffer)?;
        Ok(())
    }

    pub fn error(&self, msg: &str) -> Result<(), IOError> {
        let mut buffer = self.stderr.buffer();
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Red)))?;
        write!(&mut buffer, "error")?;
        buffer.reset()?;
        writeln!(&mut buffer, ": {}", msg)?;
        self.stderr.print(&buffer)?;
        Ok(())
    }

    pub fn info(&self, msg: &str) -> Result<(), IOError> {
        if self.verbosity == 0 {
            return Ok(());
        }
        let mut buffer = self.stdout.buffer();
        writeln!(&mut buffer, "c {}", msg)?;
        self.stdout.print(&buffer)?;
        Ok(())
    }

    pub fn print_header(&self) -> Result<(), IOError> {
        let mut buffer = self.stdout.buffer();
        write!(&mut buffer, "c ")?;
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Green)))?;
        write!(&mut buffer, "{}", crate_name!())?;
        buffer.reset()?;
        writeln!(&mut buffer, " ({})", crate_version!())?;
        writeln!(&mut buffer, "c {}", crate_authors!("\nc "))?;
        self.stdout.print(&buffer)?;
        Ok(())
    }

    pub fn print_solver_config(&self) -> Result<(), IOError> {
        if self.print_solver_config {
            let mut buffer = self.stdout.buffer();
            Self::print_parameter(&mut buffer, "linear-strategy", self.options.search_mode)?;
            Self::print_parameter(&mut buffer, "weight-strategy", self.options.weight_strategy)?;
            Self::print_parameter(&mut buffer, "varres-cg", self.options.varres_cg)?;
            Self::print_parameter(&mut buffer, "varres-lin", self.options.varres_lin)?;
            Self::print_parameter(&mut buffer, "varres-factor", self.options.varres_factor)?;
            Self::print_parameter(
                &mut buffer,
                "core-time-limit",
                OptVal::new(self.options.core_time_limit.map(|l| l.as_secs_f64())),
            )?;
            Self::print_parameter(
                &mut buffer,
                "relax-before-strat",
                self.options.relax_before_strat,
            )?;
            Self::print_parameter(
                &mut buffer,
                "incremental-varres",
                self.options.incremental_varres,
            )?;
            Self::print_parameter(
                &mut buffer,
                "delete-before-lin",
                self.options.delete_before_lin,
            )?;
            Self::print_parameter(&mut buffer, "pb-encoding", self.pb_encoding)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    pub fn print_stats(&self, stats: Stats) -> Result<(), IOError> {
        if self.print_stats {
            let mut buffer = self.stdout.buffer();
            Self::print_parameter(&mut buffer, "n-oracle-calls", stats.n_oracle_calls)?;
            Self::print_parameter(&mut buffer, "n-satisfiable", stats.n_satisfiable)?;
            Self::print_parameter(&mut buffer, "n-cores", stats.n_cores)?;
            Self::print_parameter(&mut buffer, "sum-core-sizes", stats.sum_core_sizes)?;
            Self::print_parameter(&mut buffer, "n-hardened", stats.n_hardened)?;
            Self::print_parameter(&mut buffer, "n-oracle-resets", stats.n_oracle_resets)?;
            Self::print_parameter(&mut buffer, "n-orig-hards", stats.n_orig_hards)?;
            Self::print_parameter(&mut buffer, "n-orig-softs", stats.n_orig_softs)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    pub fn print_oracle_stats(&self, stats: SolverStats) -> Result<(), IOError> {
        if self.print_stats {
            let mut buffer = self.stdout.buffer();
            Self::print_parameter(&mut buffer, "oracle-sat-solves", stats.n_sat_solves)?;
            Self::print_parameter(&mut buffer, "oracle-unsat-solves", stats.n_unsat_solves)?;
            Self::print_parameter(&mut buffer, "oracle-clauses", stats.n_clauses)?;
            Self::print_parameter(&mut buffer, "oracle-vars", stats.n_vars)?;
            Self::print_parameter(&mut buffer, "oracle-avg-clause-len", stats.avg_clause_len)?;
            Self::print_parameter(&mut buffer, "oracle-cpu-solve-time", stats.cpu_solve_time)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    /// Prints the terminal status line and, on an optimum, the witnessing
    /// model restricted to the input variables
    pub fn print_answer(
        &self,
        status: ExitStatus,
        model: Option<&Assignment>,
        max_orig_var: Option<Var>,
    ) -> Result<(), IOError> {
        let mut buffer = self.stdout.buffer();
        match status {
            ExitStatus::Unsatisfiable => writeln!(&mut buffer, "s UNSATISFIABLE")?,
            ExitStatus::Optimum => {
                writeln!(&mut buffer, "s OPTIMUM FOUND")?;
                if let (Some(model), Some(max_var)) = (model, max_orig_var) {
                    Self::print_model(&mut buffer, model, max_var)?;
                }
            }
        }
        self.stdout.print(&buffer)?;
        Ok(())
    }

    /// Prints the status line for an unfinished search
    pub fn print_unknown(&self) -> Result<(), IOError> {
        let mut buffer = self.stdout.buffer();
        writeln!(&mut buffer, "s UNKNOWN")?;
        self.stdout.print(&buffer)?;
        Ok(())
    }

    fn print_model(buffer: &mut Buffer, model: &Assignment, max_var: Var) -> Result<(), IOError> {
        write!(buffer, "v")?;
        for idx in 0..=max_var.idx32() {
            let var = rustsat::var![idx];
            match model.var_value(var) {
                TernaryVal::False => write!(buffer, " -{}", idx + 1)?,
                _ => write!(buffer, " {}", idx + 1)?,
            }
        }
        writeln!(buffer)?;
        Ok(())
    }

    fn print_parameter<V: fmt::Display>(
        buffer: &mut Buffer,
        name: &str,
        val: V,
    ) -> Result<(), IOError> {
        write!(buffer, "c ")?;
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(buffer, "{}", name)?;
        buffer.reset()?;
        writeln!(buffer, ": {}", val)?;
        Ok(())
    }
}

fn color_choice(choice: concolor_clap::ColorChoice, stream: atty::Stream) -> termcolor::ColorChoice {
    match choice {
        concolor_clap::ColorChoice::Always => termcolor::ColorChoice::Always,
        concolor_clap::ColorChoice::Never => termcolor::ColorChoice::Never,
        concolor_clap::ColorChoice::Auto => {
            if atty::is(stream) {
                termcolor::ColorChoice::Auto
            } else {
                termcolor::ColorChoice::Never
            }
        }
    }
}

pub struct CliLogger {
    stdout: BufferWriter,
    verbosity: u8,
}

impl CliLogger {
    fn wrap_error<T>(ires: Result<T, IOError>) -> Result<T, LoggerError> {
        match ires {
            Ok(t) => Ok(t),
            Err(ierror) => Err(LoggerError::new(ierror)),
        }
    }

    fn ilog_bound(&self, cost: isize) -> Result<(), IOError> {
        let mut buffer = self.stdout.buffer();
        writeln!(&mut buffer, "o {}", cost)?;
        self.stdout.print(&buffer)?;
        Ok(())
    }

    fn ilog_core(
        &self,
        core_weight: usize,
        core_size: usize,
        lb_cost: usize,
    ) -> Result<(), IOError> {
        if self.verbosity > 0 {
            let mut buffer = self.stdout.buffer();
            writeln!(
                &mut buffer,
                "c LB : {:<12} CS : {:<12} W  : {:<12}",
                lb_cost, core_size, core_weight
            )?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn ilog_stratum(&self, weight: usize, phase: Phase) -> Result<(), IOError> {
        if self.verbosity > 0 {
            let mut buffer = self.stdout.buffer();
            writeln!(
                &mut buffer,
                "c {} stratum weight {} at {:.2}s",
                phase,
                weight,
                ProcessTime::now().as_duration().as_secs_f32(),
            )?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn ilog_gap(&self, gap: usize, phase: Phase) -> Result<(), IOError> {
        if self.verbosity > 0 {
            let mut buffer = self.stdout.buffer();
            writeln!(
                &mut buffer,
                "c {} gap {} at {:.2}s",
                phase,
                gap,
                ProcessTime::now().as_duration().as_secs_f32(),
            )?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn ilog_hardened(&self, n_hardened: usize, next_trigger: usize) -> Result<(), IOError> {
        if self.verbosity > 0 {
            let mut buffer = self.stdout.buffer();
            writeln!(
                &mut buffer,
                "c hardened {} clauses, next trigger at gap {}",
                n_hardened, next_trigger
            )?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn ilog_phase_change(&self, phase: Phase) -> Result<(), IOError> {
        if self.verbosity > 0 {
            let mut buffer = self.stdout.buffer();
            writeln!(
                &mut buffer,
                "c entering {} search at {:.2}s",
                phase,
                ProcessTime::now().as_duration().as_secs_f32(),
            )?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn ilog_oracle_call(&self, result: SolverResult) -> Result<(), IOError> {
        if self.verbosity > 1 {
            let mut buffer = self.stdout.buffer();
            writeln!(
                &mut buffer,
                "c oracle call returned {} at {:.2}s",
                result,
                ProcessTime::now().as_duration().as_secs_f32(),
            )?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn ilog_message(&self, msg: &str) -> Result<(), IOError> {
        if self.verbosity > 0 {
            let mut buffer = self.stdout.buffer();
            writeln!(&mut buffer, "c {}", msg)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }
}

impl WriteSolverLog for CliLogger {
    fn log_bound(&mut self, cost: isize) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_bound(cost))
    }

    fn log_core(
        &mut self,
        core_weight: usize,
        core_size: usize,
        lb_cost: usize,
    ) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_core(core_weight, core_size, lb_cost))
    }

    fn log_stratum(&mut self, weight: usize, phase: Phase) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_stratum(weight, phase))
    }

    fn log_gap(&mut self, gap: usize, phase: Phase) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_gap(gap, phase))
    }

    fn log_hardened(&mut self, n_hardened: usize, next_trigger: usize) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_hardened(n_hardened, next_trigger))
    }

    fn log_phase_change(&mut self, phase: Phase) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_phase_change(phase))
    }

    fn log_oracle_call(&mut self, result: SolverResult) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_oracle_call(result))
    }

    fn log_message(&mut self, msg: &str) -> Result<(), LoggerError> {
        Self::wrap_error(self.ilog_message(msg))
    }
}

struct OptVal<T> {
    val: Option<T>,
}

impl<T> OptVal<T> {
    fn new(val: Option<T>) -> Self {
        OptVal { val }
    }
}

impl<T: fmt::Display> fmt::Display for OptVal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.val {
            Some(t) => fmt::Display::fmt(&t, f),
            None => write!(f, "none"),
        }
    }
}

#[test]
fn verify_cli_args() {
    use clap::CommandFactory;
    CliArgs::command().debug_assert()
}
