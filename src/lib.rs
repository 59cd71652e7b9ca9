//! # Core-Guided MaxSAT Solving with MaxSAT Resolution
//!
//! This library implements a weighted MaxSAT solver built around the MaxSAT
//! resolution (PMRES) core relaxation \[1\], weight-stratified core extraction
//! \[2\], and an optional transition into solution-improving linear search over
//! a pseudo-boolean encoding of the residual objective \[3\]. Any incremental
//! SAT solver and any cardinality or pseudo-boolean encoding from
//! [RustSAT](https://github.com/chrjabs/rustsat) can be plugged in as the
//! decision oracle and the objective encoder.
//!
//! ## References
//!
//! - \[1\] Nina Narodytska and Fahiem Bacchus: _Maximum Satisfiability Using
//!   Core-Guided MaxSAT Resolution_, AAAI 2014.
//! - \[2\] Carlos Ansótegui, Maria Luisa Bonet, Joel Gabàs and Jordi Levy:
//!   _Improving SAT-Based Weighted MaxSAT Solvers_, CP 2012.
//! - \[3\] Jeremias Berg, Emir Demirović and Peter J. Stuckey: _Core-Boosted
//!   Linear Search for Incomplete MaxSAT_, CPAIOR 2019.

use std::fmt;

use rustsat::solvers::{SolverError, SolverResult};

pub mod formula;
pub mod options;
pub mod types;

pub use options::{Options, SearchMode, WeightStrategy};

mod solver;
pub use crate::solver::{Interrupter, PMRes};

#[cfg(feature = "build-binary")]
pub mod cli;

/// Terminal status of a completed search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// An optimal solution was found and proven optimal
    Optimum,
    /// The hard clauses alone are unsatisfiable
    Unsatisfiable,
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Optimum => write!(f, "optimum"),
            ExitStatus::Unsatisfiable => write!(f, "unsatisfiable"),
        }
    }
}

/// Early termination reasons for [`PMRes::search`]
#[derive(Debug)]
pub enum Termination {
    /// Terminated because of an external interrupt
    Interrupted,
    /// The instance contains no variables
    NoVars,
    /// Termination because an attached logger failed
    LoggerError(LoggerError),
    /// An error occured in the oracle
    OracleError(SolverError),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Interrupted => {
                write!(f, "solver terminated early because of interrupt signal")
            }
            Termination::NoVars => write!(f, "the instance does not contain any variables"),
            Termination::LoggerError(err) => write!(f, "{}", err),
            Termination::OracleError(err) => write!(f, "error in the SAT oracle: {}", err),
        }
    }
}

impl From<SolverError> for Termination {
    fn from(se: SolverError) -> Self {
        Termination::OracleError(se)
    }
}

impl From<LoggerError> for Termination {
    fn from(le: LoggerError) -> Self {
        Termination::LoggerError(le)
    }
}

/// Search phases that the solver can be in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Core-guided phase, extracting and relaxing cores
    CoreGuided,
    /// Linear search phase over the pseudo-boolean objective encoding
    Linear,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::CoreGuided => write!(f, "core-guided"),
            Phase::Linear => write!(f, "linear"),
        }
    }
}

/// Statistics of the solver
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Stats {
    /// The number of calls to the SAT oracle
    pub n_oracle_calls: usize,
    /// The number of satisfiable oracle calls
    pub n_satisfiable: usize,
    /// The number of extracted unsatisfiable cores
    pub n_cores: usize,
    /// The summed size of all extracted cores
    pub sum_core_sizes: usize,
    /// The number of soft clauses hardened or subsumed during search
    pub n_hardened: usize,
    /// The number of times the oracle was rebuilt from scratch
    pub n_oracle_resets: usize,
    /// The number of hard clauses in the input
    pub n_orig_hards: usize,
    /// The number of soft clauses in the input
    pub n_orig_softs: usize,
}

/// A logger to attach to a solver
pub trait WriteSolverLog {
    /// Adds an improved upper bound to the log
    fn log_bound(&mut self, cost: isize) -> Result<(), LoggerError>;
    /// Adds an extracted core to the log
    fn log_core(
        &mut self,
        core_weight: usize,
        core_size: usize,
        lb_cost: usize,
    ) -> Result<(), LoggerError>;
    /// Adds a change of the working stratum weight to the log
    fn log_stratum(&mut self, weight: usize, phase: Phase) -> Result<(), LoggerError>;
    /// Adds an improved bound gap to the log
    fn log_gap(&mut self, gap: usize, phase: Phase) -> Result<(), LoggerError>;
    /// Adds a hardening round to the log
    fn log_hardened(&mut self, n_hardened: usize, next_trigger: usize) -> Result<(), LoggerError>;
    /// Adds a phase change to the log
    fn log_phase_change(&mut self, phase: Phase) -> Result<(), LoggerError>;
    /// Adds an oracle call to the log
    fn log_oracle_call(&mut self, result: SolverResult) -> Result<(), LoggerError>;
    /// Adds a free-form comment to the log
    fn log_message(&mut self, msg: &str) -> Result<(), LoggerError>;
}

/// Error type for loggers
pub struct LoggerError {
    ierror: Box<dyn fmt::Display>,
}

impl LoggerError {
    pub fn new<IE: fmt::Display + 'static>(ierror: IE) -> Self {
        LoggerError {
            ierror: Box::new(ierror),
        }
    }
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoggerError: {}", self.ierror)
    }
}

impl fmt::Debug for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoggerError: {}", self.ierror)
    }
}
