//! # Options
//!
//! This module contains all configuration options of the solver.

use std::{fmt, time::Duration};

/// Solver-wide configuration options
#[derive(Clone, Copy)]
pub struct Options {
    /// The stratification strategy for picking the working weight
    pub weight_strategy: WeightStrategy,
    /// The top-level search strategy
    pub search_mode: SearchMode,
    /// Varying-resolution stratification in the core-guided phase
    pub varres_cg: bool,
    /// Varying-resolution bound refinement in the linear phase
    pub varres_lin: bool,
    /// The divisor used by varying resolution
    pub varres_factor: usize,
    /// Wall-clock budget for the core-guided phase of a hybrid search
    pub core_time_limit: Option<Duration>,
    /// Deliver pending relaxation clauses to the oracle before advancing the
    /// stratum (as opposed to advancing the stratum first)
    pub relax_before_strat: bool,
    /// Tighten the objective bound through assumptions instead of unit clauses
    pub incremental_varres: bool,
    /// Rebuild the oracle from scratch when entering the linear phase
    pub delete_before_lin: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            weight_strategy: WeightStrategy::Diversify,
            search_mode: SearchMode::Hybrid,
            varres_cg: false,
            varres_lin: false,
            varres_factor: 2,
            core_time_limit: None,
            relax_before_strat: true,
            incremental_varres: false,
            delete_before_lin: false,
        }
    }
}

impl Options {
    /// Whether hardened units may live in the oracle only, without being
    /// mirrored into the formula store. Requires that the oracle is never
    /// rebuilt during the linear phase.
    pub(crate) fn harden_lazily(&self) -> bool {
        !self.delete_before_lin && !self.varres_lin
    }
}

/// Strategy for advancing the working weight between strata
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "build-binary", derive(clap::ValueEnum))]
pub enum WeightStrategy {
    /// No stratification wanted; the solver falls back to `Normal`
    None,
    /// Step to the next-smaller distinct soft clause weight
    Normal,
    /// Step until the clause/weight diversity ratio is reached
    #[default]
    Diversify,
}

impl fmt::Display for WeightStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightStrategy::None => write!(f, "none"),
            WeightStrategy::Normal => write!(f, "normal"),
            WeightStrategy::Diversify => write!(f, "diversify"),
        }
    }
}

/// Top-level search strategy
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum SearchMode {
    /// Stay in the core-guided phase until an optimum is proven
    CoreGuided,
    /// Run the core-guided phase first, then switch to linear search once the
    /// working weight reaches 1 or the core budget expires
    #[default]
    Hybrid,
    /// Skip the core-guided phase entirely
    LinearOnly,
}

impl SearchMode {
    /// Parses the numeric strategy selector used on the command line
    pub fn from_index(idx: u8) -> Option<SearchMode> {
        match idx {
            0 => Some(SearchMode::CoreGuided),
            1 => Some(SearchMode::Hybrid),
            2 => Some(SearchMode::LinearOnly),
            _ => None,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::CoreGuided => write!(f, "core-guided"),
            SearchMode::Hybrid => write!(f, "hybrid"),
            SearchMode::LinearOnly => write!(f, "linear-only"),
        }
    }
}
