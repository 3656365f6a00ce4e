//! Carve Solver Engine
//!
//! The improvement loop of a parallel combinatorial-optimization solver:
//! - Neighborhood helper: constraint graph, synchronized domains, fix/relax
//! - Neighborhood generators: the LNS strategy portfolio with self-tuning
//!   difficulty and deterministic time budgets
//! - Shared state: solution repository, response manager (bounds, status,
//!   gap integral, callbacks), bounds/clauses exchange managers
//! - Worker loop and UCB1-based generator selection

pub mod adaptive;
pub mod combiner;
pub mod generators;
pub mod helper;
pub mod neighborhood;
pub mod portfolio;
pub mod shared;

#[cfg(test)]
pub(crate) mod test_utils;

pub use adaptive::AdaptiveParameter;
pub use combiner::SolutionCombiner;
pub use generators::{GeneratorStats, NeighborhoodGenerator, SolveData};
pub use helper::NeighborhoodHelper;
pub use neighborhood::Neighborhood;
pub use portfolio::{default_portfolio, GeneratorPortfolio, LnsWorker};
pub use shared::{
    SharedBoundsManager, SharedClausesManager, SharedResponseManager, SharedSolutionRepository,
    Solution, UniqueClauseStream,
};
