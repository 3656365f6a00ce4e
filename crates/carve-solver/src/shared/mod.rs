//! Shared cross-worker state: solution pool, response bounds/status,
//! bounds and clause exchange.
//!
//! Every structure here follows the same discipline: one scoped mutex per
//! structure, held only for O(state size) bookkeeping and never across a
//! model solve; publication is fire-and-forget; merge steps sort before
//! deduplicating so the visible state after `synchronize` is independent of
//! the arrival interleaving of concurrent producers.

pub mod bounds;
pub mod clauses;
pub mod response;
pub mod solutions;

pub use bounds::SharedBoundsManager;
pub use clauses::{SharedClausesManager, UniqueClauseStream};
pub use response::SharedResponseManager;
pub use solutions::{SharedSolutionRepository, Solution};
