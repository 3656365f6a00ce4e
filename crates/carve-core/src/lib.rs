//! Core model-document types for the carve neighborhood-search engine.
//!
//! This crate defines the optimization problem representation shared by every
//! other carve crate:
//! - Integer domains as ordered sets of disjoint closed intervals
//! - Variables, typed constraints (linear, clause, scheduling, packing, routing)
//! - Linear expressions and the optional linear objective
//! - The solve boundary: status, limits, response, and the `SubSolver` trait
//!   through which an external engine solves a (sub-)model

pub mod domain;
pub mod error;
pub mod feasibility;
pub mod linear;
pub mod model;
pub mod solve;

pub use domain::Domain;
pub use error::{CoreError, Result};
pub use feasibility::{is_feasible, objective_value};
pub use linear::LinearExpr;
pub use model::{
    Arc, Assignment, Constraint, ConstraintId, ConstraintKind, Interval, IntervalId, Literal,
    ModelDocument, Objective, VarId, Variable,
};
pub use solve::{SolveLimits, SolveStatus, SubResponse, SubSolver};
