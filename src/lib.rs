//! Crate to presolve flatzinc models.
//!
//! Minizinc problems are compiled to flatzinc, a flat list of integer
//! variables and builtin constraints. This crate parses that format
//! into a mutable intermediate representation and rewrites it in
//! place into an equivalent but simpler model for a CP solver.

pub mod cli;
pub mod fzn;
pub mod presolve;
