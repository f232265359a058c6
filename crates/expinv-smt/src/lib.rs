#![doc = include_str!("../README.md")]

//! SMT and quantifier-elimination integration for expectation-invariant
//! synthesis.
//!
//! Queries are built as [`terms::SmtTerm`] trees, printed to SMT-LIB and
//! sent to a fresh solver process per query. Redlog scripts go to a
//! REDUCE process the same way. No solver state survives between calls.

pub mod backends;
pub mod process;
pub mod solver;
pub mod sorts;
pub mod terms;
