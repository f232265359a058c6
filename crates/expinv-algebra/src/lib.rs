#![doc = include_str!("../README.md")]

//! Exact algebra for polynomial expectation-invariant synthesis.
//!
//! The synthesis engine never touches floating point on the path from
//! sample points to a certified invariant. This crate supplies the
//! pieces it needs for that: integer number theory, monomial
//! enumeration, rational polynomials and exact interpolation bases.

pub mod arith;
pub mod basis;
pub mod monomial;
pub mod polynomial;

pub use arith::{binomial, format_rational, gcd, lcm, lcm_all, reduce_fraction, AlgebraError};
pub use basis::{interpolation_basis, vandermonde, AdjugateBasis, Basis};
pub use monomial::{enumerate_monomials, monomial_count, Monomial};
pub use polynomial::Polynomial;

pub use num::bigint::BigInt;
pub use num::rational::BigRational;
