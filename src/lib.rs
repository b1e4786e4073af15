//! # fdgrad: gradient verification for differentiable simulation
//!
//! Tooling for threading gradients through a black-box electromagnetic
//! solver and checking them against finite-difference ground truth.
//!
//! ## Key pieces
//!
//! - **Numeric oracle**: [`grad_num`] / [`jacobian_num`] estimate
//!   gradients and dense Jacobians by forward differences — the ground
//!   truth an automatic gradient is compared against
//! - **Custom VJPs**: [`vjp_targets`] and [`VjpTarget`] manufacture
//!   reverse-mode vector-Jacobian products for non-differentiable
//!   primitives, so a solver step can participate in an AD graph
//! - **Jacobian assembly**: [`jacobian`] pushes the standard basis of
//!   the output space back through any [`ReverseMode`] pullback to
//!   recover a dense Jacobian
//! - **Solver contract**: [`solver::FieldSolver`] is the interface the
//!   external FDTD/FDFD engine implements
//!
//! ## Quick Start
//!
//! ```rust
//! use fdgrad::{grad_num, Array, Shape};
//!
//! // f(x) = sum(x^2), gradient 2x
//! let x = Array::from_vec(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
//! let g = grad_num(|x| x.as_slice().iter().map(|v| v * v).sum(), &x, 1e-6).unwrap();
//! assert!((g.get(2) - 6.0).abs() < 1e-3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod array;
mod error;
pub mod jacobian;
pub mod numdiff;
mod shape;
pub mod solver;
pub mod vjp;

// Public exports
pub use array::Array;
pub use error::{GradError, Result};
pub use jacobian::{jacobian, FdReverse, Partial, ReverseMode, ReversePass};
pub use numdiff::{grad_num, grad_num_par, jacobian_num, StepSize};
pub use shape::Shape;
pub use vjp::{vjp_targets, NumericVjp, VjpTarget};
