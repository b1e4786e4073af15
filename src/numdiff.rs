//! Finite-difference gradient and Jacobian oracles.
//!
//! These are the ground-truth estimators used to validate automatic
//! gradients: a forward-difference gradient for scalar objectives and a
//! brute-force dense Jacobian for vector-valued functions. Both cost one
//! function evaluation per input entry and never mutate their arguments.

use crate::error::{GradError, Result};
use crate::{Array, Shape};
use rayon::prelude::*;
use tracing::debug;

/// Perturbation magnitude for finite differences.
///
/// Either one scalar applied to every entry, or a per-entry array of the
/// same shape as the differentiated argument. Every resolved entry must
/// be nonzero and finite; a zero, `NaN` or infinite step is rejected
/// before any function evaluation.
#[derive(Debug, Clone)]
pub enum StepSize {
    /// The same step for every parameter entry.
    Uniform(f64),
    /// One step per parameter entry, shaped like the argument.
    PerEntry(Array),
}

impl StepSize {
    /// Resolve to one step per flat entry of an argument with the given
    /// shape, checking the step and shape invariants.
    pub fn resolve(&self, shape: &Shape) -> Result<Vec<f64>> {
        match self {
            StepSize::Uniform(s) => {
                check_step(*s, 0)?;
                Ok(vec![*s; shape.size()])
            }
            StepSize::PerEntry(steps) => {
                if steps.shape() != shape {
                    return Err(GradError::ShapeMismatch {
                        expected: shape.clone(),
                        got: steps.shape().clone(),
                    });
                }
                for (index, &s) in steps.as_slice().iter().enumerate() {
                    check_step(s, index)?;
                }
                Ok(steps.to_vec())
            }
        }
    }
}

/// Reject a step that cannot produce a usable difference quotient.
pub(crate) fn check_step(step: f64, index: usize) -> Result<()> {
    if step == 0.0 || !step.is_finite() {
        return Err(GradError::InvalidStep { index });
    }
    Ok(())
}

impl From<f64> for StepSize {
    fn from(s: f64) -> Self {
        StepSize::Uniform(s)
    }
}

impl From<Array> for StepSize {
    fn from(steps: Array) -> Self {
        StepSize::PerEntry(steps)
    }
}

/// Numerically differentiate `f` with respect to its argument.
///
/// For every flat index `i` of `arg`, evaluates `f` at a copy of `arg`
/// with entry `i` incremented by the step, and estimates
/// `gradient[i] = (f(arg + step_i e_i) - f(arg)) / step_i` (forward
/// difference). The gradient has the same shape as `arg`.
///
/// Non-finite function values propagate into the corresponding gradient
/// entries rather than being masked.
///
/// # Examples
///
/// ```
/// # use fdgrad::{grad_num, Array, Shape};
/// let x = Array::from_vec(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
/// // f(x) = sum(x^2), gradient 2x
/// let g = grad_num(|x| x.as_slice().iter().map(|v| v * v).sum(), &x, 1e-6).unwrap();
/// assert!((g.get(1) - 4.0).abs() < 1e-3);
/// ```
pub fn grad_num<F>(f: F, arg: &Array, step_size: impl Into<StepSize>) -> Result<Array>
where
    F: Fn(&Array) -> f64,
{
    let step = step_size.into().resolve(arg.shape())?;
    let f_old = f(arg);
    debug!(size = arg.size(), "numeric gradient");

    let gradient: Vec<f64> = (0..arg.size())
        .map(|i| (f(&arg.perturbed(i, step[i])) - f_old) / step[i])
        .collect();

    Ok(Array::from_vec(gradient, arg.shape().clone()))
}

/// Parallel variant of [`grad_num`].
///
/// The perturbation loop is embarrassingly parallel: each entry's
/// estimate depends only on the unperturbed argument and `f_old`. The
/// function must therefore be safe to invoke concurrently; a function
/// wrapping a solver with shared mutable state must capture that state
/// by value per invocation.
pub fn grad_num_par<F>(f: F, arg: &Array, step_size: impl Into<StepSize>) -> Result<Array>
where
    F: Fn(&Array) -> f64 + Sync,
{
    let step = step_size.into().resolve(arg.shape())?;
    let f_old = f(arg);
    debug!(size = arg.size(), "numeric gradient (parallel)");

    let gradient: Vec<f64> = (0..arg.size())
        .into_par_iter()
        .map(|i| (f(&arg.perturbed(i, step[i])) - f_old) / step[i])
        .collect();

    Ok(Array::from_vec(gradient, arg.shape().clone()))
}

/// Brute-force dense Jacobian of a vector-valued function.
///
/// Column `i` is estimated by one forward difference in input entry `i`;
/// the result is laid out as `output_shape ++ input_shape` with flat
/// indexing `jac[j * n + i] = ∂output_j / ∂input_i`, matching the
/// row-major basis order used by [`crate::jacobian`].
///
/// Every evaluation of `f` must return the same shape as `f(arg)`.
pub fn jacobian_num<F>(f: F, arg: &Array, step_size: impl Into<StepSize>) -> Result<Array>
where
    F: Fn(&Array) -> Array,
{
    let step = step_size.into().resolve(arg.shape())?;
    let y_old = f(arg);
    let m = y_old.size();
    let n = arg.size();
    debug!(inputs = n, outputs = m, "numeric jacobian");

    let mut jac = vec![0.0; m * n];
    for i in 0..n {
        let y_new = f(&arg.perturbed(i, step[i]));
        if y_new.shape() != y_old.shape() {
            return Err(GradError::ShapeMismatch {
                expected: y_old.shape().clone(),
                got: y_new.shape().clone(),
            });
        }
        let inv = 1.0 / step[i];
        for j in 0..m {
            jac[j * n + i] = (y_new.get(j) - y_old.get(j)) * inv;
        }
    }

    Ok(Array::from_vec(jac, y_old.shape().concat(arg.shape())))
}
