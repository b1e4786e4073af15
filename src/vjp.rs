//! Finite-difference vector-Jacobian products for black-box primitives.
//!
//! A solver step implemented without native differentiation support can
//! still participate in a reverse-mode pass: for each differentiable
//! argument position, a [`VjpTarget`] builds a [`NumericVjp`] that maps
//! an upstream cotangent to the gradient contribution for that argument,
//! estimating each local partial by one forward difference.
//!
//! The cotangent dot-product is folded into the perturbation loop, so
//! the local Jacobian is never materialized: cost is `O(M)` function
//! evaluations for an argument with `M` entries, independent of the
//! output size. That matters because the wrapped primitive may emit full
//! field arrays.

use crate::error::{GradError, Result};
use crate::numdiff::check_step;
use crate::Array;
use rayon::prelude::*;
use tracing::debug;

/// One differentiable argument position of a wrapped primitive, with its
/// finite-difference step fixed at construction time.
///
/// This is the explicit form of the custom-gradient protocol: a
/// `VjpTarget` plays the role of a "VJP maker" for the argument at
/// `arg_index`, and [`VjpTarget::build`] is invoked with the primitive's
/// already-computed output and full argument list once those exist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VjpTarget {
    arity: usize,
    arg_index: usize,
    step: f64,
}

impl VjpTarget {
    /// Create a target for the argument at `arg_index` of a function of
    /// `arity` positional arguments.
    ///
    /// Fails with [`GradError::IndexOutOfRange`] for an index past the
    /// arity and [`GradError::InvalidStep`] for a zero or non-finite
    /// step — both are configuration errors caught before any function
    /// evaluation.
    pub fn new(arity: usize, arg_index: usize, step: f64) -> Result<Self> {
        if arg_index >= arity {
            return Err(GradError::IndexOutOfRange { index: arg_index, arity });
        }
        check_step(step, arg_index)?;
        Ok(Self { arity, arg_index, step })
    }

    /// The argument position this target differentiates.
    #[inline]
    pub fn arg_index(&self) -> usize {
        self.arg_index
    }

    /// The finite-difference step used for this argument.
    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Build the VJP for one concrete invocation of the primitive.
    ///
    /// `output` is the primitive's already-computed value at `args`;
    /// `args` is its full positional argument list. Argument positions
    /// without a target are treated as non-differentiable and are held
    /// fixed during perturbation.
    pub fn build<'a, F>(
        &self,
        func: &'a F,
        output: &'a Array,
        args: &'a [Array],
    ) -> Result<NumericVjp<'a, F>>
    where
        F: Fn(&[Array]) -> Array,
    {
        if args.len() != self.arity {
            return Err(GradError::ArityMismatch {
                expected: self.arity,
                got: args.len(),
            });
        }
        Ok(NumericVjp {
            func,
            output,
            args,
            arg_index: self.arg_index,
            step: self.step,
        })
    }
}

/// Create one [`VjpTarget`] per `(arg_index, step)` pair for a function
/// of `arity` positional arguments.
///
/// # Examples
///
/// ```
/// # use fdgrad::vjp_targets;
/// let targets = vjp_targets(3, &[(0, 1e-6), (2, 1e-7)]).unwrap();
/// assert_eq!(targets.len(), 2);
/// assert_eq!(targets[1].arg_index(), 2);
/// ```
pub fn vjp_targets(arity: usize, targets: &[(usize, f64)]) -> Result<Vec<VjpTarget>> {
    targets
        .iter()
        .map(|&(arg_index, step)| VjpTarget::new(arity, arg_index, step))
        .collect()
}

/// A reverse-mode primitive for one argument of one concrete invocation:
/// consumes an upstream cotangent shaped like the output and returns the
/// gradient contribution for the targeted argument.
#[derive(Debug)]
pub struct NumericVjp<'a, F> {
    func: &'a F,
    output: &'a Array,
    args: &'a [Array],
    arg_index: usize,
    step: f64,
}

impl<'a, F> NumericVjp<'a, F>
where
    F: Fn(&[Array]) -> Array,
{
    /// Apply the VJP: returns `Σ_j v_j * ∂output_j/∂arg_i` for every
    /// entry `i` of the targeted argument, shaped like that argument.
    ///
    /// Fails with [`GradError::ShapeMismatch`] if the cotangent is not
    /// shaped like the recorded output, or if the primitive's output
    /// shape drifts under perturbation.
    pub fn apply(&self, cotangent: &Array) -> Result<Array> {
        self.check_cotangent(cotangent)?;
        let target = &self.args[self.arg_index];
        debug!(
            arg_index = self.arg_index,
            entries = target.size(),
            "numeric vjp"
        );

        let folded: Vec<f64> = (0..target.size())
            .map(|p| self.fold_entry(cotangent, p))
            .collect::<Result<_>>()?;

        Ok(Array::from_vec(folded, target.shape().clone()))
    }

    /// Parallel variant of [`NumericVjp::apply`].
    ///
    /// Requires the wrapped function be safe to invoke concurrently:
    /// each iteration re-runs it on an independent perturbed copy of the
    /// arguments, so any solver state it touches must be captured by
    /// value per invocation.
    pub fn apply_par(&self, cotangent: &Array) -> Result<Array>
    where
        F: Sync,
    {
        self.check_cotangent(cotangent)?;
        let target = &self.args[self.arg_index];
        debug!(
            arg_index = self.arg_index,
            entries = target.size(),
            "numeric vjp (parallel)"
        );

        let folded: Vec<f64> = (0..target.size())
            .into_par_iter()
            .map(|p| self.fold_entry(cotangent, p))
            .collect::<Result<_>>()?;

        Ok(Array::from_vec(folded, target.shape().clone()))
    }

    fn check_cotangent(&self, cotangent: &Array) -> Result<()> {
        if cotangent.shape() != self.output.shape() {
            return Err(GradError::ShapeMismatch {
                expected: self.output.shape().clone(),
                got: cotangent.shape().clone(),
            });
        }
        Ok(())
    }

    /// Estimate column `p` of the local Jacobian and contract it with
    /// the cotangent in one pass.
    ///
    /// The perturbed evaluation must keep the output shape recorded at
    /// build time; anything else would silently truncate the
    /// contraction.
    fn fold_entry(&self, cotangent: &Array, p: usize) -> Result<f64> {
        let mut args_new: Vec<Array> = self.args.to_vec();
        args_new[self.arg_index] = self.args[self.arg_index].perturbed(p, self.step);
        let f_new = (self.func)(&args_new);
        if f_new.shape() != self.output.shape() {
            return Err(GradError::ShapeMismatch {
                expected: self.output.shape().clone(),
                got: f_new.shape().clone(),
            });
        }

        let inv_step = 1.0 / self.step;
        Ok(cotangent
            .as_slice()
            .iter()
            .zip(f_new.as_slice().iter().zip(self.output.as_slice()))
            .map(|(v, (new, old))| v * (new - old) * inv_step)
            .sum())
    }
}
