//! Dense Jacobian assembly by repeated reverse-mode pullbacks.
//!
//! A reverse-mode engine hands back one constructed [`ReversePass`]: the
//! forward output plus a pullback mapping a cotangent to an input-shaped
//! gradient. [`jacobian`] probes that pullback with every standard-basis
//! vector of the output space, in row-major order, and stacks the
//! resulting rows into a tensor of shape `output_shape ++ input_shape`.
//!
//! Row `j` of the stacked result corresponds to flat output index `j`.
//! This basis-enumeration order is the primary correctness hazard here:
//! it must match the linearization a caller uses to reinterpret the
//! result, and it is cross-checked against the brute-force
//! [`crate::jacobian_num`] oracle in the test suite.

use crate::error::{GradError, Result};
use crate::numdiff::check_step;
use crate::Array;

/// One constructed reverse pass: the forward output together with a
/// pullback over the same tape.
///
/// Each [`ReversePass::pullback`] call reuses the constructed pass, so
/// assembling a Jacobian costs one forward construction plus one
/// backward evaluation per output entry — cheaper than finite
/// differences whenever the function is natively differentiable.
pub struct ReversePass<'a> {
    output: Array,
    pullback: Box<dyn Fn(&Array) -> Result<Array> + 'a>,
}

impl<'a> ReversePass<'a> {
    /// Package an already-computed output with its pullback.
    pub fn new(output: Array, pullback: impl Fn(&Array) -> Result<Array> + 'a) -> Self {
        Self { output, pullback: Box::new(pullback) }
    }

    /// The forward output of the pass.
    pub fn output(&self) -> &Array {
        &self.output
    }

    /// Pull one cotangent (shaped like the output) back to a gradient
    /// shaped like the input.
    pub fn pullback(&self, cotangent: &Array) -> Result<Array> {
        (self.pullback)(cotangent)
    }
}

/// A reverse-mode differentiation collaborator.
///
/// Implementations wrap an AD engine (or, via [`FdReverse`], a finite
/// difference fallback) and expose the single operation the assembler
/// needs: `reverse_pass(x) -> (pullback, f(x))`.
pub trait ReverseMode {
    /// Construct one reverse pass of the wrapped function at `x`.
    fn reverse_pass(&self, x: &Array) -> Result<ReversePass<'_>>;
}

/// Build a dense-Jacobian function from a reverse-mode engine.
///
/// The returned closure evaluates the Jacobian of the wrapped function
/// at a point: `jacobian(&engine)(x)` has shape
/// `output_shape ++ input_shape` with flat layout
/// `jac[j * n + i] = ∂output_j / ∂input_i`.
///
/// # Examples
///
/// ```
/// # use fdgrad::{jacobian, Array, FdReverse, Shape};
/// // f(x) = x elementwise squared; Jacobian is diag(2x)
/// let engine = FdReverse::new(
///     |x: &Array| x.mul(x).unwrap(),
///     1e-6,
/// ).unwrap();
/// let jac_fn = jacobian(&engine);
/// let x = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![2]));
/// let jac = jac_fn(&x).unwrap();
/// assert_eq!(jac.shape().as_slice(), &[2, 2]);
/// assert!((jac.get(0) - 2.0).abs() < 1e-4);
/// assert!((jac.get(3) - 4.0).abs() < 1e-4);
/// ```
pub fn jacobian<E: ReverseMode>(engine: &E) -> impl Fn(&Array) -> Result<Array> + '_ {
    move |x: &Array| {
        let pass = engine.reverse_pass(x)?;
        let out_shape = pass.output().shape().clone();
        let jac_shape = out_shape.concat(x.shape());

        let mut rows = Vec::with_capacity(jac_shape.size());
        for basis in Array::standard_basis(&out_shape) {
            let row = pass.pullback(&basis)?;
            if row.shape() != x.shape() {
                return Err(GradError::ShapeMismatch {
                    expected: x.shape().clone(),
                    got: row.shape().clone(),
                });
            }
            rows.extend_from_slice(row.as_slice());
        }

        Ok(Array::from_vec(rows, jac_shape))
    }
}

/// Pin a multi-argument function to one differentiated positional
/// argument, holding the others fixed.
///
/// The argument position is validated against the argument list at
/// construction, so a misconfigured index fails before any evaluation.
pub struct Partial<'a, F> {
    func: &'a F,
    args: Vec<Array>,
    argnum: usize,
}

impl<'a, F> Partial<'a, F>
where
    F: Fn(&[Array]) -> Array,
{
    /// Fix every argument except the one at `argnum`.
    pub fn new(func: &'a F, args: Vec<Array>, argnum: usize) -> Result<Self> {
        if argnum >= args.len() {
            return Err(GradError::IndexOutOfRange {
                index: argnum,
                arity: args.len(),
            });
        }
        Ok(Self { func, args, argnum })
    }

    /// Evaluate the wrapped function with `x` substituted at the pinned
    /// position.
    pub fn call(&self, x: &Array) -> Array {
        let mut args = self.args.clone();
        args[self.argnum] = x.clone();
        (self.func)(&args)
    }
}

/// A [`ReverseMode`] engine backed by finite differences.
///
/// This lets a black-box, non-differentiable function drive the
/// Jacobian assembler: the pullback estimates each local partial by one
/// forward difference and folds the cotangent in during the same loop.
/// Unlike a native reverse pass, every pullback costs `O(N)` forward
/// evaluations for an input of `N` entries.
pub struct FdReverse<F> {
    func: F,
    step: f64,
}

impl<F> FdReverse<F>
where
    F: Fn(&Array) -> Array,
{
    /// Wrap a function with a fixed finite-difference step.
    ///
    /// A zero or non-finite step is rejected up front.
    pub fn new(func: F, step: f64) -> Result<Self> {
        check_step(step, 0)?;
        Ok(Self { func, step })
    }
}

impl<F> ReverseMode for FdReverse<F>
where
    F: Fn(&Array) -> Array,
{
    fn reverse_pass(&self, x: &Array) -> Result<ReversePass<'_>> {
        let output = (self.func)(x);
        let out_for_pullback = output.clone();
        let x = x.clone();
        let step = self.step;
        let func = &self.func;

        let pullback = move |cotangent: &Array| -> Result<Array> {
            if cotangent.shape() != out_for_pullback.shape() {
                return Err(GradError::ShapeMismatch {
                    expected: out_for_pullback.shape().clone(),
                    got: cotangent.shape().clone(),
                });
            }
            let inv_step = 1.0 / step;
            let folded: Vec<f64> = (0..x.size())
                .map(|i| -> Result<f64> {
                    let f_new = func(&x.perturbed(i, step));
                    // The output shape must not drift under perturbation
                    // or the contraction would silently truncate.
                    if f_new.shape() != out_for_pullback.shape() {
                        return Err(GradError::ShapeMismatch {
                            expected: out_for_pullback.shape().clone(),
                            got: f_new.shape().clone(),
                        });
                    }
                    Ok(cotangent
                        .as_slice()
                        .iter()
                        .zip(f_new.as_slice().iter().zip(out_for_pullback.as_slice()))
                        .map(|(v, (new, old))| v * (new - old) * inv_step)
                        .sum())
                })
                .collect::<Result<_>>()?;
            Ok(Array::from_vec(folded, x.shape().clone()))
        };

        Ok(ReversePass::new(output, pullback))
    }
}
