//! Error types for gradient and Jacobian computation.

use crate::solver::FieldComponent;
use crate::Shape;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GradError>;

/// Failures surfaced by gradient, VJP and Jacobian computations.
///
/// A wrapped function returning `NaN` or `Inf` is deliberately *not* an
/// error: non-finite values propagate into the corresponding gradient
/// entries so a downstream comparison against an automatic gradient can
/// detect the anomaly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradError {
    /// An array did not have the shape the operation required.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// The shape the operation required.
        expected: Shape,
        /// The shape actually supplied.
        got: Shape,
    },

    /// A finite-difference step that is zero or non-finite; either way
    /// the quotient `(f(x + step) - f(x)) / step` is meaningless.
    #[error("finite-difference step at flat index {index} must be nonzero and finite")]
    InvalidStep {
        /// Flat index of the offending step entry.
        index: usize,
    },

    /// An argument position that does not exist for the wrapped function.
    #[error("argument index {index} out of range for arity {arity}")]
    IndexOutOfRange {
        /// The requested argument position.
        index: usize,
        /// The wrapped function's arity.
        arity: usize,
    },

    /// The wrapped function was invoked with the wrong number of
    /// positional arguments.
    #[error("expected {expected} positional arguments, got {got}")]
    ArityMismatch {
        /// Arity fixed at construction time.
        expected: usize,
        /// Number of arguments actually supplied.
        got: usize,
    },

    /// A field snapshot did not contain the requested component.
    #[error("field snapshot missing component {0}")]
    MissingComponent(FieldComponent),
}
