//! Core Array type for n-dimensional numeric arrays.

use crate::error::{GradError, Result};
use crate::Shape;

/// A dense multidimensional array of `f64` values.
///
/// This is the parameter/field carrier of fdgrad: permittivity grids,
/// source amplitudes, gradients and Jacobians are all `Array`s. Data is
/// stored flat in row-major order; the flattening order is part of the
/// crate's contract, since perturbation indices and standard-basis
/// enumeration both refer to it.
///
/// Arrays are immutable values: every operation allocates a fresh result
/// and never mutates its inputs.
///
/// # Examples
///
/// ```
/// # use fdgrad::{Array, Shape};
/// let a = Array::zeros(Shape::new(vec![2, 3]));
/// assert_eq!(a.shape().as_slice(), &[2, 3]);
/// assert_eq!(a.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// Flat row-major data.
    data: Vec<f64>,
    /// Shape of the array.
    shape: Shape,
}

impl Array {
    /// Create a new array filled with zeros.
    pub fn zeros(shape: Shape) -> Self {
        let size = shape.size();
        Self { data: vec![0.0; size], shape }
    }

    /// Create a new array filled with ones.
    pub fn ones(shape: Shape) -> Self {
        Self::full(1.0, shape)
    }

    /// Create a new array filled with a specific value.
    pub fn full(value: f64, shape: Shape) -> Self {
        let size = shape.size();
        Self { data: vec![value; size], shape }
    }

    /// Create a 0-dimensional array holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self { data: vec![value], shape: Shape::scalar() }
    }

    /// Create an array from a flat `Vec<f64>` and shape.
    ///
    /// # Panics
    ///
    /// Panics if the shape size doesn't match the data length.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fdgrad::{Array, Shape};
    /// let a = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
    /// assert_eq!(a.shape().as_slice(), &[2, 2]);
    /// ```
    pub fn from_vec(data: Vec<f64>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.size(),
            "Data length must match shape size"
        );
        Self { data, shape }
    }

    /// Returns the shape of the array.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the number of dimensions.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Returns the total number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Returns true if this is a 0-dimensional (scalar) array.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_scalar()
    }

    /// Returns the flat row-major data as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Copy the flat row-major data into a `Vec<f64>`.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Get the element at a flat row-major index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.size()`.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        self.data[index]
    }

    /// Return a copy of this array viewed under a new shape of equal size.
    pub fn reshape(&self, new_shape: Shape) -> Result<Self> {
        if new_shape.size() != self.size() {
            return Err(GradError::ShapeMismatch {
                expected: self.shape.clone(),
                got: new_shape,
            });
        }
        Ok(Self { data: self.data.clone(), shape: new_shape })
    }

    /// Return a copy with the entry at flat index `index` incremented by
    /// `delta`. All other entries and the shape are reproduced exactly.
    ///
    /// This is the flatten / perturb-one-entry / reshape round trip used
    /// by every finite-difference loop in the crate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.size()`.
    pub fn perturbed(&self, index: usize, delta: f64) -> Self {
        let mut data = self.data.clone();
        data[index] += delta;
        Self { data, shape: self.shape.clone() }
    }

    /// Enumerate the standard basis of the vector space of arrays with
    /// the given shape: one-hot arrays `e_0, e_1, ...` in row-major
    /// linear index order.
    ///
    /// The enumeration order is an externally observable contract: row
    /// `j` of a Jacobian assembled by pulling back `e_j` corresponds to
    /// flat output index `j`.
    pub fn standard_basis(shape: &Shape) -> impl Iterator<Item = Array> {
        let shape = shape.clone();
        let size = shape.size();
        (0..size).map(move |j| {
            let mut data = vec![0.0; size];
            data[j] = 1.0;
            Array { data, shape: shape.clone() }
        })
    }

    /// Elementwise addition.
    pub fn add(&self, other: &Array) -> Result<Array> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise subtraction.
    pub fn sub(&self, other: &Array) -> Result<Array> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Elementwise multiplication.
    pub fn mul(&self, other: &Array) -> Result<Array> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Multiply every element by a scalar.
    pub fn scale(&self, factor: f64) -> Array {
        let data = self.data.iter().map(|a| a * factor).collect();
        Self { data, shape: self.shape.clone() }
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Elementwise product summed over all entries, `Σ_i a_i * b_i`.
    ///
    /// Both arrays must have the same shape. This is the cotangent
    /// contraction at the heart of every VJP.
    pub fn dot(&self, other: &Array) -> Result<f64> {
        if self.shape != other.shape {
            return Err(GradError::ShapeMismatch {
                expected: self.shape.clone(),
                got: other.shape.clone(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum())
    }

    /// L2 norm of the flattened array.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|a| a * a).sum::<f64>().sqrt()
    }

    fn zip_with(&self, other: &Array, f: impl Fn(f64, f64) -> f64) -> Result<Array> {
        if self.shape != other.shape {
            return Err(GradError::ShapeMismatch {
                expected: self.shape.clone(),
                got: other.shape.clone(),
            });
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self { data, shape: self.shape.clone() })
    }
}
