//! Shape utilities for n-dimensional arrays.

use std::fmt;

/// Shape of an n-dimensional array.
///
/// Represented as a vector of dimensions. An empty vector represents a scalar.
/// All flattening in this crate is row-major (C order): the last dimension
/// varies fastest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fdgrad::Shape;
    /// let shape = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(shape.ndim(), 3);
    /// assert_eq!(shape.size(), 24);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Create a scalar shape (empty dimensions).
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    /// Returns the number of dimensions.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        if self.dims.is_empty() {
            1
        } else {
            self.dims.iter().product()
        }
    }

    /// Returns a slice of the dimensions.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }

    /// Returns true if this is a scalar shape.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Concatenate two shapes: `output_shape ++ input_shape`.
    ///
    /// This is the shape of a dense Jacobian tensor of a map from an
    /// array of shape `other` to an array of shape `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fdgrad::Shape;
    /// let out = Shape::new(vec![3]);
    /// let inp = Shape::new(vec![2, 2]);
    /// assert_eq!(out.concat(&inp), Shape::new(vec![3, 2, 2]));
    /// ```
    pub fn concat(&self, other: &Shape) -> Shape {
        let mut dims = self.dims.clone();
        dims.extend_from_slice(&other.dims);
        Shape::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        if self.dims.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_creation() {
        let shape = Shape::new(vec![2, 3, 4]);
        assert_eq!(shape.ndim(), 3);
        assert_eq!(shape.size(), 24);
        assert_eq!(shape.as_slice(), &[2, 3, 4]);
    }

    #[test]
    fn test_scalar_shape() {
        let shape = Shape::scalar();
        assert_eq!(shape.ndim(), 0);
        assert_eq!(shape.size(), 1);
        assert!(shape.is_scalar());
    }

    #[test]
    fn test_concat() {
        let out = Shape::new(vec![3]);
        let inp = Shape::new(vec![4]);
        assert_eq!(out.concat(&inp), Shape::new(vec![3, 4]));

        let out = Shape::scalar();
        let inp = Shape::new(vec![2, 2]);
        assert_eq!(out.concat(&inp), Shape::new(vec![2, 2]));
        assert_eq!(inp.concat(&out), Shape::new(vec![2, 2]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new(vec![2, 3, 4]).to_string(), "(2, 3, 4)");
        assert_eq!(Shape::new(vec![5]).to_string(), "(5,)");
        assert_eq!(Shape::scalar().to_string(), "()");
    }
}
