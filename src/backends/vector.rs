use std::borrow::Cow;

/// A trait for vector-like inputs to compiled formulas.
///
/// Compiled functions read their input from a contiguous `&[f64]` indexed by
/// variable slot. This trait lets any vector implementation provide that view;
/// implementations whose storage is not contiguous return an owned copy.
///
/// # Examples
///
/// ```rust
/// use exprtree_jit::prelude::Vector;
///
/// let vec = vec![1.0, 2.0, 3.0];
/// assert_eq!(vec.as_slice()[0], 1.0);
/// assert_eq!(Vector::len(&vec), 3);
/// ```
pub trait Vector {
    /// Returns the vector's data as a contiguous slice.
    fn as_slice(&self) -> Cow<'_, [f64]>;

    /// Returns the length of the vector.
    fn len(&self) -> usize;

    /// Checks if the vector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Vector for Vec<f64> {
    fn as_slice(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self)
    }

    fn len(&self) -> usize {
        self.len()
    }
}

impl Vector for [f64] {
    fn as_slice(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self)
    }

    fn len(&self) -> usize {
        self.len()
    }
}

/// Implementation of Vector trait for fixed-size arrays.
///
/// # Examples
///
/// ```rust
/// use exprtree_jit::prelude::Vector;
///
/// let arr = [1.0, 2.0];
/// assert_eq!(&*arr.as_slice(), &[1.0, 2.0]);
/// ```
impl<const N: usize> Vector for [f64; N] {
    fn as_slice(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(self)
    }

    fn len(&self) -> usize {
        N
    }
}

/// Implementation of Vector trait for ndarray's Array1<f64>.
///
/// Arrays in standard layout are borrowed; strided views are copied.
///
/// # Examples
///
/// ```rust
/// use exprtree_jit::prelude::Vector;
/// use ndarray::Array1;
///
/// let vec = Array1::from_vec(vec![1.0, 2.0, 3.0]);
/// assert!(matches!(Vector::as_slice(&vec), std::borrow::Cow::Borrowed(_)));
/// ```
#[cfg(feature = "ndarray")]
impl Vector for ndarray::Array1<f64> {
    fn as_slice(&self) -> Cow<'_, [f64]> {
        match ndarray::ArrayBase::as_slice(self) {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.to_vec()),
        }
    }

    fn len(&self) -> usize {
        ndarray::ArrayBase::len(self)
    }
}

/// Implementation of Vector trait for nalgebra's DVector<f64>.
///
/// # Examples
///
/// ```rust
/// use exprtree_jit::prelude::Vector;
/// use nalgebra::DVector;
///
/// let vec = DVector::from_vec(vec![1.0, 2.0]);
/// assert_eq!(&*Vector::as_slice(&vec), &[1.0, 2.0]);
/// ```
#[cfg(feature = "nalgebra")]
impl Vector for nalgebra::DVector<f64> {
    fn as_slice(&self) -> Cow<'_, [f64]> {
        Cow::Borrowed(nalgebra::Matrix::as_slice(self))
    }

    fn len(&self) -> usize {
        nalgebra::Matrix::len(self)
    }
}
