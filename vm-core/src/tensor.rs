//! `Tensor`: a dense row-major array of [`BigIntMid`] elements.

use core::fmt;

use crate::bigint::BigIntMid;
use crate::error::VmError;

/// A rank-`r` dense array of mid-tier integers, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    elements: Vec<BigIntMid>,
}

impl Tensor {
    /// Construct from an explicit shape and row-major element buffer.
    /// Fails with [`VmError::ShapeMismatch`] if `elements.len()` does not
    /// equal the product of `shape`.
    pub fn new(shape: Vec<usize>, elements: Vec<BigIntMid>) -> Result<Self, VmError> {
        let expected = shape.iter().product::<usize>().max(1);
        if elements.len() != expected {
            return Err(VmError::ShapeMismatch);
        }
        Ok(Self { shape, elements })
    }

    /// A rank-0 tensor wrapping a single scalar.
    pub fn scalar(value: BigIntMid) -> Self {
        Self {
            shape: Vec::new(),
            elements: vec![value],
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn elements(&self) -> &[BigIntMid] {
        &self.elements
    }

    /// Applies a unary op to every element, keeping the shape.
    pub fn map(&self, f: impl Fn(&BigIntMid) -> BigIntMid) -> Self {
        Self {
            shape: self.shape.clone(),
            elements: self.elements.iter().map(f).collect(),
        }
    }

    /// Applies a binary op element-by-element; both tensors must share a
    /// shape.
    pub fn zip_with(
        &self,
        rhs: &Tensor,
        f: impl Fn(&BigIntMid, &BigIntMid) -> BigIntMid,
    ) -> Result<Self, VmError> {
        if self.shape != rhs.shape {
            return Err(VmError::ShapeMismatch);
        }
        Ok(Self {
            shape: self.shape.clone(),
            elements: self
                .elements
                .iter()
                .zip(rhs.elements.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        })
    }

    /// Applies a fallible binary op element-by-element; both tensors must
    /// share a shape.
    pub fn try_zip_with(
        &self,
        rhs: &Tensor,
        f: impl Fn(&BigIntMid, &BigIntMid) -> Result<BigIntMid, VmError>,
    ) -> Result<Self, VmError> {
        if self.shape != rhs.shape {
            return Err(VmError::ShapeMismatch);
        }
        let elements = self
            .elements
            .iter()
            .zip(rhs.elements.iter())
            .map(|(a, b)| f(a, b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            shape: self.shape.clone(),
            elements,
        })
    }

    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Valid iff `product(new_shape) == size`; preserves element order.
    pub fn reshape(&self, new_shape: Vec<usize>) -> Result<Self, VmError> {
        let expected = new_shape.iter().product::<usize>().max(1);
        if expected != self.elements.len() {
            return Err(VmError::ShapeMismatch);
        }
        Ok(Self {
            shape: new_shape,
            elements: self.elements.clone(),
        })
    }

    /// Permutes axes according to `perm`, a permutation of `[0, rank)`.
    /// Materializes the permuted element order immediately.
    pub fn transpose(&self, perm: &[usize]) -> Result<Self, VmError> {
        if perm.len() != self.rank() {
            return Err(VmError::RankError);
        }
        let mut seen = vec![false; perm.len()];
        for &axis in perm {
            if axis >= perm.len() || seen[axis] {
                return Err(VmError::IndexOutOfRange);
            }
            seen[axis] = true;
        }

        let new_shape: Vec<usize> = perm.iter().map(|&axis| self.shape[axis]).collect();
        let old_strides = self.strides();
        let new_size = new_shape.iter().product::<usize>().max(1);
        let mut elements = Vec::with_capacity(new_size);
        for flat in 0..new_size {
            let new_index = unflatten(flat, &new_shape);
            let mut old_index = vec![0usize; self.rank()];
            for (new_axis, &old_axis) in perm.iter().enumerate() {
                old_index[old_axis] = new_index[new_axis];
            }
            let old_flat: usize = old_index
                .iter()
                .zip(old_strides.iter())
                .map(|(i, s)| i * s)
                .sum();
            elements.push(self.elements[old_flat].clone());
        }
        Ok(Self {
            shape: new_shape,
            elements,
        })
    }

    /// Slices `[lo, hi)` along `axis`, copying elements in order.
    pub fn slice(&self, axis: usize, lo: usize, hi: usize) -> Result<Self, VmError> {
        if axis >= self.rank() {
            return Err(VmError::IndexOutOfRange);
        }
        if lo > hi || hi > self.shape[axis] {
            return Err(VmError::IndexOutOfRange);
        }
        let strides = self.strides();
        let mut new_shape = self.shape.clone();
        new_shape[axis] = hi - lo;
        let new_size = new_shape.iter().product::<usize>().max(1);
        let mut elements = Vec::with_capacity(new_size);
        for flat in 0..new_size {
            let mut index = unflatten(flat, &new_shape);
            index[axis] += lo;
            let old_flat: usize = index.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
            elements.push(self.elements[old_flat].clone());
        }
        Ok(Self {
            shape: new_shape,
            elements,
        })
    }

    /// Contracts the last axis of `self` against the first axis of `rhs`:
    /// requires both ranks ≥ 1 and `self.shape[last] == rhs.shape[0]`.
    /// Result rank is `self.rank() + rhs.rank() - 2`.
    pub fn dot(&self, rhs: &Tensor) -> Result<Self, VmError> {
        if self.rank() < 1 || rhs.rank() < 1 {
            return Err(VmError::RankError);
        }
        let contracted = *self.shape.last().unwrap();
        if contracted != rhs.shape[0] {
            return Err(VmError::ShapeMismatch);
        }

        let left_shape = &self.shape[..self.rank() - 1];
        let right_shape = &rhs.shape[1..];
        let left_strides = self.strides();
        let right_strides = rhs.strides();

        let mut out_shape = Vec::with_capacity(left_shape.len() + right_shape.len());
        out_shape.extend_from_slice(left_shape);
        out_shape.extend_from_slice(right_shape);
        let out_size = out_shape.iter().product::<usize>().max(1);

        let mut elements = Vec::with_capacity(out_size);
        for flat in 0..out_size {
            let full_index = unflatten(flat, &out_shape);
            let (left_index, right_index) = full_index.split_at(left_shape.len());

            let mut sum = BigIntMid::zero();
            for j in 0..contracted {
                let left_flat: usize = left_index
                    .iter()
                    .zip(left_strides.iter())
                    .map(|(i, s)| i * s)
                    .sum::<usize>()
                    + j * left_strides.last().copied().unwrap_or(1);
                let right_flat: usize = j * right_strides[0]
                    + right_index
                        .iter()
                        .zip(right_strides[1..].iter())
                        .map(|(i, s)| i * s)
                        .sum::<usize>();
                sum = sum.add(&self.elements[left_flat].mul(&rhs.elements[right_flat]));
            }
            elements.push(sum);
        }

        Ok(Self {
            shape: out_shape,
            elements,
        })
    }
}

fn unflatten(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0usize; shape.len()];
    for axis in (0..shape.len()).rev() {
        let dim = shape[axis].max(1);
        index[axis] = flat % dim;
        flat /= dim;
    }
    index
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank={} shape={:?} [", self.rank(), self.shape)?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{element}")?;
        }
        write!(f, "]")
    }
}
