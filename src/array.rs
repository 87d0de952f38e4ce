//! Strided N-dimensional views over device buffers.

use alloc::vec::Vec;

use crate::dtype::DType;
use crate::error::FftError;

/// Opaque identity of an underlying allocation.
///
/// Two views alias exactly when their buffers report the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// A handle to device memory that the planner can identify.
pub trait BufferHandle {
    fn id(&self) -> BufferId;

    /// Size of the allocation in bytes, if the backend can report it.
    fn byte_len(&self) -> Option<usize> {
        None
    }
}

impl BufferHandle for BufferId {
    fn id(&self) -> BufferId {
        *self
    }
}

/// One strided view over a device buffer.
///
/// Strides are in bytes. The planner borrows descriptors and never mutates
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor<B> {
    shape: Vec<usize>,
    strides: Vec<isize>,
    dtype: DType,
    buffer: B,
    offset: usize,
}

impl<B> ArrayDescriptor<B> {
    /// Build a view from explicit shape and byte strides.
    pub fn new(
        buffer: B,
        shape: Vec<usize>,
        strides: Vec<isize>,
        dtype: DType,
    ) -> Result<Self, FftError> {
        if shape.len() != strides.len() {
            return Err(FftError::InvalidDescriptor {
                reason: "shape and strides have different lengths",
            });
        }
        if shape.is_empty() {
            return Err(FftError::InvalidDescriptor {
                reason: "array must have at least one axis",
            });
        }
        if shape.contains(&0) {
            return Err(FftError::InvalidDescriptor {
                reason: "every axis must have a non-zero length",
            });
        }
        if checked_len(&shape).is_none() {
            return Err(FftError::InvalidDescriptor {
                reason: "element count overflows usize",
            });
        }
        Ok(Self {
            shape,
            strides,
            dtype,
            buffer,
            offset: 0,
        })
    }

    /// Row-major (last axis fastest) packed view.
    pub fn contiguous(buffer: B, shape: Vec<usize>, dtype: DType) -> Result<Self, FftError> {
        let strides = row_major_strides(&shape, dtype.itemsize()).ok_or(OVERSIZED)?;
        Self::new(buffer, shape, strides, dtype)
    }

    /// Column-major (first axis fastest) packed view.
    pub fn fortran(buffer: B, shape: Vec<usize>, dtype: DType) -> Result<Self, FftError> {
        let mut strides = Vec::with_capacity(shape.len());
        let mut step = Some(dtype.itemsize() as isize);
        for &n in &shape {
            strides.push(step.ok_or(OVERSIZED)?);
            step = step.and_then(|s| s.checked_mul(isize::try_from(n).ok()?));
        }
        Self::new(buffer, shape, strides, dtype)
    }

    /// Same view starting `offset` bytes into the buffer.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packed row-major layout; axes of length one are ignored.
    pub fn is_c_contiguous(&self) -> bool {
        packed(
            self.shape.iter().rev().zip(self.strides.iter().rev()),
            self.dtype.itemsize(),
        )
    }

    /// Packed column-major layout; axes of length one are ignored.
    pub fn is_f_contiguous(&self) -> bool {
        packed(
            self.shape.iter().zip(self.strides.iter()),
            self.dtype.itemsize(),
        )
    }

    /// True when shape, strides and dtype all agree with `other`.
    pub fn same_layout<C>(&self, other: &ArrayDescriptor<C>) -> bool {
        self.shape == other.shape && self.strides == other.strides && self.dtype == other.dtype
    }
}

impl<B: BufferHandle> ArrayDescriptor<B> {
    /// Whether both views live in the same allocation.
    pub fn aliases<C: BufferHandle>(&self, other: &ArrayDescriptor<C>) -> bool {
        self.buffer.id() == other.buffer.id()
    }
}

const OVERSIZED: FftError = FftError::InvalidDescriptor {
    reason: "packed byte strides overflow isize",
};

fn checked_len(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

/// Byte strides of a packed row-major array, or `None` if a stride does
/// not fit in `isize`.
pub fn row_major_strides(shape: &[usize], itemsize: usize) -> Option<Vec<isize>> {
    let mut strides = alloc::vec![0isize; shape.len()];
    let mut step = Some(itemsize as isize);
    for (s, &n) in strides.iter_mut().zip(shape.iter()).rev() {
        *s = step?;
        step = step.and_then(|v| v.checked_mul(isize::try_from(n).ok()?));
    }
    Some(strides)
}

fn packed<'a>(axes: impl Iterator<Item = (&'a usize, &'a isize)>, itemsize: usize) -> bool {
    let mut expected = Some(itemsize as isize);
    for (&n, &stride) in axes {
        if n == 1 {
            continue;
        }
        if Some(stride) != expected {
            return false;
        }
        expected = expected.and_then(|e| e.checked_mul(isize::try_from(n).ok()?));
    }
    true
}
