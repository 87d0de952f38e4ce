//! Splitting array axes into transformed and batched axes.

use alloc::vec::Vec;

use crate::array::ArrayDescriptor;
use crate::error::FftError;

/// Transform axes in transform order and the complementary batch axes
/// ordered by descending stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPartition {
    transform: Vec<usize>,
    batch: Vec<usize>,
}

impl AxisPartition {
    pub fn transform_axes(&self) -> &[usize] {
        &self.transform
    }

    pub fn batch_axes(&self) -> &[usize] {
        &self.batch
    }

    /// The axis whose length halves in a real transform.
    pub fn first_axis(&self) -> usize {
        self.transform[0]
    }
}

/// Map negative axes through `+rank` and validate range and uniqueness.
///
/// Order is preserved: it decides the engine's internal axis order.
pub fn normalize_axes(axes: &[isize], rank: usize) -> Result<Vec<usize>, FftError> {
    let invalid = || FftError::InvalidAxes {
        axes: axes.to_vec(),
        rank,
    };
    if axes.is_empty() || axes.len() > rank {
        return Err(invalid());
    }
    let mut out = Vec::with_capacity(axes.len());
    for &a in axes {
        let n = if a < 0 { a + rank as isize } else { a };
        if n < 0 || n as usize >= rank {
            return Err(invalid());
        }
        let n = n as usize;
        if out.contains(&n) {
            return Err(invalid());
        }
        out.push(n);
    }
    Ok(out)
}

/// All axes, ordered so the innermost (unit stride) axis comes first.
///
/// Column-major arrays use ascending order; everything else, including
/// arrays that are neither row- nor column-major, uses descending order.
pub fn default_axes<B>(array: &ArrayDescriptor<B>) -> Vec<usize> {
    let rank = array.ndim();
    if array.is_f_contiguous() && !array.is_c_contiguous() {
        (0..rank).collect()
    } else {
        (0..rank).rev().collect()
    }
}

/// Classify the axes of `array`. `None` transforms every axis.
pub fn partition<B>(
    array: &ArrayDescriptor<B>,
    axes: Option<&[isize]>,
) -> Result<AxisPartition, FftError> {
    let rank = array.ndim();
    let transform = match axes {
        Some(axes) => normalize_axes(axes, rank)?,
        None => default_axes(array),
    };
    let strides = array.strides();
    let mut batch: Vec<usize> = (0..rank).filter(|a| !transform.contains(a)).collect();
    batch.sort_by(|&a, &b| strides[b].cmp(&strides[a]));
    Ok(AxisPartition { transform, batch })
}
