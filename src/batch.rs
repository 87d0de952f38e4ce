//! Collapsing batch axes into the engine's single batch dimension.
//!
//! Batched execution walks one arithmetic progression of start offsets, so
//! the batch axes must chain: sorted by stride, every axis has to start where
//! the previous one ends (`stride[i + 1] == stride[i] * len[i]`).

use alloc::vec::Vec;

use crate::error::FftError;

/// The single batch dimension in element units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLayout {
    /// Element stride between consecutive transforms; `0` when unbatched.
    pub distance: usize,
    /// Number of transforms.
    pub batch_size: usize,
}

impl BatchLayout {
    pub const SINGLE: BatchLayout = BatchLayout {
        distance: 0,
        batch_size: 1,
    };
}

/// Collapse `batch_axes` of an array with element `strides`.
///
/// Axes of length one are skipped since any stride fits them.
pub fn collapse(
    shape: &[usize],
    strides: &[usize],
    batch_axes: &[usize],
) -> Result<BatchLayout, FftError> {
    let mut run: Vec<usize> = batch_axes
        .iter()
        .copied()
        .filter(|&a| shape[a] > 1)
        .collect();
    if run.is_empty() {
        return Ok(BatchLayout::SINGLE);
    }
    run.sort_by_key(|&a| strides[a]);

    let runs = 1 + run
        .windows(2)
        .filter(|w| strides[w[0]].checked_mul(shape[w[0]]) != Some(strides[w[1]]))
        .count();
    if runs > 1 {
        return Err(FftError::UncollapsibleLayout { runs });
    }

    let batch_size = run
        .iter()
        .try_fold(1usize, |acc, &a| acc.checked_mul(shape[a]))
        .ok_or(FftError::InvalidDescriptor {
            reason: "batch size overflows usize",
        })?;
    Ok(BatchLayout {
        distance: strides[run[0]],
        batch_size,
    })
}
