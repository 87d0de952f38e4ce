//! Resolving precision, memory layouts and real/complex shape relations.
//!
//! A real signal of length `n` has `n / 2 + 1` non-redundant spectral bins.
//! The hermitian side of a real transform stores only those, along the
//! first transform axis.

use alloc::vec::Vec;
use core::fmt;

use crate::dtype::{DType, Kind, Precision};
use crate::error::FftError;

/// Memory layout of one side of a transform, as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    ComplexInterleaved,
    Real,
    HermitianInterleaved,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::ComplexInterleaved => "complex-interleaved",
            Layout::Real => "real",
            Layout::HermitianInterleaved => "hermitian-interleaved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    ComplexToComplex,
    /// Forward real transform.
    RealToComplex,
    /// Inverse real transform.
    ComplexToReal,
}

impl TransformKind {
    /// `(layout_in, layout_out)`
    pub const fn layouts(self) -> (Layout, Layout) {
        match self {
            TransformKind::ComplexToComplex => {
                (Layout::ComplexInterleaved, Layout::ComplexInterleaved)
            }
            TransformKind::RealToComplex => (Layout::Real, Layout::HermitianInterleaved),
            TransformKind::ComplexToReal => (Layout::HermitianInterleaved, Layout::Real),
        }
    }

    pub const fn is_real(self) -> bool {
        !matches!(self, TransformKind::ComplexToComplex)
    }
}

/// Outcome of [`resolve_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindResolution {
    pub kind: TransformKind,
    pub precision: Precision,
    /// `real` was not given and was deduced from the element types.
    pub real_inferred: bool,
}

/// Decide the transform kind from the element types and the `real` flag.
///
/// `output` is `None` for an in-place transform without an output view; a
/// complex input then transforms complex-to-complex unless `real` is set.
pub fn resolve_kind(
    input: DType,
    output: Option<DType>,
    real: Option<bool>,
) -> Result<KindResolution, FftError> {
    let out_kind = output.map(DType::kind);
    let kind = match (input.kind(), out_kind) {
        (Kind::Real, Some(Kind::Real)) => {
            return Err(FftError::InvalidTransformKind {
                reason: "input and output are both real",
            })
        }
        (Kind::Real, _) | (Kind::Complex, Some(Kind::Real)) if real == Some(false) => {
            return Err(FftError::InvalidTransformKind {
                reason: "real = false but one side of the transform is real",
            })
        }
        (Kind::Real, _) => TransformKind::RealToComplex,
        (Kind::Complex, Some(Kind::Real)) => TransformKind::ComplexToReal,
        (Kind::Complex, Some(Kind::Complex)) if real == Some(true) => {
            return Err(FftError::InvalidTransformKind {
                reason: "real = true but input and output are both complex",
            })
        }
        (Kind::Complex, Some(Kind::Complex)) => TransformKind::ComplexToComplex,
        (Kind::Complex, None) if real == Some(true) => TransformKind::ComplexToReal,
        (Kind::Complex, None) => TransformKind::ComplexToComplex,
    };
    // Kind rules come first; precision is only compared for a valid pairing.
    if let Some(out) = output {
        if out.precision() != input.precision() {
            return Err(FftError::PrecisionMismatch { input, output: out });
        }
    }
    Ok(KindResolution {
        kind,
        precision: input.precision(),
        real_inferred: kind.is_real() && real.is_none(),
    })
}

/// Number of hermitian bins for a real length `n`.
pub const fn hermitian_len(n: usize) -> usize {
    n / 2 + 1
}

/// Shape of the complex array paired with a real array of `shape`
/// transformed with `axis` first.
pub fn companion_shape(shape: &[usize], axis: usize) -> Vec<usize> {
    let mut out = shape.to_vec();
    out[axis] = hermitian_len(out[axis]);
    out
}

/// Check that `complex_shape` is the hermitian companion of `real_shape`.
pub fn check_companion(
    real_shape: &[usize],
    complex_shape: &[usize],
    axis: usize,
) -> Result<(), FftError> {
    let expected = companion_shape(real_shape, axis);
    if complex_shape != expected.as_slice() {
        return Err(FftError::ShapeMismatch {
            expected,
            found: complex_shape.to_vec(),
        });
    }
    Ok(())
}

/// Real elements an in-place real transform needs per line along `axis`.
pub const fn required_padding(n: usize) -> usize {
    2 * hermitian_len(n)
}

/// Validate that an in-place real view leaves room for the hermitian data.
///
/// `strides` are in real elements. The smallest stride among the other
/// non-unit axes is the line pitch; with no such axis, `capacity` (real
/// elements available from the view's start) bounds the single line.
pub fn check_padding(
    shape: &[usize],
    strides: &[usize],
    axis: usize,
    capacity: Option<usize>,
) -> Result<(), FftError> {
    let required = required_padding(shape[axis]);
    let pitch = shape
        .iter()
        .zip(strides.iter())
        .enumerate()
        .filter(|&(a, (&n, _))| a != axis && n > 1)
        .map(|(_, (_, &s))| s)
        .min();
    match pitch.or(capacity) {
        Some(found) if found < required => Err(FftError::InsufficientPadding { found, required }),
        _ => Ok(()),
    }
}
