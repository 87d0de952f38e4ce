//! Error taxonomy for planning and enqueueing transforms.
//!
//! Every validation error is raised while the plan is being built; only
//! [`FftError::ArrayMismatch`] and [`FftError::Backend`] can surface from an
//! enqueue.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Errors raised by the transform backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The engine returned a non-success status code.
    Status { code: i32, operation: &'static str },
    /// The engine does not support a requested feature.
    Unsupported(String),
    /// A buffer allocation of `bytes` failed.
    Allocation { bytes: usize },
    /// An access would run past the end of a buffer.
    OutOfBounds { needed: usize, available: usize },
    /// A plan handle was used before it was baked.
    NotBaked,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Status { code, operation } => {
                write!(f, "{operation} failed with status {code}")
            }
            BackendError::Unsupported(what) => write!(f, "unsupported by backend: {what}"),
            BackendError::Allocation { bytes } => {
                write!(f, "failed to allocate {bytes} bytes")
            }
            BackendError::OutOfBounds { needed, available } => write!(
                f,
                "buffer access needs {needed} bytes but only {available} are available"
            ),
            BackendError::NotBaked => write!(f, "plan was enqueued before it was baked"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BackendError {}

/// Errors that can occur while planning or enqueueing a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FftError {
    /// An axis was out of range, repeated, or too many axes were given.
    InvalidAxes { axes: Vec<isize>, rank: usize },
    /// Shape and stride ranks differ, or an axis has zero length.
    InvalidDescriptor { reason: &'static str },
    /// A stride cannot be expressed for the engine.
    InvalidStride { axis: usize, stride: isize },
    /// Batch axes do not form a single stride run.
    UncollapsibleLayout { runs: usize },
    /// The input/output kinds do not describe a supported transform.
    InvalidTransformKind { reason: &'static str },
    /// Input and output precisions differ.
    PrecisionMismatch {
        input: crate::dtype::DType,
        output: crate::dtype::DType,
    },
    /// An array shape differs from the shape the transform requires.
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// An in-place real transform lacks room for the hermitian output.
    /// Values are in real elements.
    InsufficientPadding { found: usize, required: usize },
    /// An in-place complex-to-real transform needs the full real shape.
    MissingShape,
    /// The explicit in-place flag disagrees with buffer aliasing.
    InPlaceMismatch { requested: bool, aliased: bool },
    /// An array passed at enqueue time differs from the planned one.
    ArrayMismatch {
        array: &'static str,
        field: &'static str,
    },
    /// Failure reported by the transform backend.
    Backend(BackendError),
}

impl fmt::Display for FftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FftError::InvalidAxes { axes, rank } => {
                write!(f, "invalid transform axes {axes:?} for an array of rank {rank}")
            }
            FftError::InvalidDescriptor { reason } => write!(f, "invalid array descriptor: {reason}"),
            FftError::InvalidStride { axis, stride } => {
                write!(f, "stride {stride} on axis {axis} is not supported")
            }
            FftError::UncollapsibleLayout { runs } => write!(
                f,
                "data layout not supported: batch axes form {runs} stride runs, only one is allowed"
            ),
            FftError::InvalidTransformKind { reason } => {
                write!(f, "invalid transform kind: {reason}")
            }
            FftError::PrecisionMismatch { input, output } => {
                write!(f, "precision of {input} input does not match {output} output")
            }
            FftError::ShapeMismatch { expected, found } => write!(
                f,
                "array shape {found:?} does not match expected shape {expected:?}"
            ),
            FftError::InsufficientPadding { found, required } => write!(
                f,
                "in-place real transform needs a stride of at least {required} elements, found {found}"
            ),
            FftError::MissingShape => write!(
                f,
                "in-place complex-to-real transform requires the full real shape"
            ),
            FftError::InPlaceMismatch { requested, aliased } => write!(
                f,
                "in_place = {requested} but input and output buffers are {}",
                if *aliased { "the same" } else { "distinct" }
            ),
            FftError::ArrayMismatch { array, field } => {
                write!(f, "{array} array {field} differs from the planned array")
            }
            FftError::Backend(e) => write!(f, "backend error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FftError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for FftError {
    fn from(e: BackendError) -> Self {
        FftError::Backend(e)
    }
}
