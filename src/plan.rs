//! Building the flat engine configuration from strided array views.
//!
//! [`plan`] is pure: it validates the views and returns a [`TransformPlan`]
//! without touching any backend. Binding the plan to an engine happens in
//! [`crate::transform`].

use alloc::vec::Vec;

use crate::array::{ArrayDescriptor, BufferHandle};
use crate::axes::{partition, AxisPartition};
use crate::batch::{collapse, BatchLayout};
use crate::dtype::{DType, Precision};
use crate::error::FftError;
use crate::layout::{
    check_companion, check_padding, companion_shape, resolve_kind, Layout, TransformKind,
};

/// Planning options shared by every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    axes: Option<Vec<isize>>,
    real: Option<bool>,
    fft_shape: Option<Vec<usize>>,
    in_place: Option<bool>,
}

impl PlanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform these axes, in this order. Negative axes count from the end.
    pub fn axes(mut self, axes: &[isize]) -> Self {
        self.axes = Some(axes.to_vec());
        self
    }

    /// Request (or forbid) a real transform instead of inferring it.
    pub fn real(mut self, real: bool) -> Self {
        self.real = Some(real);
        self
    }

    /// Full logical shape of the real array, in array axis order.
    pub fn fft_shape(mut self, shape: &[usize]) -> Self {
        self.fft_shape = Some(shape.to_vec());
        self
    }

    /// Acknowledge that the output view aliases the input buffer.
    pub fn in_place(mut self, in_place: bool) -> Self {
        self.in_place = Some(in_place);
        self
    }
}

/// Finished engine configuration.
///
/// Strides and distances are in elements of each side's own type: real
/// scalars on a real side, complex pairs otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    axes: AxisPartition,
    kind: TransformKind,
    transform_shape: Vec<usize>,
    strides_in: Vec<usize>,
    strides_out: Vec<usize>,
    distance_in: usize,
    distance_out: usize,
    batch_size: usize,
    precision: Precision,
    in_place: bool,
    real_inferred: bool,
    output_shape: Vec<usize>,
    output_dtype: DType,
}

impl TransformPlan {
    pub fn transform_axes(&self) -> &[usize] {
        self.axes.transform_axes()
    }

    pub fn batch_axes(&self) -> &[usize] {
        self.axes.batch_axes()
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Logical (real-side) lengths of the transform axes, in transform order.
    pub fn transform_shape(&self) -> &[usize] {
        &self.transform_shape
    }

    pub fn strides_in(&self) -> &[usize] {
        &self.strides_in
    }

    pub fn strides_out(&self) -> &[usize] {
        &self.strides_out
    }

    /// `(distance_in, distance_out)`
    pub fn distances(&self) -> (usize, usize) {
        (self.distance_in, self.distance_out)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// `(layout_in, layout_out)`
    pub fn layouts(&self) -> (Layout, Layout) {
        self.kind.layouts()
    }

    pub fn in_place(&self) -> bool {
        self.in_place
    }

    /// `real` was deduced from the element types rather than requested.
    pub fn real_inferred(&self) -> bool {
        self.real_inferred
    }

    /// Shape of the result view (derived for in-place real transforms).
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    pub fn output_dtype(&self) -> DType {
        self.output_dtype
    }

    /// Number of points in one transform.
    pub fn transform_len(&self) -> usize {
        self.transform_shape.iter().product()
    }
}

/// One side of the transform in element units.
#[derive(Debug, Clone)]
struct SideView {
    shape: Vec<usize>,
    strides: Vec<usize>,
    dtype: DType,
}

impl SideView {
    fn of<B>(array: &ArrayDescriptor<B>) -> Result<Self, FftError> {
        Ok(Self {
            shape: array.shape().to_vec(),
            strides: element_strides(array)?,
            dtype: array.dtype(),
        })
    }

    fn pick(&self, axes: &[usize]) -> Vec<usize> {
        axes.iter().map(|&a| self.strides[a]).collect()
    }
}

/// Byte strides divided by the item size.
///
/// Length-one axes are never stepped, so an unrepresentable stride there
/// becomes `0` instead of an error.
pub fn element_strides<B>(array: &ArrayDescriptor<B>) -> Result<Vec<usize>, FftError> {
    let itemsize = array.dtype().itemsize() as isize;
    array
        .strides()
        .iter()
        .zip(array.shape())
        .enumerate()
        .map(|(axis, (&stride, &n))| {
            if stride > 0 && stride % itemsize == 0 {
                Ok((stride / itemsize) as usize)
            } else if n == 1 {
                Ok(0)
            } else {
                Err(FftError::InvalidStride { axis, stride })
            }
        })
        .collect()
}

fn resolve_in_place<B: BufferHandle>(
    input: &ArrayDescriptor<B>,
    output: Option<&ArrayDescriptor<B>>,
    requested: Option<bool>,
) -> Result<bool, FftError> {
    let Some(output) = output else {
        return match requested {
            Some(false) => Err(FftError::InPlaceMismatch {
                requested: false,
                aliased: true,
            }),
            _ => Ok(true),
        };
    };
    let aliased = input.aliases(output);
    match (aliased, requested) {
        (true, Some(true)) => {
            if input.offset() != output.offset() {
                return Err(FftError::InvalidDescriptor {
                    reason: "in-place views must start at the same offset",
                });
            }
            Ok(true)
        }
        (false, None | Some(false)) => Ok(false),
        (aliased, requested) => Err(FftError::InPlaceMismatch {
            requested: requested.unwrap_or(false),
            aliased,
        }),
    }
}

/// Companion view of an in-place transform with no output descriptor.
fn derive_view<B>(
    input: &ArrayDescriptor<B>,
    src: &SideView,
    kind: TransformKind,
    first: usize,
    fft_shape: Option<&[usize]>,
) -> Result<SideView, FftError> {
    let unit_first = |view: &SideView| {
        if view.shape[first] > 1 && view.strides[first] != 1 {
            Err(FftError::InvalidStride {
                axis: first,
                stride: input.strides()[first],
            })
        } else {
            Ok(())
        }
    };
    match kind {
        TransformKind::ComplexToComplex => Ok(src.clone()),
        TransformKind::RealToComplex => {
            unit_first(src)?;
            let mut strides = Vec::with_capacity(src.strides.len());
            for (axis, (&s, &n)) in src.strides.iter().zip(src.shape.iter()).enumerate() {
                if axis == first {
                    strides.push(1);
                } else if s % 2 == 0 || n == 1 {
                    strides.push(s / 2);
                } else {
                    return Err(FftError::InvalidStride {
                        axis,
                        stride: input.strides()[axis],
                    });
                }
            }
            Ok(SideView {
                shape: companion_shape(&src.shape, first),
                strides,
                dtype: src.dtype.to_complex(),
            })
        }
        TransformKind::ComplexToReal => {
            let shape = fft_shape.ok_or(FftError::MissingShape)?;
            if shape.len() != src.shape.len() {
                return Err(FftError::ShapeMismatch {
                    expected: src.shape.clone(),
                    found: shape.to_vec(),
                });
            }
            unit_first(src)?;
            let strides = src
                .strides
                .iter()
                .enumerate()
                .map(|(axis, &s)| {
                    if axis == first {
                        Ok(1)
                    } else {
                        s.checked_mul(2).ok_or(FftError::InvalidStride {
                            axis,
                            stride: input.strides()[axis],
                        })
                    }
                })
                .collect::<Result<_, _>>()?;
            Ok(SideView {
                shape: shape.to_vec(),
                strides,
                dtype: src.dtype.to_real(),
            })
        }
    }
}

/// Validate `input`/`output` and compute the engine configuration.
///
/// `output = None` plans an in-place transform over `input`.
pub fn plan<B: BufferHandle>(
    input: &ArrayDescriptor<B>,
    output: Option<&ArrayDescriptor<B>>,
    options: &PlanOptions,
) -> Result<TransformPlan, FftError> {
    let axes = partition(input, options.axes.as_deref())?;
    let first = axes.first_axis();
    let in_place = resolve_in_place(input, output, options.in_place)?;
    let resolved = resolve_kind(input.dtype(), output.map(|o| o.dtype()), options.real)?;
    let kind = resolved.kind;

    let src = SideView::of(input)?;
    let dst = match output {
        Some(out) if out.ndim() != input.ndim() => {
            return Err(FftError::ShapeMismatch {
                expected: input.shape().to_vec(),
                found: out.shape().to_vec(),
            })
        }
        Some(out) => SideView::of(out)?,
        None => derive_view(input, &src, kind, first, options.fft_shape.as_deref())?,
    };

    let real_side = match kind {
        TransformKind::ComplexToComplex => {
            if dst.shape != src.shape {
                return Err(FftError::ShapeMismatch {
                    expected: src.shape.clone(),
                    found: dst.shape.clone(),
                });
            }
            &src
        }
        TransformKind::RealToComplex => {
            check_companion(&src.shape, &dst.shape, first)?;
            &src
        }
        TransformKind::ComplexToReal => {
            check_companion(&dst.shape, &src.shape, first)?;
            &dst
        }
    };
    if let Some(shape) = options.fft_shape.as_deref() {
        if shape != real_side.shape.as_slice() {
            return Err(FftError::ShapeMismatch {
                expected: real_side.shape.clone(),
                found: shape.to_vec(),
            });
        }
    }

    if in_place && kind.is_real() {
        for view in [&src, &dst] {
            if view.shape[first] > 1 && view.strides[first] != 1 {
                return Err(FftError::InvalidStride {
                    axis: first,
                    stride: (view.strides[first] * view.dtype.itemsize()) as isize,
                });
            }
        }
        let itemsize = real_side.dtype.itemsize();
        let capacity = input
            .buffer()
            .byte_len()
            .map(|len| len.saturating_sub(input.offset()) / itemsize);
        check_padding(&real_side.shape, &real_side.strides, first, capacity)?;
    }

    let batch_in = collapse(&src.shape, &src.strides, axes.batch_axes())?;
    let batch_out: BatchLayout = collapse(&dst.shape, &dst.strides, axes.batch_axes())?;
    if batch_in.batch_size != batch_out.batch_size {
        return Err(FftError::ShapeMismatch {
            expected: src.shape.clone(),
            found: dst.shape.clone(),
        });
    }

    let transform_axes = axes.transform_axes();
    let plan = TransformPlan {
        kind,
        transform_shape: transform_axes.iter().map(|&a| real_side.shape[a]).collect(),
        strides_in: src.pick(transform_axes),
        strides_out: dst.pick(transform_axes),
        distance_in: batch_in.distance,
        distance_out: batch_out.distance,
        batch_size: batch_in.batch_size,
        precision: resolved.precision,
        in_place,
        real_inferred: resolved.real_inferred,
        output_shape: dst.shape.clone(),
        output_dtype: dst.dtype,
        axes,
    };

    if plan.real_inferred {
        crate::vlog!(
            info,
            "real transform inferred from {} input and {} output",
            input.dtype(),
            plan.output_dtype
        );
    }
    crate::vlog!(
        debug,
        "planned {:?}: axes {:?} shape {:?} layouts {:?} strides {:?}/{:?} distances {}/{} batch {} in_place {}",
        plan.kind,
        plan.transform_axes(),
        plan.transform_shape,
        plan.layouts(),
        plan.strides_in,
        plan.strides_out,
        plan.distance_in,
        plan.distance_out,
        plan.batch_size,
        plan.in_place
    );
    Ok(plan)
}
