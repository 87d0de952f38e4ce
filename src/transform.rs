//! Plans bound to a backend, and enqueueing them.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::array::ArrayDescriptor;
use crate::backend::{Backend, Callback, PlanRequest};
use crate::error::FftError;
use crate::plan::{plan, PlanOptions, TransformPlan};

/// Options for [`Fft::new`]: planning options plus engine extras.
#[derive(Debug, Clone)]
pub struct FftOptions<Buf> {
    plan: PlanOptions,
    scale_forward: Option<f64>,
    scale_backward: Option<f64>,
    callbacks: Vec<Callback<Buf>>,
}

impl<Buf> Default for FftOptions<Buf> {
    fn default() -> Self {
        Self {
            plan: PlanOptions::new(),
            scale_forward: None,
            scale_backward: None,
            callbacks: Vec::new(),
        }
    }
}

impl<Buf> FftOptions<Buf> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axes(mut self, axes: &[isize]) -> Self {
        self.plan = self.plan.axes(axes);
        self
    }

    pub fn real(mut self, real: bool) -> Self {
        self.plan = self.plan.real(real);
        self
    }

    pub fn fft_shape(mut self, shape: &[usize]) -> Self {
        self.plan = self.plan.fft_shape(shape);
        self
    }

    pub fn in_place(mut self, in_place: bool) -> Self {
        self.plan = self.plan.in_place(in_place);
        self
    }

    /// Factor applied to forward results. Defaults to `1`.
    pub fn scale_forward(mut self, scale: f64) -> Self {
        self.scale_forward = Some(scale);
        self
    }

    /// Factor applied to inverse results. Defaults to one over the
    /// number of points in the transform.
    pub fn scale_backward(mut self, scale: f64) -> Self {
        self.scale_backward = Some(scale);
        self
    }

    pub fn callback(mut self, callback: Callback<Buf>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn plan_options(&self) -> &PlanOptions {
        &self.plan
    }
}

/// A baked transform over a pair of bound arrays.
///
/// Owns the engine plan and its scratch buffer; both are released on drop,
/// so the plan must outlive every transform enqueued with it.
pub struct Fft<B: Backend> {
    backend: Arc<B>,
    queue: B::Queue,
    plan: TransformPlan,
    handle: Option<B::Plan>,
    scratch: Option<B::Buffer>,
    callbacks: Vec<Callback<B::Buffer>>,
    data: ArrayDescriptor<B::Buffer>,
    result: Option<ArrayDescriptor<B::Buffer>>,
}

impl<B: Backend> Fft<B> {
    /// Plan a transform of `data` into `result` (in place when `None`),
    /// create it on the backend, bake it and allocate its scratch space.
    ///
    /// All validation happens before any backend call. If baking fails the
    /// partially created plan handle is destroyed before returning.
    pub fn new(
        backend: Arc<B>,
        context: &B::Context,
        queue: B::Queue,
        data: ArrayDescriptor<B::Buffer>,
        result: Option<ArrayDescriptor<B::Buffer>>,
        options: FftOptions<B::Buffer>,
    ) -> Result<Self, FftError> {
        let plan = plan(&data, result.as_ref(), &options.plan)?;
        let request = PlanRequest {
            plan: &plan,
            scale_forward: options.scale_forward.unwrap_or(1.0),
            scale_backward: options
                .scale_backward
                .unwrap_or(1.0 / plan.transform_len() as f64),
            callbacks: &options.callbacks,
        };

        let mut handle = backend.create_plan(context, &request)?;
        let scratch_bytes = match backend.bake(&mut handle, &queue) {
            Ok(bytes) => bytes,
            Err(e) => {
                backend.destroy_plan(handle);
                return Err(e.into());
            }
        };
        let scratch = if scratch_bytes > 0 {
            match backend.allocate_scratch(context, scratch_bytes) {
                Ok(buf) => Some(buf),
                Err(e) => {
                    backend.destroy_plan(handle);
                    return Err(e.into());
                }
            }
        } else {
            None
        };
        crate::vlog!(debug, "baked plan, scratch {} bytes", scratch_bytes);

        Ok(Self {
            backend,
            queue,
            plan,
            handle: Some(handle),
            scratch,
            callbacks: options.callbacks,
            data,
            result,
        })
    }

    pub fn plan(&self) -> &TransformPlan {
        &self.plan
    }

    pub fn data(&self) -> &ArrayDescriptor<B::Buffer> {
        &self.data
    }

    pub fn result(&self) -> Option<&ArrayDescriptor<B::Buffer>> {
        self.result.as_ref()
    }

    pub fn scratch(&self) -> Option<&B::Buffer> {
        self.scratch.as_ref()
    }

    pub fn callbacks(&self) -> &[Callback<B::Buffer>] {
        &self.callbacks
    }

    /// Enqueue the transform on the bound arrays.
    pub fn enqueue(&self, forward: bool, wait_for: &[B::Event]) -> Result<Vec<B::Event>, FftError> {
        self.enqueue_arrays(None, None, forward, wait_for)
    }

    /// Enqueue the transform on other arrays with the planned layout.
    ///
    /// `data`/`result` replace the bound arrays and must match their shape,
    /// strides and dtype exactly, and alias each other the way the planned
    /// pair does. Returns the backend's completion events
    /// without waiting on them.
    pub fn enqueue_arrays(
        &self,
        data: Option<&ArrayDescriptor<B::Buffer>>,
        result: Option<&ArrayDescriptor<B::Buffer>>,
        forward: bool,
        wait_for: &[B::Event],
    ) -> Result<Vec<B::Event>, FftError> {
        let data = match data {
            Some(d) => {
                check_same_layout("data", d, &self.data)?;
                d
            }
            None => &self.data,
        };
        let result = match (result, self.result.as_ref()) {
            (Some(r), Some(bound)) => {
                check_same_layout("result", r, bound)?;
                Some(r)
            }
            (Some(_), None) => {
                return Err(FftError::ArrayMismatch {
                    array: "result",
                    field: "presence",
                })
            }
            (None, bound) => bound,
        };
        if let Some(r) = result {
            // The pair must alias exactly as the planned pair did.
            let placed = if self.plan.in_place() {
                data.aliases(r) && data.offset() == r.offset()
            } else {
                !data.aliases(r)
            };
            if !placed {
                return Err(FftError::ArrayMismatch {
                    array: "result",
                    field: "placement",
                });
            }
        }

        let input = self.resolve(data)?;
        let output = match result {
            Some(r) if !self.plan.in_place() => Some(self.resolve(r)?),
            _ => None,
        };
        let handle = self.handle.as_ref().ok_or(crate::error::BackendError::NotBaked)?;
        crate::vlog!(
            trace,
            "enqueue {} transform, batch {}",
            if forward { "forward" } else { "inverse" },
            self.plan.batch_size()
        );
        let events = self.backend.enqueue_transform(
            handle,
            &[&self.queue],
            core::slice::from_ref(&input),
            output.as_ref().map(core::slice::from_ref),
            forward,
            self.scratch.as_ref(),
            wait_for,
        )?;
        Ok(events)
    }

    /// Buffer whose first byte is the view's first element.
    fn resolve(&self, array: &ArrayDescriptor<B::Buffer>) -> Result<B::Buffer, FftError> {
        if array.offset() == 0 {
            Ok(array.buffer().clone())
        } else {
            Ok(self.backend.offset_view(array.buffer(), array.offset())?)
        }
    }
}

fn check_same_layout<B, C>(
    array: &'static str,
    given: &ArrayDescriptor<B>,
    bound: &ArrayDescriptor<C>,
) -> Result<(), FftError> {
    let field = if given.shape() != bound.shape() {
        "shape"
    } else if given.strides() != bound.strides() {
        "strides"
    } else if given.dtype() != bound.dtype() {
        "dtype"
    } else {
        return Ok(());
    };
    Err(FftError::ArrayMismatch { array, field })
}

impl<B: Backend> Drop for Fft<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.destroy_plan(handle);
        }
        // Scratch and callback buffers are released after the plan.
        self.scratch = None;
    }
}
