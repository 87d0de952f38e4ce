//! The narrow interface to an external FFT execution engine.
//!
//! The planner never runs transforms itself. A [`Backend`] receives the
//! finished configuration in one [`PlanRequest`], compiles it once in
//! [`Backend::bake`] and executes it on device buffers.

use alloc::string::String;
use alloc::vec::Vec;

use crate::array::BufferHandle;
use crate::error::BackendError;
use crate::plan::TransformPlan;

/// When a callback runs relative to the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackPhase {
    /// Runs on each input element as it is loaded.
    Pre,
    /// Runs on each output element before it is stored.
    Post,
}

/// User code injected into the engine's generated kernels.
#[derive(Debug, Clone, PartialEq)]
pub struct Callback<Buf> {
    /// Entry point inside `source`.
    pub name: String,
    pub source: String,
    pub phase: CallbackPhase,
    /// Extra buffer handed to the callback; kept alive by the plan.
    pub user_data: Option<Buf>,
}

impl<Buf> Callback<Buf> {
    pub fn new(name: &str, source: &str, phase: CallbackPhase) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            phase,
            user_data: None,
        }
    }

    pub fn with_user_data(mut self, buffer: Buf) -> Self {
        self.user_data = Some(buffer);
        self
    }
}

/// Everything the engine needs to create a plan, gathered up front.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a, Buf> {
    pub plan: &'a TransformPlan,
    pub scale_forward: f64,
    pub scale_backward: f64,
    pub callbacks: &'a [Callback<Buf>],
}

/// An FFT execution engine.
///
/// Implementations must make [`Backend::enqueue_transform`] asynchronous:
/// it submits work to the queues and returns completion events without
/// waiting on them.
pub trait Backend {
    type Context;
    type Queue;
    type Buffer: BufferHandle + Clone;
    type Event: Clone;
    type Plan;

    /// Create a fully configured, not yet compiled plan.
    fn create_plan(
        &self,
        context: &Self::Context,
        request: &PlanRequest<'_, Self::Buffer>,
    ) -> Result<Self::Plan, BackendError>;

    /// Compile `plan` for `queue`. Returns the scratch size in bytes the
    /// plan needs at execution time (`0` for none).
    fn bake(&self, plan: &mut Self::Plan, queue: &Self::Queue) -> Result<usize, BackendError>;

    fn allocate_scratch(
        &self,
        context: &Self::Context,
        bytes: usize,
    ) -> Result<Self::Buffer, BackendError>;

    /// A buffer handle whose byte `0` is byte `offset` of `buffer`.
    fn offset_view(&self, buffer: &Self::Buffer, offset: usize)
        -> Result<Self::Buffer, BackendError>;

    /// Submit one transform. `outputs = None` runs in place.
    #[allow(clippy::too_many_arguments)]
    fn enqueue_transform(
        &self,
        plan: &Self::Plan,
        queues: &[&Self::Queue],
        inputs: &[Self::Buffer],
        outputs: Option<&[Self::Buffer]>,
        forward: bool,
        temp_buffer: Option<&Self::Buffer>,
        wait_for: &[Self::Event],
    ) -> Result<Vec<Self::Event>, BackendError>;

    /// Release a plan handle, baked or not.
    fn destroy_plan(&self, plan: Self::Plan);
}
