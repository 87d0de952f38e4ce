//! Host-memory reference backend.
//!
//! Executes plans on the CPU with the scalar kernels from [`crate::fft`].
//! Buffers are shared byte vectors, the queue runs work as soon as it is
//! submitted and every returned event is already complete. Callbacks carry
//! device kernel source and are rejected.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::array::{BufferHandle, BufferId};
use crate::backend::{Backend, PlanRequest};
use crate::config::HostConfig;
use crate::dtype::Precision;
use crate::error::BackendError;
use crate::fft::FftPlanner;
use crate::layout::{hermitian_len, Layout, TransformKind};
use crate::num::{Complex, Complex32, Complex64, Float};
use crate::service::SharedBackend;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);
static SHARED: SharedBackend<HostBackend> = SharedBackend::new();

/// Scalars the host backend can load from and store to raw bytes.
pub trait HostScalar: Float {
    const BYTES: usize;
    fn load(bytes: &[u8]) -> Self;
    fn store(self, bytes: &mut [u8]);
}

impl HostScalar for f32 {
    const BYTES: usize = 4;
    fn load(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        f32::from_ne_bytes(raw)
    }
    fn store(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.to_ne_bytes());
    }
}

impl HostScalar for f64 {
    const BYTES: usize = 8;
    fn load(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        f64::from_ne_bytes(raw)
    }
    fn store(self, bytes: &mut [u8]) {
        bytes[..8].copy_from_slice(&self.to_ne_bytes());
    }
}

/// A shared host allocation, possibly viewed from a byte offset.
///
/// Clones and offset views share storage and identity.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    id: BufferId,
    storage: Arc<Mutex<Vec<u8>>>,
    origin: usize,
}

impl HostBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            id: BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)),
            storage: Arc::new(Mutex::new(bytes)),
            origin: 0,
        }
    }

    pub fn zeroed(bytes: usize) -> Self {
        Self::from_bytes(vec![0u8; bytes])
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self::from_scalars(values.iter().copied())
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Self::from_scalars(values.iter().copied())
    }

    pub fn from_complex32(values: &[Complex32]) -> Self {
        Self::from_scalars(values.iter().flat_map(|c| [c.re, c.im]))
    }

    pub fn from_complex64(values: &[Complex64]) -> Self {
        Self::from_scalars(values.iter().flat_map(|c| [c.re, c.im]))
    }

    fn from_scalars<T: HostScalar>(values: impl Iterator<Item = T>) -> Self {
        let mut bytes = Vec::new();
        for v in values {
            let start = bytes.len();
            bytes.resize(start + T::BYTES, 0);
            v.store(&mut bytes[start..]);
        }
        Self::from_bytes(bytes)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.storage.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Bytes visible from this view's origin.
    pub fn len(&self) -> usize {
        self.lock().len().saturating_sub(self.origin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.to_scalars()
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.to_scalars()
    }

    pub fn to_complex32_vec(&self) -> Vec<Complex32> {
        pairs(self.to_scalars())
    }

    pub fn to_complex64_vec(&self) -> Vec<Complex64> {
        pairs(self.to_scalars())
    }

    fn to_scalars<T: HostScalar>(&self) -> Vec<T> {
        let storage = self.lock();
        storage
            .get(self.origin..)
            .unwrap_or(&[])
            .chunks_exact(T::BYTES)
            .map(T::load)
            .collect()
    }

    fn shares_storage(&self, other: &HostBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

fn pairs<T: Float>(scalars: Vec<T>) -> Vec<Complex<T>> {
    scalars
        .chunks_exact(2)
        .map(|p| Complex::new(p[0], p[1]))
        .collect()
}

impl BufferHandle for HostBuffer {
    fn id(&self) -> BufferId {
        self.id
    }

    fn byte_len(&self) -> Option<usize> {
        Some(self.len())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostQueue;

/// Completion handle. Host work finishes before the event is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEvent {
    id: u64,
}

impl HostEvent {
    fn completed() -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_complete(&self) -> bool {
        true
    }

    pub fn wait(&self) {}
}

/// Plan state captured from a [`PlanRequest`].
#[derive(Debug, Clone)]
pub struct HostPlan {
    kind: TransformKind,
    shape: Vec<usize>,
    strides_in: Vec<usize>,
    strides_out: Vec<usize>,
    distance_in: usize,
    distance_out: usize,
    batch_size: usize,
    precision: Precision,
    in_place: bool,
    scale_forward: f64,
    scale_backward: f64,
    baked: bool,
}

impl HostPlan {
    pub fn is_baked(&self) -> bool {
        self.baked
    }
}

/// One side of an execution: where elements live and how they are stored.
struct Lattice<'a> {
    layout: Layout,
    shape: &'a [usize],
    strides: &'a [usize],
    distance: usize,
}

impl Lattice<'_> {
    fn element_bytes<T: HostScalar>(&self) -> usize {
        match self.layout {
            Layout::Real => T::BYTES,
            Layout::ComplexInterleaved | Layout::HermitianInterleaved => 2 * T::BYTES,
        }
    }

    /// Bytes past the view origin touched by `batch` transforms.
    fn extent<T: HostScalar>(&self, batch: usize) -> usize {
        let last = (batch - 1) * self.distance
            + self
                .shape
                .iter()
                .zip(self.strides)
                .map(|(&n, &s)| (n - 1) * s)
                .sum::<usize>();
        (last + 1) * self.element_bytes::<T>()
    }

    fn offset(&self, base: usize, index: &[usize]) -> usize {
        base + index
            .iter()
            .zip(self.strides)
            .map(|(&k, &s)| k * s)
            .sum::<usize>()
    }

    fn load<T: HostScalar>(&self, bytes: &[u8], element: usize) -> Complex<T> {
        let at = element * self.element_bytes::<T>();
        match self.layout {
            Layout::Real => Complex::new(T::load(&bytes[at..]), T::zero()),
            _ => Complex::new(T::load(&bytes[at..]), T::load(&bytes[at + T::BYTES..])),
        }
    }

    fn store<T: HostScalar>(&self, bytes: &mut [u8], element: usize, value: Complex<T>) {
        let at = element * self.element_bytes::<T>();
        value.re.store(&mut bytes[at..]);
        if self.layout != Layout::Real {
            value.im.store(&mut bytes[at + T::BYTES..]);
        }
    }
}

/// Visit every multi-index of `shape`, first axis fastest.
fn for_each_index(shape: &[usize], mut f: impl FnMut(usize, &[usize])) {
    let total: usize = shape.iter().product();
    let mut index = vec![0usize; shape.len()];
    for linear in 0..total {
        f(linear, &index);
        for (k, &n) in index.iter_mut().zip(shape) {
            *k += 1;
            if *k < n {
                break;
            }
            *k = 0;
        }
    }
}

pub struct HostBackend {
    config: HostConfig,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    live_plans: AtomicUsize,
}

impl HostBackend {
    pub fn new() -> Result<Self, BackendError> {
        Self::with_config(HostConfig::global())
    }

    pub fn with_config(config: HostConfig) -> Result<Self, BackendError> {
        #[cfg(feature = "parallel")]
        let pool = if config.threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.threads)
                    .build()
                    .map_err(|e| BackendError::Unsupported(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            config,
            #[cfg(feature = "parallel")]
            pool,
            live_plans: AtomicUsize::new(0),
        })
    }

    /// The process-wide host backend, created on first use.
    pub fn shared() -> Result<Arc<Self>, BackendError> {
        SHARED.acquire(Self::new)
    }

    /// Whether the process-wide instance is alive.
    pub fn shared_is_live() -> bool {
        SHARED.is_live()
    }

    pub fn config(&self) -> HostConfig {
        self.config
    }

    /// Plans created and not yet destroyed.
    pub fn live_plans(&self) -> usize {
        self.live_plans.load(Ordering::SeqCst)
    }

    fn execute<T: HostScalar>(
        &self,
        plan: &HostPlan,
        input: &HostBuffer,
        output: &HostBuffer,
        forward: bool,
    ) -> Result<(), BackendError> {
        let (layout_in, layout_out) = plan.kind.layouts();
        let inverse = match plan.kind {
            TransformKind::ComplexToComplex => !forward,
            TransformKind::RealToComplex if forward => false,
            TransformKind::ComplexToReal if !forward => true,
            kind => {
                return Err(BackendError::Unsupported(format!(
                    "{kind:?} plan enqueued in the {} direction",
                    if forward { "forward" } else { "inverse" }
                )))
            }
        };
        let scale = T::from_f64(if inverse {
            plan.scale_backward
        } else {
            plan.scale_forward
        });
        let full = plan.shape.as_slice();
        let mut half = plan.shape.clone();
        half[0] = hermitian_len(half[0]);
        let side_shape = |layout: Layout| match layout {
            Layout::HermitianInterleaved => half.as_slice(),
            _ => full,
        };
        let src = Lattice {
            layout: layout_in,
            shape: side_shape(layout_in),
            strides: &plan.strides_in,
            distance: plan.distance_in,
        };
        let dst = Lattice {
            layout: layout_out,
            shape: side_shape(layout_out),
            strides: &plan.strides_out,
            distance: plan.distance_out,
        };
        for (lattice, buffer) in [(&src, input), (&dst, output)] {
            let needed = lattice.extent::<T>(plan.batch_size);
            let available = buffer.len();
            if needed > available {
                return Err(BackendError::OutOfBounds { needed, available });
            }
        }

        let mut blocks: Vec<Vec<Complex<T>>> = {
            let storage = input.lock();
            let bytes = &storage[input.origin..];
            (0..plan.batch_size)
                .map(|b| gather(&src, bytes, b * src.distance, full))
                .collect()
        };

        self.transform_blocks(&mut blocks, full, inverse, scale);

        let mut storage = output.lock();
        let bytes = &mut storage[output.origin..];
        for (b, block) in blocks.iter().enumerate() {
            scatter(&dst, bytes, b * dst.distance, full, block);
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn transform_blocks<T: HostScalar>(
        &self,
        blocks: &mut [Vec<Complex<T>>],
        shape: &[usize],
        inverse: bool,
        scale: T,
    ) {
        match &self.pool {
            Some(pool) => pool.install(|| {
                blocks.par_iter_mut().for_each_init(FftPlanner::new, |planner, block| {
                    transform_block(planner, block, shape, inverse, scale)
                })
            }),
            None => {
                let mut planner = FftPlanner::new();
                for block in blocks.iter_mut() {
                    transform_block(&mut planner, block, shape, inverse, scale);
                }
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn transform_blocks<T: HostScalar>(
        &self,
        blocks: &mut [Vec<Complex<T>>],
        shape: &[usize],
        inverse: bool,
        scale: T,
    ) {
        let mut planner = FftPlanner::new();
        for block in blocks.iter_mut() {
            transform_block(&mut planner, block, shape, inverse, scale);
        }
    }
}

fn transform_block<T: Float>(
    planner: &mut FftPlanner<T>,
    block: &mut [Complex<T>],
    shape: &[usize],
    inverse: bool,
    scale: T,
) {
    planner.fft_nd(block, shape, inverse);
    if scale != T::one() {
        for v in block.iter_mut() {
            *v = v.scale(scale);
        }
    }
}

/// Load one transform into a packed full-size complex block.
///
/// A hermitian side is expanded with `X[k] = conj(X[-k])`.
fn gather<T: HostScalar>(
    src: &Lattice<'_>,
    bytes: &[u8],
    base: usize,
    full: &[usize],
) -> Vec<Complex<T>> {
    let mut block = vec![Complex::zero(); full.iter().product()];
    let stored = src.shape[0];
    let mut mirror = vec![0usize; full.len()];
    for_each_index(full, |linear, index| {
        block[linear] = if index[0] < stored {
            src.load(bytes, src.offset(base, index))
        } else {
            for ((m, &k), &n) in mirror.iter_mut().zip(index).zip(full) {
                *m = (n - k) % n;
            }
            src.load::<T>(bytes, src.offset(base, &mirror)).conj()
        };
    });
    block
}

/// Store a packed block, keeping only the stored half of a hermitian side.
fn scatter<T: HostScalar>(
    dst: &Lattice<'_>,
    bytes: &mut [u8],
    base: usize,
    full: &[usize],
    block: &[Complex<T>],
) {
    let stored = dst.shape[0];
    for_each_index(full, |linear, index| {
        if index[0] < stored {
            dst.store(bytes, dst.offset(base, index), block[linear]);
        }
    });
}

impl Backend for HostBackend {
    type Context = HostContext;
    type Queue = HostQueue;
    type Buffer = HostBuffer;
    type Event = HostEvent;
    type Plan = HostPlan;

    fn create_plan(
        &self,
        _context: &HostContext,
        request: &PlanRequest<'_, HostBuffer>,
    ) -> Result<HostPlan, BackendError> {
        if !request.callbacks.is_empty() {
            return Err(BackendError::Unsupported(
                "callbacks are not supported by the host backend".into(),
            ));
        }
        let plan = request.plan;
        let (distance_in, distance_out) = plan.distances();
        self.live_plans.fetch_add(1, Ordering::SeqCst);
        Ok(HostPlan {
            kind: plan.kind(),
            shape: plan.transform_shape().to_vec(),
            strides_in: plan.strides_in().to_vec(),
            strides_out: plan.strides_out().to_vec(),
            distance_in,
            distance_out,
            batch_size: plan.batch_size(),
            precision: plan.precision(),
            in_place: plan.in_place(),
            scale_forward: request.scale_forward,
            scale_backward: request.scale_backward,
            baked: false,
        })
    }

    fn bake(&self, plan: &mut HostPlan, _queue: &HostQueue) -> Result<usize, BackendError> {
        plan.baked = true;
        Ok(0)
    }

    fn allocate_scratch(
        &self,
        _context: &HostContext,
        bytes: usize,
    ) -> Result<HostBuffer, BackendError> {
        Ok(HostBuffer::zeroed(bytes))
    }

    fn offset_view(&self, buffer: &HostBuffer, offset: usize) -> Result<HostBuffer, BackendError> {
        let available = buffer.len();
        if offset > available {
            return Err(BackendError::OutOfBounds {
                needed: offset,
                available,
            });
        }
        Ok(HostBuffer {
            origin: buffer.origin + offset,
            ..buffer.clone()
        })
    }

    fn enqueue_transform(
        &self,
        plan: &HostPlan,
        queues: &[&HostQueue],
        inputs: &[HostBuffer],
        outputs: Option<&[HostBuffer]>,
        forward: bool,
        _temp_buffer: Option<&HostBuffer>,
        _wait_for: &[HostEvent],
    ) -> Result<Vec<HostEvent>, BackendError> {
        if !plan.baked {
            return Err(BackendError::NotBaked);
        }
        let input = match inputs {
            [input] => input,
            _ => {
                return Err(BackendError::Unsupported(
                    "exactly one interleaved input buffer is required".into(),
                ))
            }
        };
        let output = match (outputs, plan.in_place) {
            (None, true) => input,
            (Some([output]), false) => output,
            _ => {
                return Err(BackendError::Unsupported(
                    "output buffers do not match the plan's placement".into(),
                ))
            }
        };
        if self.config.debug {
            crate::vlog!(
                debug,
                "host {:?} {} batch {} shape {:?} aliased {}",
                plan.kind,
                if forward { "forward" } else { "inverse" },
                plan.batch_size,
                plan.shape,
                input.shares_storage(output)
            );
        }
        match plan.precision {
            Precision::Single => self.execute::<f32>(plan, input, output, forward)?,
            Precision::Double => self.execute::<f64>(plan, input, output, forward)?,
        }
        Ok(queues.iter().map(|_| HostEvent::completed()).collect())
    }

    fn destroy_plan(&self, _plan: HostPlan) {
        self.live_plans.fetch_sub(1, Ordering::SeqCst);
    }
}
