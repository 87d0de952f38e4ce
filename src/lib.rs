//! # stridefft - strided array planning for external FFT engines
//!
//! Describes how an FFT engine should transform arbitrary strided,
//! possibly offset, multi-dimensional arrays. Given an input array, an
//! optional output array and a choice of axes, the planner works out which
//! axes are transformed and which are batched, whether the transform is
//! complex, real-to-complex or complex-to-real, and the element strides and
//! batch distances the engine needs. It rejects layouts the engine cannot
//! express before any engine call is made.
//!
//! Execution is delegated to a [`Backend`]. The `host` feature provides a
//! CPU reference implementation used for testing and for machines without a
//! device.
//!
//! ## Cargo Features
//!
//! - `std` (default): `std::error::Error` impls, shared backend handles and
//!   environment configuration
//! - `host` (default): the CPU reference backend
//! - `parallel`: run batched host transforms on a Rayon pool
//! - `verbose-logging`: emit planning and execution details through `log`
//!
//! ## Example
//!
//! ```
//! # #[cfg(feature = "host")] {
//! use stridefft::host::{HostBackend, HostBuffer, HostContext, HostQueue};
//! use stridefft::{ArrayDescriptor, Complex32, DType, Fft, FftOptions};
//!
//! let backend = HostBackend::shared().unwrap();
//! let samples: Vec<Complex32> = (0..8).map(|i| Complex32::new(i as f32, 0.0)).collect();
//! let input = HostBuffer::from_complex32(&samples);
//! let output = HostBuffer::zeroed(8 * 8);
//! let data = ArrayDescriptor::contiguous(input, vec![8], DType::Complex64).unwrap();
//! let result = ArrayDescriptor::contiguous(output.clone(), vec![8], DType::Complex64).unwrap();
//!
//! let fft = Fft::new(backend, &HostContext, HostQueue, data, Some(result), FftOptions::new()).unwrap();
//! fft.enqueue(true, &[]).unwrap();
//! assert!((output.to_complex32_vec()[0].re - 28.0).abs() < 1e-4);
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

/// Log through `log` when `verbose-logging` is enabled; otherwise the
/// arguments are type-checked and discarded.
#[cfg(feature = "verbose-logging")]
macro_rules! vlog {
    ($level:ident, $($arg:tt)+) => {
        ::log::$level!($($arg)+)
    };
}

#[cfg(not(feature = "verbose-logging"))]
macro_rules! vlog {
    ($level:ident, $($arg:tt)+) => {{
        if false {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

pub(crate) use vlog;

pub mod array;
pub mod axes;
pub mod backend;
pub mod batch;
pub mod dtype;
pub mod error;
pub mod fft;
pub mod layout;
pub mod num;
pub mod plan;
pub mod transform;

#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod service;

/// CPU reference backend.
#[cfg(feature = "host")]
pub mod host;

pub use array::{ArrayDescriptor, BufferHandle, BufferId};
pub use backend::{Backend, Callback, CallbackPhase, PlanRequest};
pub use dtype::{DType, Kind, Precision};
pub use error::{BackendError, FftError};
pub use fft::FftPlanner;
pub use layout::{Layout, TransformKind};
pub use num::{Complex, Complex32, Complex64, Float};
pub use plan::{plan, PlanOptions, TransformPlan};
pub use transform::{Fft, FftOptions};

#[cfg(feature = "std")]
pub use service::SharedBackend;
