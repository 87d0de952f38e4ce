//! Process-wide backend handles.
//!
//! An FFT library is initialized once and shared by every plan. A
//! [`SharedBackend`] slot hands out `Arc`s to one live instance, creating it
//! on first use. The slot only holds a weak reference, so the library is
//! torn down when the last plan referencing it is dropped and created again
//! on the next request.

use std::sync::{Arc, Mutex, Weak};

use crate::error::BackendError;

pub struct SharedBackend<B> {
    slot: Mutex<Weak<B>>,
}

impl<B> Default for SharedBackend<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SharedBackend<B> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Weak::new()),
        }
    }

    /// Return the live instance, or create one with `init`.
    pub fn acquire<F>(&self, init: F) -> Result<Arc<B>, BackendError>
    where
        F: FnOnce() -> Result<B, BackendError>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(live) = slot.upgrade() {
            return Ok(live);
        }
        let fresh = Arc::new(init()?);
        *slot = Arc::downgrade(&fresh);
        crate::vlog!(debug, "initialized shared FFT backend");
        Ok(fresh)
    }

    /// Whether an instance is currently alive.
    pub fn is_live(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.strong_count() > 0
    }
}
