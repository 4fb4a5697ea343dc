//! Null backend for testing and headless runs.
//!
//! Performs no GPU work but keeps a registry of live handles, creation
//! counters and a simulated timeline fence, so tests can observe exactly
//! when objects are allocated and physically freed. The fence can lag
//! behind signaled values by a configurable number of `signal_fence`
//! calls to mimic GPU latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::RhiError;
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

use super::{RawRhiHandle, RhiBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NullObject {
    Buffer,
    Texture,
    Sampler,
}

#[derive(Debug, Default)]
struct NullState {
    next_handle: u64,
    live: HashMap<u64, NullObject>,
    buffers_created: u64,
    textures_created: u64,
    samplers_created: u64,
    destroyed: u64,
}

/// Backend that allocates handle numbers instead of GPU objects.
#[derive(Debug)]
pub struct NullBackend {
    state: Mutex<NullState>,
    /// Highest value passed to `signal_fence`.
    signaled: AtomicU64,
    /// Pending signal values not yet "completed", oldest first.
    fence_lag: Mutex<Vec<u64>>,
    /// Completed timeline value.
    completed: AtomicU64,
    /// How many signals stay in flight before completing.
    latency: u64,
}

impl NullBackend {
    /// Create a backend whose fence completes immediately on signal.
    pub fn new() -> Self {
        Self::with_fence_latency(0)
    }

    /// Create a backend whose fence trails signals by `latency` calls.
    ///
    /// With latency 2, `signal_fence(3)` makes value 1 complete.
    pub fn with_fence_latency(latency: u64) -> Self {
        Self {
            state: Mutex::new(NullState::default()),
            signaled: AtomicU64::new(0),
            fence_lag: Mutex::new(Vec::new()),
            completed: AtomicU64::new(0),
            latency,
        }
    }

    fn allocate(&self, kind: NullObject) -> RawRhiHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.live.insert(handle, kind);
        match kind {
            NullObject::Buffer => state.buffers_created += 1,
            NullObject::Texture => state.textures_created += 1,
            NullObject::Sampler => state.samplers_created += 1,
        }
        RawRhiHandle(handle)
    }

    /// Number of handles created and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Whether `handle` is still live.
    pub fn is_live(&self, handle: RawRhiHandle) -> bool {
        self.state.lock().live.contains_key(&handle.0)
    }

    /// Total buffers ever created.
    pub fn buffers_created(&self) -> u64 {
        self.state.lock().buffers_created
    }

    /// Total textures ever created.
    pub fn textures_created(&self) -> u64 {
        self.state.lock().textures_created
    }

    /// Total samplers ever created.
    pub fn samplers_created(&self) -> u64 {
        self.state.lock().samplers_created
    }

    /// Total objects physically destroyed.
    pub fn objects_destroyed(&self) -> u64 {
        self.state.lock().destroyed
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RhiBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<RawRhiHandle, RhiError> {
        if let Some(data) = initial_data {
            if data.len() as u64 > descriptor.size {
                return Err(RhiError::InvalidParameter(format!(
                    "initial data ({} bytes) exceeds buffer size ({})",
                    data.len(),
                    descriptor.size
                )));
            }
        }
        let handle = self.allocate(NullObject::Buffer);
        log::trace!(
            "NullBackend: created buffer {:?} (size: {}) -> {}",
            descriptor.label,
            descriptor.size,
            handle
        );
        Ok(handle)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<RawRhiHandle, RhiError> {
        let handle = self.allocate(NullObject::Texture);
        log::trace!(
            "NullBackend: created texture {:?} ({}x{}, {:?}) -> {}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.format,
            handle
        );
        Ok(handle)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<RawRhiHandle, RhiError> {
        let handle = self.allocate(NullObject::Sampler);
        log::trace!(
            "NullBackend: created sampler {:?} -> {}",
            descriptor.label,
            handle
        );
        Ok(handle)
    }

    fn destroy(&self, handle: RawRhiHandle) {
        let mut state = self.state.lock();
        if state.live.remove(&handle.0).is_some() {
            state.destroyed += 1;
            log::trace!("NullBackend: destroyed {}", handle);
        } else {
            log::warn!("NullBackend: destroy of unknown handle {}", handle);
        }
    }

    fn signal_fence(&self, value: u64) {
        self.signaled.store(value, Ordering::Release);
        let mut lag = self.fence_lag.lock();
        lag.push(value);
        while lag.len() as u64 > self.latency {
            let done = lag.remove(0);
            self.completed.store(done, Ordering::Release);
        }
    }

    fn fence_completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_registry() {
        let backend = NullBackend::new();
        let desc = BufferDescriptor::new(64, crate::types::BufferUsage::UNIFORM);
        let a = backend.create_buffer(&desc, None).unwrap();
        let b = backend.create_buffer(&desc, None).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.live_objects(), 2);
        backend.destroy(a);
        assert!(!backend.is_live(a));
        assert!(backend.is_live(b));
        assert_eq!(backend.objects_destroyed(), 1);
    }

    #[test]
    fn test_oversized_initial_data_rejected() {
        let backend = NullBackend::new();
        let desc = BufferDescriptor::new(4, crate::types::BufferUsage::UNIFORM);
        let err = backend.create_buffer(&desc, Some(&[0u8; 8])).unwrap_err();
        assert!(matches!(err, RhiError::InvalidParameter(_)));
    }

    #[test]
    fn test_fence_latency() {
        let backend = NullBackend::with_fence_latency(2);
        backend.signal_fence(1);
        backend.signal_fence(2);
        assert_eq!(backend.fence_completed_value(), 0);
        backend.signal_fence(3);
        assert_eq!(backend.fence_completed_value(), 1);
        backend.signal_fence(4);
        assert_eq!(backend.fence_completed_value(), 2);
    }

    #[test]
    fn test_immediate_fence() {
        let backend = NullBackend::new();
        backend.signal_fence(7);
        assert_eq!(backend.fence_completed_value(), 7);
    }
}
