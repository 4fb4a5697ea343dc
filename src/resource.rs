//! RHI objects and the render resource lifecycle.
//!
//! A [`RenderResource`] owns at most one [`RhiObject`] and moves through
//! a fixed state machine:
//!
//! ```text
//! Uninitialized -> Creating -> Ready -> Destroying -> Destroyed
//! ```
//!
//! `Uninitialized -> Creating` happens on whichever thread requests
//! initialization; every other transition happens on the render thread,
//! which is also the only place the object's reference count is touched.
//! Once an object's count reaches zero it leaves the resource and enters
//! the deferred destruction queue; the backend free happens later, when
//! the GPU is known to be done with it.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{RawRhiHandle, RhiBackend};
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

/// Unique identity of a [`RenderResource`], stable across its lifetime.
///
/// Pool reuse hands back the same identity; eviction and recreation hand
/// back a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Lifecycle state of a [`RenderResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No GPU object exists and none is being created.
    Uninitialized,
    /// A creation task is queued or running.
    Creating,
    /// The GPU object exists and is usable.
    Ready,
    /// Destruction requested; outstanding references keep the object alive.
    Destroying,
    /// The object has left the resource (or never existed).
    Destroyed,
}

const STATE_UNINITIALIZED: u8 = 0;
const STATE_CREATING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_DESTROYING: u8 = 3;
const STATE_DESTROYED: u8 = 4;

/// What kind of GPU object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhiObjectKind {
    /// A buffer.
    Buffer,
    /// A texture or render surface.
    Texture,
    /// A sampler.
    Sampler,
}

/// A backend handle plus an explicit reference count.
///
/// Reference counts are mutated only on the render thread; the type is
/// deliberately not `Clone` so exactly one owner exists at a time —
/// first the resource, then the deferred destruction queue.
#[derive(Debug)]
pub struct RhiObject {
    raw: RawRhiHandle,
    kind: RhiObjectKind,
    refs: u32,
}

impl RhiObject {
    pub(crate) fn new(raw: RawRhiHandle, kind: RhiObjectKind) -> Self {
        Self { raw, kind, refs: 1 }
    }

    /// The backend handle.
    pub fn raw(&self) -> RawRhiHandle {
        self.raw
    }

    /// The object kind.
    pub fn kind(&self) -> RhiObjectKind {
        self.kind
    }

    /// Outstanding references.
    pub fn references(&self) -> u32 {
        self.refs
    }

    pub(crate) fn add_reference(&mut self) {
        self.refs += 1;
    }

    /// Drop one reference; returns the count afterwards.
    pub(crate) fn release(&mut self) -> u32 {
        debug_assert!(self.refs > 0, "release of a dead RHI object");
        self.refs -= 1;
        self.refs
    }
}

/// What a resource describes to the backend at creation time.
#[derive(Debug, Clone)]
pub enum ResourceDesc {
    /// A buffer, optionally with initial contents.
    Buffer {
        /// Buffer shape.
        descriptor: BufferDescriptor,
        /// Uploaded into the buffer at creation.
        initial_data: Option<Vec<u8>>,
    },
    /// A texture.
    Texture(TextureDescriptor),
    /// A sampler.
    Sampler(SamplerDescriptor),
}

impl ResourceDesc {
    /// The kind of object this descriptor produces.
    pub fn kind(&self) -> RhiObjectKind {
        match self {
            Self::Buffer { .. } => RhiObjectKind::Buffer,
            Self::Texture(_) => RhiObjectKind::Texture,
            Self::Sampler(_) => RhiObjectKind::Sampler,
        }
    }
}

struct ResourceInner {
    id: ResourceId,
    desc: ResourceDesc,
    state: AtomicU8,
    object: Mutex<Option<RhiObject>>,
}

/// A refcounted handle to a lifecycle-managed GPU resource.
///
/// Clones share the same underlying resource and identity. Creation and
/// destruction go through [`RenderContext`](crate::RenderContext), never
/// through this type directly.
#[derive(Clone)]
pub struct RenderResource {
    inner: Arc<ResourceInner>,
}

impl RenderResource {
    /// Create an uninitialized resource from a descriptor.
    pub fn new(desc: ResourceDesc) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                id: ResourceId::next(),
                desc,
                state: AtomicU8::new(STATE_UNINITIALIZED),
                object: Mutex::new(None),
            }),
        }
    }

    /// Stable identity of this resource.
    pub fn id(&self) -> ResourceId {
        self.inner.id
    }

    /// The creation descriptor.
    pub fn desc(&self) -> &ResourceDesc {
        &self.inner.desc
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_UNINITIALIZED => ResourceState::Uninitialized,
            STATE_CREATING => ResourceState::Creating,
            STATE_READY => ResourceState::Ready,
            STATE_DESTROYING => ResourceState::Destroying,
            _ => ResourceState::Destroyed,
        }
    }

    /// The backend handle, if the object currently exists.
    pub fn rhi_handle(&self) -> Option<RawRhiHandle> {
        self.inner.object.lock().as_ref().map(|obj| obj.raw())
    }

    /// Claim the `Uninitialized -> Creating` transition. Returns false if
    /// another caller got there first (or the resource is past creation).
    pub(crate) fn try_begin_create(&self) -> bool {
        self.inner
            .state
            .compare_exchange(
                STATE_UNINITIALIZED,
                STATE_CREATING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Create the backend object. Render thread only; the caller must
    /// have won [`try_begin_create`](Self::try_begin_create).
    ///
    /// Backend failure here is unrecoverable and aborts the render
    /// thread.
    pub(crate) fn create_now(&self, backend: &dyn RhiBackend) {
        debug_assert_eq!(self.state(), ResourceState::Creating);
        let result = match &self.inner.desc {
            ResourceDesc::Buffer {
                descriptor,
                initial_data,
            } => backend.create_buffer(descriptor, initial_data.as_deref()),
            ResourceDesc::Texture(descriptor) => backend.create_texture(descriptor),
            ResourceDesc::Sampler(descriptor) => backend.create_sampler(descriptor),
        };
        match result {
            Ok(raw) => {
                *self.inner.object.lock() = Some(RhiObject::new(raw, self.inner.desc.kind()));
                self.inner.state.store(STATE_READY, Ordering::Release);
                log::trace!("resource {:?} ready ({})", self.inner.id, backend.name());
            }
            Err(err) => {
                log::error!(
                    "fatal: backend {} failed to create resource {:?}: {err}",
                    backend.name(),
                    self.inner.id
                );
                panic!("GPU resource creation failed: {err}");
            }
        }
    }

    /// Release the resource's own reference. Render thread only.
    ///
    /// Returns the object when the count hit zero, handing ownership to
    /// the deferred destruction queue. With references outstanding the
    /// resource stays `Destroying` until they are released too.
    pub(crate) fn destroy_now(&self) -> Option<RhiObject> {
        let mut slot = self.inner.object.lock();
        match slot.as_mut() {
            Some(obj) => {
                self.inner.state.store(STATE_DESTROYING, Ordering::Release);
                if obj.release() == 0 {
                    self.inner.state.store(STATE_DESTROYED, Ordering::Release);
                    slot.take()
                } else {
                    None
                }
            }
            None => {
                self.inner.state.store(STATE_DESTROYED, Ordering::Release);
                None
            }
        }
    }

    /// Add a reference to the underlying object. Render thread only.
    pub(crate) fn add_reference_now(&self) {
        let mut slot = self.inner.object.lock();
        match slot.as_mut() {
            Some(obj) => obj.add_reference(),
            None => log::warn!(
                "add_reference on resource {:?} with no live object",
                self.inner.id
            ),
        }
    }

    /// Drop one reference without requesting destruction. Render thread
    /// only. Returns the object if the count reached zero.
    pub(crate) fn release_now(&self) -> Option<RhiObject> {
        let mut slot = self.inner.object.lock();
        match slot.as_mut() {
            Some(obj) => {
                if obj.release() == 0 {
                    self.inner.state.store(STATE_DESTROYED, Ordering::Release);
                    slot.take()
                } else {
                    None
                }
            }
            None => None,
        }
    }
}

impl std::fmt::Debug for RenderResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderResource")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("kind", &self.inner.desc.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::types::BufferUsage;

    fn buffer_resource(size: u64) -> RenderResource {
        RenderResource::new(ResourceDesc::Buffer {
            descriptor: BufferDescriptor::new(size, BufferUsage::UNIFORM),
            initial_data: None,
        })
    }

    #[test]
    fn test_state_machine_happy_path() {
        let backend = NullBackend::new();
        let res = buffer_resource(64);
        assert_eq!(res.state(), ResourceState::Uninitialized);
        assert!(res.rhi_handle().is_none());

        assert!(res.try_begin_create());
        assert_eq!(res.state(), ResourceState::Creating);
        res.create_now(&backend);
        assert_eq!(res.state(), ResourceState::Ready);
        assert!(res.rhi_handle().is_some());

        let freed = res.destroy_now().unwrap();
        assert_eq!(res.state(), ResourceState::Destroyed);
        assert_eq!(freed.references(), 0);
        assert!(res.rhi_handle().is_none());
    }

    #[test]
    fn test_begin_create_claimed_once() {
        let res = buffer_resource(64);
        assert!(res.try_begin_create());
        assert!(!res.try_begin_create());
    }

    #[test]
    fn test_outstanding_references_defer_free() {
        let backend = NullBackend::new();
        let res = buffer_resource(64);
        assert!(res.try_begin_create());
        res.create_now(&backend);
        res.add_reference_now();

        // Destruction requested, but a reference keeps the object parked.
        assert!(res.destroy_now().is_none());
        assert_eq!(res.state(), ResourceState::Destroying);
        assert!(res.rhi_handle().is_some());

        let freed = res.release_now().unwrap();
        assert_eq!(res.state(), ResourceState::Destroyed);
        assert_eq!(freed.references(), 0);
    }

    #[test]
    fn test_destroy_uninitialized_resource() {
        let res = buffer_resource(64);
        assert!(res.destroy_now().is_none());
        assert_eq!(res.state(), ResourceState::Destroyed);
    }

    #[test]
    fn test_clones_share_identity() {
        let res = buffer_resource(64);
        let other = res.clone();
        assert_eq!(res.id(), other.id());
        assert_ne!(res.id(), buffer_resource(64).id());
    }
}
