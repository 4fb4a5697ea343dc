//! Deferred GPU object destruction.
//!
//! A destroyed [`RhiObject`] cannot be freed immediately: the GPU may
//! still be reading it from frames in flight. Retired objects therefore
//! collect in *epochs*; each frame the current epoch is sealed with a
//! completion mark, and sealed epochs are physically freed once the mark
//! is provably behind the GPU.
//!
//! Two strategies share the epoch machinery and differ only in what the
//! mark means:
//! - [`FenceEpochDestroy`] seals with timeline fence values and polls
//!   the backend fence (explicit-submission backends).
//! - [`FrameCountdownDestroy`] seals with frame indices and frees after
//!   a fixed number of frames (backends without a cheap fence poll, and
//!   the original home of staging-buffer retirement).

use std::collections::VecDeque;

use crate::frame::FrameIndex;
use crate::resource::RhiObject;

mod countdown;
mod fence;

pub use countdown::FrameCountdownDestroy;
pub use fence::FenceEpochDestroy;

/// Frames a countdown destroyer waits before freeing, covering the
/// maximum number of frames in flight with headroom.
pub const DEFAULT_DESTROY_WAIT_FRAMES: u64 = 5;

/// A deferred destruction strategy.
///
/// Objects passed to [`enqueue`](Self::enqueue) are owned exclusively by
/// the destroyer until it frees them through the backend. All methods
/// are called on the render thread.
pub trait DeferredDestroy: Send {
    /// Take ownership of a retired object.
    fn enqueue(&mut self, object: RhiObject, frame: FrameIndex);

    /// Seal the current epoch and free every epoch the GPU has finished
    /// with. Called once per frame, after the pool sweep.
    fn update(&mut self, frame: FrameIndex);

    /// Free everything immediately. Only valid when the GPU is idle
    /// (shutdown).
    fn flush_all(&mut self);

    /// Objects waiting to be freed.
    fn pending(&self) -> usize;
}

struct Epoch {
    mark: u64,
    objects: Vec<RhiObject>,
}

/// Epoch rotation shared by both strategies.
///
/// Epoch buffers are recycled instead of reallocated; when the head
/// epoch is not yet complete a fresh buffer simply starts the next epoch
/// rather than anything blocking on the GPU.
#[derive(Default)]
pub(crate) struct EpochQueue {
    sealed: VecDeque<Epoch>,
    current: Vec<RhiObject>,
    recycled: Vec<Vec<RhiObject>>,
}

impl EpochQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, object: RhiObject) {
        self.current.push(object);
    }

    /// Seal the current epoch under `mark`. A quiet frame seals nothing.
    pub(crate) fn seal(&mut self, mark: u64) {
        if self.current.is_empty() {
            return;
        }
        if let Some(last) = self.sealed.back() {
            debug_assert!(last.mark < mark, "epoch marks must increase");
        }
        let next = self.recycled.pop().unwrap_or_default();
        let objects = std::mem::replace(&mut self.current, next);
        self.sealed.push_back(Epoch { mark, objects });
    }

    /// Free every sealed epoch with `mark <= completed`.
    pub(crate) fn collect(&mut self, completed: u64, mut free: impl FnMut(RhiObject)) {
        while self
            .sealed
            .front()
            .is_some_and(|epoch| epoch.mark <= completed)
        {
            if let Some(mut epoch) = self.sealed.pop_front() {
                for object in epoch.objects.drain(..) {
                    free(object);
                }
                self.recycled.push(epoch.objects);
            }
        }
    }

    /// Free everything, sealed or not.
    pub(crate) fn drain_all(&mut self, mut free: impl FnMut(RhiObject)) {
        for mut epoch in self.sealed.drain(..) {
            for object in epoch.objects.drain(..) {
                free(object);
            }
        }
        for object in self.current.drain(..) {
            free(object);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.current.len() + self.sealed.iter().map(|e| e.objects.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawRhiHandle;
    use crate::resource::RhiObjectKind;

    fn object(id: u64) -> RhiObject {
        RhiObject::new(RawRhiHandle(id), RhiObjectKind::Buffer)
    }

    #[test]
    fn test_collect_respects_marks() {
        let mut epochs = EpochQueue::new();
        epochs.push(object(1));
        epochs.seal(10);
        epochs.push(object(2));
        epochs.seal(11);
        assert_eq!(epochs.pending(), 2);

        let mut freed = Vec::new();
        epochs.collect(10, |obj| freed.push(obj.raw().value()));
        assert_eq!(freed, vec![1]);
        assert_eq!(epochs.pending(), 1);

        epochs.collect(11, |obj| freed.push(obj.raw().value()));
        assert_eq!(freed, vec![1, 2]);
        assert_eq!(epochs.pending(), 0);
    }

    #[test]
    fn test_empty_epochs_not_sealed() {
        let mut epochs = EpochQueue::new();
        epochs.seal(1);
        epochs.seal(2);
        assert_eq!(epochs.pending(), 0);
        assert!(epochs.sealed.is_empty());
    }

    #[test]
    fn test_buffers_are_recycled() {
        let mut epochs = EpochQueue::new();
        epochs.push(object(1));
        epochs.seal(1);
        epochs.collect(1, |_| {});
        assert_eq!(epochs.recycled.len(), 1);

        epochs.push(object(2));
        epochs.seal(2);
        assert!(epochs.recycled.is_empty());
    }

    #[test]
    fn test_drain_all_frees_unsealed() {
        let mut epochs = EpochQueue::new();
        epochs.push(object(1));
        epochs.seal(1);
        epochs.push(object(2));

        let mut freed = Vec::new();
        epochs.drain_all(|obj| freed.push(obj.raw().value()));
        assert_eq!(freed, vec![1, 2]);
        assert_eq!(epochs.pending(), 0);
    }
}
