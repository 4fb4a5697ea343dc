//! Fence-epoch destruction strategy.

use std::sync::Arc;

use crate::backend::RhiBackend;
use crate::frame::FrameIndex;
use crate::resource::RhiObject;

use super::{DeferredDestroy, EpochQueue};

/// Frees retired objects once a timeline fence proves the GPU is past
/// the frame that retired them.
///
/// Each `update` seals the pending objects under the next fence value
/// and signals that value behind all submitted work; sealed epochs whose
/// value the GPU has reached are freed. An epoch the GPU is still behind
/// on never blocks anything — new retirements start a fresh epoch.
pub struct FenceEpochDestroy {
    backend: Arc<dyn RhiBackend>,
    epochs: EpochQueue,
    next_mark: u64,
}

impl FenceEpochDestroy {
    /// Create a destroyer polling `backend`'s timeline fence.
    pub fn new(backend: Arc<dyn RhiBackend>) -> Self {
        Self {
            backend,
            epochs: EpochQueue::new(),
            next_mark: 1,
        }
    }
}

impl DeferredDestroy for FenceEpochDestroy {
    fn enqueue(&mut self, object: RhiObject, _frame: FrameIndex) {
        log::trace!("deferring destruction of {}", object.raw());
        self.epochs.push(object);
    }

    fn update(&mut self, _frame: FrameIndex) {
        self.epochs.seal(self.next_mark);
        self.backend.signal_fence(self.next_mark);
        self.next_mark += 1;
        let completed = self.backend.fence_completed_value();
        let backend = &self.backend;
        self.epochs.collect(completed, |obj| backend.destroy(obj.raw()));
    }

    fn flush_all(&mut self) {
        let backend = &self.backend;
        self.epochs.drain_all(|obj| backend.destroy(obj.raw()));
    }

    fn pending(&self) -> usize {
        self.epochs.pending()
    }
}
