//! Frame-coalescing batch scheduling.
//!
//! Producers append decoded batches to a shared queue from any
//! thread; the rendering thread drains it once per animation-frame
//! tick. Under load, skippable batches between the head and the next
//! cannot-skip (or last) batch are dropped, trading intermediate
//! visual states for pace while structural calls always run.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use crate::wire::Batch;

/// The producer-facing half of the dispatcher: a pending queue plus
/// a coalesced tick-request latch. Shared via `Arc` with every
/// submitting thread.
#[derive(Debug, Default)]
pub struct BatchQueue {
    pending: Mutex<VecDeque<Batch>>,
    tick_requested: AtomicBool,
}

impl BatchQueue {
    /// Appends a batch. Returns `true` when the caller should request
    /// a scheduling tick; a tick already requested and not yet
    /// serviced is never duplicated.
    pub fn submit(&self, batch: Batch) -> bool {
        self.pending.lock().push_back(batch);
        self.request_tick()
    }

    /// Arms the tick-request latch. Returns `true` if it was unarmed.
    pub fn request_tick(&self) -> bool {
        !self.tick_requested.swap(true, Ordering::AcqRel)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn begin_tick(&self) {
        self.tick_requested.store(false, Ordering::Release);
    }

    fn clear(&self) {
        self.pending.lock().clear();
    }
}

/// The rendering-thread half: runs the coalescing policy and caches
/// the last-executed batch for no-new-input redraw ticks.
pub struct BatchDispatcher {
    queue: Arc<BatchQueue>,
    current: Option<Arc<Batch>>,
}

impl BatchDispatcher {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(BatchQueue::default()),
            current: None,
        }
    }

    pub fn queue(&self) -> &Arc<BatchQueue> {
        &self.queue
    }

    /// Selects the batch to execute for this tick.
    ///
    /// Empty queue: re-runs the previously executed batch (continuous
    /// redraw without a new command stream). One pending: runs it.
    /// More: drains from the front, dropping skippable batches until
    /// hitting one that is cannot-skip or last; anything after a
    /// cannot-skip batch stays queued for the next tick.
    ///
    /// Batches stamped with a generation older than `generation` are
    /// stale references from before a runtime reset and are discarded.
    pub fn next_batch(&mut self, generation: u64) -> Option<Arc<Batch>> {
        self.queue.begin_tick();

        let picked = {
            let mut pending = self.queue.pending.lock();
            loop {
                let Some(batch) = pending.pop_front() else {
                    break None;
                };
                if batch.generation != generation {
                    log::warn!("discarding batch submitted before the last runtime reset");
                    continue;
                }
                if pending.is_empty() || batch.cannot_skip {
                    break Some(batch);
                }
                log::debug!("coalescing: dropping a skippable batch under load");
            }
        };

        if let Some(batch) = picked {
            // The previously cached batch (if different) is released here.
            self.current = Some(Arc::new(batch));
        }
        self.current.clone()
    }

    /// Whether batches remain queued after a tick (drain stopped at a
    /// cannot-skip batch).
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Drops the queue and the cached batch. Part of the full runtime
    /// reset; must run on the rendering thread.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.current = None;
    }
}

impl Default for BatchDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Op;

    fn batch(marker: u32, cannot_skip: bool) -> Batch {
        Batch {
            ops: vec![Op::Save { canvas: marker }],
            cannot_skip,
            generation: 0,
        }
    }

    fn marker(batch: &Batch) -> u32 {
        match batch.ops[0] {
            Op::Save { canvas } => canvas,
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_queue_no_current_is_idle() {
        let mut dispatcher = BatchDispatcher::new();
        assert!(dispatcher.next_batch(0).is_none());
    }

    #[test]
    fn single_batch_runs_and_is_cached() {
        let mut dispatcher = BatchDispatcher::new();
        dispatcher.queue().submit(batch(1, false));

        let first = dispatcher.next_batch(0).unwrap();
        assert_eq!(marker(&first), 1);

        // No new input: the same batch re-runs.
        let rerun = dispatcher.next_batch(0).unwrap();
        assert!(Arc::ptr_eq(&first, &rerun));
    }

    #[test]
    fn drain_skips_droppable_batches() {
        let mut dispatcher = BatchDispatcher::new();
        for i in 1..=3 {
            dispatcher.queue().submit(batch(i, false));
        }
        // Only the last batch survives coalescing.
        let picked = dispatcher.next_batch(0).unwrap();
        assert_eq!(marker(&picked), 3);
        assert!(!dispatcher.has_pending());
    }

    #[test]
    fn drain_stops_at_cannot_skip() {
        let mut dispatcher = BatchDispatcher::new();
        dispatcher.queue().submit(batch(1, false));
        dispatcher.queue().submit(batch(2, true));
        dispatcher.queue().submit(batch(3, false));

        let picked = dispatcher.next_batch(0).unwrap();
        assert_eq!(marker(&picked), 2);
        // Batch 3 was never reached in this tick.
        assert!(dispatcher.has_pending());

        let next = dispatcher.next_batch(0).unwrap();
        assert_eq!(marker(&next), 3);
        assert!(!dispatcher.has_pending());
    }

    #[test]
    fn tick_requests_coalesce() {
        let dispatcher = BatchDispatcher::new();
        assert!(dispatcher.queue().submit(batch(1, false)));
        assert!(!dispatcher.queue().submit(batch(2, false)));
    }

    #[test]
    fn tick_request_rearms_after_tick() {
        let mut dispatcher = BatchDispatcher::new();
        assert!(dispatcher.queue().submit(batch(1, false)));
        dispatcher.next_batch(0);
        assert!(dispatcher.queue().submit(batch(2, false)));
    }

    #[test]
    fn stale_generation_batches_are_discarded() {
        let mut dispatcher = BatchDispatcher::new();
        dispatcher.queue().submit(batch(1, true));
        assert!(dispatcher.next_batch(1).is_none());
    }

    #[test]
    fn reset_drops_queue_and_cache() {
        let mut dispatcher = BatchDispatcher::new();
        dispatcher.queue().submit(batch(1, false));
        dispatcher.next_batch(0);
        dispatcher.reset();
        assert!(dispatcher.next_batch(0).is_none());
    }
}
