//! The three-lane request queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Lane, Request, RequestQueue, RequestSink};

/// Default in-flight capacity of the normal lane.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Priority, normal and deferred lanes sharing one sink.
///
/// `drain` never runs two passes at once: a caller that finds a pass in
/// progress returns immediately, and the running pass re-checks for
/// admissible work after it releases the guard.
pub struct RequestQueueCollection {
    priority: Mutex<RequestQueue>,
    normal: Mutex<RequestQueue>,
    deferred: Mutex<RequestQueue>,
    draining: AtomicBool,
    sink: Arc<dyn RequestSink>,
}

impl RequestQueueCollection {
    /// Create the lanes for the given normal-lane concurrency.
    #[must_use]
    pub fn new(concurrency: usize, sink: Arc<dyn RequestSink>) -> Self {
        let lane = |lane: Lane| Mutex::new(RequestQueue::new(lane, lane.capacity(concurrency)));
        Self {
            priority: lane(Lane::Priority),
            normal: lane(Lane::Normal),
            deferred: lane(Lane::Deferred),
            draining: AtomicBool::new(false),
            sink,
        }
    }

    fn lock(&self, lane: Lane) -> MutexGuard<'_, RequestQueue> {
        let queue = match lane {
            Lane::Priority => &self.priority,
            Lane::Normal => &self.normal,
            Lane::Deferred => &self.deferred,
        };
        queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a request to its lane and try to dispatch.
    pub fn enqueue(&self, request: Request) {
        let lane = Lane::for_command(request.command());
        self.lock(lane).enqueue(request);
        self.drain();
    }

    /// Take the waiting request answered by a response, if any.
    pub fn dequeue(&self, command: &str, seq: u64) -> Option<Request> {
        self.lock(Lane::for_command(command)).dequeue(seq)
    }

    /// Cancel a pending request. Returns false if it was already sent or gone.
    pub fn cancel(&self, command: &str, seq: u64) -> bool {
        self.lock(Lane::for_command(command)).cancel(seq)
    }

    /// True when no lane has pending work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Lane::ALL.iter().all(|&lane| !self.lock(lane).has_pending())
    }

    #[must_use]
    pub fn pending_len(&self, lane: Lane) -> usize {
        self.lock(lane).pending_len()
    }

    #[must_use]
    pub fn waiting_len(&self, lane: Lane) -> usize {
        self.lock(lane).waiting_len()
    }

    #[must_use]
    pub fn capacity(&self, lane: Lane) -> usize {
        self.lock(lane).capacity()
    }

    /// Reject every queued and in-flight request.
    pub fn abandon_all(&self) {
        for lane in Lane::ALL {
            self.lock(lane).abandon();
        }
    }

    /// Move pending requests into flight, up to each lane's capacity.
    pub fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            self.drain_pass();
            self.draining.store(false, Ordering::Release);

            if !self.has_admissible_work() {
                return;
            }
        }
    }

    fn drain_pass(&self) {
        if self.lock(Lane::Priority).is_full() {
            return;
        }
        if self.lock(Lane::Normal).is_full() && self.lock(Lane::Deferred).is_full() {
            return;
        }

        {
            let mut priority = self.lock(Lane::Priority);
            if priority.has_pending() {
                priority.process_pending(self.sink.as_ref());
                return;
            }
        }

        for lane in [Lane::Normal, Lane::Deferred] {
            let mut queue = self.lock(lane);
            if queue.has_pending() {
                queue.process_pending(self.sink.as_ref());
            }
        }
    }

    // Mirrors the gating in `drain_pass`.
    fn has_admissible_work(&self) -> bool {
        {
            let priority = self.lock(Lane::Priority);
            if priority.is_full() {
                return false;
            }
            if priority.has_pending() {
                return true;
            }
        }
        [Lane::Normal, Lane::Deferred].iter().any(|&lane| {
            let queue = self.lock(lane);
            queue.has_pending() && !queue.is_full()
        })
    }
}

impl std::fmt::Debug for RequestQueueCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueueCollection")
            .field("priority", &*self.lock(Lane::Priority))
            .field("normal", &*self.lock(Lane::Normal))
            .field("deferred", &*self.lock(Lane::Deferred))
            .field("draining", &self.draining.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
