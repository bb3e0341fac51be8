//! Deferred work: a cancel-and-replace debouncer and a frame coalescer.
//!
//! Time is passed in explicitly as milliseconds so both primitives stay
//! deterministic; the binary feeds them from `tokio::time`.

/// Holds at most one pending payload. Scheduling again replaces the payload
/// and pushes the deadline out; the earlier deadline becomes inert.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    wait_ms: u64,
    generation: u64,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    generation: u64,
    due_ms: u64,
    payload: T,
}

impl<T> Debouncer<T> {
    pub fn new(wait_ms: u64) -> Self {
        Self {
            wait_ms,
            generation: 0,
            pending: None,
        }
    }

    /// Returns the generation token of the new pending payload.
    pub fn schedule(&mut self, now_ms: u64, payload: T) -> u64 {
        self.generation += 1;
        self.pending = Some(Pending {
            generation: self.generation,
            due_ms: now_ms.saturating_add(self.wait_ms),
            payload,
        });
        self.generation
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Fire the pending payload if its deadline has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<T> {
        if self.pending.as_ref()?.due_ms > now_ms {
            return None;
        }
        self.pending.take().map(|p| p.payload)
    }

    /// Fire only if `token` is still the live generation. A timer armed for
    /// a replaced payload calls this and gets nothing.
    pub fn fire(&mut self, token: u64, now_ms: u64) -> Option<T> {
        match &self.pending {
            Some(p) if p.generation == token => self.poll(now_ms),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.due_ms)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn wait_ms(&self) -> u64 {
        self.wait_ms
    }
}

/// Any number of requests between two frames collapse into one, due one
/// frame after the first request of the burst.
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    requested_at: Option<u64>,
    coalesced: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, now_ms: u64) {
        match self.requested_at {
            Some(_) => self.coalesced += 1,
            None => self.requested_at = Some(now_ms),
        }
    }

    pub fn take(&mut self) -> bool {
        self.requested_at.take().is_some()
    }

    pub fn is_requested(&self) -> bool {
        self.requested_at.is_some()
    }

    /// Absolute time the pending frame is due; later requests never move it.
    pub fn deadline(&self, frame_ms: u64) -> Option<u64> {
        self.requested_at.map(|t| t.saturating_add(frame_ms))
    }

    /// Requests absorbed into an already pending frame.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}
