//! Simulation kernel: a clock that owns a time-ordered event queue.
//!
//! Every state change in a run happens inside an event action. Actions get the
//! clock back (to schedule follow-ups) plus a mutable borrow of the world `W`
//! the clock was started with, so nothing needs globals or shared cells.

pub mod time;
pub use time::{SimTime, transmission_time};

use crate::error::{Result, SimError};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use tracing::{debug, trace};

pub type Action<W> = Box<dyn FnOnce(&mut Clock<W>, &mut W) -> Result<()>>;

/// Opaque reference to a scheduled event, used only for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(u64);

impl EventHandle {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

struct Scheduled<W> {
    time: SimTime,
    seq: u64,
    action: Action<W>,
}

impl<W> PartialEq for Scheduled<W> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<W> Eq for Scheduled<W> {}

impl<W> PartialOrd for Scheduled<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<W> Ord for Scheduled<W> {
    // BinaryHeap is a max-heap; flip so the earliest (time, seq) pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub dispatched: u64,
    pub now: SimTime,
    pub pending: usize,
}

pub struct Clock<W> {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<Scheduled<W>>,
    pending: HashSet<u64>,
    cancelled: HashSet<u64>,
    dispatched: u64,
}

impl<W> Clock<W> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
            cancelled: HashSet::new(),
            dispatched: 0,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Live events still waiting to fire (cancelled ones excluded).
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Total actions invoked over the clock's lifetime.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle.0)
    }

    /// Queues `action` to run at `time`. Events sharing a timestamp run in the
    /// order they were scheduled.
    pub fn schedule<F>(&mut self, time: SimTime, action: F) -> Result<EventHandle>
    where
        F: FnOnce(&mut Clock<W>, &mut W) -> Result<()> + 'static,
    {
        if time < self.now {
            return Err(SimError::InvalidTime {
                requested: time,
                now: self.now,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq);
        self.queue.push(Scheduled {
            time,
            seq,
            action: Box::new(action),
        });

        trace!("scheduled event {} at {}", seq, time);
        Ok(EventHandle(seq))
    }

    pub fn schedule_after<F>(&mut self, delay: SimTime, action: F) -> Result<EventHandle>
    where
        F: FnOnce(&mut Clock<W>, &mut W) -> Result<()> + 'static,
    {
        self.schedule(self.now + delay, action)
    }

    /// Marks a pending event inert. The entry stays in the heap and is
    /// discarded when it reaches the front.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<()> {
        let seq = handle.0;
        if self.pending.remove(&seq) {
            self.cancelled.insert(seq);
            trace!("cancelled event {}", seq);
            return Ok(());
        }
        if self.cancelled.contains(&seq) {
            return Ok(());
        }
        if seq < self.next_seq {
            Err(SimError::CancelTooLate(seq))
        } else {
            Err(SimError::UnknownEvent(seq))
        }
    }

    /// Dispatches every live event with a timestamp at or before `end`, then
    /// parks the clock at `end`.
    ///
    /// An action error aborts the run with the clock left at the failing
    /// event's time.
    pub fn run_until(&mut self, end: SimTime, world: &mut W) -> Result<RunStats> {
        if end < self.now {
            return Err(SimError::InvalidTime {
                requested: end,
                now: self.now,
            });
        }

        let mut dispatched = 0;
        while self.queue.peek().is_some_and(|next| next.time <= end) {
            if self.dispatch_next(world)?.is_some() {
                dispatched += 1;
            }
        }
        self.now = end;

        debug!(
            "ran to {}: {} events dispatched, {} pending",
            end,
            dispatched,
            self.pending.len()
        );

        Ok(RunStats {
            dispatched,
            now: self.now,
            pending: self.pending.len(),
        })
    }

    /// Dispatches the next live event regardless of its time. Returns the
    /// time it fired at, or `None` once the queue is drained.
    pub fn step(&mut self, world: &mut W) -> Result<Option<SimTime>> {
        while !self.queue.is_empty() {
            if let Some(time) = self.dispatch_next(world)? {
                return Ok(Some(time));
            }
        }
        Ok(None)
    }

    // Pops the head; Ok(None) when the head was a cancelled entry.
    fn dispatch_next(&mut self, world: &mut W) -> Result<Option<SimTime>> {
        let Some(event) = self.queue.pop() else {
            return Ok(None);
        };
        // anything no longer pending was cancelled; its tombstone stays so a
        // repeated cancel still reads as cancelled rather than fired
        if !self.pending.remove(&event.seq) {
            return Ok(None);
        }

        self.now = event.time;
        self.dispatched += 1;
        (event.action)(self, world)?;
        Ok(Some(event.time))
    }
}

impl<W> Default for Clock<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> fmt::Debug for Clock<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .field("dispatched", &self.dispatched)
            .finish()
    }
}
