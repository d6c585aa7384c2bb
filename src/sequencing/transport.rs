//! Shared transport
//!
//! One pausable clock drives every timer in the engine. Callers schedule
//! events at clock-relative times and the owner pumps the transport:
//! `advance` moves the clock while it runs, `pop_due` hands back events
//! whose time has come, in (time, schedule-order) order. Repeating events
//! re-arm themselves as they are popped.
//!
//! Stopping pauses the clock in place; nothing fires while stopped, and
//! whatever was scheduled stays queued for a later start. Cancellation is by
//! tombstone, so a cancelled timer costs nothing until its entry surfaces.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Handle to one scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
enum Payload<E> {
    Once(E),
    Repeat { event: E, interval: f64 },
}

#[derive(Debug)]
struct Entry<E> {
    time: f64,
    seq: u64,
    timer: TimerId,
    payload: Payload<E>,
}

// Heap order: earliest time first, schedule order breaking ties. BinaryHeap
// is a max-heap, so comparisons are reversed.
impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pausable musical clock plus event scheduler.
#[derive(Debug)]
pub struct Transport<E> {
    now: f64,
    running: bool,
    heap: BinaryHeap<Entry<E>>,
    cancelled: HashSet<TimerId>,
    next_seq: u64,
    next_timer: u64,
}

impl<E> Default for Transport<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Transport<E> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            running: false,
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
            next_timer: 0,
        }
    }

    /// Current clock time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Pause in place. Scheduled entries are kept.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Move the clock forward. No-op while stopped.
    pub fn advance(&mut self, dt: f64) {
        assert!(dt >= 0.0, "transport cannot run backwards");
        if self.running {
            self.now += dt;
        }
    }

    fn alloc_timer(&mut self) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        id
    }

    fn push(&mut self, time: f64, timer: TimerId, payload: Payload<E>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            time,
            seq,
            timer,
            payload,
        });
    }

    /// Schedule `event` once at the absolute clock time `time`. Times in the
    /// past fire on the next pump.
    pub fn schedule_once(&mut self, time: f64, event: E) -> TimerId {
        let timer = self.alloc_timer();
        self.push(time, timer, Payload::Once(event));
        timer
    }

    /// Schedule `event` every `interval` seconds, first firing `start_delay`
    /// from now.
    pub fn schedule_repeat(&mut self, event: E, interval: f64, start_delay: f64) -> TimerId
    where
        E: Clone,
    {
        assert!(interval > 0.0, "repeat interval must be positive");
        let timer = self.alloc_timer();
        let time = self.now + start_delay;
        self.push(time, timer, Payload::Repeat { event, interval });
        timer
    }

    /// Cancel a timer. Cancelling one that already fired (or was never
    /// scheduled) is a no-op.
    pub fn cancel(&mut self, timer: TimerId) {
        self.cancelled.insert(timer);
    }

    /// Pop the next due event, if any. Nothing fires while the transport is
    /// stopped, even if the event came due before the stop. Repeating entries
    /// are re-armed at their fixed grid (`time + interval`), not relative to
    /// when they were popped, so a slow pump does not drift the schedule.
    pub fn pop_due(&mut self) -> Option<E>
    where
        E: Clone,
    {
        if !self.running {
            return None;
        }
        loop {
            let due = self
                .heap
                .peek()
                .map_or(false, |entry| entry.time <= self.now);
            if !due {
                return None;
            }

            let entry = self.heap.pop()?;
            if self.cancelled.remove(&entry.timer) {
                // A timer has at most one live entry, so the tombstone is
                // spent as soon as that entry surfaces
                continue;
            }

            match entry.payload {
                Payload::Once(event) => return Some(event),
                Payload::Repeat { event, interval } => {
                    self.push(
                        entry.time + interval,
                        entry.timer,
                        Payload::Repeat {
                            event: event.clone(),
                            interval,
                        },
                    );
                    return Some(event);
                }
            }
        }
    }

    /// Number of queued entries, tombstoned ones included.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<E: Clone>(transport: &mut Transport<E>) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(event) = transport.pop_due() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_nothing_fires_before_its_time() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_once(5.0, "late");

        transport.advance(4.9);
        assert!(transport.pop_due().is_none());

        transport.advance(0.2);
        assert_eq!(transport.pop_due(), Some("late"));
        assert!(transport.pop_due().is_none());
    }

    #[test]
    fn test_same_time_fires_in_schedule_order() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_once(1.0, "first");
        transport.schedule_once(1.0, "second");
        transport.schedule_once(0.5, "earlier");

        transport.advance(1.0);
        assert_eq!(drain(&mut transport), vec!["earlier", "first", "second"]);
    }

    #[test]
    fn test_repeat_fires_on_fixed_grid() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_repeat("tick", 2.0, 2.0);

        let mut fired = 0;
        for _ in 0..10 {
            transport.advance(1.0);
            fired += drain(&mut transport).len();
        }
        // Fires at 2, 4, 6, 8, 10
        assert_eq!(fired, 5);
    }

    #[test]
    fn test_slow_pump_catches_up_without_drift() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_repeat((), 1.0, 1.0);

        // One big advance covers several intervals; each is delivered
        transport.advance(5.5);
        assert_eq!(drain(&mut transport).len(), 5);

        transport.advance(0.5);
        assert_eq!(drain(&mut transport).len(), 1, "grid stays at whole seconds");
    }

    #[test]
    fn test_stopped_clock_does_not_advance() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_once(1.0, "held");

        transport.stop();
        transport.advance(10.0);
        assert_eq!(transport.now(), 0.0);
        assert!(transport.pop_due().is_none());

        // Resume where we paused
        transport.start();
        transport.advance(1.0);
        assert_eq!(transport.pop_due(), Some("held"));
    }

    #[test]
    fn test_stopped_transport_fires_nothing() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_once(1.0, "due");

        // Already due when the stop lands; it must stay queued
        transport.advance(1.0);
        transport.stop();
        assert!(transport.pop_due().is_none());

        transport.start();
        assert_eq!(transport.pop_due(), Some("due"));
    }

    #[test]
    fn test_cancel_suppresses_once_and_repeat() {
        let mut transport = Transport::new();
        transport.start();
        let once = transport.schedule_once(1.0, "once");
        let repeat = transport.schedule_repeat("repeat", 1.0, 1.0);

        transport.cancel(once);
        transport.cancel(repeat);

        transport.advance(5.0);
        assert!(drain(&mut transport).is_empty());
        assert_eq!(transport.pending(), 0, "tombstoned entries fully drained");
    }

    #[test]
    fn test_cancel_mid_stream_stops_later_fires() {
        let mut transport = Transport::new();
        transport.start();
        let repeat = transport.schedule_repeat((), 1.0, 1.0);

        transport.advance(2.0);
        assert_eq!(drain(&mut transport).len(), 2);

        transport.cancel(repeat);
        transport.advance(5.0);
        assert!(drain(&mut transport).is_empty());
    }

    #[test]
    fn test_past_time_fires_immediately() {
        let mut transport = Transport::new();
        transport.start();
        transport.advance(0.0);
        transport.schedule_once(0.0, "now");
        assert_eq!(transport.pop_due(), Some("now"));
    }

    #[test]
    fn test_independent_timers_interleave() {
        let mut transport = Transport::new();
        transport.start();
        transport.schedule_repeat("slow", 3.0, 3.0);
        transport.schedule_repeat("fast", 1.0, 1.0);

        let mut seen = Vec::new();
        for _ in 0..6 {
            transport.advance(1.0);
            seen.extend(drain(&mut transport));
        }
        assert_eq!(
            seen,
            vec!["fast", "fast", "slow", "fast", "fast", "fast", "slow", "fast"]
        );
    }
}
