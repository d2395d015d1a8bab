use std::cmp::Ordering;
use std::collections::BinaryHeap;

use cxl_fabric_abstract::{Event, EventKind};
use tracing::debug;

use crate::error::SimError;
use crate::stats::SimStats;

/// Heap entry. Ordered by `(timestamp, insertion sequence)` so that equal
/// timestamps dispatch in the order they were scheduled.
#[derive(Debug)]
struct Scheduled {
    time: u64,
    seq: u64,
    event: Event,
}

// Reverse comparison: the smallest (time, seq) must be Greater so the
// BinaryHeap behaves as a min-heap.
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

/// Owns the pending-event queue, the virtual clock, and run statistics.
///
/// Virtual time is integer nanoseconds and advances only when an event is
/// popped for dispatch, never inside handlers, so all effects scheduled for
/// the same nanosecond observe the same clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    current_time: u64,
    queue: BinaryHeap<Scheduled>,
    next_seq: u64,
    pub stats: SimStats,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event. Fails if the event lies in the past; that is a
    /// programming bug in the caller, not a runtime condition.
    pub fn schedule(&mut self, event: Event) -> Result<(), SimError> {
        if event.timestamp < self.current_time {
            return Err(SimError::PastEvent {
                at: event.timestamp,
                now: self.current_time,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled {
            time: event.timestamp,
            seq,
            event,
        });
        Ok(())
    }

    pub fn now(&self) -> u64 {
        self.current_time
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn peek_next_time(&self) -> Option<u64> {
        self.queue.peek().map(|s| s.time)
    }

    /// Pop the next event, advancing the clock to its timestamp.
    fn pop_next(&mut self) -> Option<Event> {
        let scheduled = self.queue.pop()?;
        self.current_time = scheduled.time;
        self.stats.total_events += 1;
        Some(scheduled.event)
    }
}

/// Handler invoked for each dispatched event of its registered kind. The
/// event is mutable so a handler can take ownership of the payload packet.
pub type Handler<W> = Box<dyn FnMut(&mut W, &mut Scheduler, &mut Event) -> Result<(), SimError>>;

/// Stopping conditions for [`SimulationEngine::run`]. With neither limit set
/// the run drains the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLimits {
    /// Halt before dispatching any event with `timestamp > until`.
    pub until: Option<u64>,
    /// Halt after dispatching this many events (counted per call).
    pub max_events: Option<u64>,
}

impl RunLimits {
    pub fn until(t: u64) -> Self {
        Self {
            until: Some(t),
            max_events: None,
        }
    }

    pub fn max_events(n: u64) -> Self {
        Self {
            until: None,
            max_events: Some(n),
        }
    }
}

/// Discrete-event kernel, agnostic to the model it drives.
///
/// The world `W` is whatever state the registered handlers operate on; the
/// engine itself only orders events and dispatches them.
pub struct SimulationEngine<W> {
    pub scheduler: Scheduler,
    handlers: [Vec<Handler<W>>; EventKind::COUNT],
}

impl<W> Default for SimulationEngine<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> SimulationEngine<W> {
    pub fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            handlers: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Register a handler for an event kind. Handlers for the same kind fire
    /// in registration order.
    pub fn register(&mut self, kind: EventKind, handler: Handler<W>) {
        self.handlers[kind.index()].push(handler);
    }

    pub fn stats(&self) -> &SimStats {
        &self.scheduler.stats
    }

    /// Process events in `(timestamp, insertion)` order until the queue is
    /// empty or a limit is hit.
    ///
    /// A halting event is never popped: it keeps its original insertion
    /// sequence, so a later `run` call resumes with identical ordering. A
    /// handler error aborts the run immediately.
    pub fn run(&mut self, world: &mut W, limits: RunLimits) -> Result<(), SimError> {
        let mut processed: u64 = 0;
        loop {
            let Some(next_time) = self.scheduler.peek_next_time() else {
                break;
            };
            if limits.until.is_some_and(|until| next_time > until) {
                break;
            }
            if limits.max_events.is_some_and(|max| processed >= max) {
                break;
            }
            let Some(mut event) = self.scheduler.pop_next() else {
                break;
            };
            for handler in &mut self.handlers[event.kind.index()] {
                handler(world, &mut self.scheduler, &mut event)?;
            }
            processed += 1;
            if processed % 10_000 == 0 {
                debug!(
                    events = processed,
                    sim_time_ns = self.scheduler.current_time,
                    "simulation progress"
                );
            }
        }
        self.scheduler.stats.final_time = self.scheduler.current_time;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxl_fabric_abstract::{Packet, PacketKind, Priority};

    fn probe(timestamp: u64, kind: EventKind) -> Event {
        let packet = Packet::new(0, PacketKind::MemRead, 0, 0, 0, Priority::Medium, timestamp);
        match kind {
            EventKind::HostSend => Event::host_send(timestamp, packet, 0),
            EventKind::SwitchTransmit => Event::switch_transmit(timestamp, 0, 0),
            EventKind::DeviceResponse => Event::device_response(timestamp, packet),
        }
    }

    fn recorder(engine: &mut SimulationEngine<Vec<EventKind>>, kind: EventKind) {
        engine.register(
            kind,
            Box::new(|log, _sched, event| {
                log.push(event.kind);
                Ok(())
            }),
        );
    }

    #[test]
    fn empty_run_is_a_noop() {
        let mut engine: SimulationEngine<Vec<EventKind>> = SimulationEngine::new();
        let mut log = Vec::new();
        engine.run(&mut log, RunLimits::default()).unwrap();
        assert_eq!(engine.stats().total_events, 0);
        assert_eq!(engine.stats().final_time, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn events_dispatch_in_timestamp_order() {
        let mut engine = SimulationEngine::new();
        for kind in [
            EventKind::HostSend,
            EventKind::SwitchTransmit,
            EventKind::DeviceResponse,
        ] {
            recorder(&mut engine, kind);
        }
        // Scheduled out of order on purpose.
        engine
            .scheduler
            .schedule(probe(200, EventKind::SwitchTransmit))
            .unwrap();
        engine
            .scheduler
            .schedule(probe(100, EventKind::HostSend))
            .unwrap();
        engine
            .scheduler
            .schedule(probe(300, EventKind::DeviceResponse))
            .unwrap();

        let mut log = Vec::new();
        engine.run(&mut log, RunLimits::until(400)).unwrap();
        assert_eq!(
            log,
            vec![
                EventKind::HostSend,
                EventKind::SwitchTransmit,
                EventKind::DeviceResponse
            ]
        );
        assert_eq!(engine.stats().final_time, 300);
    }

    #[test]
    fn tied_timestamps_fire_in_insertion_order() {
        let kinds = [
            EventKind::HostSend,
            EventKind::SwitchTransmit,
            EventKind::DeviceResponse,
        ];
        for order in [kinds, [kinds[2], kinds[1], kinds[0]]] {
            let mut engine = SimulationEngine::new();
            for kind in kinds {
                recorder(&mut engine, kind);
            }
            for kind in order {
                engine.scheduler.schedule(probe(100, kind)).unwrap();
            }
            let mut log = Vec::new();
            engine.run(&mut log, RunLimits::default()).unwrap();
            assert_eq!(log, order.to_vec());
        }
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let mut engine: SimulationEngine<Vec<&'static str>> = SimulationEngine::new();
        engine.register(
            EventKind::HostSend,
            Box::new(|log, _, _| {
                log.push("first");
                Ok(())
            }),
        );
        engine.register(
            EventKind::HostSend,
            Box::new(|log, _, _| {
                log.push("second");
                Ok(())
            }),
        );
        engine
            .scheduler
            .schedule(probe(0, EventKind::HostSend))
            .unwrap();
        let mut log = Vec::new();
        engine.run(&mut log, RunLimits::default()).unwrap();
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn scheduling_in_the_past_fails() {
        let mut engine: SimulationEngine<Vec<EventKind>> = SimulationEngine::new();
        recorder(&mut engine, EventKind::HostSend);
        engine
            .scheduler
            .schedule(probe(100, EventKind::HostSend))
            .unwrap();
        let mut log = Vec::new();
        engine.run(&mut log, RunLimits::default()).unwrap();
        assert_eq!(engine.scheduler.now(), 100);

        let err = engine
            .scheduler
            .schedule(probe(50, EventKind::HostSend))
            .unwrap_err();
        assert_eq!(err, SimError::PastEvent { at: 50, now: 100 });
    }

    #[test]
    fn halted_run_resumes_deterministically() {
        // Two engines with identical schedules: one runs in two segments,
        // the other in a single call. Resulting logs and stats must match.
        let build = || {
            let mut engine = SimulationEngine::new();
            for kind in [
                EventKind::HostSend,
                EventKind::SwitchTransmit,
                EventKind::DeviceResponse,
            ] {
                recorder(&mut engine, kind);
            }
            for (t, kind) in [
                (100, EventKind::HostSend),
                (500, EventKind::SwitchTransmit),
                (500, EventKind::DeviceResponse),
                (900, EventKind::HostSend),
            ] {
                engine.scheduler.schedule(probe(t, kind)).unwrap();
            }
            engine
        };

        let mut segmented = build();
        let mut log_a = Vec::new();
        segmented.run(&mut log_a, RunLimits::until(400)).unwrap();
        assert_eq!(log_a, vec![EventKind::HostSend]);
        segmented.run(&mut log_a, RunLimits::until(1000)).unwrap();

        let mut single = build();
        let mut log_b = Vec::new();
        single.run(&mut log_b, RunLimits::until(1000)).unwrap();

        assert_eq!(log_a, log_b);
        assert_eq!(segmented.stats().total_events, single.stats().total_events);
        assert_eq!(segmented.stats().final_time, single.stats().final_time);
    }

    #[test]
    fn max_events_halts_and_preserves_queue() {
        let mut engine = SimulationEngine::new();
        recorder(&mut engine, EventKind::HostSend);
        for t in [10, 20, 30] {
            engine
                .scheduler
                .schedule(probe(t, EventKind::HostSend))
                .unwrap();
        }
        let mut log = Vec::new();
        engine.run(&mut log, RunLimits::max_events(2)).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(engine.scheduler.pending(), 1);
        assert_eq!(engine.scheduler.peek_next_time(), Some(30));

        engine.run(&mut log, RunLimits::default()).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(engine.stats().total_events, 3);
    }

    #[test]
    fn handlers_can_schedule_follow_ups() {
        let mut engine: SimulationEngine<Vec<EventKind>> = SimulationEngine::new();
        engine.register(
            EventKind::HostSend,
            Box::new(|log, sched, event| {
                log.push(event.kind);
                if log.len() == 1 {
                    let packet =
                        Packet::new(0, PacketKind::MemRead, 0, 0, 0, Priority::Medium, 0);
                    sched.schedule(Event::device_response(sched.now() + 150, packet))?;
                }
                Ok(())
            }),
        );
        recorder(&mut engine, EventKind::DeviceResponse);
        engine
            .scheduler
            .schedule(probe(0, EventKind::HostSend))
            .unwrap();
        let mut log = Vec::new();
        engine.run(&mut log, RunLimits::default()).unwrap();
        assert_eq!(log, vec![EventKind::HostSend, EventKind::DeviceResponse]);
        assert_eq!(engine.stats().final_time, 150);
    }
}
