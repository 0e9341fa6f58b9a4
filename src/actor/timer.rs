//! Cancellable one-shot timers for the auto-visibility state machine.
//!
//! The engine never sleeps. It asks a [`Scheduler`] for a timer and gets back
//! a [`TimerHandle`]; when the delay elapses the scheduler produces a
//! [`TimerEvent`] that the event loop feeds back into the engine. Dropping or
//! replacing a handle cancels its timer, so a dock that goes away can never
//! be acted on by a stale event.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::actor::{self, Receiver};
use crate::layout_engine::DockId;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimerKind {
    Raise,
    Lower,
    Collapse,
    Expand,
}

impl TimerKind {
    /// The timer that undoes this one's effect.
    pub fn opposite(self) -> Self {
        match self {
            TimerKind::Raise => TimerKind::Lower,
            TimerKind::Lower => TimerKind::Raise,
            TimerKind::Collapse => TimerKind::Expand,
            TimerKind::Expand => TimerKind::Collapse,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize
)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "timer{}", self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEvent {
    pub id: TimerId,
    pub dock: DockId,
    pub kind: TimerKind,
}

/// Owning reference to a scheduled timer. Cancels it on drop.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new(id: TimerId) -> (Self, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        (Self { id, cancelled: cancelled.clone() }, cancelled)
    }

    pub fn id(&self) -> TimerId { self.id }


    pub fn cancel(&self) { self.cancelled.store(true, Ordering::Release); }
}

impl Drop for TimerHandle {
    fn drop(&mut self) { self.cancel(); }
}

pub trait Scheduler: Send {
    fn schedule(&self, delay: Duration, dock: DockId, kind: TimerKind) -> TimerHandle;
}

struct Pending {
    deadline: Duration,
    event: TimerEvent,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    pending: Vec<Pending>,
}

/// Scheduler driven by hand: time only moves when [`ManualScheduler::advance`]
/// is called. Clones share one clock.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<Clock>>,
}

impl ManualScheduler {
    pub fn new() -> Self { Self::default() }


    /// Timers scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> Vec<(DockId, TimerKind)> {
        let clock = self.clock.lock();
        clock
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::Acquire))
            .map(|p| (p.event.dock, p.event.kind))
            .collect()
    }

    /// Moves the clock forward and returns the timers that came due, in
    /// deadline order.
    pub fn advance(&self, by: Duration) -> Vec<TimerEvent> {
        let mut clock = self.clock.lock();
        clock.now += by;
        let now = clock.now;

        let (mut due, rest): (Vec<_>, Vec<_>) =
            clock.pending.drain(..).partition(|p| p.deadline <= now);
        clock.pending = rest;
        due.sort_by_key(|p| (p.deadline, p.event.id));
        due.into_iter().filter(|p| !p.cancelled.load(Ordering::Acquire)).map(|p| p.event).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, dock: DockId, kind: TimerKind) -> TimerHandle {
        let mut clock = self.clock.lock();
        clock.next_id += 1;
        let id = TimerId(clock.next_id);
        let (handle, cancelled) = TimerHandle::new(id);
        let deadline = clock.now + delay;
        clock.pending.push(Pending { deadline, event: TimerEvent { id, dock, kind }, cancelled });
        trace!(%id, ?dock, %kind, ?delay, "scheduled");
        handle
    }
}

/// Scheduler backed by `tokio::time`. Fired timers arrive on the receiver
/// returned by [`TokioScheduler::new`].
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
    tx: actor::Sender<TimerEvent>,
    next_id: AtomicU64,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> (Self, Receiver<TimerEvent>) {
        let (tx, rx) = actor::channel();
        (Self { runtime, tx, next_id: AtomicU64::new(1) }, rx)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, dock: DockId, kind: TimerKind) -> TimerHandle {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, cancelled) = TimerHandle::new(id);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !cancelled.load(Ordering::Acquire) {
                tx.send(TimerEvent { id, dock, kind });
            }
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout_engine::testing::dock_ids;

    #[test]
    fn manual_timers_fire_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let dock = dock_ids(1)[0];
        let _slow = scheduler.schedule(Duration::from_millis(500), dock, TimerKind::Lower);
        let _fast = scheduler.schedule(Duration::from_millis(100), dock, TimerKind::Collapse);

        assert!(scheduler.advance(Duration::from_millis(50)).is_empty());
        let fired: Vec<_> =
            scheduler.advance(Duration::from_millis(500)).into_iter().map(|e| e.kind).collect();
        assert_eq!(fired, vec![TimerKind::Collapse, TimerKind::Lower]);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn dropping_a_handle_cancels_the_timer() {
        let scheduler = ManualScheduler::new();
        let dock = dock_ids(1)[0];
        let handle = scheduler.schedule(Duration::from_millis(10), dock, TimerKind::Raise);
        assert_eq!(scheduler.pending(), vec![(dock, TimerKind::Raise)]);
        drop(handle);
        assert!(scheduler.pending().is_empty());
        assert!(scheduler.advance(Duration::from_secs(1)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timers_are_delivered_unless_cancelled() {
        let (scheduler, mut rx) = TokioScheduler::new(tokio::runtime::Handle::current());
        let dock = dock_ids(1)[0];
        let kept = scheduler.schedule(Duration::from_millis(200), dock, TimerKind::Expand);
        let dropped = scheduler.schedule(Duration::from_millis(100), dock, TimerKind::Raise);
        drop(dropped);

        let (_span, event) = rx.recv().await.expect("timer event");
        assert_eq!(event.id, kept.id());
        assert_eq!(event.kind, TimerKind::Expand);
        assert!(rx.try_recv().is_err());
    }
}
