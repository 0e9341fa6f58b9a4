//! Auto raise/lower and auto collapse/expand.
//!
//! Each dock runs two independent two-state machines. Entering the dock
//! region arms the "show" timer of a family (raise, expand) and cancels the
//! "hide" one; leaving does the opposite. A family whose flag is off never
//! arms anything, and switching the flag off disarms it on the spot.

use std::time::Duration;

use strum::IntoEnumIterator;
use tracing::{debug, trace};

use super::timer::{Scheduler, TimerEvent, TimerHandle, TimerKind};
use crate::common::config::TimingSettings;
use crate::layout_engine::Dock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Family {
    RaiseLower,
    Collapse,
}

impl Family {
    pub fn of(kind: TimerKind) -> Self {
        match kind {
            TimerKind::Raise | TimerKind::Lower => Family::RaiseLower,
            TimerKind::Collapse | TimerKind::Expand => Family::Collapse,
        }
    }

    /// Timer armed when the pointer comes in.
    pub fn on_enter(self) -> TimerKind {
        match self {
            Family::RaiseLower => TimerKind::Raise,
            Family::Collapse => TimerKind::Expand,
        }
    }

    /// Timer armed when the pointer goes out.
    pub fn on_leave(self) -> TimerKind { self.on_enter().opposite() }

    pub fn enabled(self, dock: &Dock) -> bool {
        match self {
            Family::RaiseLower => dock.auto_raise_lower,
            Family::Collapse => dock.auto_collapse,
        }
    }
}

/// The at most four timers a dock has outstanding.
#[derive(Debug, Default)]
pub struct DockTimers {
    raise: Option<TimerHandle>,
    lower: Option<TimerHandle>,
    collapse: Option<TimerHandle>,
    expand: Option<TimerHandle>,
}

impl DockTimers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Raise => &mut self.raise,
            TimerKind::Lower => &mut self.lower,
            TimerKind::Collapse => &mut self.collapse,
            TimerKind::Expand => &mut self.expand,
        }
    }

    pub fn get(&self, kind: TimerKind) -> Option<&TimerHandle> {
        match kind {
            TimerKind::Raise => self.raise.as_ref(),
            TimerKind::Lower => self.lower.as_ref(),
            TimerKind::Collapse => self.collapse.as_ref(),
            TimerKind::Expand => self.expand.as_ref(),
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool { self.get(kind).is_some() }

    pub fn pending(&self) -> impl Iterator<Item = TimerKind> + '_ {
        TimerKind::iter().filter(|&kind| self.is_pending(kind))
    }

    /// Drops the handle, which cancels the timer. Returns whether one was
    /// outstanding.
    pub fn cancel(&mut self, kind: TimerKind) -> bool { self.slot(kind).take().is_some() }

    pub fn cancel_all(&mut self) {
        for kind in TimerKind::iter() {
            self.cancel(kind);
        }
    }

    fn arm(&mut self, kind: TimerKind, handle: TimerHandle) { *self.slot(kind) = Some(handle); }

    /// Claims the handle `event` was scheduled through. Events for a handle
    /// that was cancelled or replaced in the meantime are stale.
    fn claim(&mut self, event: &TimerEvent) -> bool {
        let slot = self.slot(event.kind);
        if slot.as_ref().is_some_and(|handle| handle.id() == event.id) {
            // Already fired; nothing left to cancel.
            slot.take();
            true
        } else {
            false
        }
    }
}

/// Drives the state machine of one dock at a time.
pub struct AutoVisibility<'a> {
    pub scheduler: &'a dyn Scheduler,
    pub timing: &'a TimingSettings,
}

impl AutoVisibility<'_> {
    fn delay(&self, kind: TimerKind) -> Duration { self.timing.delay(kind) }

    pub fn enter(&self, dock: &mut Dock, family: Family) {
        let (show, hide) = (family.on_enter(), family.on_leave());
        dock.timers.cancel(hide);
        if family.enabled(dock) && !dock.timers.is_pending(show) {
            let handle = self.scheduler.schedule(self.delay(show), dock.id(), show);
            trace!(dock = ?dock.id(), kind = %show, timer = %handle.id(), "armed");
            dock.timers.arm(show, handle);
        }
    }

    pub fn leave(&self, dock: &mut Dock, family: Family) {
        let (show, hide) = (family.on_enter(), family.on_leave());
        dock.timers.cancel(show);
        if family.enabled(dock) {
            let handle = self.scheduler.schedule(self.delay(hide), dock.id(), hide);
            trace!(dock = ?dock.id(), kind = %hide, timer = %handle.id(), "armed");
            dock.timers.arm(hide, handle);
        }
    }
}

/// Disarms both timers of a family, e.g. when its flag is switched off.
pub fn disable(dock: &mut Dock, family: Family) {
    let show = dock.timers.cancel(family.on_enter());
    let hide = dock.timers.cancel(family.on_leave());
    if show || hide {
        debug!(dock = ?dock.id(), %family, "cancelled pending timers");
    }
}

/// Applies a fired timer. `None` means the event was stale and ignored;
/// otherwise whether the dock's visible state changed.
pub fn fired(dock: &mut Dock, event: &TimerEvent) -> Option<bool> {
    if !dock.timers.claim(event) {
        trace!(dock = ?dock.id(), timer = %event.id, kind = %event.kind, "stale timer");
        return None;
    }
    Some(apply(dock, event.kind))
}

/// Puts a dock in the state a timer of `kind` leads to.
pub fn apply(dock: &mut Dock, kind: TimerKind) -> bool {
    let (flag, value) = match kind {
        TimerKind::Raise => (&mut dock.lowered, false),
        TimerKind::Lower => (&mut dock.lowered, true),
        TimerKind::Collapse => (&mut dock.collapsed, true),
        TimerKind::Expand => (&mut dock.collapsed, false),
    };
    let changed = *flag != value;
    *flag = value;
    changed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actor::timer::ManualScheduler;
    use crate::layout_engine::testing::*;
    use crate::layout_engine::{ClipSystem, Point};

    fn clip() -> Dock {
        let id = dock_ids(1)[0];
        let mut dock = dock(id, ClipSystem::default(), Point::new(0, 0), 8, None);
        dock.auto_collapse = true;
        dock.auto_raise_lower = true;
        dock.lowered = true;
        dock
    }

    #[test]
    fn enter_arms_the_show_timers_once() {
        let scheduler = ManualScheduler::new();
        let timing = TimingSettings::default();
        let fsm = AutoVisibility { scheduler: &scheduler, timing: &timing };
        let mut dock = clip();
        dock.collapsed = true;

        fsm.enter(&mut dock, Family::RaiseLower);
        fsm.enter(&mut dock, Family::Collapse);
        let first = dock.timers.get(TimerKind::Raise).map(TimerHandle::id);
        fsm.enter(&mut dock, Family::RaiseLower);
        assert_eq!(dock.timers.get(TimerKind::Raise).map(TimerHandle::id), first);
        assert_eq!(dock.timers.pending().collect::<Vec<_>>(), vec![
            TimerKind::Raise,
            TimerKind::Expand
        ]);

        for event in scheduler.advance(Duration::from_millis(timing.raise_delay_ms)) {
            assert_eq!(fired(&mut dock, &event), Some(true));
        }
        assert!(!dock.lowered);
        assert!(!dock.timers.is_pending(TimerKind::Raise));
    }

    #[test]
    fn leave_swaps_the_pending_timer() {
        let scheduler = ManualScheduler::new();
        let timing = TimingSettings::default();
        let fsm = AutoVisibility { scheduler: &scheduler, timing: &timing };
        let mut dock = clip();

        fsm.enter(&mut dock, Family::RaiseLower);
        fsm.leave(&mut dock, Family::RaiseLower);
        assert!(!dock.timers.is_pending(TimerKind::Raise));
        assert!(dock.timers.is_pending(TimerKind::Lower));

        let events = scheduler.advance(Duration::from_secs(5));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TimerKind::Lower);
        // Already lowered, so nothing visible changes.
        assert_eq!(fired(&mut dock, &events[0]), Some(false));
    }

    #[test]
    fn disabled_families_never_arm() {
        let scheduler = ManualScheduler::new();
        let timing = TimingSettings::default();
        let fsm = AutoVisibility { scheduler: &scheduler, timing: &timing };
        let mut dock = clip();
        dock.auto_collapse = false;

        fsm.leave(&mut dock, Family::Collapse);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn disabling_cancels_without_firing() {
        let scheduler = ManualScheduler::new();
        let timing = TimingSettings::default();
        let fsm = AutoVisibility { scheduler: &scheduler, timing: &timing };
        let mut dock = clip();

        fsm.leave(&mut dock, Family::Collapse);
        dock.auto_collapse = false;
        disable(&mut dock, Family::Collapse);
        assert!(scheduler.advance(Duration::from_secs(5)).is_empty());
        assert!(!dock.collapsed);
    }

    #[test]
    fn replaced_timers_are_stale() {
        let scheduler = ManualScheduler::new();
        let timing = TimingSettings::default();
        let fsm = AutoVisibility { scheduler: &scheduler, timing: &timing };
        let mut dock = clip();

        fsm.leave(&mut dock, Family::Collapse);
        let stale = TimerEvent {
            id: dock.timers.get(TimerKind::Collapse).map(TimerHandle::id).unwrap(),
            dock: dock.id(),
            kind: TimerKind::Collapse,
        };
        fsm.leave(&mut dock, Family::Collapse);
        assert_eq!(fired(&mut dock, &stale), None);
        assert!(!dock.collapsed);
    }
}
