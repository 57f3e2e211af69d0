//! Timer seam.
//!
//! The engine never sleeps; every suspension is a scheduled timer the
//! host fires back into [`crate::ReplayEngine::on_timer`]. A browser
//! host maps this to `setTimeout`/`clearTimeout`; tests drive the
//! deterministic [`ManualScheduler`].

/// Opaque timer handle.
pub type TimerId = u64;

/// One-shot timer scheduling.
pub trait Scheduler {
    /// Arm a timer; the host must call back with the returned id after
    /// at least `delay_ms` milliseconds.
    fn schedule(&mut self, delay_ms: u64) -> TimerId;

    /// Disarm a timer. Unknown ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

/// Deterministic scheduler with a virtual clock.
///
/// Timers fire when the test pops them, in (due time, id) order; the
/// clock jumps to each timer's due time so elapsed virtual time can be
/// asserted.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: TimerId,
    now_ms: u64,
    armed: Vec<(TimerId, u64)>,
    delays: Vec<u64>,
}

impl ManualScheduler {
    /// Fresh scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Every delay ever requested, in order, including canceled timers.
    #[must_use]
    pub fn scheduled_delays(&self) -> &[u64] {
        &self.delays
    }

    /// Number of armed timers.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Fire the earliest armed timer, advancing the clock to its due
    /// time. None when nothing is armed.
    pub fn pop_due(&mut self) -> Option<TimerId> {
        let idx = self
            .armed
            .iter()
            .enumerate()
            .min_by_key(|&(_, &(id, due))| (due, id))
            .map(|(i, _)| i)?;
        let (id, due) = self.armed.remove(idx);
        self.now_ms = self.now_ms.max(due);
        Some(id)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay_ms: u64) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.armed.push((id, self.now_ms + delay_ms));
        self.delays.push(delay_ms);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.armed.retain(|(armed_id, _)| *armed_id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut s = ManualScheduler::new();
        let late = s.schedule(500);
        let early = s.schedule(100);
        assert_eq!(s.pop_due(), Some(early));
        assert_eq!(s.now(), 100);
        assert_eq!(s.pop_due(), Some(late));
        assert_eq!(s.now(), 500);
        assert_eq!(s.pop_due(), None);
    }

    #[test]
    fn cancel_disarms() {
        let mut s = ManualScheduler::new();
        let id = s.schedule(100);
        s.cancel(id);
        assert_eq!(s.pop_due(), None);
        assert_eq!(s.armed_count(), 0);
    }

    #[test]
    fn clock_never_goes_backward() {
        let mut s = ManualScheduler::new();
        s.schedule(1000);
        let _ = s.pop_due();
        s.schedule(10);
        let _ = s.pop_due();
        assert_eq!(s.now(), 1010);
    }
}
