//! Timed transitions owned by a drag session.
//!
//! Plans are lists of `(delay, transition)` pairs where each delay is relative to
//! the previous step. Arming a plan turns it into absolute due times; nothing is
//! ever cancelled once armed.

use crate::config::Timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Clear progress and drop back to Idle (visual reset after a failure).
    ResetProgress,
    Navigate(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub delay_ms: u64,
    pub transition: Transition,
}

pub type Plan = Vec<Step>;

pub fn success_plan(t: &Timing) -> Plan {
    vec![Step {
        delay_ms: t.success_redirect_ms,
        transition: Transition::Navigate(Outcome::Success),
    }]
}

pub fn failure_plan(t: &Timing) -> Plan {
    vec![
        Step {
            delay_ms: t.failure_display_ms,
            transition: Transition::ResetProgress,
        },
        Step {
            delay_ms: t.failure_redirect_ms,
            transition: Transition::Navigate(Outcome::Failure),
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub due_ms: u64,
    pub transition: Transition,
}

#[derive(Debug, Default)]
pub struct Schedule {
    pending: Vec<Scheduled>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now_ms: u64, plan: &[Step]) {
        let mut at = now_ms;
        for step in plan {
            at = at.saturating_add(step.delay_ms);
            self.pending.push(Scheduled {
                due_ms: at,
                transition: step.transition,
            });
        }
        // stable: equal due times keep plan order
        self.pending.sort_by_key(|s| s.due_ms);
    }

    /// Removes and returns every entry due at or before `now_ms`, in due order.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<Scheduled> {
        let split = self.pending.partition_point(|s| s.due_ms <= now_ms);
        self.pending.drain(..split).collect()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.first().map(|s| s.due_ms)
    }
}
