//! Named deadlines polled by the control cycle.
//!
//! Nothing fires on its own: the controller checks every armed deadline once per
//! cycle, so a deadline that elapses between polls is observed on the next one.

/// A one-shot deadline on the millisecond clock of the control loop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Deadline {
    deadline_ms: u64,
    armed: bool,
}

impl Deadline {
    pub const fn disarmed() -> Self {
        Self {
            deadline_ms: 0,
            armed: false,
        }
    }

    pub fn arm(&mut self, now_ms: u64, span_ms: u64) {
        self.deadline_ms = now_ms.saturating_add(span_ms);
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    pub const fn deadline_ms(&self) -> Option<u64> {
        if self.armed {
            Some(self.deadline_ms)
        } else {
            None
        }
    }

    /// `true` while armed and `now_ms` has reached the deadline.
    pub const fn expired(&self, now_ms: u64) -> bool {
        self.armed && now_ms >= self.deadline_ms
    }

    /// Like [`Self::expired`], but disarms so the caller sees the edge once.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if self.expired(now_ms) {
            self.armed = false;
            true
        } else {
            false
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.deadline_ms()
            .map(|deadline| deadline.saturating_sub(now_ms))
    }
}
