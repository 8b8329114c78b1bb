//! The value returned by a guest's `go_tick` export.

use std::time::Duration;

/// Raw value meaning no runnable work remains.
pub const TICK_IDLE: i32 = -1;

/// Raw value meaning runnable work exists.
pub const TICK_READY: i32 = 0;

/// What the guest scheduler asks the host to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// No pending work; the run is complete.
    Idle,
    /// More work is runnable; tick again without delay.
    Ready,
    /// Nothing runs until the given number of milliseconds has elapsed.
    Timer(u32),
}

impl TickResult {
    /// Decode a raw tick value. Negative values other than `-1` are not
    /// part of the protocol and yield `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            TICK_IDLE => Some(TickResult::Idle),
            TICK_READY => Some(TickResult::Ready),
            n if n > 0 => Some(TickResult::Timer(n as u32)),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            TickResult::Idle => TICK_IDLE,
            TickResult::Ready => TICK_READY,
            TickResult::Timer(ms) => ms as i32,
        }
    }

    /// How long to wait before the next tick, if at all.
    pub fn delay(self) -> Option<Duration> {
        match self {
            TickResult::Timer(ms) => Some(Duration::from_millis(u64::from(ms))),
            _ => None,
        }
    }
}
