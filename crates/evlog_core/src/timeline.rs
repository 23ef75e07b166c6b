//! Tick → nanosecond timeline.
//!
//! The logger stamps events with a free-running 16-bit counter (2 µs period)
//! that wraps silently. Deltas are taken modulo 2^16, so consecutive readings
//! must be less than one wrap (~131 ms) apart to be placed correctly.

use crate::catalog::{RecordKind, TimeRule};
use crate::consts::{NUDGE_NS, TICK_MODULUS, TICK_PERIOD_NS};
use crate::utils::le_u16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeKeeper {
    time_ns: u64,
    prev_tick: Option<u16>,
}

impl TimeKeeper {
    pub fn new() -> Self { Self::default() }

    /// Resume from a saved state (index checkpoints).
    pub fn resume(time_ns: u64, prev_tick: Option<u16>) -> Self {
        Self { time_ns, prev_tick }
    }

    pub fn time_ns(&self) -> u64 { self.time_ns }
    pub fn prev_tick(&self) -> Option<u16> { self.prev_tick }

    /// Explicit clock reading. The first one only anchors the counter.
    pub fn tick(&mut self, t: u16) -> u64 {
        if let Some(prev) = self.prev_tick {
            let delta = (t as u32).wrapping_sub(prev as u32) % TICK_MODULUS;
            self.time_ns = self.time_ns.saturating_add(delta as u64 * TICK_PERIOD_NS);
        }
        self.prev_tick = Some(t);
        self.time_ns
    }

    /// Record without a clock reading: ordering nudge only.
    pub fn nudge(&mut self) -> u64 {
        self.time_ns = self.time_ns.saturating_add(NUDGE_NS);
        self.time_ns
    }

    /// Apply the transition a record of `kind` implies. `payload` must hold the
    /// record's full payload.
    pub fn apply(&mut self, kind: RecordKind, payload: &[u8]) -> u64 {
        match kind.time_rule() {
            TimeRule::Tick => self.tick(le_u16(&payload[..2])),
            TimeRule::Nudge => self.nudge(),
            TimeRule::Hold => self.time_ns,
        }
    }
}
