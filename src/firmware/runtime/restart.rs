use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

/// "Restart at t" request read by the supervisor loop.
///
/// Once requested it stays requested. A later call may bring the target
/// forward but never pushes it back, and there is no way to withdraw it.
pub struct RestartSignal {
    at_ms: Mutex<CriticalSectionRawMutex, Cell<Option<u64>>>,
}

impl Default for RestartSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RestartSignal {
    pub const fn new() -> Self {
        Self {
            at_ms: Mutex::new(Cell::new(None)),
        }
    }

    /// Requests a restart `delay_ms` after `now_ms` and returns the target
    /// now in effect, which is the earlier of this and any pending request.
    pub fn schedule(&self, now_ms: u64, delay_ms: u64) -> u64 {
        let requested = now_ms.saturating_add(delay_ms);
        self.at_ms.lock(|at_ms| {
            let target = at_ms.get().map_or(requested, |pending| pending.min(requested));
            at_ms.set(Some(target));
            target
        })
    }

    pub fn requested_at(&self) -> Option<u64> {
        self.at_ms.lock(Cell::get)
    }

    pub fn is_requested(&self) -> bool {
        self.requested_at().is_some()
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.requested_at().is_some_and(|at_ms| now_ms >= at_ms)
    }
}

/// The one process-wide restart request, shared with code that cannot be
/// handed a reference (update handlers, hardware callbacks).
pub static RESTART: RestartSignal = RestartSignal::new();
