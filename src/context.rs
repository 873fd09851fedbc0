//! Shared state across all tracked objects on a process: just the 60Hz
//! single-lighthouse regime flag.

use std::sync::Mutex;

#[derive(Debug, Default)]
struct Regime60HzState {
    active: bool,
    locked_count: u32,
}

/// Tracks whether the process-wide environment has been determined to be a
/// single-lighthouse (60Hz) room. Reference-counted so the flag only clears
/// once every object that contributed to it has demoted back to UNKNOWN.
#[derive(Debug, Default)]
pub struct GlobalContext {
    state: Mutex<Regime60HzState>,
}

impl GlobalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_60hz(&self) -> bool {
        self.state.lock().unwrap().active
    }

    /// Called when an object locks. `half` indicates whether the lock was
    /// into the half-period (60Hz) regime.
    pub fn lock_as(&self, half: bool) {
        if !half {
            return;
        }
        let mut s = self.state.lock().unwrap();
        s.locked_count += 1;
        s.active = true;
    }

    /// Called when an object that was locked in the half regime demotes
    /// back to UNKNOWN. No-op if the object was locked in the full regime.
    pub fn unlock_half(&self) {
        let mut s = self.state.lock().unwrap();
        if s.locked_count == 0 {
            return;
        }
        s.locked_count -= 1;
        if s.locked_count == 0 {
            s.active = false;
        }
    }
}
