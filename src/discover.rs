//! Phase discovery: given a rolling history of syncs, search for the unique
//! period phase consistent with (almost) all of them.

use log::warn;

use crate::acode::{self, apply_mod, find_slot_by_offset, period, SLOTS, SYNC_HISTORY_LEN};
use crate::pulse::find_acode;
use crate::sync::SyncHistory;
use crate::types::{Lighthouse, Regime};

/// Minimum number of history entries that must agree with a candidate
/// anchor before it is accepted as a lock.
const LOCK_INLIER_THRESHOLD: usize = SYNC_HISTORY_LEN - 1;

const TRUSTED_ACODE_ERR_TICKS: u32 = 500;
const TRUSTED_PHASE_ERR_TICKS: u32 = 500;

/// How often a repeated discovery failure is logged, in attempts.
const FAILURE_REPORT_INTERVAL: u32 = 1000;

pub struct Lock {
    pub slot: usize,
    pub anchor: u32,
    pub regime: Regime,
}

/// Attempts to find a phase lock from the current sync history. `sibling_60hz`
/// is the process-wide "some other object already locked into 60Hz" flag;
/// when true, the full 12-slot regime is not attempted (the room is known
/// to contain only one visible lighthouse).
pub fn try_discover(history: &SyncHistory, sibling_60hz: bool) -> Option<Lock> {
    let Some(latest) = history.most_recent().filter(|e| e.longest_length > 0) else {
        return None;
    };

    let Some(raw_acode) = find_acode(latest.longest_length) else {
        return None;
    };
    let approx_acode = raw_acode & 0b101;

    for g in 0..acode::SLOT_COUNT {
        let slot = &SLOTS[g];
        if slot.is_sweep || slot.acode_base != approx_acode {
            continue;
        }

        let guess_anchor = latest.first_timestamp.wrapping_sub(acode::slot_start(g));

        for regime in [Regime::Full, Regime::Half] {
            if regime == Regime::Full && sibling_60hz {
                continue;
            }
            if regime == Regime::Half && g >= 6 {
                continue;
            }

            let inliers = count_inliers(history, guess_anchor, regime);
            if inliers >= LOCK_INLIER_THRESHOLD {
                return Some(Lock { slot: g, anchor: guess_anchor, regime });
            }
        }
    }

    None
}

fn count_inliers(history: &SyncHistory, anchor: u32, regime: Regime) -> usize {
    let p = period(regime);
    let mut inliers = 0;
    for entry in history.iter() {
        if entry.longest_length == 0 {
            continue;
        }
        let offset = apply_mod(entry.first_timestamp, anchor, p);
        let (slot_idx, phase_err) = find_slot_by_offset(offset, regime);
        let slot = &SLOTS[slot_idx];
        if slot.is_sweep {
            continue;
        }
        if regime == Regime::Half && slot.lighthouse == Lighthouse::B {
            continue;
        }
        if phase_err > TRUSTED_PHASE_ERR_TICKS {
            continue;
        }
        let acode_err = crate::pulse::acode_error(slot.acode_base, entry.longest_length);
        if acode_err > TRUSTED_ACODE_ERR_TICKS {
            continue;
        }
        inliers += 1;
    }
    inliers
}

/// Reports a discovery failure, rate-limited to once per
/// `FAILURE_REPORT_INTERVAL` attempts.
pub fn report_failure(failures: u32) {
    if failures % FAILURE_REPORT_INTERVAL == 0 {
        warn!("phase discovery has failed {failures} times, still searching");
    }
}
