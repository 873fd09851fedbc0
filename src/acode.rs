//! Static schedule table and tick-domain arithmetic.
//!
//! The schedule repeats every 12 slots: sync, sync, sweep, alternating
//! between the two lighthouses and the two axes. Under a 60Hz single-
//! lighthouse regime only the first 6 slots are ever used.

use crate::types::{Axis, Lighthouse, Regime};

/// Window length in ticks of each of the 12 slots, in order.
pub const WINDOWS: [u32; 12] = [
    20_000, 20_000, 360_000, 20_000, 20_000, 360_000, 20_000, 20_000, 360_000, 20_000, 20_000,
    360_000,
];

pub const SLOT_COUNT: usize = 12;
pub const FULL_PERIOD: u32 = 1_600_000;
pub const HALF_PERIOD: u32 = 800_000;
pub const SYNC_HISTORY_LEN: usize = 12;

/// Distance, in ticks, beyond which `find_slot_by_offset`'s naive "closer
/// edge" rule is overridden: a sweep slot keeps ownership of any offset
/// unless it is within this many ticks of the next slot's start.
const SWEEP_TAIL_GUARD_TICKS: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub acode_base: u8,
    pub lighthouse: Lighthouse,
    pub axis: Axis,
    pub is_sweep: bool,
}

pub const SLOTS: [ScheduleSlot; 12] = [
    ScheduleSlot { acode_base: 4, lighthouse: Lighthouse::B, axis: Axis::X, is_sweep: false },
    ScheduleSlot { acode_base: 0, lighthouse: Lighthouse::A, axis: Axis::X, is_sweep: false },
    ScheduleSlot { acode_base: 4, lighthouse: Lighthouse::A, axis: Axis::X, is_sweep: true },
    ScheduleSlot { acode_base: 5, lighthouse: Lighthouse::B, axis: Axis::Y, is_sweep: false },
    ScheduleSlot { acode_base: 1, lighthouse: Lighthouse::A, axis: Axis::Y, is_sweep: false },
    ScheduleSlot { acode_base: 1, lighthouse: Lighthouse::A, axis: Axis::Y, is_sweep: true },
    ScheduleSlot { acode_base: 0, lighthouse: Lighthouse::B, axis: Axis::X, is_sweep: false },
    ScheduleSlot { acode_base: 4, lighthouse: Lighthouse::A, axis: Axis::X, is_sweep: false },
    ScheduleSlot { acode_base: 4, lighthouse: Lighthouse::B, axis: Axis::X, is_sweep: true },
    ScheduleSlot { acode_base: 1, lighthouse: Lighthouse::B, axis: Axis::Y, is_sweep: false },
    ScheduleSlot { acode_base: 5, lighthouse: Lighthouse::A, axis: Axis::Y, is_sweep: false },
    ScheduleSlot { acode_base: 5, lighthouse: Lighthouse::B, axis: Axis::Y, is_sweep: true },
];

/// Cumulative start offset of slot `i` (0-indexed, 0..=12). `slot_start(12)`
/// equals the full period, a convenient sentinel for wraparound math.
pub fn slot_start(i: usize) -> u32 {
    WINDOWS[..i].iter().sum()
}

pub fn period(regime: Regime) -> u32 {
    match regime {
        Regime::Full => FULL_PERIOD,
        Regime::Half => HALF_PERIOD,
    }
}

/// Expected sync pulse length, in ticks, for a 3-bit acode.
pub fn timing(acode: u8) -> u32 {
    let bit0 = (acode & 1) as i32;
    let bit1 = ((acode >> 1) & 1) as i32;
    let bit2 = ((acode >> 2) & 1) as i32;
    (3000 + 500 * bit0 + 1000 * bit1 + 2000 * bit2 - 250) as u32
}

/// Reduce `ts - anchor` into `[0, period)`, handling a 32-bit wrap of the
/// tick clock between `anchor` and `ts`.
pub fn apply_mod(ts: u32, anchor: u32, period: u32) -> u32 {
    let ts = ts as i64;
    let anchor = anchor as i64;
    let period = period as i64;
    let result = if ts >= anchor {
        (ts - anchor).rem_euclid(period)
    } else {
        let gap = anchor - ts;
        if gap > (1i64 << 31) {
            ((1i64 << 32) - anchor + ts).rem_euclid(period)
        } else {
            (ts - anchor).rem_euclid(period)
        }
    };
    result as u32
}

/// Ticks elapsed between two tick-clock readings, tolerant of the 32-bit
/// wrap. A small apparent step backwards (reordering jitter) reads as zero
/// rather than as a near-full-range forward jump.
pub fn elapsed_ticks(current: u32, previous: u32) -> u32 {
    if current >= previous {
        current - previous
    } else {
        let backward = previous - current;
        if backward as i64 > (1i64 << 31) {
            (current as i64 + ((1i64 << 32) - previous as i64)) as u32
        } else {
            0
        }
    }
}

/// Locate the slot containing (or nearest to) `offset`, returning the slot
/// index and the tick distance to its chosen boundary.
pub fn find_slot_by_offset(offset: u32, regime: Regime) -> (usize, u32) {
    let n = regime.slot_count();
    let offset = offset as i64;
    let period = period(regime) as i64;

    let mut succ_idx = 0usize;
    let mut found = false;
    for i in 0..n {
        if slot_start(i) as i64 > offset {
            succ_idx = i;
            found = true;
            break;
        }
    }
    if !found {
        succ_idx = 0;
    }
    let pred_idx = (succ_idx + n - 1) % n;
    let pred_start = slot_start(pred_idx) as i64;
    let succ_start = if !found { period } else { slot_start(succ_idx) as i64 };

    let dist_pred = offset - pred_start;
    let dist_succ = succ_start - offset;

    if SLOTS[pred_idx].is_sweep && dist_succ > SWEEP_TAIL_GUARD_TICKS {
        return (pred_idx, dist_pred as u32);
    }
    if dist_pred <= dist_succ {
        (pred_idx, dist_pred as u32)
    } else {
        (succ_idx, dist_succ as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_starts_match_authoritative_table() {
        let expected = [
            0, 20_000, 40_000, 400_000, 420_000, 440_000, 800_000, 820_000, 840_000, 1_200_000,
            1_220_000, 1_240_000,
        ];
        for (i, &start) in expected.iter().enumerate() {
            assert_eq!(slot_start(i), start, "slot {i}");
        }
        assert_eq!(slot_start(12), FULL_PERIOD);
        assert_eq!(slot_start(6), HALF_PERIOD);
    }

    #[test]
    fn timing_values_match_formula() {
        assert_eq!(timing(0), 2750);
        assert_eq!(timing(1), 3250);
        assert_eq!(timing(2), 3750);
        assert_eq!(timing(4), 4750);
        assert_eq!(timing(7), 6250);
    }

    #[test]
    fn find_slot_by_offset_hits_every_slot_start() {
        for i in 0..12 {
            let (slot, dist) = find_slot_by_offset(slot_start(i), Regime::Full);
            assert_eq!(slot, i);
            assert_eq!(dist, 0);
        }
        for i in 0..6 {
            let (slot, dist) = find_slot_by_offset(slot_start(i), Regime::Half);
            assert_eq!(slot, i);
            assert_eq!(dist, 0);
        }
    }

    #[test]
    fn find_slot_by_offset_keeps_sweep_tail() {
        // Deep into slot 2 (sweep, 360k window starting at 40_000).
        let (slot, _) = find_slot_by_offset(40_000 + 300_000, Regime::Full);
        assert_eq!(slot, 2);
    }

    #[test]
    fn find_slot_by_offset_crosses_near_sweep_boundary() {
        // Within the tail guard of slot 2's end (succ starts at 400_000).
        let (slot, _) = find_slot_by_offset(400_000 - 500, Regime::Full);
        assert_eq!(slot, 3);
    }

    #[test]
    fn apply_mod_is_periodic_across_wrap() {
        let anchor = 4_000_000_000u32;
        let period = FULL_PERIOD;
        let a = apply_mod(100, anchor, period);
        // 100 is "after" anchor once the 32-bit clock wraps past u32::MAX.
        let b = apply_mod(100u32.wrapping_add(period), anchor, period);
        assert_eq!(a, b);
    }

    #[test]
    fn elapsed_ticks_handles_small_backward_jitter() {
        assert_eq!(elapsed_ticks(995, 1000), 0);
    }

    #[test]
    fn elapsed_ticks_handles_wrap() {
        let previous = u32::MAX - 100;
        let current = 50u32;
        assert_eq!(elapsed_ticks(current, previous), 151);
    }
}
