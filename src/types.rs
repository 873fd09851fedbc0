//! Plain data types shared across the disambiguator.

use serde::{Deserialize, Serialize};

/// A single detected optical pulse, as reported by the acquisition layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightEvent {
    pub sensor_id: u8,
    /// 48MHz tick-clock timestamp, wraps at 2^32.
    pub timestamp: u32,
    /// Pulse duration in ticks.
    pub length: u32,
}

/// Which of the two base stations a slot or lock belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lighthouse {
    A,
    B,
}

impl Lighthouse {
    pub fn index(self) -> usize {
        match self {
            Lighthouse::A => 0,
            Lighthouse::B => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// Lock state of a single tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Unknown,
    /// 0-indexed slot, 0..12 (0..6 under the 60Hz regime).
    Locked(u8),
}

/// Timing regime a lock was established under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Both lighthouses visible, full 12-slot / 1.6M-tick period.
    Full,
    /// Single lighthouse visible, half 6-slot / 800k-tick period.
    Half,
}

impl Regime {
    pub fn slot_count(self) -> usize {
        match self {
            Regime::Full => 12,
            Regime::Half => 6,
        }
    }
}

/// A coalesced sync pulse: the merged result of one or more overlapping raw
/// sync detections within a single slot visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoalescedSync {
    pub first_timestamp: u32,
    pub longest_length: u32,
    pub count: u32,
}

/// Sentinel `index` value marking a merged-sync emission rather than a sweep.
pub const SYNC_INDEX: i32 = -2;

/// A normalized record handed to the upstream pose solver.
///
/// `sensor_id` and `index` are distinct fields (see DESIGN.md): for sweep
/// emissions both equal the real sensor number; for sync emissions
/// `sensor_id = -count` and `index = SYNC_INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightRecord {
    pub sensor_id: i32,
    pub index: i32,
    pub acode: u8,
    pub sweep_offset_ticks: u32,
    pub timestamp: u32,
    pub length: u32,
    pub lighthouse: Lighthouse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_event_serde_roundtrip() {
        let e = LightEvent { sensor_id: 3, timestamp: 123456, length: 3000 };
        let json = serde_json::to_string(&e).unwrap();
        let back: LightEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn light_record_serde_roundtrip() {
        let r = LightRecord {
            sensor_id: -2,
            index: SYNC_INDEX,
            acode: 5,
            sweep_offset_ticks: 0,
            timestamp: 10,
            length: 3250,
            lighthouse: Lighthouse::A,
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: LightRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
