//! Pulse-width classification and acode matching.

use crate::acode::timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
    Sync,
    Sweep,
}

const SYNC_MIN_TICKS: u32 = 2250;
const SYNC_MAX_TICKS: u32 = 6750;

pub fn classify(length: u32) -> Pulse {
    if (SYNC_MIN_TICKS..=SYNC_MAX_TICKS).contains(&length) {
        Pulse::Sync
    } else {
        Pulse::Sweep
    }
}

const ACODE_BUCKET_MIN: u32 = 2550;
const ACODE_BUCKET_MAX: u32 = 6550;
const ACODE_BUCKET_WIDTH: u32 = 500;

/// Maps a pulse length to a 3-bit acode guess by 500-tick buckets. Used only
/// during initial phase discovery, where no slot context is yet available.
pub fn find_acode(length: u32) -> Option<u8> {
    if length < ACODE_BUCKET_MIN || length > ACODE_BUCKET_MAX {
        return None;
    }
    let bucket = (length - ACODE_BUCKET_MIN) / ACODE_BUCKET_WIDTH;
    Some(bucket.min(7) as u8)
}

/// Distance between an observed pulse length and the acode it is being
/// tested against, minimizing over whether the data bit is set.
pub fn acode_error(target_acode: u8, length: u32) -> u32 {
    let without_data = timing(target_acode);
    let with_data = timing(target_acode | 0b010);
    let err_a = without_data.abs_diff(length);
    let err_b = with_data.abs_diff(length);
    err_a.min(err_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(2250), Pulse::Sync);
        assert_eq!(classify(6750), Pulse::Sync);
        assert_eq!(classify(2249), Pulse::Sweep);
        assert_eq!(classify(6751), Pulse::Sweep);
    }

    #[test]
    fn find_acode_out_of_range() {
        assert_eq!(find_acode(2549), None);
        assert_eq!(find_acode(6551), None);
    }

    #[test]
    fn find_acode_matches_expected_timings() {
        // timing(0)=2750 falls inside [2550,3050)
        assert_eq!(find_acode(2750), Some(0));
        // timing(7)=6250 falls inside [6050,6550]
        assert_eq!(find_acode(6250), Some(7));
    }

    #[test]
    fn acode_error_zero_for_exact_match() {
        assert_eq!(acode_error(4, timing(4)), 0);
        assert_eq!(acode_error(4, timing(4 | 0b010)), 0);
    }
}
