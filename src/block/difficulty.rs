//! Sub-epoch difficulty and `sub_slot_iters` adjustment: recomputed every
//! `sub_epoch_blocks` blocks from how long the previous sub-epoch actually
//! took versus its target duration, clamped so no single adjustment can
//! swing too far.

use crate::constants::blockchain::SUB_SLOT_TIME_TARGET_SECS;
use crate::network_type::NetworkConstants;

/// Maximum fractional change allowed in one adjustment (25% either way),
/// the same kind of clamp Chia-style chains use to prevent a single bad
/// sub-epoch from destabilising difficulty.
const MAX_ADJUSTMENT_NUM: u64 = 5;
const MAX_ADJUSTMENT_DEN: u64 = 4;

/// Recomputes difficulty and `sub_slot_iters` for the next sub-epoch.
///
/// `actual_duration_secs` is how long the just-completed sub-epoch took;
/// `prev_difficulty` / `prev_sub_slot_iters` are its parameters.
pub fn adjust(
    prev_difficulty: u64,
    prev_sub_slot_iters: u64,
    actual_duration_secs: u64,
    constants: &NetworkConstants,
) -> (u64, u64) {
    let target_duration_secs = SUB_SLOT_TIME_TARGET_SECS * constants.sub_epoch_blocks as u64;
    let actual = actual_duration_secs.max(1);

    let mut new_difficulty = (prev_difficulty as u128 * target_duration_secs as u128
        / actual as u128) as u64;

    let min_difficulty = prev_difficulty * MAX_ADJUSTMENT_DEN / MAX_ADJUSTMENT_NUM;
    let max_difficulty = prev_difficulty * MAX_ADJUSTMENT_NUM / MAX_ADJUSTMENT_DEN;
    new_difficulty = new_difficulty.clamp(min_difficulty.max(1), max_difficulty.max(min_difficulty + 1));

    let new_sub_slot_iters = ((new_difficulty as u128 * constants.difficulty_constant_factor as u128)
        / prev_difficulty.max(1) as u128) as u64;
    let new_sub_slot_iters = new_sub_slot_iters
        .max(prev_sub_slot_iters / 4)
        .min(prev_sub_slot_iters.saturating_mul(4).max(new_sub_slot_iters));

    (new_difficulty.max(1), new_sub_slot_iters.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn constants() -> NetworkConstants {
        crate::network_type::NetworkType::Testnet.constants()
    }

    #[test]
    fn faster_than_target_raises_difficulty() {
        let c = constants();
        let target = SUB_SLOT_TIME_TARGET_SECS * c.sub_epoch_blocks as u64;
        let (new_difficulty, _) = adjust(1000, 100_000, target / 2, &c);
        assert!(new_difficulty > 1000);
    }

    #[test]
    fn slower_than_target_lowers_difficulty() {
        let c = constants();
        let target = SUB_SLOT_TIME_TARGET_SECS * c.sub_epoch_blocks as u64;
        let (new_difficulty, _) = adjust(1000, 100_000, target * 2, &c);
        assert!(new_difficulty < 1000);
    }

    #[test]
    fn adjustment_is_clamped() {
        let c = constants();
        let (new_difficulty, _) = adjust(1000, 100_000, 1, &c);
        assert!(new_difficulty <= 1000 * MAX_ADJUSTMENT_NUM / MAX_ADJUSTMENT_DEN);
    }

    #[rstest]
    #[case(1)]
    #[case(10)]
    #[case(1_000_000)]
    #[case(u64::MAX / 8)]
    fn clamp_bounds_hold_across_durations(#[case] actual_duration_secs: u64) {
        let c = constants();
        let (new_difficulty, new_sub_slot_iters) = adjust(1000, 100_000, actual_duration_secs, &c);
        let min_difficulty = (1000 * MAX_ADJUSTMENT_DEN / MAX_ADJUSTMENT_NUM).max(1);
        let max_difficulty = 1000 * MAX_ADJUSTMENT_NUM / MAX_ADJUSTMENT_DEN;
        assert!(new_difficulty >= min_difficulty);
        assert!(new_difficulty <= max_difficulty);
        assert!(new_sub_slot_iters >= 1);
    }
}
