/// Wealth-reveal ratio breakpoints, scanned descending; the largest
/// breakpoint the amount reaches (inclusive) wins.
const RATIO_BREAKPOINTS: &[(u64, u64)] = &[
    (100_000_000, 1), // 1 BTC
    (10_000_000, 5),  // 0.1 BTC
    (1_000_000, 10),  // 0.01 BTC
];

/// Change smaller than this is tolerated by the small-change metric.
pub const SMALL_CHANGE_SAT: u64 = 50_000;

/// Output values divisible by this count as round-number payments.
pub const ROUND_NUMBER_MOD_SAT: u64 = 10_000;

/// Minimum historical change-output population before the common-position
/// metric is statistically meaningful.
pub const CHANGE_POSITION_MIN_SAMPLE: u64 = 8;

/// Fraction of historical change outputs at one position that marks the
/// position as a fingerprint.
pub const CHANGE_POSITION_RATIO: f64 = 0.80;

/// Default anonymity set an output value must reach.
pub const DEFAULT_ANONYMITY_SET: u64 = 2;

/// Allowed ratio of returned change to the amount sent to others. Amounts
/// below every breakpoint use the smallest breakpoint's ratio.
pub fn ratio_threshold(sent_to_others: u64) -> u64 {
    for &(breakpoint, ratio) in RATIO_BREAKPOINTS {
        if sent_to_others >= breakpoint {
            return ratio;
        }
    }
    RATIO_BREAKPOINTS[RATIO_BREAKPOINTS.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_inclusive() {
        assert_eq!(ratio_threshold(100_000_000), 1);
        assert_eq!(ratio_threshold(10_000_000), 5);
        assert_eq!(ratio_threshold(1_000_000), 10);
        assert_eq!(ratio_threshold(100_000), 10);
    }

    #[test]
    fn below_all_breakpoints() {
        assert_eq!(ratio_threshold(999_999), 10);
        assert_eq!(ratio_threshold(0), 10);
    }

    #[test]
    fn above_top_breakpoint() {
        assert_eq!(ratio_threshold(2_100_000_000_000_000), 1);
    }

    #[test]
    fn non_increasing_as_amount_grows() {
        let probes = [
            0u64, 999_999, 1_000_000, 9_999_999, 10_000_000, 99_999_999, 100_000_000, u64::MAX,
        ];
        let mut prev = u64::MAX;
        for &amount in &probes {
            let ratio = ratio_threshold(amount);
            assert!(ratio <= prev, "ratio grew at {amount}");
            prev = ratio;
        }
    }
}
