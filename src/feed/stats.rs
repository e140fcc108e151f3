// Aggregator: summary statistics over a signal set

use crate::types::{Action, Signal, Stats};

/// Counts and mean confidence. The mean rounds half up and is 0 for an
/// empty set.
pub fn stats(signals: &[Signal]) -> Stats {
    let total = signals.len();
    let buy_count = signals.iter().filter(|s| s.action == Action::Buy).count();
    let sell_count = signals.iter().filter(|s| s.action == Action::Sell).count();

    let avg_confidence = if total == 0 {
        0
    } else {
        let sum: u64 = signals.iter().map(|s| u64::from(s.confidence.value())).sum();
        let n = total as u64;
        // floor(sum / n + 1/2) in integer arithmetic
        ((2 * sum + n) / (2 * n)) as u8
    };

    Stats {
        total,
        buy_count,
        sell_count,
        avg_confidence,
    }
}
