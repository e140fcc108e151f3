// Dataset footprint shown next to the "clear all" action

use crate::error::FeedResult;
use crate::types::Signal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetFootprint {
    pub total_signals: usize,
    /// JSON-serialized size in KiB, two decimals
    pub size_kb: f64,
}

pub fn footprint(signals: &[Signal]) -> FeedResult<DatasetFootprint> {
    if signals.is_empty() {
        return Ok(DatasetFootprint::default());
    }

    let bytes = serde_json::to_vec(signals)?.len();
    let size_kb = ((bytes as f64 / 1024.0) * 100.0).round() / 100.0;

    Ok(DatasetFootprint {
        total_signals: signals.len(),
        size_kb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Confidence, NewSignal, Session};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_empty_footprint() {
        assert_eq!(footprint(&[]).unwrap(), DatasetFootprint { total_signals: 0, size_kb: 0.0 });
    }

    #[test]
    fn test_footprint_grows_with_payload() {
        let small = NewSignal::new("EUR/USD", Action::Buy, Confidence::new(90).unwrap(), Session::London)
            .into_signal(Uuid::new_v4(), Utc::now());
        let large = NewSignal::new("EUR/USD", Action::Buy, Confidence::new(90).unwrap(), Session::London)
            .details(serde_json::json!({ "rationale": "x".repeat(4096) }))
            .into_signal(Uuid::new_v4(), Utc::now());

        let a = footprint(&[small]).unwrap();
        let b = footprint(&[large]).unwrap();

        assert_eq!(a.total_signals, 1);
        assert!(a.size_kb > 0.0);
        assert!(b.size_kb > 4.0);
    }
}
