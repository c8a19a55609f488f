//! JSON serialization for snapshots and query reports.

use serde::Serialize;

/// Serialize a snapshot or report to a compact JSON string.
///
/// Unavailable counters become `null`.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for crate types).
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Serialize a snapshot or report to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for crate types).
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryReport;
    use crate::snapshot::{CounterValue, Snapshot};
    use std::time::Duration;

    fn make_report() -> QueryReport {
        QueryReport {
            label: "3".to_string(),
            rows: 10,
            elapsed: Duration::from_millis(250),
            snapshot: Snapshot::from_entries([
                ("cycles", CounterValue::Count(900)),
                ("ins", CounterValue::Count(1200)),
                ("dTLB_misses", CounterValue::Unavailable),
                ("wall_clock_ms", CounterValue::Count(250)),
            ]),
        }
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&make_report()).expect("serialization should succeed");
        assert!(json.contains("\"label\":\"3\""));
        assert!(json.contains("\"rows\":10"));
        assert!(json.contains(r#"{"name":"dTLB_misses","value":null}"#));
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json_pretty(&[make_report()]).expect("serialization should succeed");
        assert!(json.contains('\n'));
        assert!(json.contains("\"wall_clock_ms\""));
    }

    #[test]
    fn test_json_roundtrip() {
        let report = make_report();
        let json = to_json(&report).unwrap();
        let back: QueryReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
