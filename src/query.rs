//! Measuring statements against an external query engine.
//!
//! The engine is reached through two small traits: [`QueryExecutor`] runs a
//! statement and returns something implementing [`QueryResult`]. The crate
//! never interprets the statement text.
//!
//! ```rust,ignore
//! let mut group = perf_bracket::registry::baseline_group()?;
//! let reports = run_suite(&mut conn, &mut group, [("q1", "pragma tpch(1)"), ("q2", "pragma tpch(2)")])?;
//! print!("{}", perf_bracket::output::terminal::format_reports(&reports));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::CounterError;
use crate::group::CounterGroup;
use crate::measure::{try_measure, MeasureError};
use crate::measurement::CounterBackend;
use crate::snapshot::Snapshot;

/// Result of executing one statement.
pub trait QueryResult {
    /// Whether the statement failed.
    fn has_error(&self) -> bool {
        self.error().is_some()
    }

    /// The engine's error message, if the statement failed.
    fn error(&self) -> Option<&str>;

    /// Number of rows produced.
    fn row_count(&self) -> u64;

    /// Rendered value at `row`, `col`, if present.
    fn value(&self, row: usize, col: usize) -> Option<String>;
}

/// Something that executes statements, e.g. a database connection.
pub trait QueryExecutor {
    /// The result type of a statement.
    type Output: QueryResult;

    /// Execute `sql` synchronously.
    fn query(&mut self, sql: &str) -> Self::Output;
}

/// Errors from running measured statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The counters could not be driven.
    #[error(transparent)]
    Counter(#[from] CounterError),

    /// The engine reported an error for a statement.
    #[error("query {label} failed: {message}")]
    Failed {
        /// Label of the failing statement.
        label: String,
        /// Engine error message.
        message: String,
    },
}

/// Counters and timing for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    /// Caller-supplied label, e.g. a query number.
    pub label: String,
    /// Rows returned.
    pub rows: u64,
    /// Wall-clock duration of the measured window.
    pub elapsed: Duration,
    /// Counter values including `wall_clock_ms`.
    pub snapshot: Snapshot,
}

/// Run one statement inside a measured window.
///
/// # Errors
///
/// [`QueryError::Failed`] if the result reports an error (the group is
/// disabled first), or [`QueryError::Counter`] if the counters fail.
pub fn run_query<X, B>(
    executor: &mut X,
    group: &mut CounterGroup<B>,
    label: impl Into<String>,
    sql: &str,
) -> Result<QueryReport, QueryError>
where
    X: QueryExecutor,
    B: CounterBackend,
{
    let label = label.into();
    debug!(label = %label, sql, "running measured query");

    let measured = try_measure(group, || {
        let result = executor.query(sql);
        if result.has_error() {
            Err(result.error().unwrap_or("unknown error").to_string())
        } else {
            Ok(result.row_count())
        }
    });

    match measured {
        Ok(m) => {
            info!(label = %label, rows = m.output, elapsed_ms = m.elapsed.as_millis() as u64, "query finished");
            Ok(QueryReport {
                label,
                rows: m.output,
                elapsed: m.elapsed,
                snapshot: m.snapshot,
            })
        }
        Err(MeasureError::Work(message)) => Err(QueryError::Failed { label, message }),
        Err(MeasureError::Counter(e)) => Err(e.into()),
    }
}

/// Run labelled statements in order, re-arming the same group for each.
///
/// Stops at the first failure; the group is left disabled.
pub fn run_suite<X, B, I, L, S>(
    executor: &mut X,
    group: &mut CounterGroup<B>,
    statements: I,
) -> Result<Vec<QueryReport>, QueryError>
where
    X: QueryExecutor,
    B: CounterBackend,
    I: IntoIterator<Item = (L, S)>,
    L: Into<String>,
    S: AsRef<str>,
{
    statements
        .into_iter()
        .map(|(label, sql)| run_query(&mut *executor, &mut *group, label, sql.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroupState;
    use crate::measurement::SyntheticBackend;
    use crate::registry::baseline_group_with;

    struct Canned {
        error: Option<String>,
        rows: u64,
    }

    impl QueryResult for Canned {
        fn error(&self) -> Option<&str> {
            self.error.as_deref()
        }

        fn row_count(&self) -> u64 {
            self.rows
        }

        fn value(&self, row: usize, _col: usize) -> Option<String> {
            (row < self.rows as usize).then(|| row.to_string())
        }
    }

    #[derive(Default)]
    struct Engine {
        seen: Vec<String>,
    }

    impl QueryExecutor for Engine {
        type Output = Canned;

        fn query(&mut self, sql: &str) -> Canned {
            self.seen.push(sql.to_string());
            match sql.strip_prefix("rows ") {
                Some(n) => Canned {
                    error: None,
                    rows: n.parse().unwrap_or(0),
                },
                None => Canned {
                    error: Some(format!("syntax error near '{}'", sql)),
                    rows: 0,
                },
            }
        }
    }

    #[test]
    fn test_run_query_reports_rows() {
        let mut engine = Engine::default();
        let mut group = baseline_group_with(SyntheticBackend::new()).unwrap();
        let report = run_query(&mut engine, &mut group, "q1", "rows 3").unwrap();

        assert_eq!(report.label, "q1");
        assert_eq!(report.rows, 3);
        assert!(report.snapshot.wall_clock_ms().is_some());
    }

    #[test]
    fn test_suite_stops_at_first_failure() {
        let mut engine = Engine::default();
        let mut group = baseline_group_with(SyntheticBackend::new()).unwrap();
        let err = run_suite(
            &mut engine,
            &mut group,
            [("1", "rows 1"), ("2", "bogus"), ("3", "rows 3")],
        )
        .unwrap_err();

        assert_eq!(
            err,
            QueryError::Failed {
                label: "2".to_string(),
                message: "syntax error near 'bogus'".to_string(),
            }
        );
        assert_eq!(engine.seen, vec!["rows 1", "bogus"]);
        assert_eq!(group.state(), GroupState::Disabled);
    }

    #[test]
    fn test_suite_rearms_group() {
        let mut engine = Engine::default();
        let mut group = baseline_group_with(SyntheticBackend::new()).unwrap();
        let reports = run_suite(&mut engine, &mut group, (1..=4).map(|i| (i.to_string(), format!("rows {}", i)))).unwrap();

        assert_eq!(reports.len(), 4);
        assert_eq!(group.backend().calls().enable, 4);
        assert_eq!(reports[3].rows, 4);
    }
}
