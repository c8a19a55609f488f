//! Measure a suite of statements against a toy in-memory engine.
//!
//! The engine understands three statements over one generated column:
//! `sum`, `count where a < N`, and `max`. Anything else is an error, which
//! stops the suite.
//!
//! ```text
//! cargo run --release --example query_suite
//! PERF_BRACKET_REPORT=json cargo run --example query_suite
//! ```

use std::process::ExitCode;

use perf_bracket::output;
use perf_bracket::query::{run_suite, QueryExecutor, QueryResult};
use perf_bracket::Config;
use rand::Rng;
use tracing_subscriber::EnvFilter;

struct Table {
    a: Vec<u64>,
}

struct Rows {
    values: Vec<u64>,
    error: Option<String>,
}

impl QueryResult for Rows {
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn row_count(&self) -> u64 {
        self.values.len() as u64
    }

    fn value(&self, row: usize, col: usize) -> Option<String> {
        if col != 0 {
            return None;
        }
        self.values.get(row).map(u64::to_string)
    }
}

impl QueryExecutor for Table {
    type Output = Rows;

    fn query(&mut self, sql: &str) -> Rows {
        let single = |v: u64| Rows {
            values: vec![v],
            error: None,
        };
        let sql = sql.trim();

        if sql == "sum" {
            return single(self.a.iter().sum());
        }
        if sql == "max" {
            return single(self.a.iter().copied().max().unwrap_or(0));
        }
        if let Some(bound) = sql.strip_prefix("count where a < ") {
            if let Ok(bound) = bound.parse::<u64>() {
                return single(self.a.iter().filter(|&&v| v < bound).count() as u64);
            }
        }

        Rows {
            values: Vec::new(),
            error: Some(format!("cannot parse statement '{}'", sql)),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut rng = rand::thread_rng();
    let mut table = Table {
        a: (0..20_000_000).map(|_| rng.gen_range(0..1_000_000)).collect(),
    };

    let mut group = match config.build_group() {
        Ok(group) => group,
        Err(e) => {
            eprintln!("cannot open counters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let statements = [
        ("1", "sum"),
        ("2", "count where a < 500000"),
        ("3", "max"),
        ("4", "count where a < 1000"),
    ];

    let reports = match run_suite(&mut table, &mut group, statements) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match output::render(&reports, config.report) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("cannot render reports: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
