//! Count cycles and instructions while summing a large random array.
//!
//! ```text
//! cargo run --release --example sum_array
//! PERF_BRACKET_EVENTS=cycles,ins=instructions,llc_misses=LLC-load-misses cargo run --example sum_array
//! RUST_LOG=perf_bracket=debug cargo run --example sum_array
//! ```

use std::process::ExitCode;

use perf_bracket::output::{json, terminal};
use perf_bracket::{measure_with, preflight, Config, ReportFormat};
use rand::Rng;
use tracing_subscriber::EnvFilter;

const LEN: usize = 50_000_000;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    for warning in preflight::access_check() {
        eprintln!("warning: {}", warning.description());
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid {}: {}", perf_bracket::ENV_EVENTS, e);
            return ExitCode::FAILURE;
        }
    };

    let mut rng = rand::thread_rng();
    let numbers: Vec<u64> = (0..LEN).map(|_| rng.gen_range(0..1_000_000)).collect();

    let mut group = match config.build_group() {
        Ok(group) => group,
        Err(e) => {
            eprintln!("cannot open counters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let m = match measure_with(&mut group, config.reset_on_enable, || numbers.iter().sum::<u64>()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("measurement failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("res = {}", m.output);
    match config.report {
        ReportFormat::Terminal => print!("{}", terminal::format_snapshot(&m.snapshot)),
        ReportFormat::Json => match json::to_json_pretty(&m.snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("cannot render snapshot: {}", e),
        },
    }

    ExitCode::SUCCESS
}
