//! Terminal output formatting with colors.

use colored::Colorize;

use crate::query::QueryReport;
use crate::snapshot::{CounterValue, Snapshot, CYCLES, INSTRUCTIONS};

/// Format a snapshot as one `name, value` line per entry.
///
/// Unavailable events are dimmed so they are not mistaken for zeros.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    for (name, value) in snapshot.iter() {
        match value {
            CounterValue::Count(v) => output.push_str(&format!("{}, {}\n", name, v)),
            CounterValue::Unavailable => {
                output.push_str(&format!("{}, {}\n", name, value.to_string().dimmed()))
            }
        }
    }

    output.push_str(&format_ipc(snapshot));
    output
}

/// Format one measured query: a header line, then its counters.
pub fn format_report(report: &QueryReport) -> String {
    let mut output = format!(
        "{} {} took {} seconds\n",
        "query".bold(),
        report.label.bold(),
        report.elapsed.as_secs_f64()
    );
    output.push_str(&format_snapshot(&report.snapshot));
    output
}

/// Format a whole suite, separated by rules.
pub fn format_reports(reports: &[QueryReport]) -> String {
    let sep = "\u{2500}".repeat(40);
    let mut output = String::new();

    for report in reports {
        output.push_str(&format_report(report));
        output.push_str(&sep);
        output.push('\n');
    }

    output
}

fn format_ipc(snapshot: &Snapshot) -> String {
    if snapshot.get(CYCLES).is_none() || snapshot.get(INSTRUCTIONS).is_none() {
        return String::new();
    }

    match snapshot.ipc() {
        Some(ipc) if ipc >= 1.0 => format!("IPC = {}\n", format!("{:.3}", ipc).green()),
        Some(ipc) => format!("IPC = {}\n", format!("{:.3}", ipc).yellow()),
        None => format!("IPC = {}\n", "n/a".dimmed()),
    }
}
