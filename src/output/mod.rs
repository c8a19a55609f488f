//! Rendering snapshots and reports for people and machines.

pub mod json;
pub mod terminal;

use crate::config::ReportFormat;
use crate::query::QueryReport;

/// Render a suite of reports in the requested format.
///
/// # Errors
///
/// JSON serialization failure.
pub fn render(reports: &[QueryReport], format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Terminal => Ok(terminal::format_reports(reports)),
        ReportFormat::Json => json::to_json_pretty(reports),
    }
}
