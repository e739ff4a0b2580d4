//! JSON output formatting.

use crate::error::ReportResult;
use crate::report::{ReportBuilder, ScanReport};
use std::io::Write;

/// Write the report document, the same bytes `ReportBuilder::write` persists.
pub fn write_json<W: Write>(report: &ScanReport, out: &mut W) -> ReportResult<()> {
    let json = ReportBuilder::to_json(report)?;
    writeln!(out, "{}", json).map_err(|e| crate::error::ReportError::WriteFailed {
        path: "<stdout>".into(),
        reason: e.to_string(),
    })
}
