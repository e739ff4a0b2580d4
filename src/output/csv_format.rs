//! CSV output formatting.

use crate::report::ScanReport;
use crate::types::Finding;
use std::io::Write;

/// Write one row per finding, then one per module error.
pub fn write_csv<W: Write>(report: &ScanReport, out: &mut W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["module", "severity", "subject", "detail"])?;

    for finding in report.findings() {
        wtr.write_record([
            module_of(&finding),
            finding.severity().as_str(),
            &finding.subject(),
            &finding.description(),
        ])?;
    }

    for (module, failure) in report.module_errors() {
        wtr.write_record([
            module.as_str(),
            "error",
            &failure.kind.to_string(),
            &failure.message,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

fn module_of(finding: &Finding) -> &'static str {
    match finding {
        Finding::Header(_) => "headers",
        Finding::Tls(_) => "ssl",
        Finding::Port(_) => "ports",
        Finding::Path(_) => "directories",
    }
}
