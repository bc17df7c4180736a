//! Plain-text export of a reconciliation report.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone};

use crate::error::ExportError;
use crate::types::{ReconciliationReport, Verdict};

const BANNER_WIDTH: usize = 90;
const TITLE: &str = "CROSS-CHECK ANALYSIS - PACKAGE vs INVOICE";
const FOOTER: &str = "Analysis completed successfully!";

pub fn render_report<Tz>(report: &ReconciliationReport, verdict: &Verdict, generated_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let banner = "=".repeat(BANNER_WIDTH);
    let mut out = String::with_capacity(report.raw_text.len() + 512);
    out.push_str(&banner);
    out.push('\n');
    out.push_str(TITLE);
    out.push('\n');
    out.push_str(&banner);
    out.push_str("\n\n");
    out.push_str(&format!("Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S %z")));
    out.push_str(&format!("Verdict: {}\n\n", verdict));
    out.push_str(&report.raw_text);
    out.push_str("\n\n");
    out.push_str(&banner);
    out.push('\n');
    out.push_str(FOOTER);
    out.push('\n');
    out
}

/// Write the rendered report as UTF-8, creating parent directories as needed.
pub fn save_report(path: &Path, report: &ReconciliationReport, verdict: &Verdict) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let text = render_report(report, verdict, &Local::now());
    fs::write(path, text).map_err(io_err)?;
    tracing::info!("Report saved to {}", path.display());
    Ok(())
}
