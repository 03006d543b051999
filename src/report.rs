//! Report generation
//!
//! Renders a [`ValidationReport`] as a fixed-layout text report and stores it
//! together with a CSV sibling holding one row per page.

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::page_number::ValidationReport;

/// Byte order mark written at the start of the CSV file so spreadsheet
/// applications detect UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const TITLE: &str = "PDF Page Number Validation Report";

/// Placeholder for an undetected number in the text report
const MISSING_NUMBER: &str = "N/A";

/// Report storage error types
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Render the human-readable report
pub fn render(report: &ValidationReport) -> String {
    let banner = "=".repeat(60);
    let mut lines = vec![
        banner.clone(),
        TITLE.to_string(),
        banner,
        format!("Total pages: {}", report.total_pages),
        format!("Success rate: {:.2}%", report.success_rate),
        String::new(),
        "Details:".to_string(),
        "-".repeat(40),
    ];

    for result in &report.results {
        let detected = result
            .detected_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| MISSING_NUMBER.to_string());
        let status = if result.is_valid { "✓" } else { "✗" };
        lines.push(format!(
            "page {}: expected {}, detected {} {}",
            result.page_number(),
            result.expected_number,
            detected,
            status
        ));
    }

    if !report.issues.is_empty() {
        lines.push(String::new());
        lines.push("Issues found:".to_string());
        lines.push("-".repeat(20));
        lines.extend(report.issues.iter().map(|issue| format!("• {}", issue)));
    }

    lines.join("\n")
}

/// CSV file stored next to a text report
///
/// A destination that already ends in `.csv` gets `<stem>.pages.csv` so the
/// text report is never overwritten.
pub fn csv_path_for(text_path: &Path) -> PathBuf {
    let is_csv = text_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return text_path.with_extension("csv");
    }

    let stem = text_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    text_path.with_file_name(format!("{stem}.pages.csv"))
}

#[derive(Serialize)]
struct CsvRow {
    page_index: usize,
    expected_number: u32,
    detected_number: Option<u32>,
    is_valid: bool,
}

/// Write the text report to `destination` and the CSV to its sibling.
///
/// Returns the text report path.
pub fn write(report: &ValidationReport, destination: &Path) -> Result<PathBuf> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(destination, render(report)).map_err(|source| ReportError::Io {
        path: destination.to_path_buf(),
        source,
    })?;

    let csv_path = csv_path_for(destination);
    write_csv(report, &csv_path)?;

    info!(report = %destination.display(), csv = %csv_path.display(), "Report saved");
    Ok(destination.to_path_buf())
}

fn write_csv(report: &ValidationReport, path: &Path) -> Result<()> {
    let io_error = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(path).map_err(io_error)?;
    file.write_all(UTF8_BOM).map_err(io_error)?;

    let mut writer = csv::Writer::from_writer(file);
    for result in &report.results {
        writer.serialize(CsvRow {
            page_index: result.page_index,
            expected_number: result.expected_number,
            detected_number: result.detected_number,
            is_valid: result.is_valid,
        })?;
    }
    writer.flush().map_err(io_error)?;
    Ok(())
}
