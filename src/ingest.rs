use std::path::{Path, PathBuf};

use crate::detect::{detect_format, Format};
use crate::error::Result;
use crate::model::Job;
use crate::parsers::clover::CloverParser;
use crate::parsers::lcov::LcovParser;
use crate::parsers::ReportParser;

/// Read a coverage report, auto-detect its format (or use the override) and
/// parse it into a job.
///
/// Relative source paths in the report resolve against `base_dir`, or the
/// working directory when it is `None`.
/// Returns (job, detected_format).
pub fn ingest(
    report_path: &Path,
    format_override: Option<&str>,
    base_dir: Option<&Path>,
) -> Result<(Job, Format)> {
    let report = std::fs::read_to_string(report_path)?;
    parse_report(&report, format_override, base_dir)
}

/// Same as [`ingest`] for report text already in memory.
pub fn parse_report(
    report: &str,
    format_override: Option<&str>,
    base_dir: Option<&Path>,
) -> Result<(Job, Format)> {
    let format = match format_override {
        Some(fmt_str) => fmt_str.parse::<Format>()?,
        None => detect_format(report)?,
    };

    let base_dir = crate::parsers::base_dir_or_cwd(base_dir.map(PathBuf::from))?;
    let job = parse_with_format(format, report, base_dir)?;
    tracing::info!(
        format = %format,
        files = job.source_files.len(),
        "parsed coverage report"
    );
    Ok((job, format))
}

fn parse_with_format(format: Format, report: &str, base_dir: PathBuf) -> Result<Job> {
    match format {
        Format::Clover => CloverParser::with_base_dir(base_dir).parse(report),
        Format::Lcov => LcovParser::with_base_dir(base_dir).parse(report),
    }
}
