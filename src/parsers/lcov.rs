/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records read here:
///   TN:<test name>
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]   (count may be negative)
///   BRDA:<line>,<block>,<branch>,<taken>   ("-" means 0)
///   end_of_record
///
/// Function and summary records (FN, FNDA, LF, LH, BRF, ...) are skipped.
use std::path::PathBuf;

use super::ReportParser;
use crate::error::Result;
use crate::model::{BranchHit, Job, SourceFile};
use crate::paths;

/// One `DA` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineData {
    pub line_number: u64,
    pub execution_count: i64,
}

/// Everything recorded between `SF:` and `end_of_record`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LcovRecord {
    pub source_file: String,
    pub lines: Vec<LineData>,
    pub branches: Vec<BranchHit>,
}

impl LcovRecord {
    fn new(source_file: String) -> Self {
        Self {
            source_file,
            ..Default::default()
        }
    }
}

/// Split LCOV text into per-file records, in input order.
///
/// A record still open at end of input is kept. Lines that cannot be
/// understood are skipped.
pub fn read_records(input: &str) -> Vec<LcovRecord> {
    let mut records = Vec::new();
    let mut current: Option<LcovRecord> = None;

    for (idx, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(record) = current.take() {
                records.push(record);
            }
            continue;
        }

        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => {
                tracing::warn!(line = idx + 1, "unrecognized LCOV line, skipping");
                continue;
            }
        };

        match tag {
            "SF" => {
                if let Some(record) = current.take() {
                    records.push(record);
                }
                current = Some(LcovRecord::new(value.to_string()));
            }
            "DA" => {
                let Some(record) = current.as_mut() else {
                    continue;
                };
                match parse_line_data(value) {
                    Some(data) => record.lines.push(data),
                    None => tracing::warn!(line = idx + 1, value, "malformed DA entry, skipping"),
                }
            }
            "BRDA" => {
                let Some(record) = current.as_mut() else {
                    continue;
                };
                match parse_branch_data(value) {
                    Some(data) => record.branches.push(data),
                    None => tracing::warn!(line = idx + 1, value, "malformed BRDA entry, skipping"),
                }
            }
            // TN, FN, FNDA, FNF, FNH, LF, LH, BRF, BRH
            _ => {}
        }
    }

    if let Some(record) = current.take() {
        records.push(record);
    }

    records
}

/// DA:<line_number>,<execution_count>[,<checksum>]
fn parse_line_data(value: &str) -> Option<LineData> {
    let mut parts = value.splitn(3, ',');
    let line_number = parts.next()?.trim().parse().ok()?;
    let execution_count = parts.next()?.trim().parse().ok()?;
    Some(LineData {
        line_number,
        execution_count,
    })
}

/// BRDA:<line>,<block>,<branch>,<taken>
fn parse_branch_data(value: &str) -> Option<BranchHit> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [line, block, branch, taken] = parts.as_slice() else {
        return None;
    };
    let taken = if *taken == "-" { 0 } else { taken.parse().ok()? };
    Some(BranchHit {
        line_number: line.parse().ok()?,
        block_number: block.parse().ok()?,
        branch_number: branch.parse().ok()?,
        taken,
    })
}

/// LCOV format parser.
pub struct LcovParser {
    base_dir: PathBuf,
}

impl LcovParser {
    /// A parser resolving relative paths against the working directory.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_dir: super::base_dir_or_cwd(None)?,
        })
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ReportParser for LcovParser {
    fn parse(&self, report: &str) -> Result<Job> {
        let records = read_records(report);

        let mut source_files = Vec::with_capacity(records.len());
        for record in records {
            let path = paths::resolve(&record.source_file, &self.base_dir);
            let content = super::read_source(&path)?;
            let name = paths::stored_name(&record.source_file, &self.base_dir);

            let mut file = SourceFile::builder(name, content);
            for data in &record.lines {
                // Counts are stored as reported, no clamping.
                if !file.line(data.line_number, data.execution_count) {
                    tracing::warn!(
                        file = %record.source_file,
                        line = data.line_number,
                        "DA line outside source file, ignoring"
                    );
                }
            }
            for branch in record.branches {
                file.branch(branch);
            }
            let file = file.build();
            tracing::debug!(file = file.name(), lines = file.coverage().len(), "parsed lcov record");
            source_files.push(file);
        }

        Ok(Job::new(source_files))
    }
}
