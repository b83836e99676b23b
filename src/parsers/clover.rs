/// Parser for Clover XML coverage reports.
///
/// Clover XML structure (as produced by OpenClover, PHPUnit, `jest
/// --coverageReporters=clover`, etc.):
///
///   <coverage generated="..." clover="4.x.x">
///     <project timestamp="..." name="...">
///       <metrics .../>
///       <file name="lib/top.js">
///         <line num="1" count="5" type="stmt"/>
///       </file>
///       <package name="...">
///         <file name="lib/pkg/foo.js">
///           <line num="1" count="5" type="stmt"/>
///           <line num="3" count="2" type="method" signature="do_stuff()"/>
///           <line num="5" count="1" type="cond" truecount="1" falsecount="1"/>
///         </file>
///       </package>
///     </project>
///   </coverage>
///
/// Only `<file>` elements sitting directly under `<project>` or under
/// `<project>/<package>` are read. Direct files of every project come first,
/// then package files, each group in document order. Only `type="stmt"`
/// lines feed the per-line coverage; method and condition lines carry no
/// branch data in this model.
use std::path::PathBuf;

use quick_xml::events::{BytesStart, Event};

use super::{get_attr, ReportParser};
use crate::error::{CovupError, Result};
use crate::model::{Job, SourceFile};
use crate::paths;

/// Clover XML format parser.
pub struct CloverParser {
    base_dir: PathBuf,
}

impl CloverParser {
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

impl ReportParser for CloverParser {
    fn parse(&self, report: &str) -> Result<Job> {
        let entries = read_entries(report)?;

        let mut source_files = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = paths::resolve(&entry.name, &self.base_dir);
            let content = super::read_source(&path)?;
            let name = paths::stored_name(&entry.name, &self.base_dir);

            let mut file = SourceFile::builder(name, content);
            for (line_number, count) in &entry.statements {
                if !file.line(*line_number, *count) {
                    tracing::warn!(
                        file = %entry.name,
                        line = line_number,
                        "statement line outside source file, ignoring"
                    );
                }
            }
            let file = file.build();
            tracing::debug!(file = file.name(), lines = file.coverage().len(), "parsed clover file");
            source_files.push(file);
        }

        Ok(Job::new(source_files))
    }
}

/// A `<file>` element with its clamped statement lines.
#[derive(Debug)]
struct FileEntry {
    name: String,
    statements: Vec<(u64, i64)>,
}

/// Where a `<file>` element sits inside its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Direct,
    Packaged,
}

#[derive(Default)]
struct GroupedFiles {
    direct: Vec<FileEntry>,
    packaged: Vec<FileEntry>,
}

impl GroupedFiles {
    fn push(&mut self, placement: Placement, entry: FileEntry) {
        match placement {
            Placement::Direct => self.direct.push(entry),
            Placement::Packaged => self.packaged.push(entry),
        }
    }

    fn into_ordered(self) -> Vec<FileEntry> {
        let mut entries = self.direct;
        entries.extend(self.packaged);
        entries
    }
}

fn placement_of(stack: &[Vec<u8>]) -> Option<Placement> {
    match stack {
        [root, project] if root == b"coverage" && project == b"project" => Some(Placement::Direct),
        [root, project, package]
            if root == b"coverage" && project == b"project" && package == b"package" =>
        {
            Some(Placement::Packaged)
        }
        _ => None,
    }
}

/// Walk the XML and collect every file entry in output order.
fn read_entries(report: &str) -> Result<Vec<FileEntry>> {
    let mut xml = super::xml_reader(report);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    let mut project_count = 0usize;
    let mut files = GroupedFiles::default();
    let mut current_file: Option<(Placement, FileEntry)> = None;

    loop {
        let event = xml.read_event();
        match event {
            Err(e) => return Err(super::xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let is_empty = matches!(event, Ok(Event::Empty(_)));
                let name = e.name().as_ref().to_vec();

                if stack.is_empty() {
                    if saw_root {
                        return Err(CovupError::InvalidFormat(
                            "more than one root element".to_string(),
                        ));
                    }
                    if name != b"coverage" {
                        return Err(CovupError::InvalidFormat(format!(
                            "expected <coverage> root element, found <{}>",
                            String::from_utf8_lossy(&name)
                        )));
                    }
                    saw_root = true;
                } else {
                    match name.as_slice() {
                        b"project" if stack.len() == 1 => project_count += 1,
                        b"file" => {
                            if let Some(placement) = placement_of(&stack) {
                                let entry = FileEntry {
                                    name: file_name(e)?,
                                    statements: Vec::new(),
                                };
                                if is_empty {
                                    files.push(placement, entry);
                                } else {
                                    current_file = Some((placement, entry));
                                }
                            }
                        }
                        b"line" => {
                            let in_file = stack.last().map(|n| n == b"file").unwrap_or(false);
                            if let (true, Some((_, entry))) = (in_file, current_file.as_mut()) {
                                if let Some(statement) = statement_line(e, &entry.name)? {
                                    entry.statements.push(statement);
                                }
                            }
                        }
                        _ => {}
                    }
                }

                if !is_empty {
                    stack.push(name);
                } else if stack.is_empty() {
                    // `<coverage/>`: a root with no content.
                    break;
                }
            }
            Ok(Event::End(ref e)) => {
                stack.pop();
                if e.name().as_ref() == b"file" {
                    if let Some((placement, entry)) = current_file.take() {
                        files.push(placement, entry);
                    }
                }
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(CovupError::InvalidFormat(
            "missing <coverage> root element".to_string(),
        ));
    }
    if !stack.is_empty() {
        return Err(CovupError::InvalidFormat(format!(
            "unexpected end of document inside <{}>",
            String::from_utf8_lossy(stack.last().map(Vec::as_slice).unwrap_or_default())
        )));
    }
    if project_count == 0 {
        return Err(CovupError::InvalidFormat(
            "no <project> element in report".to_string(),
        ));
    }

    Ok(files.into_ordered())
}

fn file_name(e: &BytesStart<'_>) -> Result<String> {
    get_attr(e, b"name").ok_or_else(|| {
        CovupError::InvalidFormat("<file> element without a name attribute".to_string())
    })
}

/// `(line_number, count)` for a `type="stmt"` line, clamped to line >= 1 and
/// count >= 0. Other line types yield `None`.
fn statement_line(e: &BytesStart<'_>, file: &str) -> Result<Option<(u64, i64)>> {
    if get_attr(e, b"type").as_deref() != Some("stmt") {
        return Ok(None);
    }
    let num = numeric_attr(e, b"num", file)?;
    let count = numeric_attr(e, b"count", file)?;
    Ok(Some((num.max(1) as u64, count.max(0))))
}

fn numeric_attr(e: &BytesStart<'_>, name: &[u8], file: &str) -> Result<i64> {
    let attr = String::from_utf8_lossy(name);
    let value = get_attr(e, name).ok_or_else(|| {
        CovupError::InvalidFormat(format!("<line> in {file} is missing the {attr} attribute"))
    })?;
    value.trim().parse::<i64>().map_err(|_| {
        CovupError::InvalidFormat(format!(
            "<line> in {file} has a non-numeric {attr} attribute: '{value}'"
        ))
    })
}
