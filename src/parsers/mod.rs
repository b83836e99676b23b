pub mod clover;
pub mod lcov;

use std::path::{Path, PathBuf};

use quick_xml::events::BytesStart;
use quick_xml::Reader;

use crate::error::{CovupError, Result};
use crate::model::Job;

/// Every report parser implements this trait.
pub trait ReportParser {
    /// Parse the report text into a job, reading each named source file.
    fn parse(&self, report: &str) -> Result<Job>;
}

/// The directory relative report paths are resolved against: the process
/// working directory unless one is given.
pub(crate) fn base_dir_or_cwd(base_dir: Option<PathBuf>) -> Result<PathBuf> {
    match base_dir {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}

/// Read a source file named by a report.
///
/// Unreadable files are `FileNotFound`, zero-length files are `FileEmpty`.
pub(crate) fn read_source(path: &Path) -> Result<Vec<u8>> {
    let content = std::fs::read(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "cannot read source file");
        CovupError::FileNotFound(path.to_path_buf())
    })?;
    if content.is_empty() {
        return Err(CovupError::FileEmpty(path.to_path_buf()));
    }
    Ok(content)
}

pub(crate) fn xml_reader(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(true);
    reader
}

pub(crate) fn xml_err(source: quick_xml::Error, reader: &Reader<&[u8]>) -> CovupError {
    CovupError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Unescaped value of attribute `name`, if present and decodable.
pub(crate) fn get_attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}
