/// Detection of the coverage report format from its content.
///
/// The report is trimmed and its first bytes inspected:
///   - `<?xml` or `<coverage`  -> Clover
///   - `TN:` or `SF:`          -> LCOV
use crate::error::CovupError;

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Clover,
    Lcov,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Clover => "clover",
            Format::Lcov => "lcov",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CovupError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clover" => Ok(Format::Clover),
            "lcov" => Ok(Format::Lcov),
            _ => Err(CovupError::Format(format!(
                "Unknown format: '{}'. Supported: clover, lcov",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the report format, failing with `UnsupportedFormat` when neither
/// signature matches.
pub fn detect_format(report: &str) -> Result<Format, CovupError> {
    // A UTF-8 byte order mark is not whitespace to `trim`.
    let head = report.trim_start_matches('\u{feff}').trim();

    if head.starts_with("<?xml") || head.starts_with("<coverage") {
        return Ok(Format::Clover);
    }
    if head.starts_with("TN:") || head.starts_with("SF:") {
        return Ok(Format::Lcov);
    }
    Err(CovupError::UnsupportedFormat)
}
