//! Canonical in-memory representation of a coverage job, independent of the
//! report format it came from. Parsers produce a `Job` which is then merged
//! with build configuration and handed to the upload client.
//!
//! The serde attributes on these types define the canonical JSON wire form:
//! every optional field says explicitly when it is left out.

use chrono::{DateTime, FixedOffset};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::Result;

fn is_false(value: &bool) -> bool {
    !*value
}

/// MD5 of the raw file content, lower-case hex.
#[must_use]
pub fn source_digest(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Number of lines in `content` when split on `\r?\n`.
///
/// This is a plain split: a trailing newline produces a final empty line, so
/// `"a\nb\n"` has three lines and `""` has one.
#[must_use]
pub fn line_count(content: &str) -> usize {
    content.split('\n').count()
}

/// One branch arm as recorded by an LCOV `BRDA` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchHit {
    pub line_number: u64,
    pub block_number: u64,
    pub branch_number: u64,
    pub taken: u64,
}

impl BranchHit {
    fn to_array(self) -> [u64; 4] {
        [
            self.line_number,
            self.block_number,
            self.branch_number,
            self.taken,
        ]
    }
}

/// Branches travel as one flat array of 4-tuples:
/// `[line, block, branch, taken, line, block, branch, taken, ...]`.
mod flat_branches {
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::BranchHit;

    pub fn serialize<S: Serializer>(branches: &[BranchHit], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(branches.len() * 4))?;
        for branch in branches {
            for value in branch.to_array() {
                seq.serialize_element(&value)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<BranchHit>, D::Error> {
        let flat = Vec::<u64>::deserialize(d)?;
        if flat.len() % 4 != 0 {
            return Err(D::Error::custom(format!(
                "branches must hold a multiple of 4 values, got {}",
                flat.len()
            )));
        }
        Ok(flat
            .chunks_exact(4)
            .map(|c| BranchHit {
                line_number: c[0],
                block_number: c[1],
                branch_number: c[2],
                taken: c[3],
            })
            .collect())
    }
}

/// Coverage record for a single source file.
///
/// `coverage[i]` describes line `i + 1`: `Some(count)` for an executable
/// line, `None` for a line that carries no statement. Counts are signed so
/// formats that report negative counts keep them as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    name: String,
    source_digest: String,
    coverage: Vec<Option<i64>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "flat_branches")]
    branches: Vec<BranchHit>,
}

impl SourceFile {
    /// Start building a record for `name` whose full text is `content`.
    ///
    /// The digest covers the raw bytes; the stored text is decoded lossily.
    pub fn builder(name: impl Into<String>, content: impl AsRef<[u8]>) -> SourceFileBuilder {
        let bytes = content.as_ref();
        let source = String::from_utf8_lossy(bytes).into_owned();
        SourceFileBuilder {
            name: name.into(),
            source_digest: source_digest(bytes),
            coverage: vec![None; line_count(&source)],
            source,
            branches: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_digest(&self) -> &str {
        &self.source_digest
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn coverage(&self) -> &[Option<i64>] {
        &self.coverage
    }

    pub fn branches(&self) -> &[BranchHit] {
        &self.branches
    }
}

/// Accumulates per-line hits and branch arms before freezing a `SourceFile`.
#[derive(Debug)]
pub struct SourceFileBuilder {
    name: String,
    source_digest: String,
    source: String,
    coverage: Vec<Option<i64>>,
    branches: Vec<BranchHit>,
}

impl SourceFileBuilder {
    /// Record `count` hits for the 1-based `line_number`.
    ///
    /// Returns `false` (and records nothing) when the line lies outside the
    /// source file.
    pub fn line(&mut self, line_number: u64, count: i64) -> bool {
        let slot = usize::try_from(line_number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| self.coverage.get_mut(idx));
        match slot {
            Some(slot) => {
                *slot = Some(count);
                true
            }
            None => false,
        }
    }

    pub fn branch(&mut self, branch: BranchHit) {
        self.branches.push(branch);
    }

    /// Drop the raw text from the record; the digest is kept.
    pub fn without_source(mut self) -> Self {
        self.source.clear();
        self
    }

    pub fn build(self) -> SourceFile {
        SourceFile {
            name: self.name,
            source_digest: self.source_digest,
            coverage: self.coverage,
            source: self.source,
            branches: self.branches,
        }
    }
}

/// A single commit as reported to the coverage service.
///
/// No `Default`: every commit carries an `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub committer_email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub committer_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl GitCommit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author_email: String::new(),
            author_name: String::new(),
            committer_email: String::new(),
            committer_name: String::new(),
            message: String::new(),
        }
    }
}

/// A named git remote. SCP-style addresses are rewritten to `ssh://` URIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRemote {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl GitRemote {
    pub fn new(name: impl Into<String>, url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            url: url.and_then(normalize_remote_url),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Either a `scheme://...` URI or an SCP-style `user@host:path` address.
fn remote_url_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(
            r"^(?:(?P<uri>[A-Za-z][A-Za-z0-9+.\-]*://\S*)|(?P<user>[^@/:\s]+)@(?P<host>[^:/\s]+):(?P<path>.*))$",
        )
        .expect("remote url regex")
    })
}

/// Turn a remote address into a URI string.
///
/// `user@host:path` becomes `ssh://user@host/path`; anything already carrying
/// a `scheme://` prefix passes through. Returns `None` for addresses that are
/// neither.
pub fn normalize_remote_url(raw: &str) -> Option<String> {
    let caps = remote_url_regex().captures(raw.trim())?;
    if let Some(uri) = caps.name("uri") {
        return Some(uri.as_str().to_string());
    }
    let path = caps["path"].trim_start_matches('/');
    Some(format!("ssh://{}@{}/{}", &caps["user"], &caps["host"], path))
}

/// Repository state associated with a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitData {
    #[serde(default)]
    pub branch: String,
    #[serde(rename = "head", default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<GitCommit>,
    #[serde(default)]
    pub remotes: Vec<GitRemote>,
}

/// One upload-worthy unit of coverage data from a single test run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_number: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_job_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_pull_request: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flag_name: String,
    #[serde(rename = "parallel", default, skip_serializing_if = "is_false")]
    pub is_parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitData>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub source_files: Vec<SourceFile>,
}

impl Job {
    pub fn new(source_files: Vec<SourceFile>) -> Self {
        Self {
            source_files,
            ..Default::default()
        }
    }

    /// A job can only be submitted when it identifies either a repository
    /// token or a CI service.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        !self.repo_token.is_empty() || !self.service_name.is_empty()
    }

    /// Serialize to the canonical upload JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Re-read a job from its canonical JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_file() -> SourceFile {
        let mut b = SourceFile::builder("src/lib.rs", "fn a() {}\nfn b() {}\n");
        b.line(1, 3);
        b.line(2, 0);
        b.branch(BranchHit {
            line_number: 1,
            block_number: 0,
            branch_number: 0,
            taken: 3,
        });
        b.branch(BranchHit {
            line_number: 1,
            block_number: 0,
            branch_number: 1,
            taken: 0,
        });
        b.build()
    }

    #[test]
    fn test_line_count_is_plain_split() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\nb\n"), 3);
        assert_eq!(line_count("a\r\nb\r\nc"), 3);
        assert_eq!(line_count("\n\n\n"), 4);
    }

    #[test]
    fn test_digest_is_md5_hex() {
        assert_eq!(source_digest(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(source_digest(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_builder_allocates_one_slot_per_line() {
        let file = sample_file();
        assert_eq!(file.coverage(), &[Some(3), Some(0), None]);
        assert_eq!(file.source_digest(), source_digest(b"fn a() {}\nfn b() {}\n"));
    }

    #[test]
    fn test_builder_rejects_out_of_range_lines() {
        let mut b = SourceFile::builder("x", "one\ntwo");
        assert!(!b.line(0, 1));
        assert!(!b.line(3, 1));
        assert!(b.line(2, 7));
        assert_eq!(b.build().coverage(), &[None, Some(7)]);
    }

    #[test]
    fn test_source_file_json_shape() {
        let value = serde_json::to_value(sample_file()).unwrap();
        assert_eq!(value["name"], "src/lib.rs");
        assert_eq!(value["coverage"], json!([3, 0, null]));
        assert_eq!(value["branches"], json!([1, 0, 0, 3, 1, 0, 1, 0]));
        assert_eq!(value["source"], "fn a() {}\nfn b() {}\n");
    }

    #[test]
    fn test_source_file_omits_empty_source_and_branches() {
        let file = SourceFile::builder("a.txt", "x").without_source().build();
        let value = serde_json::to_value(&file).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("source"));
        assert!(!obj.contains_key("branches"));
        assert_eq!(value["source_digest"], source_digest(b"x"));
    }

    #[test]
    fn test_flat_branches_must_be_multiple_of_four() {
        let json = r#"{"name":"a","source_digest":"d","coverage":[],"branches":[1,2,3]}"#;
        assert!(serde_json::from_str::<SourceFile>(json).is_err());
    }

    #[test]
    fn test_job_json_omits_defaults() {
        let job = Job::new(vec![]);
        assert_eq!(job.to_json().unwrap(), r#"{"source_files":[]}"#);
    }

    #[test]
    fn test_job_json_round_trip() {
        let mut commit = GitCommit::new("abc123");
        commit.author_name = "Ada".to_string();
        commit.message = "Fix things".to_string();

        let job = Job {
            repo_token: "tok".to_string(),
            service_name: "github".to_string(),
            service_number: "42".to_string(),
            service_job_id: "7".to_string(),
            service_pull_request: "3".to_string(),
            flag_name: "unit".to_string(),
            is_parallel: true,
            git: Some(GitData {
                branch: "main".to_string(),
                commit: Some(commit),
                remotes: vec![GitRemote::new("origin", Some("git@github.com:org/repo.git"))],
            }),
            commit_sha: "abc123".to_string(),
            run_at: Some(DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap()),
            source_files: vec![sample_file()],
        };

        let json = job.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["parallel"], true);
        assert_eq!(value["git"]["head"]["id"], "abc123");
        assert!(value["git"]["head"].get("committer_name").is_none());
        assert_eq!(
            value["git"]["remotes"][0]["url"],
            "ssh://git@github.com/org/repo.git"
        );
        assert_eq!(value["run_at"], "2024-05-01T12:00:00+02:00");

        assert_eq!(Job::from_json(&json).unwrap(), job);
    }

    #[test]
    fn test_round_trip_drops_empty_source() {
        let file = SourceFile::builder("a", "x\ny").without_source().build();
        let job = Job::new(vec![file]);
        let back = Job::from_json(&job.to_json().unwrap()).unwrap();
        assert_eq!(back.source_files[0].source(), "");
        assert_eq!(back, job);
    }

    #[test]
    fn test_submittable() {
        let mut job = Job::default();
        assert!(!job.is_submittable());
        job.service_name = "travis-ci".to_string();
        assert!(job.is_submittable());
        let job = Job {
            repo_token: "t".to_string(),
            ..Default::default()
        };
        assert!(job.is_submittable());
    }

    #[test]
    fn test_remote_scp_url_is_rewritten() {
        let remote = GitRemote::new("origin", Some("git@github.com:org/repo.git"));
        assert_eq!(remote.url(), Some("ssh://git@github.com/org/repo.git"));
        assert_eq!(
            normalize_remote_url("git@host:/srv/repo.git").as_deref(),
            Some("ssh://git@host/srv/repo.git")
        );
    }

    #[test]
    fn test_remote_scheme_url_passes_through() {
        let remote = GitRemote::new("origin", Some("https://github.com/org/repo.git"));
        assert_eq!(remote.url(), Some("https://github.com/org/repo.git"));

        let remote = GitRemote::new("up", Some("ssh://git@host:2222/repo.git"));
        assert_eq!(remote.url(), Some("ssh://git@host:2222/repo.git"));
    }

    #[test]
    fn test_remote_without_url() {
        let remote = GitRemote::new("bare", None);
        assert_eq!(remote.name(), "bare");
        assert_eq!(remote.url(), None);
        assert_eq!(GitRemote::new("odd", Some("not a url")).url(), None);
    }
}
