//! Build configuration and its merge onto a parsed job.
//!
//! Configuration is a flat string-to-string mapping. It is assembled from a
//! YAML file, `COVERALLS_*` environment variables and command-line flags,
//! later sources overriding earlier ones, and then applied to a `Job`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset};

use crate::error::{CovupError, Result};
use crate::model::{GitCommit, GitData, Job};

/// Environment variables with this prefix become configuration keys.
pub const ENV_PREFIX: &str = "COVERALLS_";

/// Configuration file looked up in the project root.
pub const DEFAULT_CONFIG_FILE: &str = ".coveralls.yml";

/// Resolved build settings, keyed by lower-case names such as `repo_token`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: Config) {
        self.values.extend(other.values);
    }

    /// Parse a flat YAML mapping. Scalars are stringified, `null` values are
    /// dropped; nested sequences or mappings are rejected.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml)
            .map_err(|e| CovupError::Format(format!("invalid configuration file: {e}")))?;

        let mut config = Self::new();
        for (key, value) in raw {
            let value = match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::String(s) => s,
                _ => {
                    return Err(CovupError::Format(format!(
                        "configuration key '{key}' must be a scalar"
                    )))
                }
            };
            config.set(key, value);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Load `.coveralls.yml` from `dir`; a missing file is an empty config.
    pub fn from_default_file(dir: &Path) -> Result<Self> {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::new());
        }
        tracing::debug!(path = %path.display(), "loading configuration file");
        Self::from_file(&path)
    }

    /// Keep the `COVERALLS_`-prefixed variables, stripping the prefix and
    /// lower-casing the rest (`COVERALLS_REPO_TOKEN` -> `repo_token`).
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::new();
        for (key, value) in vars {
            if let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) {
                if !name.is_empty() {
                    config.set(name.to_lowercase(), value);
                }
            }
        }
        config
    }

    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    fn string_or(&self, key: &str, fallback: String) -> String {
        self.get(key).map(str::to_string).unwrap_or(fallback)
    }

    fn string_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// `service_branch` or any `git_*` key asks for full git attribution.
    fn wants_git_data(&self) -> bool {
        self.contains("service_branch") || self.values.keys().any(|k| k.starts_with("git_"))
    }

    /// Merge these settings onto `job`. Keys that are absent leave the job's
    /// value alone.
    pub fn apply(&self, job: Job) -> Result<Job> {
        let repo_token = match self.get("repo_token").or_else(|| self.get("repo_secret_token")) {
            Some(token) => token.to_string(),
            None => job.repo_token,
        };
        let is_parallel = match self.get("parallel") {
            Some(value) => value == "true",
            None => job.is_parallel,
        };
        let run_at = match self.get("run_at") {
            Some(raw) => Some(parse_run_at(raw)?),
            None => job.run_at,
        };

        let (git, commit_sha) = if self.wants_git_data() {
            let commit = GitCommit {
                id: self.string_or_empty("commit_sha"),
                author_email: self.string_or_empty("git_author_email"),
                author_name: self.string_or_empty("git_author_name"),
                committer_email: self.string_or_empty("git_committer_email"),
                committer_name: self.string_or_empty("git_committer_name"),
                message: self.string_or_empty("git_message"),
            };
            let remotes = job.git.map(|git| git.remotes).unwrap_or_default();
            let git = GitData {
                branch: self.string_or_empty("service_branch"),
                commit: Some(commit),
                remotes,
            };
            (Some(git), job.commit_sha)
        } else {
            (job.git, self.string_or("commit_sha", job.commit_sha))
        };

        Ok(Job {
            repo_token,
            service_name: self.string_or("service_name", job.service_name),
            service_number: self.string_or("service_number", job.service_number),
            service_job_id: self.string_or("service_job_id", job.service_job_id),
            service_pull_request: self.string_or("service_pull_request", job.service_pull_request),
            flag_name: self.string_or("flag_name", job.flag_name),
            is_parallel,
            git,
            commit_sha,
            run_at,
            source_files: job.source_files,
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.set(key, value);
        }
        config
    }
}

/// Accepts RFC 3339 (`2024-05-01T12:00:00+02:00`) and the
/// `2024-05-01 12:00:00 +0200` form.
pub fn parse_run_at(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z"))
        .map_err(|e| CovupError::Format(format!("invalid run_at timestamp '{raw}': {e}")))
}
