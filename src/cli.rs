//! Command handler functions for the covup CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};

use crate::config::Config;
use crate::upload::Client;
use crate::{git, ingest};

/// Everything `upload` needs besides the report itself.
pub struct UploadOptions {
    pub format: Option<String>,
    /// Project root; source paths and `.coveralls.yml` resolve against it.
    pub root: Option<PathBuf>,
    /// Explicit configuration file, replacing `<root>/.coveralls.yml`.
    pub config_file: Option<PathBuf>,
    /// `COVERALLS_*` environment settings.
    pub env: Config,
    /// Settings given as command-line flags; these win over everything.
    pub overrides: Config,
    /// Attach branch, HEAD commit and remotes from the local repository.
    pub git: bool,
    pub endpoint: String,
    pub dry_run: bool,
}

fn resolve_root(root: Option<&Path>) -> Result<PathBuf> {
    match root {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir().context("Failed to determine working directory"),
    }
}

pub fn cmd_parse(report: &Path, format: Option<&str>, root: Option<&Path>) -> Result<String> {
    let root = resolve_root(root)?;
    let (job, _format) = ingest::ingest(report, format, Some(&root))
        .with_context(|| format!("Failed to parse {}", report.display()))?;
    let mut out = job.to_json_pretty()?;
    out.push('\n');
    Ok(out)
}

pub fn cmd_upload(report: &Path, opts: UploadOptions) -> Result<String> {
    let root = resolve_root(opts.root.as_deref())?;
    let (job, format) = ingest::ingest(report, opts.format.as_deref(), Some(&root))
        .with_context(|| format!("Failed to parse {}", report.display()))?;

    let mut config = match &opts.config_file {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?,
        None => Config::from_default_file(&root)?,
    };
    config.merge(opts.env);
    config.merge(opts.overrides);

    let mut job = config.apply(job)?;
    if opts.git {
        let local = git::read_repository(&root)
            .with_context(|| format!("Failed to read git metadata from {}", root.display()))?;
        job.git = Some(git::prefer_local(local, job.git.take()));
    }
    if job.run_at.is_none() {
        let now: DateTime<FixedOffset> = Utc::now().into();
        job.run_at = Some(now);
    }

    if opts.dry_run {
        let mut out = job.to_json_pretty()?;
        out.push('\n');
        return Ok(out);
    }

    let client = Client::new(opts.endpoint)?;
    let resp = client.submit(&job)?;

    let mut out = String::new();
    writeln!(
        out,
        "Submitted {} source files ({}) to {}",
        job.source_files.len(),
        format,
        client.endpoint()
    )
    .unwrap();
    if let Some(message) = resp.message {
        writeln!(out, "{}", message).unwrap();
    }
    if let Some(url) = resp.url {
        writeln!(out, "{}", url).unwrap();
    }
    Ok(out)
}
