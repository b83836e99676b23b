mod common;

use std::path::Path;

use covup::cli::{cmd_parse, cmd_upload, UploadOptions};
use covup::config::Config;
use git2::{Repository, RepositoryInitOptions, Signature};

fn dry_run_options(root: &Path) -> UploadOptions {
    UploadOptions {
        format: None,
        root: Some(root.to_path_buf()),
        config_file: None,
        env: Config::new(),
        overrides: Config::new(),
        git: false,
        endpoint: "http://127.0.0.1:9/never".to_string(),
        dry_run: true,
    }
}

/// Initialise a repository on `main` at `dir` and commit everything in it.
fn commit_all(dir: &Path) -> String {
    let mut init = RepositoryInitOptions::new();
    init.initial_head("main");
    let repo = Repository::init_opts(dir, &init).unwrap();

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let author = Signature::now("Ada", "ada@example.com").unwrap();
    repo.commit(Some("HEAD"), &author, &author, "Add sources\n", &tree, &[])
        .unwrap()
        .to_string()
}

#[test]
fn parse_prints_job_json() {
    let out = cmd_parse(
        &common::fixture("clover.xml"),
        None,
        Some(common::fixture_project().as_path()),
    )
    .unwrap();

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["source_files"].as_array().unwrap().len(), 3);
    assert_eq!(value["source_files"][2]["name"], "lib/math/square.js");
}

#[test]
fn upload_dry_run_merges_settings() {
    let dir = common::write_project(&[
        ("src/a.js", "var a = 1;\n"),
        ("lcov.info", "SF:src/a.js\nDA:1,1\nend_of_record\n"),
        (
            ".coveralls.yml",
            "repo_token: from-file\nservice_name: local\nflag_name: file-flag\n",
        ),
    ]);

    let mut opts = dry_run_options(dir.path());
    opts.env = Config::from_vars([("COVERALLS_REPO_TOKEN", "from-env"), ("COVERALLS_COMMIT_SHA", "abc")]);
    opts.overrides = [("flag_name", "cli-flag"), ("parallel", "true")].into_iter().collect();

    let out = cmd_upload(&dir.path().join("lcov.info"), opts).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(value["repo_token"], "from-env");
    assert_eq!(value["service_name"], "local");
    assert_eq!(value["flag_name"], "cli-flag");
    assert_eq!(value["parallel"], true);
    assert_eq!(value["commit_sha"], "abc");
    assert!(value.get("git").is_none());
    assert!(value["run_at"].is_string());
    assert_eq!(value["source_files"][0]["coverage"], serde_json::json!([1, null]));
}

#[test]
fn upload_uses_explicit_config_file() {
    let dir = common::write_project(&[
        ("a.js", "x\n"),
        ("lcov.info", "SF:a.js\nDA:1,0\nend_of_record\n"),
        ("ci/coverage.yml", "service_name: jenkins\nrun_at: 2024-05-01T12:00:00Z\n"),
    ]);

    let mut opts = dry_run_options(dir.path());
    opts.config_file = Some(dir.path().join("ci/coverage.yml"));

    let out = cmd_upload(&dir.path().join("lcov.info"), opts).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["service_name"], "jenkins");
    assert_eq!(value["run_at"], "2024-05-01T12:00:00+00:00");
}

#[test]
fn upload_without_token_or_service_fails() {
    let dir = common::write_project(&[
        ("a.js", "x\n"),
        ("lcov.info", "SF:a.js\nDA:1,0\nend_of_record\n"),
    ]);

    let mut opts = dry_run_options(dir.path());
    opts.dry_run = false;

    let err = cmd_upload(&dir.path().join("lcov.info"), opts).unwrap_err();
    assert!(err.to_string().contains("repository token"), "{err}");
}

#[test]
fn invalid_run_at_is_reported() {
    let dir = common::write_project(&[
        ("a.js", "x\n"),
        ("lcov.info", "SF:a.js\nDA:1,0\nend_of_record\n"),
    ]);

    let mut opts = dry_run_options(dir.path());
    opts.overrides = [("run_at", "not-a-time")].into_iter().collect();

    let err = cmd_upload(&dir.path().join("lcov.info"), opts).unwrap_err();
    assert!(err.to_string().contains("run_at"), "{err}");
}

#[test]
fn upload_git_keeps_local_commit_with_configured_branch() {
    let dir = common::write_project(&[
        ("a.js", "x\n"),
        ("lcov.info", "SF:a.js\nDA:1,1\nend_of_record\n"),
    ]);
    let sha = commit_all(dir.path());

    let mut opts = dry_run_options(dir.path());
    opts.git = true;
    opts.overrides = [("service_name", "ci"), ("service_branch", "release")]
        .into_iter()
        .collect();

    let out = cmd_upload(&dir.path().join("lcov.info"), opts).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(value["git"]["branch"], "main");
    assert_eq!(value["git"]["head"]["id"], sha.as_str());
    assert_eq!(value["git"]["head"]["author_name"], "Ada");
    assert_eq!(value["git"]["head"]["message"], "Add sources");
}

#[test]
fn upload_git_detached_head_uses_configured_branch() {
    let dir = common::write_project(&[
        ("a.js", "x\n"),
        ("lcov.info", "SF:a.js\nDA:1,1\nend_of_record\n"),
    ]);
    let sha = commit_all(dir.path());
    let repo = Repository::open(dir.path()).unwrap();
    repo.set_head_detached(git2::Oid::from_str(&sha).unwrap())
        .unwrap();

    let mut opts = dry_run_options(dir.path());
    opts.git = true;
    opts.overrides = [("service_name", "ci"), ("service_branch", "release")]
        .into_iter()
        .collect();

    let out = cmd_upload(&dir.path().join("lcov.info"), opts).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(value["git"]["branch"], "release");
    assert_eq!(value["git"]["head"]["id"], sha.as_str());
}
