//! Repository metadata read from a local git checkout.

use std::path::Path;

use git2::Repository;

use crate::error::Result;
use crate::model::{GitCommit, GitData, GitRemote};

/// Read the branch, HEAD commit and remotes of the repository containing
/// `path`.
///
/// The branch is empty when HEAD is detached. Remotes keep libgit2's listing
/// order, first occurrence of each name wins.
pub fn read_repository(path: &Path) -> Result<GitData> {
    let repo = Repository::discover(path)?;

    let head = repo.head()?;
    let branch = if head.is_branch() {
        head.shorthand().unwrap_or_default().to_string()
    } else {
        String::new()
    };

    let commit = head.peel_to_commit()?;
    let author = commit.author();
    let committer = commit.committer();
    let head_commit = GitCommit {
        id: commit.id().to_string(),
        author_email: author.email().unwrap_or_default().to_string(),
        author_name: author.name().unwrap_or_default().to_string(),
        committer_email: committer.email().unwrap_or_default().to_string(),
        committer_name: committer.name().unwrap_or_default().to_string(),
        message: commit.message().unwrap_or_default().trim_end().to_string(),
    };

    let mut remotes: Vec<GitRemote> = Vec::new();
    let names = repo.remotes()?;
    for name in names.iter().flatten() {
        if remotes.iter().any(|r| r.name() == name) {
            continue;
        }
        let remote = repo.find_remote(name)?;
        remotes.push(GitRemote::new(name, remote.url()));
    }

    tracing::debug!(
        branch = %branch,
        commit = %head_commit.id,
        remotes = remotes.len(),
        "read git metadata"
    );

    Ok(GitData {
        branch,
        commit: Some(head_commit),
        remotes,
    })
}

/// Combine metadata read from the checkout with what the build settings
/// supplied. The checkout wins; configured values fill only what it leaves
/// empty, such as the branch of a detached HEAD.
pub fn prefer_local(local: GitData, configured: Option<GitData>) -> GitData {
    let Some(configured) = configured else {
        return local;
    };
    GitData {
        branch: if local.branch.is_empty() {
            configured.branch
        } else {
            local.branch
        },
        commit: local.commit.or(configured.commit),
        remotes: if local.remotes.is_empty() {
            configured.remotes
        } else {
            local.remotes
        },
    }
}
