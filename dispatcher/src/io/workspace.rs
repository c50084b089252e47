//! Ephemeral working copy of a pull request branch.

use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::info;

use crate::io::config::CommitIdentity;
use crate::io::git::Git;
use crate::io::github::PullHead;
use crate::io::publish::repo_url;

/// A checkout the bot mutates. When cloned, the checkout lives in a temp
/// directory that is removed when the value is dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    git: Git,
    _temp: Option<TempDir>,
}

impl WorkingCopy {
    /// Clone the head branch of a pull request into a fresh temp directory.
    pub fn clone_pull(
        server_url: &str,
        head: &PullHead,
        identity: &CommitIdentity,
    ) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("dispatcher-")
            .tempdir()
            .context("create temp dir")?;
        let dest = temp.path().join(&head.repo.name);
        let url = repo_url(server_url, head);
        info!(%url, branch = %head.branch, "cloning pull request head");
        let git = Git::clone_branch(&url, &head.branch, &dest)
            .with_context(|| format!("clone {} branch {}", head.repo, head.branch))?;
        set_identity(&git, identity)?;
        Ok(Self {
            git,
            _temp: Some(temp),
        })
    }

    /// Use an existing checkout in place. Nothing is removed on drop.
    pub fn open(path: &Path) -> Result<Self> {
        let git = Git::new(path);
        git.head_sha()
            .with_context(|| format!("{} is not a git checkout", path.display()))?;
        Ok(Self { git, _temp: None })
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    pub fn path(&self) -> &Path {
        self.git.workdir()
    }
}

fn set_identity(git: &Git, identity: &CommitIdentity) -> Result<()> {
    git.set_config("user.name", &identity.name)?;
    git.set_config("user.email", &identity.email)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::RepoId;
    use crate::test_support::TestRemote;

    #[test]
    fn clone_is_removed_on_drop() {
        let remote = TestRemote::feedstock("pkg-feedstock", "1.0").expect("remote");
        let head = PullHead {
            branch: remote.branch().to_string(),
            repo: RepoId::new(remote.owner(), remote.name()),
        };
        let copy = WorkingCopy::clone_pull(&remote.server_url(), &head, &CommitIdentity::default())
            .expect("clone");
        let path = copy.path().to_path_buf();
        assert!(path.join("recipe/meta.yaml").exists());
        assert_eq!(copy.git().current_branch().expect("branch"), remote.branch());
        drop(copy);
        assert!(!path.exists());
    }

    #[test]
    fn open_rejects_plain_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(WorkingCopy::open(temp.path()).is_err());
    }
}
