//! Git adapter for the working copy.
//!
//! Every repository operation the bot performs goes through a small, explicit
//! wrapper around `git` subprocess calls. Commands never prompt for input, and
//! operations that handle a credential scrub it from their error text.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::diff::DiffPathSet;

const REDACTED: &str = "***";

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Clone `branch` of `url` into `dest` and return a wrapper for it.
    #[instrument(skip_all, fields(branch = branch))]
    pub fn clone_branch(url: &str, branch: &str, dest: &Path) -> Result<Self> {
        debug!(url, dest = %dest.display(), "cloning");
        let output = base_command()
            .args(["clone", "--quiet", "--branch", branch, url])
            .arg(dest)
            .output()
            .with_context(|| format!("spawn git clone {url}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git clone {url} failed: {}", stderr.trim()));
        }
        Ok(Self::new(dest))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to run)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Full SHA of the current branch tip.
    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.run_checked(&["config", key, value])?;
        Ok(())
    }

    /// Stage the given paths.
    pub fn add(&self, paths: &[&str]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run_checked(&args)?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Fold staged changes into the last commit, keeping its message.
    #[instrument(skip_all)]
    pub fn amend_last_commit(&self) -> Result<()> {
        debug!("amending last commit");
        self.run_checked(&["commit", "--amend", "--allow-empty", "--no-edit"])?;
        Ok(())
    }

    /// Paths touched between two revisions.
    pub fn diff_paths(&self, from: &str, to: &str) -> Result<DiffPathSet> {
        let out = self.run_capture(&["diff", "--name-status", "--no-renames", from, to])?;
        DiffPathSet::parse(&out).with_context(|| format!("parse git diff {from} {to}"))
    }

    /// Restore `paths` in the index and worktree to their content at `rev`.
    pub fn checkout_paths(&self, rev: &str, paths: &[&str]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["checkout", rev, "--"];
        args.extend_from_slice(paths);
        self.run_checked(&args)?;
        Ok(())
    }

    /// Remove `paths` from the index and worktree.
    pub fn remove_paths(&self, paths: &[&str]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm", "-q", "--"];
        args.extend_from_slice(paths);
        self.run_checked(&args)?;
        Ok(())
    }

    /// Push URL configured for `remote`.
    pub fn remote_push_url(&self, remote: &str) -> Result<String> {
        let out = self.run_capture(&["remote", "get-url", "--push", remote])?;
        Ok(out.trim().to_string())
    }

    /// Set the push URL of `remote`; `secret` is scrubbed from error text.
    pub fn set_remote_push_url(&self, remote: &str, url: &str, secret: Option<&str>) -> Result<()> {
        self.run_checked_redacted(&["remote", "set-url", "--push", remote, url], secret)?;
        Ok(())
    }

    /// Push `branch` to `remote`; `secret` is scrubbed from error text.
    #[instrument(skip_all, fields(remote = remote, branch = branch))]
    pub fn push(&self, remote: &str, branch: &str, secret: Option<&str>) -> Result<()> {
        debug!("pushing");
        let refspec = format!("HEAD:refs/heads/{branch}");
        self.run_checked_redacted(&["push", "--quiet", remote, &refspec], secret)?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        self.run_checked_redacted(args, None)
    }

    fn run_checked_redacted(&self, args: &[&str], secret: Option<&str>) -> Result<Output> {
        let shown = redact(&args.join(" "), secret);
        let output = base_command()
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {shown}"))?;
        if !output.status.success() {
            let stderr = redact(String::from_utf8_lossy(&output.stderr).trim(), secret);
            return Err(anyhow!("git {shown} failed: {stderr}"));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        base_command()
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn base_command() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

/// Replace every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, REDACTED),
        _ => text.to_string(),
    }
}
