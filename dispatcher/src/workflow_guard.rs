//! Keep workflow file changes out of commits the credential cannot push.
//!
//! Tokens without the workflow permission are rejected by the host when a
//! pushed commit touches the workflow directory. When that applies, the last
//! commit is rewritten without those paths and the user gets a note instead.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::diff::ChangeKind;
use crate::io::git::Git;

/// Revert workflow changes in the last commit if they cannot be pushed.
///
/// Returns the note for the user when anything was reverted.
#[instrument(skip_all, fields(workflow_dir = workflow_dir, can_write_workflows = can_write_workflows))]
pub fn guard(
    git: &Git,
    workflow_dir: &str,
    can_write_workflows: bool,
    local_rerender_docs: &str,
) -> Result<Option<String>> {
    if can_write_workflows {
        return Ok(None);
    }

    let diff = git
        .diff_paths("HEAD~1", "HEAD")
        .context("list paths changed by the last commit")?;
    let restricted = diff.under(workflow_dir);
    if restricted.is_empty() {
        return Ok(None);
    }

    let mut added = Vec::new();
    let mut restored = Vec::new();
    for entry in &restricted {
        match entry.kind {
            ChangeKind::Added => added.push(entry.path.as_str()),
            ChangeKind::Modified | ChangeKind::Deleted | ChangeKind::Other => {
                restored.push(entry.path.as_str())
            }
        }
    }
    info!(?added, ?restored, "dropping workflow changes from last commit");

    git.remove_paths(&added)
        .context("remove workflow files added by the last commit")?;
    git.checkout_paths("HEAD~1", &restored)
        .context("restore workflow files from the previous commit")?;
    git.amend_last_commit()
        .context("amend last commit without workflow changes")?;

    Ok(Some(workflow_note(workflow_dir, local_rerender_docs)))
}

pub fn workflow_note(workflow_dir: &str, local_rerender_docs: &str) -> String {
    format!(
        "Changes from rerendering for the workflow files in '{workflow_dir}' were not \
         committed because the GitHub Actions token does not have the correct permissions. \
         Please [rerender locally]({local_rerender_docs}) to update the workflows."
    )
}
