//! Outcome types shared by the mutation stages.
//!
//! A stage either produced a commit, produced nothing, or failed. The
//! "changed and errored" combination cannot be expressed.

use std::fmt;

use thiserror::Error;

/// Dispatch action requested on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Rerender,
    VersionUpdate,
}

impl Action {
    /// Wire name used in dispatch payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Rerender => "rerender",
            Action::VersionUpdate => "version_update",
        }
    }

    /// Verb phrase used in user-facing comments ("I tried to ... for you").
    pub fn verb(self) -> &'static str {
        match self {
            Action::Rerender => "rerender",
            Action::VersionUpdate => "update the version",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rerender" => Some(Action::Rerender),
            "version_update" => Some(Action::VersionUpdate),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a mutation stage failed. All kinds surface identically to users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("could not resolve a new version: {0}")]
    Resolution(String),
    #[error("could not patch the recipe: {0}")]
    Patch(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

impl MutationError {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationError::Resolution(_) => "resolution",
            MutationError::Patch(_) => "patch",
            MutationError::Execution(_) => "execution",
        }
    }

    /// Wrap an adapter error, keeping its full context chain.
    pub fn execution(err: &anyhow::Error) -> Self {
        MutationError::Execution(format!("{err:#}"))
    }
}

/// Result of one mutation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A commit was produced; `info` is a non-fatal note for the user.
    Changed { info: Option<String> },
    /// The stage completed without anything to commit.
    Unchanged,
    Errored(MutationError),
}

impl MutationOutcome {
    pub fn changed() -> Self {
        MutationOutcome::Changed { info: None }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, MutationOutcome::Changed { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, MutationOutcome::Errored(_))
    }

    pub fn info(&self) -> Option<&str> {
        match self {
            MutationOutcome::Changed { info } => info.as_deref(),
            _ => None,
        }
    }
}

impl From<MutationError> for MutationOutcome {
    fn from(err: MutationError) -> Self {
        MutationOutcome::Errored(err)
    }
}

/// Result of the publish step for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    /// Nothing to push (stage did not change anything).
    NotAttempted,
    Pushed,
    Failed(String),
}

impl PushStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PushStatus::Failed(_))
    }
}
