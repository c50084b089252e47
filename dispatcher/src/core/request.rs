//! Immutable description of one dispatch request.

use std::fmt;

use anyhow::{Result, anyhow};

use crate::core::outcome::Action;

/// Sentinel some dispatchers send instead of omitting the version.
const NULL_VERSION: &str = "null";

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn parse(full_name: &str) -> Result<Self> {
        let (owner, name) = full_name
            .split_once('/')
            .ok_or_else(|| anyhow!("repository name '{full_name}' is not owner/name"))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(anyhow!("repository name '{full_name}' is not owner/name"));
        }
        Ok(Self::new(owner, name))
    }

    /// Package name of a feedstock repository (`numpy-feedstock` -> `numpy`).
    ///
    /// Only the last `-` separated segment is dropped, so `r-base-feedstock`
    /// maps to `r-base`.
    pub fn package_name(&self) -> &str {
        package_name_from_repo(&self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Package name for a repo given as `name` or `owner/name`.
pub fn package_name_from_repo(repo: &str) -> &str {
    let base = repo.rsplit('/').next().unwrap_or(repo);
    match base.rsplit_once('-') {
        Some((name, _)) => name,
        None => base,
    }
}

/// Normalise a user supplied version: blank and `"null"` mean absent.
pub fn normalize_explicit_version(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == NULL_VERSION {
        return None;
    }
    Some(raw.to_string())
}

/// What the bot was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    action: Action,
    pr_number: u64,
    repo: RepoId,
    explicit_version: Option<String>,
}

impl MutationRequest {
    pub fn new(
        action: Action,
        pr_number: u64,
        repo: RepoId,
        explicit_version: Option<&str>,
    ) -> Self {
        Self {
            action,
            pr_number,
            repo,
            explicit_version: normalize_explicit_version(explicit_version),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn pr_number(&self) -> u64 {
        self.pr_number
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn explicit_version(&self) -> Option<&str> {
        self.explicit_version.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_drops_last_segment() {
        assert_eq!(package_name_from_repo("numpy-feedstock"), "numpy");
        assert_eq!(package_name_from_repo("conda-forge/r-base-feedstock"), "r-base");
        assert_eq!(package_name_from_repo("plain"), "plain");
    }

    #[test]
    fn null_version_is_absent() {
        let repo = RepoId::new("conda-forge", "pkg-feedstock");
        let request = MutationRequest::new(Action::VersionUpdate, 7, repo.clone(), Some("null"));
        assert_eq!(request.explicit_version(), None);

        let request = MutationRequest::new(Action::VersionUpdate, 7, repo.clone(), Some(" "));
        assert_eq!(request.explicit_version(), None);

        let request = MutationRequest::new(Action::VersionUpdate, 7, repo, Some("1.2.3"));
        assert_eq!(request.explicit_version(), Some("1.2.3"));
    }

    #[test]
    fn repo_id_requires_owner_and_name() {
        assert_eq!(
            RepoId::parse("conda-forge/pkg-feedstock").expect("parse"),
            RepoId::new("conda-forge", "pkg-feedstock")
        );
        assert!(RepoId::parse("pkg-feedstock").is_err());
        assert!(RepoId::parse("a/b/c").is_err());
        assert!(RepoId::parse("/b").is_err());
    }
}
