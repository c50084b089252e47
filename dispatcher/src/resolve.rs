//! Upstream version resolution.
//!
//! Sources are asked in a fixed order and the first one with an answer wins.
//! Answers are never merged or compared across sources. An automatic answer
//! only counts if it is strictly newer than the recipe's current version.

use anyhow::Result;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::core::outcome::MutationError;
use crate::core::recipe::RecipeConfig;
use crate::core::version::{VersionParseError, is_newer};

/// Source name reported for versions given on the pull request.
pub const EXPLICIT_SOURCE: &str = "input_version";

/// One upstream registry or probing strategy.
pub trait VersionSource {
    fn name(&self) -> &str;

    /// Latest upstream version, or `None` when this source does not apply.
    fn try_resolve(&self, package: &str, recipe: &RecipeConfig) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    pub source: String,
    pub version: String,
    /// Position of the source in the chain (0 is asked first).
    pub priority: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Candidate(VersionCandidate),
    /// Upstream is not ahead of the recipe.
    UpToDate { current: String, latest: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("could not fetch latest version (tried {})", .tried.join(", "))]
    NotFound { tried: Vec<String> },
    #[error("cannot compare versions: {0}")]
    Compare(#[from] VersionParseError),
}

impl From<ResolutionError> for MutationError {
    fn from(err: ResolutionError) -> Self {
        MutationError::Resolution(err.to_string())
    }
}

/// Ordered list of version sources.
pub struct ResolverChain<'a> {
    sources: Vec<Box<dyn VersionSource + 'a>>,
}

impl<'a> ResolverChain<'a> {
    pub fn new(sources: Vec<Box<dyn VersionSource + 'a>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// First answer from the chain, without the newer-than check.
    #[instrument(skip_all, fields(package = package))]
    pub fn latest(
        &self,
        package: &str,
        recipe: &RecipeConfig,
    ) -> Result<VersionCandidate, ResolutionError> {
        for (priority, source) in self.sources.iter().enumerate() {
            match source.try_resolve(package, recipe) {
                Ok(Some(version)) => {
                    info!(source = source.name(), %version, "upstream version found");
                    return Ok(VersionCandidate {
                        source: source.name().to_string(),
                        version,
                        priority,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(source = source.name(), err = %format!("{err:#}"), "version source failed");
                }
            }
        }
        Err(ResolutionError::NotFound {
            tried: self
                .source_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Decide which version to update to.
    ///
    /// An explicit version is taken as is. Otherwise the chain is asked and
    /// its answer must be newer than the recipe's version (dashes compare
    /// like dots).
    pub fn resolve(
        &self,
        package: &str,
        recipe: &RecipeConfig,
        explicit: Option<&str>,
    ) -> Result<Resolution, ResolutionError> {
        let current = recipe.version_or_default();
        if let Some(version) = explicit {
            info!(current, input = version, "using input version");
            return Ok(Resolution::Candidate(VersionCandidate {
                source: EXPLICIT_SOURCE.to_string(),
                version: version.to_string(),
                priority: 0,
            }));
        }

        let candidate = self.latest(package, recipe)?;
        info!(current, latest = %candidate.version, "curr version|latest version");
        if !is_newer(&candidate.version, current)? {
            info!("not updating since new version is less or equal to current version");
            return Ok(Resolution::UpToDate {
                current: current.to_string(),
                latest: candidate.version,
            });
        }
        Ok(Resolution::Candidate(candidate))
    }
}
