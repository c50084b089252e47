//! Version update stage: bump the recipe to a newer upstream release.

use std::fs;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::outcome::{MutationError, MutationOutcome};
use crate::core::recipe::RecipeConfig;
use crate::io::git::Git;
use crate::io::patcher::RecipePatcher;
use crate::resolve::{Resolution, ResolverChain};

pub const RECIPE_PATH: &str = "recipe/meta.yaml";

/// Read and parse the recipe of a checkout.
pub fn load_recipe(git: &Git) -> Result<RecipeConfig> {
    let path = git.workdir().join(RECIPE_PATH);
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(RecipeConfig::parse(&raw))
}

pub fn commit_message(version: &str) -> String {
    format!("ENH updated version to {version}")
}

pub struct VersionUpdateExecutor<'a, P: RecipePatcher + ?Sized> {
    resolver: &'a ResolverChain<'a>,
    patcher: &'a P,
}

impl<'a, P: RecipePatcher + ?Sized> VersionUpdateExecutor<'a, P> {
    pub fn new(resolver: &'a ResolverChain<'a>, patcher: &'a P) -> Self {
        Self { resolver, patcher }
    }

    #[instrument(skip_all, fields(package = package, explicit = explicit_version))]
    pub fn update_version(
        &self,
        git: &Git,
        package: &str,
        explicit_version: Option<&str>,
    ) -> MutationOutcome {
        info!("computing feedstock attributes");
        let recipe = match load_recipe(git) {
            Ok(recipe) => recipe,
            Err(err) => return MutationError::execution(&err).into(),
        };

        let candidate = match self.resolver.resolve(package, &recipe, explicit_version) {
            Ok(Resolution::Candidate(candidate)) => candidate,
            Ok(Resolution::UpToDate { .. }) => return MutationOutcome::Unchanged,
            Err(err) => return MutationError::from(err).into(),
        };
        info!(version = %candidate.version, source = %candidate.source, "updating recipe");

        let patched = match self
            .patcher
            .patch(recipe.raw(), &candidate.version)
            .into_result()
        {
            Ok(text) => self.patcher.bump_build_number(&text, 0),
            Err(err) => return err.into(),
        };

        match write_and_commit(git, &patched, &candidate.version) {
            Ok(true) => MutationOutcome::changed(),
            Ok(false) if explicit_version.is_some() => MutationError::Execution(format!(
                "recipe is already at requested version {}, nothing to commit",
                candidate.version
            ))
            .into(),
            Ok(false) => {
                info!("patched recipe is identical, nothing to commit");
                MutationOutcome::Unchanged
            }
            Err(err) => MutationError::execution(&err).into(),
        }
    }
}

fn write_and_commit(git: &Git, recipe: &str, version: &str) -> Result<bool> {
    let path = git.workdir().join(RECIPE_PATH);
    fs::write(&path, recipe).with_context(|| format!("write {}", path.display()))?;
    git.add(&[RECIPE_PATH])?;
    git.commit_staged(&commit_message(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::patcher::RecipeUpdater;
    use crate::resolve::VersionSource;
    use crate::test_support::{FakeFetch, StaticSource, init_repo, write_recipe};

    fn chain(source: StaticSource) -> ResolverChain<'static> {
        ResolverChain::new(vec![Box::new(source) as Box<dyn VersionSource>])
    }

    #[test]
    fn newer_version_is_committed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = init_repo(temp.path()).expect("init");
        write_recipe(&git, "1.0", 2).expect("recipe");
        let before = git.head_sha().expect("head");

        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        let resolver = chain(StaticSource::version("a", "1.1"));
        let outcome =
            VersionUpdateExecutor::new(&resolver, &patcher).update_version(&git, "pkg", None);

        assert_eq!(outcome, MutationOutcome::changed());
        assert_ne!(git.head_sha().expect("head"), before);
        let recipe = load_recipe(&git).expect("load");
        assert_eq!(recipe.version(), Some("1.1"));
        assert!(recipe.raw().contains("number: 0"));
    }

    #[test]
    fn older_upstream_is_unchanged_without_commit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = init_repo(temp.path()).expect("init");
        write_recipe(&git, "1.1", 0).expect("recipe");
        let before = git.head_sha().expect("head");

        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        let resolver = chain(StaticSource::version("a", "1.0"));
        let outcome =
            VersionUpdateExecutor::new(&resolver, &patcher).update_version(&git, "pkg", None);

        assert_eq!(outcome, MutationOutcome::Unchanged);
        assert_eq!(git.head_sha().expect("head"), before);
    }

    #[test]
    fn explicit_older_version_still_commits() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = init_repo(temp.path()).expect("init");
        write_recipe(&git, "2.0", 1).expect("recipe");

        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        let resolver = chain(StaticSource::version("a", "3.0"));
        let outcome = VersionUpdateExecutor::new(&resolver, &patcher).update_version(
            &git,
            "pkg",
            Some("1.0"),
        );

        assert_eq!(outcome, MutationOutcome::changed());
        assert_eq!(load_recipe(&git).expect("load").version(), Some("1.0"));
    }

    #[test]
    fn explicit_current_version_is_errored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = init_repo(temp.path()).expect("init");
        write_recipe(&git, "1.0", 0).expect("recipe");
        let before = git.head_sha().expect("head");

        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        let resolver = chain(StaticSource::version("a", "2.0"));
        let outcome = VersionUpdateExecutor::new(&resolver, &patcher).update_version(
            &git,
            "pkg",
            Some("1.0"),
        );

        assert!(matches!(outcome, MutationOutcome::Errored(MutationError::Execution(_))));
        assert_eq!(git.head_sha().expect("head"), before);
    }

    #[test]
    fn resolution_failure_is_errored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = init_repo(temp.path()).expect("init");
        write_recipe(&git, "1.0", 0).expect("recipe");

        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        let resolver = chain(StaticSource::empty("a"));
        let outcome =
            VersionUpdateExecutor::new(&resolver, &patcher).update_version(&git, "pkg", None);

        assert!(matches!(outcome, MutationOutcome::Errored(MutationError::Resolution(_))));
    }

    #[test]
    fn missing_recipe_is_errored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = init_repo(temp.path()).expect("init");

        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        let resolver = chain(StaticSource::version("a", "1.1"));
        let outcome =
            VersionUpdateExecutor::new(&resolver, &patcher).update_version(&git, "pkg", None);

        assert!(matches!(outcome, MutationOutcome::Errored(MutationError::Execution(_))));
    }

    #[test]
    fn commit_message_names_version() {
        assert_eq!(commit_message("1.2.3"), "ENH updated version to 1.2.3");
    }
}
