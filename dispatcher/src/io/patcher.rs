//! Recipe rewriting for a new upstream version.

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::core::outcome::MutationError;
use crate::core::recipe::{self, RecipeConfig};
use crate::io::http::Fetch;

/// Result of patching a recipe. Text is only usable when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchResult {
    pub text: Option<String>,
    pub errors: Vec<String>,
}

impl PatchResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            text: None,
            errors: vec![error.into()],
        }
    }

    /// Collapse into the patched text or a patch error. Partial results are
    /// never returned.
    pub fn into_result(self) -> Result<String, MutationError> {
        match (self.text, self.errors.is_empty()) {
            (Some(text), true) => Ok(text),
            (_, false) => Err(MutationError::Patch(self.errors.join("; "))),
            (None, true) => Err(MutationError::Patch("no recipe produced".to_string())),
        }
    }
}

pub trait RecipePatcher {
    fn patch(&self, recipe: &str, new_version: &str) -> PatchResult;

    fn bump_build_number(&self, recipe: &str, number: u32) -> String {
        recipe::set_build_number(recipe, number)
    }
}

/// Sets the version and recomputes source checksums from the new archives.
pub struct RecipeUpdater<'a, F: Fetch + ?Sized> {
    fetch: &'a F,
}

impl<'a, F: Fetch + ?Sized> RecipeUpdater<'a, F> {
    pub fn new(fetch: &'a F) -> Self {
        Self { fetch }
    }

    fn checksum(&self, mirrors: &[String]) -> Result<String, String> {
        let mut failures = Vec::new();
        for url in mirrors {
            match self.fetch.get_bytes(url) {
                Ok(Some(bytes)) => {
                    debug!(%url, size = bytes.len(), "downloaded source");
                    return Ok(hex::encode(Sha256::digest(&bytes)));
                }
                Ok(None) => failures.push(format!("{url}: not found")),
                Err(err) => {
                    warn!(%url, err = %format!("{err:#}"), "source download failed");
                    failures.push(format!("{url}: {err:#}"));
                }
            }
        }
        Err(format!("could not download source ({})", failures.join(", ")))
    }
}

impl<F: Fetch + ?Sized> RecipePatcher for RecipeUpdater<'_, F> {
    #[instrument(skip_all, fields(new_version = new_version))]
    fn patch(&self, recipe_text: &str, new_version: &str) -> PatchResult {
        let updated = match recipe::set_version(recipe_text, new_version) {
            Ok(text) => text,
            Err(err) => return PatchResult::failed(err.to_string()),
        };

        let slots = recipe::sha256_slots(&updated);
        if slots == 0 {
            info!("recipe has no literal checksums to update");
            return PatchResult {
                text: Some(updated),
                errors: Vec::new(),
            };
        }

        let parsed = RecipeConfig::parse(&updated);
        let sources = match parsed.render_sources(new_version) {
            Ok(sources) => sources,
            Err(err) => return PatchResult::failed(format!("{err:#}")),
        };
        if sources.len() != slots {
            return PatchResult::failed(format!(
                "recipe has {slots} sha256 checksums but {} sources",
                sources.len()
            ));
        }

        let mut hashes = Vec::with_capacity(sources.len());
        let mut errors = Vec::new();
        for mirrors in &sources {
            match self.checksum(mirrors) {
                Ok(hash) => hashes.push(hash),
                Err(err) => errors.push(err),
            }
        }
        if !errors.is_empty() {
            return PatchResult { text: None, errors };
        }

        match recipe::replace_sha256(&updated, &hashes) {
            Ok(text) => PatchResult {
                text: Some(text),
                errors: Vec::new(),
            },
            Err(err) => PatchResult::failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeFetch;

    const RECIPE: &str = "{% set version = \"1.0\" %}\n\
package:\n  name: pkg\n  version: {{ version }}\n\
source:\n  url: https://example.com/pkg-{{ version }}.tgz\n  sha256: 0000000000000000000000000000000000000000000000000000000000000000\n\
build:\n  number: 4\n";

    #[test]
    fn patch_updates_version_and_checksum() {
        let fetch = FakeFetch::default().with_bytes("https://example.com/pkg-1.1.tgz", b"abc");
        let result = RecipeUpdater::new(&fetch).patch(RECIPE, "1.1");
        let text = result.into_result().expect("patched");
        assert!(text.contains("{% set version = \"1.1\" %}"));
        assert!(text.contains(
            "sha256: ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        ));
        assert!(text.contains("number: 4"));
    }

    #[test]
    fn missing_archive_is_a_patch_error() {
        let fetch = FakeFetch::default();
        let result = RecipeUpdater::new(&fetch).patch(RECIPE, "1.1");
        assert!(result.text.is_none());
        let err = result.into_result().unwrap_err();
        assert_eq!(err.kind(), "patch");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn mirrors_are_tried_in_order() {
        let recipe = "{% set version = \"1.0\" %}\nsource:\n  url:\n    - https://a.example/x-{{ version }}.tgz\n    - https://b.example/x-{{ version }}.tgz\n  sha256: 0000000000000000000000000000000000000000000000000000000000000000\n";
        let fetch = FakeFetch::default().with_bytes("https://b.example/x-2.0.tgz", b"abc");
        let text = RecipeUpdater::new(&fetch)
            .patch(recipe, "2.0")
            .into_result()
            .expect("patched");
        assert!(text.contains("ba7816bf"));
    }

    #[test]
    fn recipe_without_version_fails_without_partial_text() {
        let fetch = FakeFetch::default();
        let result = RecipeUpdater::new(&fetch).patch("package:\n  name: pkg\n", "1.1");
        assert_eq!(result.text, None);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn build_number_bump_uses_recipe_edit() {
        let fetch = FakeFetch::default();
        let patcher = RecipeUpdater::new(&fetch);
        assert!(patcher.bump_build_number(RECIPE, 0).contains("number: 0"));
    }
}
