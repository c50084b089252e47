//! Upstream version sources.
//!
//! Each source decides from the recipe's source URLs whether it applies, then
//! asks its registry (or probes URLs) for the latest release.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::core::recipe::RecipeConfig;
use crate::io::http::Fetch;
use crate::resolve::VersionSource;

/// Upper bound on consecutive releases discovered by URL probing.
const MAX_PROBE_STEPS: usize = 16;

static PYPI_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/packages/source/[^/]/([^/]+)/").unwrap());
static NPM_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"registry\.npmjs\.org/((?:@[^/]+/)?[^/]+)/-/").unwrap());
static CRAN_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Za-z][A-Za-z0-9.]*)_[^/]+\.tar\.gz$").unwrap());
static GITHUB_REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com/([^/]+)/([^/]+)/").unwrap());

/// The sources in the order they are asked.
pub fn default_sources<'a>(
    fetch: &'a dyn Fetch,
    github_api_url: &str,
) -> Vec<Box<dyn VersionSource + 'a>> {
    vec![
        Box::new(PyPi { fetch }),
        Box::new(Cran { fetch }),
        Box::new(Npm { fetch }),
        Box::new(RawUrl { fetch }),
        Box::new(GithubReleases {
            fetch,
            api_url: github_api_url.trim_end_matches('/').to_string(),
        }),
        Box::new(IncrementAlpha { fetch }),
    ]
}

/// Source URLs rendered with the recipe's current version.
fn current_urls(recipe: &RecipeConfig) -> Result<Vec<String>> {
    let current = recipe.version_or_default();
    recipe
        .source_urls()
        .map(|template| recipe.render_with_version(template, current))
        .collect()
}

fn json_str<'v>(value: &'v Value, pointer: &str) -> Option<&'v str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn fetch_json(fetch: &dyn Fetch, url: &str) -> Result<Option<Value>> {
    let Some(body) = fetch.get_text(url)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&body).with_context(|| format!("parse json from {url}"))?;
    Ok(Some(value))
}

/// PyPI JSON API.
pub struct PyPi<'a> {
    fetch: &'a dyn Fetch,
}

impl VersionSource for PyPi<'_> {
    fn name(&self) -> &str {
        "PyPI"
    }

    fn try_resolve(&self, package: &str, recipe: &RecipeConfig) -> Result<Option<String>> {
        let urls = current_urls(recipe)?;
        let Some(url) = urls.iter().find(|url| {
            url.contains("pypi.io") || url.contains("pypi.org") || url.contains("pythonhosted.org")
        }) else {
            return Ok(None);
        };
        let project = PYPI_PATH_RE
            .captures(url)
            .map(|caps| caps[1].to_string())
            .or_else(|| recipe.name().map(str::to_string))
            .unwrap_or_else(|| package.to_string());
        debug!(%project, "querying pypi");
        let api = format!("https://pypi.org/pypi/{project}/json");
        let Some(doc) = fetch_json(self.fetch, &api)? else {
            return Ok(None);
        };
        Ok(json_str(&doc, "/info/version").map(str::to_string))
    }
}

/// CRAN package metadata from crandb.
pub struct Cran<'a> {
    fetch: &'a dyn Fetch,
}

impl VersionSource for Cran<'_> {
    fn name(&self) -> &str {
        "CRAN"
    }

    fn try_resolve(&self, package: &str, recipe: &RecipeConfig) -> Result<Option<String>> {
        if !recipe
            .source_urls()
            .any(|url| url.contains("cran_mirror") || url.contains("cran.r-project.org"))
        {
            return Ok(None);
        }
        let urls = current_urls(recipe)?;
        let cran_name = urls
            .iter()
            .find_map(|url| CRAN_FILE_RE.captures(url).map(|caps| caps[1].to_string()))
            .unwrap_or_else(|| package.strip_prefix("r-").unwrap_or(package).to_string());
        debug!(%cran_name, "querying crandb");
        let api = format!("https://crandb.r-pkg.org/{cran_name}");
        let Some(doc) = fetch_json(self.fetch, &api)? else {
            return Ok(None);
        };
        Ok(json_str(&doc, "/Version").map(str::to_string))
    }
}

/// npm registry `latest` dist-tag.
pub struct Npm<'a> {
    fetch: &'a dyn Fetch,
}

impl VersionSource for Npm<'_> {
    fn name(&self) -> &str {
        "NPM"
    }

    fn try_resolve(&self, _package: &str, recipe: &RecipeConfig) -> Result<Option<String>> {
        let urls = current_urls(recipe)?;
        let Some(npm_name) = urls
            .iter()
            .find_map(|url| NPM_PATH_RE.captures(url).map(|caps| caps[1].to_string()))
        else {
            return Ok(None);
        };
        debug!(%npm_name, "querying npm");
        let api = format!("https://registry.npmjs.org/{npm_name}");
        let Some(doc) = fetch_json(self.fetch, &api)? else {
            return Ok(None);
        };
        Ok(json_str(&doc, "/dist-tags/latest").map(str::to_string))
    }
}

/// Probe the recipe's URL template with incremented versions.
pub struct RawUrl<'a> {
    fetch: &'a dyn Fetch,
}

impl VersionSource for RawUrl<'_> {
    fn name(&self) -> &str {
        "RawURL"
    }

    fn try_resolve(&self, _package: &str, recipe: &RecipeConfig) -> Result<Option<String>> {
        probe(self.fetch, recipe, next_numeric_versions)
    }
}

/// Probe versions with the trailing letter incremented (`1.2a` -> `1.2b`).
pub struct IncrementAlpha<'a> {
    fetch: &'a dyn Fetch,
}

impl VersionSource for IncrementAlpha<'_> {
    fn name(&self) -> &str {
        "IncrementAlphaRawURL"
    }

    fn try_resolve(&self, _package: &str, recipe: &RecipeConfig) -> Result<Option<String>> {
        probe(self.fetch, recipe, next_alpha_versions)
    }
}

/// Latest release of the GitHub repository hosting the source archive.
pub struct GithubReleases<'a> {
    fetch: &'a dyn Fetch,
    api_url: String,
}

impl VersionSource for GithubReleases<'_> {
    fn name(&self) -> &str {
        "Github"
    }

    fn try_resolve(&self, package: &str, recipe: &RecipeConfig) -> Result<Option<String>> {
        let urls = current_urls(recipe)?;
        let Some((owner, repo)) = urls.iter().find_map(|url| {
            GITHUB_REPO_RE
                .captures(url)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        }) else {
            return Ok(None);
        };
        let api = format!("{}/repos/{owner}/{repo}/releases/latest", self.api_url);
        debug!(%api, "querying github releases");
        let Some(doc) = fetch_json(self.fetch, &api)? else {
            return Ok(None);
        };
        let Some(tag) = json_str(&doc, "/tag_name") else {
            return Ok(None);
        };
        Ok(Some(strip_tag_prefix(tag, &[&repo, package])))
    }
}

/// `v1.2`, `pkg-1.2`, `release-1.2` -> `1.2`.
fn strip_tag_prefix(tag: &str, names: &[&str]) -> String {
    let mut version = tag.trim();
    for name in names {
        if let Some(rest) = version.strip_prefix(name) {
            version = rest.trim_start_matches(['-', '_']);
        }
    }
    if let Some(rest) = version.strip_prefix("release-") {
        version = rest;
    }
    if let Some(rest) = version.strip_prefix(['v', 'V']) {
        if rest.starts_with(|ch: char| ch.is_ascii_digit()) {
            version = rest;
        }
    }
    version.to_string()
}

/// Walk forward from the current version as long as a probed URL exists.
fn probe(
    fetch: &dyn Fetch,
    recipe: &RecipeConfig,
    next: fn(&str) -> Vec<String>,
) -> Result<Option<String>> {
    let Some(template) = recipe.source_urls().next() else {
        return Ok(None);
    };
    let current = recipe.version_or_default().to_string();
    let current_url = recipe.render_with_version(template, &current)?;

    let mut found = current.clone();
    for _ in 0..MAX_PROBE_STEPS {
        let mut advanced = false;
        for candidate in next(&found) {
            let url = recipe.render_with_version(template, &candidate)?;
            if url == current_url {
                return Err(anyhow!("source url does not depend on the version"));
            }
            if fetch.exists(&url)? {
                debug!(%candidate, %url, "probed url exists");
                found = candidate;
                advanced = true;
                break;
            }
        }
        if !advanced {
            break;
        }
    }
    Ok((found != current).then_some(found))
}

/// Next versions from least to most significant bump.
///
/// `1.2.3` yields `1.2.4`, `1.3.0`, `1.3`, `2.0.0`, `2.0`, `2`.
fn next_numeric_versions(version: &str) -> Vec<String> {
    let parts: Vec<&str> = version.split('.').collect();
    let mut out = Vec::new();
    for index in (0..parts.len()).rev() {
        let Some(next) = parts[index]
            .parse::<u64>()
            .ok()
            .and_then(|number| number.checked_add(1))
        else {
            continue;
        };
        let mut bumped: Vec<String> = parts[..index].iter().map(|p| p.to_string()).collect();
        bumped.push(next.to_string());
        let kept = bumped.len();
        let zeros = parts.len() - kept;
        for pad in (0..=zeros).rev() {
            let mut full = bumped.clone();
            full.extend(std::iter::repeat_n("0".to_string(), pad));
            let candidate = full.join(".");
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    out
}

fn next_alpha_versions(version: &str) -> Vec<String> {
    let Some(last) = version.chars().last() else {
        return Vec::new();
    };
    if !last.is_ascii_lowercase() || last == 'z' {
        return Vec::new();
    }
    let stem = &version[..version.len() - 1];
    if !stem.ends_with(|ch: char| ch.is_ascii_digit()) {
        return Vec::new();
    }
    let next = char::from(last as u8 + 1);
    vec![format!("{stem}{next}")]
}
