//! Typed view of `recipe/meta.yaml` and the text edits applied to it.
//!
//! Recipes are Jinja-templated YAML with conda-build selectors, so they are
//! not parsed as YAML. The fields the bot needs are read line by line and
//! edits are applied with anchored regexes, leaving every other byte intact.

use std::cell::Cell;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, UndefinedBehavior, context};
use regex::{Captures, Regex};

/// Version recorded for recipes that do not declare one.
pub const DEFAULT_VERSION: &str = "0.0.0";

const CRAN_MIRROR: &str = "https://cran.r-project.org";

static SET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\{%-?\s*set\s+(\w+)\s*=\s*(.+?)\s*-?%\}[ \t]*$").unwrap()
});
static SET_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*\{%-?\s*set\s+version\s*=\s*)(["'])[^"']*(["'])(\s*-?%\})"#).unwrap()
});
static LITERAL_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*version:[ \t]*)(["']?)([^"'\s{#]+)(["']?)"#).unwrap()
});
static LITERAL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^[ \t]*name:[ \t]*["']?([^"'\s{#]+)"#).unwrap());
static SET_BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*\{%-?\s*set\s+(?:build|build_number|buildnumber)\s*=\s*)(["']?)\d+(["']?)(\s*-?%\})"#,
    )
    .unwrap()
});
static BUILD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*number:[ \t]*)\d+").unwrap());
static SHA256_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*(?:\{%-?\s*set\s+sha256\s*=\s*|sha256:[ \t]*)["']?)[0-9a-fA-F]{64}"#)
        .unwrap()
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)(?:-[ \t]+)?url:[ \t]*(.*)$").unwrap());
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)-[ \t]+(.*)$").unwrap());
static SELECTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+#.*$").unwrap());

/// A `{% set name = expr %}` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetVar {
    pub name: String,
    /// Right-hand side as written.
    pub expr: String,
    /// Full statement line.
    pub line: String,
}

impl SetVar {
    /// Literal string value, if the expression is a quoted string.
    pub fn literal(&self) -> Option<&str> {
        let expr = self.expr.trim();
        for quote in ['"', '\''] {
            if let Some(inner) = expr
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return Some(inner);
            }
        }
        None
    }
}

/// Attributes of a feedstock recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeConfig {
    raw: String,
    set_vars: Vec<SetVar>,
    name: Option<String>,
    version: Option<String>,
    sources: Vec<Vec<String>>,
}

impl RecipeConfig {
    pub fn parse(raw: &str) -> Self {
        let set_vars: Vec<SetVar> = SET_RE
            .captures_iter(raw)
            .map(|caps| SetVar {
                name: caps[1].to_string(),
                expr: caps[2].to_string(),
                line: caps[0].trim().to_string(),
            })
            .collect();

        let lookup = |key: &str| {
            set_vars
                .iter()
                .find(|var| var.name == key)
                .and_then(|var| var.literal())
                .map(str::to_string)
        };

        let version = lookup("version").or_else(|| {
            LITERAL_VERSION_RE
                .captures(raw)
                .map(|caps| caps[3].to_string())
        });
        let name = lookup("name").or_else(|| {
            LITERAL_NAME_RE
                .captures(raw)
                .map(|caps| caps[1].to_string())
        });

        Self {
            raw: raw.to_string(),
            sources: extract_sources(raw),
            set_vars,
            name,
            version,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Current version, or [`DEFAULT_VERSION`] when the recipe has none.
    pub fn version_or_default(&self) -> &str {
        self.version().unwrap_or(DEFAULT_VERSION)
    }

    pub fn set_vars(&self) -> &[SetVar] {
        &self.set_vars
    }

    /// Source entries in file order. Each entry lists its mirror URL
    /// templates as written.
    pub fn sources(&self) -> &[Vec<String>] {
        &self.sources
    }

    /// Every source URL template, mirrors included.
    pub fn source_urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.sources.iter().flatten().map(String::as_str)
    }

    /// Render every source entry with `version` substituted.
    pub fn render_sources(&self, version: &str) -> Result<Vec<Vec<String>>> {
        self.sources
            .iter()
            .map(|mirrors| {
                mirrors
                    .iter()
                    .map(|template| self.render_with_version(template, version))
                    .collect()
            })
            .collect()
    }

    /// Render one template against the recipe's `{% set %}` preamble, with
    /// the version variable replaced by `version`.
    pub fn render_with_version(&self, template: &str, version: &str) -> Result<String> {
        let version_literal =
            serde_json::to_string(version).context("encode version as jinja literal")?;
        let version_line = format!("{{% set version = {version_literal} %}}");
        let mut source = String::new();
        if !self.set_vars.iter().any(|var| var.name == "version") {
            source.push_str(&version_line);
        }
        for var in &self.set_vars {
            if var.name == "version" {
                source.push_str(&version_line);
            } else {
                source.push_str(&var.line);
            }
        }
        source.push_str(template);

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        let rendered = env
            .render_str(&source, context! { cran_mirror => CRAN_MIRROR })
            .with_context(|| format!("render template '{template}'"))?;
        Ok(rendered.trim().to_string())
    }
}

fn extract_sources(raw: &str) -> Vec<Vec<String>> {
    let mut sources = Vec::new();
    let mut lines = raw.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(caps) = URL_RE.captures(line) else {
            continue;
        };
        let value = clean_value(&caps[2]);
        if !value.is_empty() {
            sources.push(vec![value]);
            continue;
        }
        // `url:` followed by a list of mirrors.
        let indent = caps[1].len();
        let mut mirrors = Vec::new();
        while let Some(next) = lines.peek() {
            let Some(item) = LIST_ITEM_RE.captures(next) else {
                break;
            };
            if item[1].len() < indent {
                break;
            }
            let value = clean_value(&item[2]);
            if !value.is_empty() {
                mirrors.push(value);
            }
            lines.next();
        }
        if !mirrors.is_empty() {
            sources.push(mirrors);
        }
    }
    sources
}

fn clean_value(value: &str) -> String {
    let without_selector = SELECTOR_RE.replace(value, "");
    without_selector
        .trim()
        .trim_matches(|ch| ch == '"' || ch == '\'')
        .to_string()
}

/// Replace the recipe version with `new_version`.
///
/// Prefers the `{% set version = ... %}` statement and falls back to a
/// literal `version:` field.
pub fn set_version(text: &str, new_version: &str) -> Result<String> {
    if SET_VERSION_RE.is_match(text) {
        let updated = SET_VERSION_RE.replace(text, |caps: &Captures| {
            format!("{}{}{}{}{}", &caps[1], &caps[2], new_version, &caps[3], &caps[4])
        });
        return Ok(updated.into_owned());
    }
    if LITERAL_VERSION_RE.is_match(text) {
        let updated = LITERAL_VERSION_RE.replace(text, |caps: &Captures| {
            format!("{}{}{}{}", &caps[1], &caps[2], new_version, &caps[4])
        });
        return Ok(updated.into_owned());
    }
    Err(anyhow!("could not find the version in the recipe"))
}

/// Reset every literal build number to `number`.
pub fn set_build_number(text: &str, number: u32) -> String {
    let updated = SET_BUILD_RE.replace_all(text, |caps: &Captures| {
        format!("{}{}{}{}{}", &caps[1], &caps[2], number, &caps[3], &caps[4])
    });
    BUILD_NUMBER_RE
        .replace_all(&updated, |caps: &Captures| format!("{}{}", &caps[1], number))
        .into_owned()
}

/// Number of literal sha256 checksums in the recipe.
pub fn sha256_slots(text: &str) -> usize {
    SHA256_RE.find_iter(text).count()
}

/// Replace the literal sha256 checksums, in file order, with `hashes`.
pub fn replace_sha256(text: &str, hashes: &[String]) -> Result<String> {
    let slots = sha256_slots(text);
    if slots != hashes.len() {
        return Err(anyhow!(
            "recipe has {slots} sha256 checksums but {} were computed",
            hashes.len()
        ));
    }
    let index = Cell::new(0usize);
    let updated = SHA256_RE.replace_all(text, |caps: &Captures| {
        let i = index.get();
        index.set(i + 1);
        format!("{}{}", &caps[1], hashes[i])
    });
    Ok(updated.into_owned())
}
