//! `conda-forge.yml` handling.
//!
//! The bot only ever toggles `conda_forge_output_validation`. All other keys
//! are carried through unchanged (key order is preserved, comments are not).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

pub const FORGE_CONFIG_FILE: &str = "conda-forge.yml";
pub const OUTPUT_VALIDATION_KEY: &str = "conda_forge_output_validation";

/// Parsed `conda-forge.yml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForgeConfig {
    entries: Mapping,
}

impl ForgeConfig {
    /// Parse file contents. Empty documents are treated as an empty mapping.
    pub fn parse(contents: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(contents).context("parse conda-forge.yml")?;
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(entries) => Ok(Self { entries }),
            other => Err(anyhow!(
                "conda-forge.yml must be a mapping, found {}",
                kind_name(&other)
            )),
        }
    }

    /// Read `conda-forge.yml` from a feedstock root; missing file is empty.
    pub fn load(feedstock_dir: &Path) -> Result<Self> {
        let path = config_path(feedstock_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("load {}", path.display()))
    }

    pub fn write(&self, feedstock_dir: &Path) -> Result<()> {
        let path = config_path(feedstock_dir);
        let contents = serde_yaml::to_string(&self.entries).context("serialize conda-forge.yml")?;
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// YAML truthiness of the flag. Absent, null, false, 0 and "" are off.
    pub fn output_validation(&self) -> bool {
        match self.entries.get(OUTPUT_VALIDATION_KEY) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Sequence(seq)) => !seq.is_empty(),
            Some(Value::Mapping(map)) => !map.is_empty(),
            Some(Value::Tagged(_)) => true,
        }
    }

    /// Turn the flag on. Returns true if this changed the config.
    pub fn enable_output_validation(&mut self) -> bool {
        if self.output_validation() {
            return false;
        }
        self.entries.insert(
            Value::String(OUTPUT_VALIDATION_KEY.to_string()),
            Value::Bool(true),
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }
}

/// Make sure output validation is on, rewriting the file when it is not.
///
/// Returns true when the file was written.
#[instrument(skip_all)]
pub fn ensure_output_validation(feedstock_dir: &Path) -> Result<bool> {
    let mut cfg = ForgeConfig::load(feedstock_dir)?;
    if !cfg.enable_output_validation() {
        debug!("output validation already on");
        return Ok(false);
    }
    cfg.write(feedstock_dir)?;
    debug!("enabled output validation");
    Ok(true)
}

fn config_path(feedstock_dir: &Path) -> PathBuf {
    feedstock_dir.join(FORGE_CONFIG_FILE)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
