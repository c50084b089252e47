//! Dispatcher configuration (optional TOML file passed with `--config`).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Dispatcher configuration (TOML).
///
/// Every field has a default matching the hosted conda-forge setup, so the
/// file only needs the values a deployment changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Base URL that repositories are cloned from and pushed to.
    pub git_server_url: String,

    /// REST API root of the repository host.
    pub api_url: String,

    /// Directory whose changes need the workflow permission to push.
    pub workflow_dir: String,

    /// Per-request timeout for HTTP calls, in seconds.
    pub http_timeout_secs: u64,

    /// Page linked from comments about rerendering locally.
    pub local_rerender_docs: String,

    pub generator: GeneratorConfig,

    pub commit: CommitIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command that regenerates CI configuration in the working copy.
    pub command: Vec<String>,

    /// Kill the generator after this many seconds. Unset means no limit.
    pub timeout_secs: Option<u64>,

    /// Keep at most this many bytes of generator stdout/stderr.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: ["conda", "smithy", "rerender", "-c", "auto", "--no-check-uptodate"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            timeout_secs: None,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "conda-forge-webservices[bot]".to_string(),
            email: "91080706+conda-forge-webservices[bot]@users.noreply.github.com".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            git_server_url: "https://github.com".to_string(),
            api_url: "https://api.github.com".to_string(),
            workflow_dir: ".github/workflows".to_string(),
            http_timeout_secs: 60,
            local_rerender_docs: "https://conda-forge.org/docs/maintainer/updating_pkgs.html\
                                  #rerendering-with-conda-smithy-locally"
                .to_string(),
            generator: GeneratorConfig::default(),
            commit: CommitIdentity::default(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.git_server_url.trim().is_empty() {
            return Err(anyhow!("git_server_url must be non-empty"));
        }
        if self.api_url.trim().is_empty() {
            return Err(anyhow!("api_url must be non-empty"));
        }
        if self.workflow_dir.trim().trim_matches('/').is_empty() {
            return Err(anyhow!("workflow_dir must name a directory"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.generator.command.is_empty() || self.generator.command[0].trim().is_empty() {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        if self.generator.timeout_secs == Some(0) {
            return Err(anyhow!("generator.timeout_secs must be > 0 when set"));
        }
        if self.generator.output_limit_bytes == 0 {
            return Err(anyhow!("generator.output_limit_bytes must be > 0"));
        }
        if self.commit.name.trim().is_empty() || self.commit.email.trim().is_empty() {
            return Err(anyhow!("commit.name and commit.email must be non-empty"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn generator_timeout(&self) -> Option<Duration> {
        self.generator.timeout_secs.map(Duration::from_secs)
    }
}

/// Load config from a TOML file.
///
/// `None` returns `DispatchConfig::default()`.
pub fn load_config(path: Option<&Path>) -> Result<DispatchConfig> {
    let Some(path) = path else {
        let cfg = DispatchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DispatchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
