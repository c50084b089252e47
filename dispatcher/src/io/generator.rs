//! CI configuration generator abstraction.
//!
//! The [`Generator`] trait decouples the rerender stage from the external
//! `conda smithy` tool. Tests use scripted generators that commit canned
//! changes without spawning processes.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::GeneratorConfig;
use crate::io::process::run_command;

/// Regenerates CI configuration in a feedstock checkout.
///
/// A generator that changes anything commits its own work. `Err` means the
/// tool failed (spawn error, timeout, or non-zero exit).
pub trait Generator {
    fn generate(&self, workdir: &Path) -> Result<()>;
}

/// Runs the configured rerender command (`conda smithy rerender` by default).
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("generator command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: config.timeout_secs.map(Duration::from_secs),
            output_limit_bytes: config.output_limit_bytes,
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.map(|t| t.as_secs())))]
    fn generate(&self, workdir: &Path) -> Result<()> {
        let shown = self.display();
        info!(command = %shown, workdir = %workdir.display(), "running generator");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(workdir);
        let output = run_command(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {shown}"))?;

        let stdout = output.stdout_lossy();
        let stderr = output.stderr_lossy();
        if !stdout.trim().is_empty() {
            info!(stdout = %stdout.trim_end(), "generator stdout");
        }
        if !stderr.trim().is_empty() {
            info!(stderr = %stderr.trim_end(), "generator stderr");
        }

        if output.timed_out {
            warn!("generator timed out");
            return Err(anyhow!("{shown} timed out after {:?}", self.timeout));
        }
        if !output.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(anyhow!(
                "{shown} failed with status {:?}",
                output.status.code()
            ));
        }

        debug!("generator completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &[&str]) -> GeneratorConfig {
        GeneratorConfig {
            command: command.iter().map(|arg| arg.to_string()).collect(),
            timeout_secs: None,
            output_limit_bytes: 1000,
        }
    }

    #[test]
    fn zero_exit_is_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let generator =
            CommandGenerator::from_config(&config(&["sh", "-c", "touch generated"])).expect("gen");
        generator.generate(temp.path()).expect("generate");
        assert!(temp.path().join("generated").exists());
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let generator =
            CommandGenerator::from_config(&config(&["sh", "-c", "exit 2"])).expect("gen");
        let err = generator.generate(temp.path()).unwrap_err();
        assert!(err.to_string().contains("failed with status Some(2)"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let generator =
            CommandGenerator::from_config(&config(&["definitely-not-a-real-tool-xyz"]))
                .expect("gen");
        assert!(generator.generate(temp.path()).is_err());
    }

    #[test]
    fn default_command_is_smithy_rerender() {
        let generator =
            CommandGenerator::from_config(&GeneratorConfig::default()).expect("gen");
        assert_eq!(
            generator.display(),
            "conda smithy rerender -c auto --no-check-uptodate"
        );
    }
}
