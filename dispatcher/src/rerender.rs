//! Rerender stage: regenerate CI configuration in the working copy.

use tracing::{info, instrument, warn};

use crate::core::outcome::{MutationError, MutationOutcome};
use crate::io::forge_config::{FORGE_CONFIG_FILE, ensure_output_validation};
use crate::io::generator::Generator;
use crate::io::git::Git;
use crate::workflow_guard;

const VALIDATION_COMMIT_MESSAGE: &str = "MNT: turn on conda-forge output validation";

/// Runs the generator and classifies what it did.
pub struct RerenderExecutor<'a, G: Generator + ?Sized> {
    generator: &'a G,
    workflow_dir: &'a str,
    local_rerender_docs: &'a str,
}

impl<'a, G: Generator + ?Sized> RerenderExecutor<'a, G> {
    pub fn new(generator: &'a G, workflow_dir: &'a str, local_rerender_docs: &'a str) -> Self {
        Self {
            generator,
            workflow_dir,
            local_rerender_docs,
        }
    }

    #[instrument(skip_all, fields(can_write_workflows = can_write_workflows))]
    pub fn rerender(&self, git: &Git, can_write_workflows: bool) -> MutationOutcome {
        info!("rerendering");
        let flag_changed = match ensure_output_validation(git.workdir()) {
            Ok(true) => match git.add(&[FORGE_CONFIG_FILE]) {
                Ok(()) => true,
                Err(err) => return MutationError::execution(&err).into(),
            },
            Ok(false) => false,
            Err(err) => return MutationError::execution(&err).into(),
        };

        let before = match git.head_sha() {
            Ok(sha) => sha,
            Err(err) => return MutationError::execution(&err).into(),
        };

        if let Err(err) = self.generator.generate(git.workdir()) {
            warn!(err = %format!("{err:#}"), "generator failed");
            return MutationError::execution(&err).into();
        }

        let after = match git.head_sha() {
            Ok(sha) => sha,
            Err(err) => return MutationError::execution(&err).into(),
        };

        if after == before {
            if !flag_changed {
                info!("generator made no changes");
                return MutationOutcome::Unchanged;
            }
            // The generator left the staged config change uncommitted.
            return match git.commit_staged(VALIDATION_COMMIT_MESSAGE) {
                Ok(true) => MutationOutcome::changed(),
                Ok(false) => MutationOutcome::Unchanged,
                Err(err) => MutationError::execution(&err).into(),
            };
        }

        match workflow_guard::guard(
            git,
            self.workflow_dir,
            can_write_workflows,
            self.local_rerender_docs,
        ) {
            Ok(info) => MutationOutcome::Changed { info },
            Err(err) => MutationError::execution(&err).into(),
        }
    }
}
