//! Dispatch orchestration.
//!
//! One run handles one request:
//!
//! ```text
//! fetch PR -> reject if closed -> clone head branch
//!   -> mutate (rerender | version update) -> publish -> notify
//!   -> [version update pushed] rerender -> publish -> notify
//! ```
//!
//! Every stage ends in exactly one notice decision. A stage that errors or
//! cannot push stops the run and fails it.

use tracing::{error, info, instrument, warn};

use crate::core::notice::{CommentContext, Notice, Stage};
use crate::core::outcome::{Action, MutationOutcome, PushStatus};
use crate::core::request::MutationRequest;
use crate::error::DispatchError;
use crate::exit_codes;
use crate::io::config::DispatchConfig;
use crate::io::generator::Generator;
use crate::io::github::{PullRequestHandle, RepositoryHost};
use crate::io::patcher::RecipePatcher;
use crate::io::publish::{Credential, publish};
use crate::io::workspace::WorkingCopy;
use crate::notify::notify;
use crate::rerender::RerenderExecutor;
use crate::resolve::ResolverChain;
use crate::update::VersionUpdateExecutor;

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: MutationOutcome,
    pub push: PushStatus,
    pub notice: Notice,
}

impl StageReport {
    pub fn failed(&self) -> bool {
        self.outcome.is_errored() || self.push.is_failed()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn failed(&self) -> bool {
        self.stages.iter().any(StageReport::failed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed() {
            exit_codes::FAILED
        } else {
            exit_codes::OK
        }
    }
}

/// Collaborators shared by every stage of a run.
pub struct Pipeline<'a, H, G, P>
where
    H: RepositoryHost,
    G: Generator + ?Sized,
    P: RecipePatcher + ?Sized,
{
    pub config: &'a DispatchConfig,
    pub host: &'a H,
    pub generator: &'a G,
    pub resolver: &'a ResolverChain<'a>,
    pub patcher: &'a P,
    pub credential: &'a Credential,
    /// Workflow run that is processing the event, if known.
    pub run_id: Option<&'a str>,
}

impl<'a, H, G, P> Pipeline<'a, H, G, P>
where
    H: RepositoryHost,
    G: Generator + ?Sized,
    P: RecipePatcher + ?Sized,
{
    #[instrument(skip_all, fields(action = %request.action(), repo = %request.repo(), pr = request.pr_number()))]
    pub fn run(&self, request: &MutationRequest) -> Result<RunReport, DispatchError> {
        let pull = self
            .host
            .pull_request(request.repo(), request.pr_number())?;
        if pull.is_closed() {
            return Err(DispatchError::State(closed_message(request.action()).to_string()));
        }
        info!(labels = ?pull.labels(), "processing pull request");

        let head = pull.head().clone();
        let copy = WorkingCopy::clone_pull(&self.config.git_server_url, &head, &self.config.commit)?;

        let run_link = self.run_link(request);
        let ctx = CommentContext {
            head_branch: &head.branch,
            head_owner: &head.repo.owner,
            head_repo: &head.repo.name,
            run_link: run_link.as_deref(),
            local_rerender_docs: &self.config.local_rerender_docs,
        };

        let mut report = RunReport::default();
        match request.action() {
            Action::Rerender => {
                let outcome = self.rerender(&copy);
                report
                    .stages
                    .push(self.finish_stage(&copy, &pull, Stage::Primary(Action::Rerender), outcome, &ctx)?);
            }
            Action::VersionUpdate => {
                let outcome = VersionUpdateExecutor::new(self.resolver, self.patcher).update_version(
                    copy.git(),
                    request.repo().package_name(),
                    request.explicit_version(),
                );
                let stage = self.finish_stage(
                    &copy,
                    &pull,
                    Stage::Primary(Action::VersionUpdate),
                    outcome,
                    &ctx,
                )?;
                let pushed = stage.push == PushStatus::Pushed;
                report.stages.push(stage);

                if pushed {
                    let outcome = self.rerender(&copy);
                    report.stages.push(self.finish_stage(
                        &copy,
                        &pull,
                        Stage::TrailingRerender,
                        outcome,
                        &ctx,
                    )?);
                }
            }
        }

        if report.failed() {
            error!("dispatch finished with errors");
        } else {
            info!("dispatch finished");
        }
        Ok(report)
    }

    fn rerender(&self, copy: &WorkingCopy) -> MutationOutcome {
        RerenderExecutor::new(
            self.generator,
            &self.config.workflow_dir,
            &self.config.local_rerender_docs,
        )
        .rerender(copy.git(), self.credential.can_write_workflows())
    }

    /// Publish a changed stage, then post its notice.
    fn finish_stage(
        &self,
        copy: &WorkingCopy,
        pull: &H::Pull,
        stage: Stage,
        outcome: MutationOutcome,
        ctx: &CommentContext<'_>,
    ) -> Result<StageReport, DispatchError> {
        info!(stage = ?stage, outcome = ?outcome, "stage finished");
        let push = if outcome.is_changed() {
            match publish(
                copy.git(),
                self.credential,
                &self.config.git_server_url,
                pull.head(),
            ) {
                Ok(()) => PushStatus::Pushed,
                Err(err) => {
                    warn!(err = %err, "push failed");
                    PushStatus::Failed(err.to_string())
                }
            }
        } else {
            PushStatus::NotAttempted
        };
        let notice = notify(pull, stage, &outcome, &push, ctx)?;
        Ok(StageReport {
            stage,
            outcome,
            push,
            notice,
        })
    }

    fn run_link(&self, request: &MutationRequest) -> Option<String> {
        self.run_id.map(|id| {
            format!(
                "{}/{}/actions/runs/{id}",
                self.config.git_server_url.trim_end_matches('/'),
                request.repo()
            )
        })
    }
}

fn closed_message(action: Action) -> &'static str {
    match action {
        Action::Rerender => "Closed PRs cannot be rerendered!",
        Action::VersionUpdate => "Closed PRs cannot have their version updated!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(outcome: MutationOutcome, push: PushStatus) -> StageReport {
        StageReport {
            stage: Stage::Primary(Action::Rerender),
            outcome,
            push,
            notice: Notice {
                comment: None,
                close: false,
            },
        }
    }

    #[test]
    fn run_fails_when_any_stage_failed() {
        let ok = RunReport {
            stages: vec![stage(MutationOutcome::changed(), PushStatus::Pushed)],
        };
        assert_eq!(ok.exit_code(), exit_codes::OK);

        let push_failed = RunReport {
            stages: vec![stage(
                MutationOutcome::changed(),
                PushStatus::Failed("denied".to_string()),
            )],
        };
        assert_eq!(push_failed.exit_code(), exit_codes::FAILED);

        let trailing_failed = RunReport {
            stages: vec![
                stage(MutationOutcome::changed(), PushStatus::Pushed),
                stage(
                    MutationOutcome::Errored(crate::core::outcome::MutationError::Execution(
                        "exit 1".to_string(),
                    )),
                    PushStatus::NotAttempted,
                ),
            ],
        };
        assert_eq!(trailing_failed.exit_code(), exit_codes::FAILED);
    }

    #[test]
    fn unchanged_run_is_ok() {
        let report = RunReport {
            stages: vec![stage(MutationOutcome::Unchanged, PushStatus::NotAttempted)],
        };
        assert!(!report.failed());
    }

    #[test]
    fn closed_messages_name_the_action() {
        assert!(closed_message(Action::Rerender).contains("rerendered"));
        assert!(closed_message(Action::VersionUpdate).contains("version updated"));
    }
}
