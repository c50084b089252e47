//! Post the notice for a finished stage on the pull request.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::notice::{CommentContext, Notice, Stage, decide, render_comment};
use crate::core::outcome::{MutationOutcome, PushStatus};
use crate::io::github::PullRequestHandle;

/// Comment on (and possibly close) the pull request. Returns what was done.
#[instrument(skip_all, fields(stage = ?stage))]
pub fn notify<P: PullRequestHandle + ?Sized>(
    pull: &P,
    stage: Stage,
    outcome: &MutationOutcome,
    push: &PushStatus,
    ctx: &CommentContext<'_>,
) -> Result<Notice> {
    let notice = decide(stage, outcome, push);
    if let Some(kind) = &notice.comment {
        let body = render_comment(stage, kind, ctx);
        pull.post_comment(&body)
            .with_context(|| format!("comment on pull request #{}", pull.number()))?;
        info!(?kind, "commented");
    }
    if notice.close {
        pull.close()
            .with_context(|| format!("close pull request #{}", pull.number()))?;
        info!("closed pull request");
    }
    Ok(notice)
}
