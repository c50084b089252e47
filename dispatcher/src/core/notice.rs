//! Decide and render the user-facing notice for a finished stage.
//!
//! Every stage maps to at most one comment and an optional close:
//!
//! | outcome   | push     | comment              | close                 |
//! |-----------|----------|----------------------|-----------------------|
//! | changed   | ok       | info note, if any    | no                    |
//! | changed   | failed   | push failure         | no                    |
//! | errored   | -        | ran into issues      | no                    |
//! | unchanged | -        | nothing to do        | version update only   |
//!
//! The rerender that trails a version update stays silent when it has nothing
//! to do, so a successful bump produces no comment besides an info note.

use crate::core::outcome::{Action, MutationOutcome, PushStatus};

const GREETING: &str = "Hi! This is the friendly automated conda-forge-webservice.";

/// Which stage of a run produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Primary(Action),
    /// Rerender that follows a successful version update.
    TrailingRerender,
}

impl Stage {
    pub fn action(self) -> Action {
        match self {
            Stage::Primary(action) => action,
            Stage::TrailingRerender => Action::Rerender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentKind {
    InfoNote(String),
    PushFailed,
    Errored,
    NothingToDo { closing: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub comment: Option<CommentKind>,
    pub close: bool,
}

impl Notice {
    fn silent() -> Self {
        Self {
            comment: None,
            close: false,
        }
    }
}

/// Map a stage result to its notice.
pub fn decide(stage: Stage, outcome: &MutationOutcome, push: &PushStatus) -> Notice {
    match outcome {
        MutationOutcome::Changed { info } => {
            if push.is_failed() {
                return Notice {
                    comment: Some(CommentKind::PushFailed),
                    close: false,
                };
            }
            Notice {
                comment: info.clone().map(CommentKind::InfoNote),
                close: false,
            }
        }
        MutationOutcome::Errored(_) => Notice {
            comment: Some(CommentKind::Errored),
            close: false,
        },
        MutationOutcome::Unchanged => match stage {
            Stage::TrailingRerender => Notice::silent(),
            Stage::Primary(action) => {
                let closing = action == Action::VersionUpdate;
                Notice {
                    comment: Some(CommentKind::NothingToDo { closing }),
                    close: closing,
                }
            }
        },
    }
}

/// Pull request details quoted in comments.
#[derive(Debug, Clone)]
pub struct CommentContext<'a> {
    pub head_branch: &'a str,
    pub head_owner: &'a str,
    pub head_repo: &'a str,
    /// Link to the workflow run that produced the comment.
    pub run_link: Option<&'a str>,
    /// Documentation for rerendering locally.
    pub local_rerender_docs: &'a str,
}

pub fn render_comment(stage: Stage, kind: &CommentKind, ctx: &CommentContext<'_>) -> String {
    let action = stage.action();
    let verb = action.verb();
    let mut body = format!("{GREETING}\n\n");
    match kind {
        CommentKind::InfoNote(info) => {
            body.push_str(info);
            body.push('\n');
        }
        CommentKind::PushFailed => {
            body.push_str(&format!(
                "I tried to {verb} for you, but it looks like I wasn't able to push to the {} \
                 branch of {}/{}. Did you check the \"Allow edits from maintainers\" box?\n\n\
                 **NOTE**: PRs from organization accounts or PRs from forks made from \
                 organization forks cannot be modified by this bot because of GitHub \
                 permissions. Please fork the feedstock directly from conda-forge into your \
                 personal GitHub account.\n",
                ctx.head_branch, ctx.head_owner, ctx.head_repo
            ));
        }
        CommentKind::Errored => {
            let help = match action {
                Action::Rerender => format!(
                    " or you can try [rerendering locally]({})",
                    ctx.local_rerender_docs
                ),
                Action::VersionUpdate => String::new(),
            };
            body.push_str(&format!(
                "I tried to {verb} for you but ran into some issues. Please check the output \
                 logs of the latest webservices GitHub actions workflow run for errors. You can \
                 also ping conda-forge/core for further assistance{help}.\n"
            ));
        }
        CommentKind::NothingToDo { closing } => {
            body.push_str(&format!(
                "I tried to {verb} for you, but it looks like there was nothing to do.\n"
            ));
            if *closing {
                body.push_str("\nI am closing this PR!\n");
            }
        }
    }
    if let Some(link) = ctx.run_link {
        body.push_str(&format!(
            "\nThis message was generated by GitHub actions workflow run [{link}]({link}).\n"
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::MutationError;

    fn ctx(run_link: Option<&str>) -> CommentContext<'_> {
        CommentContext {
            head_branch: "bump",
            head_owner: "someone",
            head_repo: "pkg-feedstock",
            run_link,
            local_rerender_docs: "https://docs.example/rerender",
        }
    }

    #[test]
    fn success_without_info_is_silent() {
        let notice = decide(
            Stage::Primary(Action::Rerender),
            &MutationOutcome::changed(),
            &PushStatus::Pushed,
        );
        assert_eq!(notice, Notice::silent());
    }

    #[test]
    fn success_with_info_posts_note() {
        let outcome = MutationOutcome::Changed {
            info: Some("rerender locally".to_string()),
        };
        let notice = decide(Stage::TrailingRerender, &outcome, &PushStatus::Pushed);
        assert_eq!(
            notice.comment,
            Some(CommentKind::InfoNote("rerender locally".to_string()))
        );
        assert!(!notice.close);
    }

    #[test]
    fn push_failure_wins_over_info() {
        let outcome = MutationOutcome::Changed {
            info: Some("note".to_string()),
        };
        let notice = decide(
            Stage::Primary(Action::VersionUpdate),
            &outcome,
            &PushStatus::Failed("denied".to_string()),
        );
        assert_eq!(notice.comment, Some(CommentKind::PushFailed));
        assert!(!notice.close);
    }

    #[test]
    fn errors_never_close() {
        let outcome = MutationOutcome::Errored(MutationError::Resolution("none".to_string()));
        for stage in [
            Stage::Primary(Action::Rerender),
            Stage::Primary(Action::VersionUpdate),
            Stage::TrailingRerender,
        ] {
            let notice = decide(stage, &outcome, &PushStatus::NotAttempted);
            assert_eq!(notice.comment, Some(CommentKind::Errored));
            assert!(!notice.close);
        }
    }

    #[test]
    fn noop_closes_only_for_version_update() {
        let update = decide(
            Stage::Primary(Action::VersionUpdate),
            &MutationOutcome::Unchanged,
            &PushStatus::NotAttempted,
        );
        assert!(update.close);
        assert_eq!(
            update.comment,
            Some(CommentKind::NothingToDo { closing: true })
        );

        let rerender = decide(
            Stage::Primary(Action::Rerender),
            &MutationOutcome::Unchanged,
            &PushStatus::NotAttempted,
        );
        assert!(!rerender.close);
        assert_eq!(
            rerender.comment,
            Some(CommentKind::NothingToDo { closing: false })
        );
    }

    #[test]
    fn trailing_rerender_noop_is_silent() {
        let notice = decide(
            Stage::TrailingRerender,
            &MutationOutcome::Unchanged,
            &PushStatus::NotAttempted,
        );
        assert_eq!(notice, Notice::silent());
    }

    #[test]
    fn push_failure_comment_names_branch_and_fork() {
        let body = render_comment(
            Stage::Primary(Action::Rerender),
            &CommentKind::PushFailed,
            &ctx(None),
        );
        assert!(body.starts_with(GREETING));
        assert!(body.contains("push to the bump branch of someone/pkg-feedstock"));
        assert!(body.contains("Allow edits from maintainers"));
        assert!(!body.contains("generated by"));
    }

    #[test]
    fn rerender_error_links_local_docs() {
        let body = render_comment(
            Stage::Primary(Action::Rerender),
            &CommentKind::Errored,
            &ctx(None),
        );
        assert!(body.contains("[rerendering locally](https://docs.example/rerender)"));

        let body = render_comment(
            Stage::Primary(Action::VersionUpdate),
            &CommentKind::Errored,
            &ctx(None),
        );
        assert!(body.contains("I tried to update the version for you but ran into some issues"));
        assert!(!body.contains("rerendering locally"));
    }

    #[test]
    fn comments_carry_run_link() {
        let link = "https://github.com/org/pkg-feedstock/actions/runs/7";
        let body = render_comment(
            Stage::Primary(Action::VersionUpdate),
            &CommentKind::NothingToDo { closing: true },
            &ctx(Some(link)),
        );
        assert!(body.contains("there was nothing to do"));
        assert!(body.contains("I am closing this PR!"));
        assert!(body.contains(&format!("[{link}]({link})")));
    }
}
