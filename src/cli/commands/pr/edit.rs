//! `azdo pr edit`

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::output::{self, ColorScheme};
use crate::client::types::UpdatePullRequest;
use crate::error::CliError;

use super::{full_ref, select, SelectorArgs};

/// Arguments for `azdo pr edit`
#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// New title
    #[arg(short = 't', long)]
    pub title: Option<String>,

    /// New body
    #[arg(short = 'b', long, conflicts_with = "editor")]
    pub body: Option<String>,

    /// Edit the body in your editor
    #[arg(short = 'e', long)]
    pub editor: bool,

    /// New base branch
    #[arg(short = 'B', long, value_name = "BRANCH")]
    pub base: Option<String>,

    /// Convert to a draft
    #[arg(long, conflicts_with = "ready")]
    pub draft: bool,

    /// Mark a draft as ready for review
    #[arg(long)]
    pub ready: bool,
}

/// Execute `pr edit`
pub async fn execute(factory: Arc<Factory>, args: EditArgs) -> Result<()> {
    let nothing = args.title.is_none()
        && args.body.is_none()
        && !args.editor
        && args.base.is_none()
        && !args.draft
        && !args.ready;
    if nothing {
        return Err(CliError::flag("specify at least one of --title, --body, --editor, --base, --draft or --ready").into());
    }

    let selected = select(&factory, &args.selector).await?;
    let pr = &selected.pr;

    let mut description = args.body.clone();
    if args.editor {
        let current = pr.description.clone().unwrap_or_default();
        description = Some(factory.edit_text(&current).await?);
    }

    let update = UpdatePullRequest {
        title: args.title.clone(),
        description,
        target_ref_name: args.base.as_deref().map(full_ref),
        is_draft: match (args.draft, args.ready) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        ..UpdatePullRequest::default()
    };
    let updated = selected
        .client
        .git()
        .update_pull_request(
            &selected.repo.project,
            &selected.repo.repository,
            pr.pull_request_id,
            &update,
        )
        .await?;

    let cs = ColorScheme::new(factory.io());
    output::success(
        factory.io(),
        &format!(
            "Edited pull request {} {}",
            cs.bold(&format!("#{}", updated.pull_request_id)),
            updated.title
        ),
    );
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("edit", "Edit a pull request", factory, execute)
        .example("azdo pr edit 23 --title \"I found a bug\" --body \"Nothing works\"")
        .example("azdo pr edit --ready")
}
