//! `azdo pr view`

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::printer::{FieldOpts, OutputFormat};
use crate::client::types::Reviewer;
use crate::core::pr_filter::display_merge_status;
use crate::infra::process;

use super::{select, short_branch, web_url, SelectorArgs, PR_FIELDS};

/// Arguments for `azdo pr view`
#[derive(Args, Debug)]
pub struct ViewArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Open the pull request in the browser
    #[arg(short = 'w', long)]
    pub web: bool,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Human name of a reviewer vote
pub fn vote_text(vote: i32) -> &'static str {
    match vote {
        10 => "approved",
        5 => "approved with suggestions",
        -5 => "waiting for author",
        -10 => "rejected",
        _ => "no vote",
    }
}

fn reviewer_line(reviewer: &Reviewer) -> String {
    let mut line = format!("{} ({})", reviewer.identity.display_name, vote_text(reviewer.vote));
    if reviewer.is_required {
        line.push_str(", required");
    }
    line
}

/// Execute `pr view`
pub async fn execute(factory: Arc<Factory>, args: ViewArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, PR_FIELDS)?;
    let selected = select(&factory, &args.selector).await?;
    let pr = &selected.pr;
    let url = web_url(pr, &selected.repo, selected.client.base_url());

    if args.web {
        if factory.io().is_stdout_tty() {
            writeln!(factory.io().err(), "Opening {url} in your browser.")?;
        }
        process::open_browser(factory.browser()?.as_deref(), &url).await?;
        return Ok(());
    }
    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), pr);
    }

    let reviewers: Vec<String> = pr.reviewers.iter().map(reviewer_line).collect();
    let mut printer = factory.printer(OutputFormat::List);
    printer.add_columns(&[
        "ID",
        "Title",
        "State",
        "Author",
        "Branches",
        "IsDraft",
        "MergeStatus",
        "Reviewers",
        "Labels",
        "URL",
        "Description",
    ]);
    printer.add_field(&pr.pull_request_id.to_string());
    printer.add_field_with(&pr.title, FieldOpts::no_truncate());
    printer.add_field(&pr.status);
    printer.add_field(&pr.created_by.display_name);
    printer.add_field(&format!(
        "{} <- {}",
        short_branch(&pr.target_ref_name),
        short_branch(&pr.source_ref_name)
    ));
    printer.add_field(if pr.is_draft { "true" } else { "false" });
    printer.add_field(display_merge_status(pr.merge_status.as_deref()));
    printer.add_field_with(&reviewers.join("; "), FieldOpts::no_truncate());
    printer.add_field(&pr.label_names().join(", "));
    printer.add_field_with(&url, FieldOpts::no_truncate());
    printer.add_field_with(pr.description.as_deref().unwrap_or(""), FieldOpts::no_truncate());
    printer.end_row();
    printer.render()?;
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("view", "View a pull request", factory, execute)
        .json_fields(PR_FIELDS)
        .example("azdo pr view 42")
        .example("azdo pr view --json title,reviewers --jq '.reviewers[].displayName'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::pr::RepoArgs;
    use crate::cli::commands::testing::Harness;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_vote_text() {
        assert_eq!(vote_text(10), "approved");
        assert_eq!(vote_text(-10), "rejected");
        assert_eq!(vote_text(0), "no vote");
    }

    #[tokio::test]
    async fn test_view_record() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/git/pullrequests/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pullRequestId": 9,
                "title": "Tidy up",
                "status": "active",
                "sourceRefName": "refs/heads/tidy",
                "targetRefName": "refs/heads/main",
                "createdBy": {"displayName": "Mona"},
                "reviewers": [{"displayName": "Hubot", "vote": 10, "isRequired": true}]
            })))
            .mount(&h.server)
            .await;

        execute(
            Arc::clone(&h.factory),
            ViewArgs {
                selector: SelectorArgs {
                    number: Some(9),
                    repo: RepoArgs::default(),
                },
                web: false,
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        let out = h.out();
        assert!(out.contains("main <- tidy"));
        assert!(out.contains("Hubot (approved), required"));
        assert!(out.contains("/contoso/myproj/_git/myrepo/pullrequest/9"));
    }
}
