//! `azdo pr merge`

use anyhow::{anyhow, Result};
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::commands::{ask, wait_for, WaitArgs};
use crate::cli::context::Factory;
use crate::cli::output::{self, ColorScheme};
use crate::client::types::{CompletionOptions, PullRequest, UpdatePullRequest};
use crate::error::CliError;

use super::{select, short_branch, SelectorArgs};

/// Arguments for `azdo pr merge`
#[derive(Args, Debug)]
pub struct MergeArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Merge the commits with the base branch
    #[arg(short = 'm', long, group = "strategy")]
    pub merge: bool,

    /// Squash the commits into one commit and merge it into the base branch
    #[arg(short = 's', long, group = "strategy")]
    pub squash: bool,

    /// Rebase the commits onto the base branch
    #[arg(short = 'r', long, group = "strategy")]
    pub rebase: bool,

    /// Delete the source branch after merge
    #[arg(short = 'd', long)]
    pub delete_branch: bool,

    /// Commit message for the merge commit
    #[arg(long, value_name = "TEXT")]
    pub message: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,
}

/// Merge strategy as the service names it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Merge,
    Squash,
    Rebase,
}

impl Strategy {
    const ALL: [Strategy; 3] = [Strategy::Merge, Strategy::Squash, Strategy::Rebase];

    pub fn api_name(self) -> &'static str {
        match self {
            Self::Merge => "noFastForward",
            Self::Squash => "squash",
            Self::Rebase => "rebase",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Merge => "Create a merge commit",
            Self::Squash => "Squash and merge",
            Self::Rebase => "Rebase and fast-forward",
        }
    }

    fn from_flags(args: &MergeArgs) -> Option<Self> {
        if args.merge {
            Some(Self::Merge)
        } else if args.squash {
            Some(Self::Squash)
        } else if args.rebase {
            Some(Self::Rebase)
        } else {
            None
        }
    }
}

/// Whether a pull request can be completed right now
pub fn check_mergeable(pr: &PullRequest) -> Result<(), CliError> {
    let id = pr.pull_request_id;
    match pr.status.as_str() {
        "completed" => return Err(CliError::flag(format!("pull request #{id} was already merged"))),
        "abandoned" => return Err(CliError::flag(format!("pull request #{id} is closed"))),
        _ => {}
    }
    if pr.is_draft {
        return Err(CliError::flag(format!(
            "pull request #{id} is still a draft; run 'azdo pr edit {id} --ready' first"
        )));
    }
    if pr.merge_status.as_deref() == Some("conflicts") {
        return Err(CliError::flag(format!("pull request #{id} has merge conflicts")));
    }
    Ok(())
}

/// Execute `pr merge`
pub async fn execute(factory: Arc<Factory>, args: MergeArgs) -> Result<()> {
    let selected = select(&factory, &args.selector).await?;
    let pr = &selected.pr;
    check_mergeable(pr)?;

    let strategy = match Strategy::from_flags(&args) {
        Some(strategy) => strategy,
        None => {
            let options: Vec<String> = Strategy::ALL.iter().map(|s| s.label().to_string()).collect();
            let index = ask(&factory, "--merge, --squash or --rebase", move |p| {
                p.select("What merge method would you like to use?", Some(0), &options)
            })
            .await?;
            Strategy::ALL.get(index).copied().unwrap_or(Strategy::Merge)
        }
    };
    let last_commit = pr
        .last_merge_source_commit
        .clone()
        .ok_or_else(|| anyhow!("pull request #{} has no source commit to merge", pr.pull_request_id))?;

    let update = UpdatePullRequest {
        status: Some("completed".to_string()),
        last_merge_source_commit: Some(last_commit),
        completion_options: Some(CompletionOptions {
            merge_strategy: Some(strategy.api_name().to_string()),
            delete_source_branch: args.delete_branch,
            merge_commit_message: args.message.clone(),
        }),
        ..UpdatePullRequest::default()
    };
    let git = selected.client.git();
    git.update_pull_request(
        &selected.repo.project,
        &selected.repo.repository,
        pr.pull_request_id,
        &update,
    )
    .await?;

    let cs = ColorScheme::new(factory.io());
    let id = pr.pull_request_id;
    if args.wait.wait {
        wait_for(&factory, &args.wait, || {
            let git = selected.client.git();
            async move {
                let current = git.pull_request(id).await?;
                match (current.status.as_str(), current.merge_status.as_deref()) {
                    ("completed", _) => Ok(Some(current)),
                    (_, Some(status @ ("conflicts" | "failure" | "rejectedByPolicy"))) => {
                        Err(anyhow!("pull request #{id} could not be merged: {status}"))
                    }
                    _ => Ok(None),
                }
            }
        })
        .await?;
        output::success(
            factory.io(),
            &format!("Merged pull request {} {}", cs.bold(&format!("#{id}")), pr.title),
        );
    } else {
        output::success(
            factory.io(),
            &format!(
                "Completing pull request {} ({})",
                cs.bold(&format!("#{id}")),
                strategy.label().to_lowercase()
            ),
        );
    }
    if args.delete_branch {
        output::success(
            factory.io(),
            &format!("Deleted branch {}", short_branch(&pr.source_ref_name)),
        );
    }
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("merge", "Merge a pull request", factory, execute)
        .long_about(
            "Merge a pull request on Azure DevOps.\n\n\
             Without --merge, --squash or --rebase the merge method is asked for.\n\
             With --wait the command returns once the service has completed the merge.",
        )
        .example("azdo pr merge 42 --squash --delete-branch")
        .example("azdo pr merge --rebase --wait --timeout 2m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::pr::RepoArgs;
    use crate::cli::commands::testing::Harness;
    use crate::infra::prompter::Answer;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn args(number: u64) -> MergeArgs {
        MergeArgs {
            selector: SelectorArgs {
                number: Some(number),
                repo: RepoArgs::default(),
            },
            merge: false,
            squash: false,
            rebase: false,
            delete_branch: false,
            message: None,
            wait: WaitArgs::default(),
        }
    }

    fn active(id: u64) -> serde_json::Value {
        json!({
            "pullRequestId": id,
            "title": "Ship it",
            "status": "active",
            "sourceRefName": "refs/heads/ship",
            "mergeStatus": "succeeded",
            "lastMergeSourceCommit": {"commitId": "abc123"}
        })
    }

    #[test]
    fn test_check_mergeable() {
        let mut pr: PullRequest = serde_json::from_value(active(1)).unwrap();
        assert!(check_mergeable(&pr).is_ok());
        pr.is_draft = true;
        assert!(check_mergeable(&pr).unwrap_err().to_string().contains("still a draft"));
        pr.is_draft = false;
        pr.status = "completed".into();
        assert_eq!(
            check_mergeable(&pr).unwrap_err().to_string(),
            "pull request #1 was already merged"
        );
    }

    #[tokio::test]
    async fn test_squash_and_wait() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/git/pullrequests/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(active(3)))
            .up_to_n_times(1)
            .mount(&h.server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo/pullrequests/3"))
            .and(body_partial_json(json!({
                "status": "completed",
                "lastMergeSourceCommit": {"commitId": "abc123"},
                "completionOptions": {"mergeStrategy": "squash", "deleteSourceBranch": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(active(3)))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/git/pullrequests/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pullRequestId": 3, "status": "completed"
            })))
            .mount(&h.server)
            .await;

        let mut squash = args(3);
        squash.squash = true;
        squash.delete_branch = true;
        squash.wait.wait = true;
        execute(Arc::clone(&h.factory), squash).await.unwrap();
        assert!(h.err().contains("Merged pull request #3 Ship it"));
        assert!(h.err().contains("Deleted branch ship"));
    }

    #[tokio::test]
    async fn test_strategy_is_prompted() {
        let h = Harness::with_answers(vec![Answer::Select(2)]).await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/git/pullrequests/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(active(4)))
            .mount(&h.server)
            .await;
        Mock::given(method("PATCH"))
            .and(body_partial_json(json!({"completionOptions": {"mergeStrategy": "rebase"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(active(4)))
            .expect(1)
            .mount(&h.server)
            .await;

        execute(Arc::clone(&h.factory), args(4)).await.unwrap();
        assert_eq!(h.prompter.asked().len(), 1);
    }
}
