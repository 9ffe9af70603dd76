//! Pull request commands
//!
//! Every leaf takes `-R/--repo [ORG/]PROJECT/REPO` and falls back to the
//! repository of the current working copy. Leaves that act on one pull
//! request accept its number, or pick the active pull request whose source
//! is the checked-out branch.

mod checkout;
mod create;
mod diff;
mod edit;
mod list;
mod merge;
mod state;
mod view;

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::client::types::{PullRequest, PullRequestQuery};
use crate::client::AzdoClient;
use crate::core::scope::RepoRef;
use crate::error::CliError;

/// Fields offered by `--json` on pull request leaves
pub const PR_FIELDS: &[&str] = &[
    "pullRequestId",
    "title",
    "description",
    "sourceRefName",
    "targetRefName",
    "status",
    "createdBy",
    "creationDate",
    "closedDate",
    "isDraft",
    "mergeStatus",
    "labels",
    "reviewers",
    "repository",
    "lastMergeSourceCommit",
    "url",
];

/// `-R/--repo`
#[derive(Args, Debug, Clone, Default)]
pub struct RepoArgs {
    /// Select another repository using the [ORGANIZATION/]PROJECT/REPO format
    #[arg(short = 'R', long = "repo", value_name = "[ORGANIZATION/]PROJECT/REPO")]
    pub repo: Option<String>,
}

/// Optional pull request number
#[derive(Args, Debug, Clone, Default)]
pub struct SelectorArgs {
    /// Pull request number; defaults to the pull request of the current branch
    #[arg(value_name = "NUMBER")]
    pub number: Option<u64>,

    #[command(flatten)]
    pub repo: RepoArgs,
}

/// Branch name without `refs/heads/`
pub fn short_branch(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

/// Fully qualified branch reference
pub fn full_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}

/// Identity ID for `@me`, an ID, or a user name or email
pub async fn identity_id(client: &AzdoClient, input: &str) -> Result<String> {
    if input == "@me" {
        return Ok(client.core().connection_data().await?.authenticated_user.id);
    }
    if uuid::Uuid::parse_str(input).is_ok() {
        return Ok(input.to_string());
    }
    let subjects = client.graph().query_subjects(input, None).await?;
    let subject = subjects
        .into_iter()
        .next()
        .ok_or_else(|| CliError::NotFound(format!("no user or group matches {input:?}")))?;
    let identities = client
        .identities()
        .by_subject_descriptors(&[subject.descriptor])
        .await?;
    identities
        .into_iter()
        .next()
        .map(|i| i.id)
        .ok_or_else(|| CliError::NotFound(format!("no identity found for {input:?}")).into())
}

/// A pull request together with where it lives
pub struct Selected {
    pub repo: RepoRef,
    pub client: AzdoClient,
    pub pr: PullRequest,
}

/// Resolve the pull request a leaf acts on
pub async fn select(factory: &Factory, args: &SelectorArgs) -> Result<Selected> {
    let repo = factory.repo_ref(args.repo.repo.as_deref()).await?;
    let client = factory.client(&repo.organization)?;
    let pr = match args.number {
        Some(id) => match client.git().pull_request(id).await {
            Ok(pr) => pr,
            Err(e) if e.is_not_found() => {
                return Err(CliError::NotFound(format!("pull request #{id} not found in {repo}")).into())
            }
            Err(e) => return Err(e.into()),
        },
        None => {
            let branch = factory.git()?.current_branch().await?;
            let query = PullRequestQuery {
                status: "active".to_string(),
                source_ref_name: Some(full_ref(&branch)),
                top: 1,
                ..PullRequestQuery::default()
            };
            client
                .git()
                .pull_requests(&repo.project, &repo.repository, &query)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    CliError::NotFound(format!("no open pull request found for branch {branch:?} in {repo}"))
                })?
        }
    };
    Ok(Selected { repo, client, pr })
}

/// Web address of a pull request
pub fn web_url(pr: &PullRequest, repo: &RepoRef, org_url: &url::Url) -> String {
    match pr.repository.as_ref().filter(|r| !r.web_url.is_empty()) {
        Some(repository) => format!("{}/pullrequest/{}", repository.web_url, pr.pull_request_id),
        None => format!(
            "{}/{}/_git/{}/pullrequest/{}",
            org_url.as_str().trim_end_matches('/'),
            crate::client::segment(&repo.project),
            crate::client::segment(&repo.repository),
            pr.pull_request_id
        ),
    }
}

/// `azdo pr`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("pr", "Manage pull requests")
        .long_about(
            "Work with Azure DevOps pull requests.\n\n\
             A pull request can be supplied as argument in the form of its number.\n\
             Without one, the pull request of the current branch is used.",
        )
        .child(list::command(factory))
        .child(create::command(factory))
        .child(edit::command(factory))
        .child(view::command(factory))
        .child(checkout::command(factory))
        .child(state::close_command(factory))
        .child(state::reopen_command(factory))
        .child(merge::command(factory))
        .child(diff::command(factory))
}
