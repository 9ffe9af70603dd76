//! `azdo pr create`

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::commands::ask;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::output::{self, ColorScheme};
use crate::client::types::{CreatePullRequest, IdentityId, LabelName};
use crate::error::CliError;

use super::{full_ref, identity_id, short_branch, web_url, RepoArgs, PR_FIELDS};

/// Arguments for `azdo pr create`
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Branch to merge into; defaults to the repository's default branch
    #[arg(short = 'B', long, value_name = "BRANCH")]
    pub base: Option<String>,

    /// Branch containing the changes; defaults to the current branch
    #[arg(short = 'H', long, value_name = "BRANCH")]
    pub head: Option<String>,

    /// Title for the pull request
    #[arg(short = 't', long)]
    pub title: Option<String>,

    /// Body for the pull request
    #[arg(short = 'b', long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the body from a file; `-` reads standard input
    #[arg(short = 'F', long, value_name = "FILE")]
    pub body_file: Option<PathBuf>,

    /// Mark the pull request as a draft
    #[arg(short = 'd', long)]
    pub draft: bool,

    /// Request a review from these users or groups
    #[arg(short = 'r', long = "reviewer", value_name = "USER")]
    pub reviewers: Vec<String>,

    /// Add labels
    #[arg(short = 'l', long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

async fn read_body(factory: &Factory, args: &CreateArgs) -> Result<Option<String>> {
    if let Some(body) = &args.body {
        return Ok(Some(body.clone()));
    }
    let Some(path) = &args.body_file else {
        return Ok(None);
    };
    if path.as_os_str() == "-" {
        let io = Arc::clone(factory.io());
        let text = tokio::task::spawn_blocking(move || io.read_all())
            .await
            .context("reading body from standard input")??;
        return Ok(Some(text));
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Some(text))
}

/// Execute `pr create`
pub async fn execute(factory: Arc<Factory>, args: CreateArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, PR_FIELDS)?;
    let repo = factory.repo_ref(args.repo.repo.as_deref()).await?;
    let client = factory.client(&repo.organization)?;

    let head = match &args.head {
        Some(head) => head.clone(),
        None => factory
            .git()?
            .current_branch()
            .await
            .context("could not determine the current branch; pass --head")?,
    };
    let base = match &args.base {
        Some(base) => base.clone(),
        None => {
            let repository = client.git().repository(&repo.project, &repo.repository).await?;
            repository
                .default_branch
                .map(|b| short_branch(&b).to_string())
                .ok_or_else(|| CliError::flag(format!("{repo} has no default branch; pass --base")))?
        }
    };
    if short_branch(&head) == short_branch(&base) {
        return Err(CliError::flag(format!(
            "head branch {:?} is the same as base branch",
            short_branch(&head)
        ))
        .into());
    }

    let title = match &args.title {
        Some(title) => title.clone(),
        None => ask(&factory, "--title", |p| p.input("Title", None)).await?,
    };
    if title.trim().is_empty() {
        return Err(CliError::flag("title can't be blank").into());
    }
    let description = read_body(&factory, &args).await?;

    let mut reviewers = Vec::with_capacity(args.reviewers.len());
    for reviewer in &args.reviewers {
        reviewers.push(IdentityId {
            id: identity_id(&client, reviewer).await?,
        });
    }

    let request = CreatePullRequest {
        source_ref_name: full_ref(&head),
        target_ref_name: full_ref(&base),
        title,
        description,
        is_draft: args.draft,
        reviewers,
        labels: args
            .labels
            .iter()
            .map(|name| LabelName { name: name.clone() })
            .collect(),
    };
    tracing::debug!("creating pull request {} -> {}", request.source_ref_name, request.target_ref_name);
    let pr = client
        .git()
        .create_pull_request(&repo.project, &repo.repository, &request)
        .await?;

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &pr);
    }
    let cs = ColorScheme::new(factory.io());
    output::success(
        factory.io(),
        &format!(
            "Created pull request {} {}",
            cs.bold(&format!("#{}", pr.pull_request_id)),
            pr.title
        ),
    );
    writeln!(factory.io().out(), "{}", web_url(&pr, &repo, client.base_url()))?;
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("create", "Create a pull request", factory, execute)
        .alias("new")
        .json_fields(PR_FIELDS)
        .example("azdo pr create --title \"Fix login\" --body \"Closes #12\"")
        .example("azdo pr create --base develop --draft --reviewer mona@contoso.com")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use crate::infra::prompter::Answer;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn args() -> CreateArgs {
        CreateArgs {
            repo: RepoArgs::default(),
            base: None,
            head: Some("feature-x".into()),
            title: Some("Add login".into()),
            body: None,
            body_file: None,
            draft: true,
            reviewers: Vec::new(),
            labels: vec!["auth".into()],
            export: ExportArgs::default(),
        }
    }

    #[tokio::test]
    async fn test_create_targets_default_branch() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "r1", "name": "myrepo", "defaultBranch": "refs/heads/main"
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo/pullrequests"))
            .and(body_json(json!({
                "sourceRefName": "refs/heads/feature-x",
                "targetRefName": "refs/heads/main",
                "title": "Add login",
                "isDraft": true,
                "labels": [{"name": "auth"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "pullRequestId": 42,
                "title": "Add login",
                "repository": {"id": "r1", "name": "myrepo", "webUrl": "https://dev.azure.com/contoso/myproj/_git/myrepo"}
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        execute(Arc::clone(&h.factory), args()).await.unwrap();
        assert_eq!(
            h.out(),
            "https://dev.azure.com/contoso/myproj/_git/myrepo/pullrequest/42\n"
        );
    }

    #[tokio::test]
    async fn test_same_branch_is_rejected() {
        let h = Harness::start().await;
        let mut same = args();
        same.base = Some("refs/heads/feature-x".into());
        let err = execute(Arc::clone(&h.factory), same).await.unwrap_err();
        assert!(err.to_string().contains("is the same as base branch"));
    }

    #[tokio::test]
    async fn test_prompted_title_must_not_be_blank() {
        let h = Harness::with_answers(vec![Answer::Text("  ".into())]).await;
        let mut untitled = args();
        untitled.base = Some("main".into());
        untitled.title = None;
        let err = execute(Arc::clone(&h.factory), untitled).await.unwrap_err();
        assert_eq!(err.to_string(), "title can't be blank");
        assert_eq!(h.prompter.asked(), vec!["Title".to_string()]);
    }
}
