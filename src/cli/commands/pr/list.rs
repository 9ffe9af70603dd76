//! `azdo pr list`

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::printer::FieldOpts;
use crate::client::types::PullRequestQuery;
use crate::core::pr_filter::{display_merge_status, PrFacts, PrFilter, MERGE_STATUSES};
use crate::error::CliError;

use super::{full_ref, identity_id, short_branch, RepoArgs, PR_FIELDS};

/// Arguments for `azdo pr list`
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Filter by state
    #[arg(short = 's', long, value_parser = ["active", "abandoned", "completed", "all"], default_value = "active")]
    pub state: String,

    /// Filter by target branch
    #[arg(short = 'B', long, value_name = "BRANCH")]
    pub base: Option<String>,

    /// Filter by source branch
    #[arg(short = 'H', long, value_name = "BRANCH")]
    pub head: Option<String>,

    /// Filter by author; `@me` for yourself
    #[arg(short = 'A', long, value_name = "USER")]
    pub author: Option<String>,

    /// Filter by reviewer; `@me` for yourself
    #[arg(short = 'r', long, value_name = "USER")]
    pub reviewer: Option<String>,

    /// Maximum number of pull requests to fetch
    #[arg(short = 'L', long, value_name = "N", default_value_t = 30)]
    pub limit: usize,

    /// Only list draft pull requests
    #[arg(short = 'd', long)]
    pub draft: bool,

    /// Only list pull requests carrying all of these labels
    #[arg(short = 'l', long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    /// Filter by merge status
    #[arg(long = "mergestate", value_name = "STATUS", value_parser = clap::builder::PossibleValuesParser::new(MERGE_STATUSES))]
    pub merge_state: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Execute `pr list`
pub async fn execute(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    if args.limit == 0 {
        return Err(CliError::flag(format!("invalid value for --limit: {}", args.limit)).into());
    }
    let exporter = Exporter::from_args(&args.export, PR_FIELDS)?;
    let repo = factory.repo_ref(args.repo.repo.as_deref()).await?;
    let client = factory.client(&repo.organization)?;

    let mut query = PullRequestQuery {
        status: args.state.clone(),
        source_ref_name: args.head.as_deref().map(full_ref),
        target_ref_name: args.base.as_deref().map(full_ref),
        top: args.limit,
        ..PullRequestQuery::default()
    };
    if let Some(author) = &args.author {
        query.creator_id = Some(identity_id(&client, author).await?);
    }
    if let Some(reviewer) = &args.reviewer {
        query.reviewer_id = Some(identity_id(&client, reviewer).await?);
    }

    let fetched = client
        .git()
        .pull_requests(&repo.project, &repo.repository, &query)
        .await?;
    if fetched.is_empty() {
        return Err(CliError::NoResults(format!("No pull requests match your search in {repo}")).into());
    }

    let filter = PrFilter {
        draft_only: args.draft,
        labels: args.labels.clone(),
        merge_status: args.merge_state.clone(),
    };
    let prs: Vec<_> = if filter.is_active() {
        fetched
            .into_iter()
            .filter(|pr| {
                let labels = pr.label_names();
                filter.matches(PrFacts {
                    is_draft: pr.is_draft,
                    labels: &labels,
                    merge_status: pr.merge_status.as_deref(),
                })
            })
            .collect()
    } else {
        fetched
    };
    if prs.is_empty() {
        return Err(CliError::NoResults(format!(
            "No Pull Requests found in {repo} using specified filters"
        ))
        .into());
    }

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &prs);
    }

    let mut printer = factory.printer(Default::default());
    printer.add_columns(&["ID", "Title", "Branch", "Author", "State", "IsDraft", "MergeStatus"]);
    for pr in &prs {
        printer.add_field_with(&pr.pull_request_id.to_string(), FieldOpts::no_truncate());
        printer.add_field(&pr.title);
        printer.add_field(short_branch(&pr.source_ref_name));
        printer.add_field(&pr.created_by.display_name);
        printer.add_field(&pr.status);
        printer.add_field(if pr.is_draft { "true" } else { "false" });
        printer.add_field(display_merge_status(pr.merge_status.as_deref()));
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("list", "List pull requests in a repository", factory, execute)
        .alias("ls")
        .json_fields(PR_FIELDS)
        .long_about(
            "List pull requests in an Azure DevOps repository.\n\n\
             Draft, label and merge status filters are applied after fetching,\n\
             so fewer than --limit results may be shown.",
        )
        .example("azdo pr list --author @me")
        .example("azdo pr list --base develop --label bug --label p1")
        .example("azdo pr list --state all --json pullRequestId,title --jq '.[].title'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, ResponseTemplate};

    const PRS_PATH: &str = "/contoso/myproj/_apis/git/repositories/myrepo/pullrequests";

    fn args() -> ListArgs {
        ListArgs {
            repo: RepoArgs::default(),
            state: "active".into(),
            base: None,
            head: None,
            author: None,
            reviewer: None,
            limit: 30,
            draft: false,
            labels: Vec::new(),
            merge_state: None,
            export: ExportArgs::default(),
        }
    }

    fn pr(id: u64, draft: bool, labels: &[&str], merge: Option<&str>) -> serde_json::Value {
        let mut value = json!({
            "pullRequestId": id,
            "title": format!("Change {id}"),
            "sourceRefName": "refs/heads/feature-x",
            "targetRefName": "refs/heads/develop",
            "status": "active",
            "createdBy": {"displayName": "Mona Lisa"},
            "isDraft": draft,
            "labels": labels.iter().map(|l| json!({"name": l})).collect::<Vec<_>>(),
        });
        if let Some(status) = merge {
            value["mergeStatus"] = json!(status);
        }
        value
    }

    #[tokio::test]
    async fn test_default_query_and_columns() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path(PRS_PATH))
            .and(query_param("searchCriteria.status", "active"))
            .and(query_param("$top", "30"))
            .and(query_param_is_missing("searchCriteria.sourceRefName"))
            .and(query_param_is_missing("searchCriteria.targetRefName"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "value": [pr(12, false, &[], None)]
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        execute(Arc::clone(&h.factory), args()).await.unwrap();
        assert_eq!(
            h.out(),
            "12\tChange 12\tfeature-x\tMona Lisa\tactive\tfalse\tunknown\n"
        );
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path(PRS_PATH))
            .and(query_param("searchCriteria.targetRefName", "refs/heads/develop"))
            .and(query_param("searchCriteria.sourceRefName", "refs/heads/feature-x"))
            .and(query_param("$top", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 4,
                "value": [
                    pr(1, true, &["bug", "p1"], Some("succeeded")),
                    pr(2, false, &["bug", "p1"], Some("succeeded")),
                    pr(3, true, &["bug"], Some("succeeded")),
                    pr(4, true, &["bug", "p1", "ux"], Some("conflicts")),
                ]
            })))
            .mount(&h.server)
            .await;

        let mut filtered = args();
        filtered.base = Some("develop".into());
        filtered.head = Some("feature-x".into());
        filtered.limit = 5;
        filtered.draft = true;
        filtered.labels = vec!["bug".into(), "p1".into()];
        filtered.merge_state = Some("succeeded".into());
        filtered.export.json = Some(vec!["pullRequestId".into()]);

        execute(Arc::clone(&h.factory), filtered).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&h.out()).unwrap();
        assert_eq!(value, json!([{"pullRequestId": 1}]));
    }

    #[tokio::test]
    async fn test_filtered_to_nothing() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path(PRS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "value": [pr(1, false, &["bug"], None)]
            })))
            .mount(&h.server)
            .await;

        let mut filtered = args();
        filtered.labels = vec!["p1".into()];
        let err = execute(Arc::clone(&h.factory), filtered).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No Pull Requests found in contoso/myproj/myrepo using specified filters"
        );
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NoResults(_))
        ));
    }

    #[tokio::test]
    async fn test_author_me_uses_connection_data() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/connectionData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authenticatedUser": {"id": "me-id", "descriptor": "d"}
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path(PRS_PATH))
            .and(query_param("searchCriteria.creatorId", "me-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "value": [pr(7, false, &[], Some("queued"))]
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let mut mine = args();
        mine.author = Some("@me".into());
        execute(Arc::clone(&h.factory), mine).await.unwrap();
        assert!(h.out().ends_with("\tqueued\n"));
    }
}
