//! `azdo pr diff`
//!
//! Lists the files changed by the latest iteration of a pull request.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::printer::FieldOpts;
use crate::client::types::ChangeEntry;
use crate::error::CliError;

use super::{select, SelectorArgs};

const CHANGE_FIELDS: &[&str] = &["changeType", "path", "originalPath"];

/// Arguments for `azdo pr diff`
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Only print the names of changed files
    #[arg(long)]
    pub name_only: bool,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// One changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub change_type: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

impl From<ChangeEntry> for FileChange {
    fn from(entry: ChangeEntry) -> Self {
        Self {
            change_type: entry.change_type,
            path: entry.item.path,
            original_path: entry.original_path,
        }
    }
}

/// Execute `pr diff`
pub async fn execute(factory: Arc<Factory>, args: DiffArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, CHANGE_FIELDS)?;
    let selected = select(&factory, &args.selector).await?;
    let id = selected.pr.pull_request_id;
    let git = selected.client.git();
    let (project, repository) = (&selected.repo.project, &selected.repo.repository);

    let iterations = git.iterations(project, repository, id).await?;
    let latest = iterations
        .iter()
        .map(|i| i.id)
        .max()
        .ok_or_else(|| CliError::NoResults(format!("pull request #{id} has no iterations")))?;
    let changes: Vec<FileChange> = git
        .iteration_changes(project, repository, id, latest)
        .await?
        .change_entries
        .into_iter()
        .filter(|e| !e.item.path.is_empty())
        .map(FileChange::from)
        .collect();
    if changes.is_empty() {
        return Err(CliError::NoResults(format!("pull request #{id} has no changes")).into());
    }

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &changes);
    }

    let mut printer = factory.printer(Default::default());
    if args.name_only {
        printer.add_columns(&["Path"]);
    } else {
        printer.add_columns(&["Change", "Path"]);
    }
    for change in &changes {
        if !args.name_only {
            printer.add_field(&change.change_type);
        }
        let path = match &change.original_path {
            Some(original) if !args.name_only => format!("{original} -> {}", change.path),
            _ => change.path.clone(),
        };
        printer.add_field_with(&path, FieldOpts::no_truncate());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("diff", "List the files changed by a pull request", factory, execute)
        .json_fields(CHANGE_FIELDS)
        .example("azdo pr diff 42")
        .example("azdo pr diff --name-only")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::pr::RepoArgs;
    use crate::cli::commands::testing::Harness;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_uses_latest_iteration() {
        let h = Harness::start().await;
        let base = "/contoso/myproj/_apis/git/repositories/myrepo/pullRequests/6";
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/git/pullrequests/6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pullRequestId": 6})))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{base}/iterations")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2, "value": [{"id": 1}, {"id": 2}]
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{base}/iterations/2/changes")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "changeEntries": [
                    {"changeType": "edit", "item": {"path": "/src/lib.rs"}},
                    {"changeType": "rename", "item": {"path": "/docs/new.md"}, "originalPath": "/docs/old.md"}
                ]
            })))
            .mount(&h.server)
            .await;

        execute(
            Arc::clone(&h.factory),
            DiffArgs {
                selector: SelectorArgs {
                    number: Some(6),
                    repo: RepoArgs::default(),
                },
                name_only: false,
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            h.out(),
            "edit\t/src/lib.rs\nrename\t/docs/old.md -> /docs/new.md\n"
        );
    }
}
