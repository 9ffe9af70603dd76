//! Project command implementation
//!
//! Creating and deleting a project queue server operations; with `--wait`
//! the operation is polled until it reaches a final state.

use anyhow::{anyhow, Result};
use clap::Args;
use serde_json::json;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::output::{self, ColorScheme};
use crate::cli::printer::FieldOpts;
use crate::client::types::{CreateProjectRequest, Operation, OperationReference, OperationStatus, Process};
use crate::client::AzdoClient;
use crate::error::CliError;

use super::{wait_for, OrgArgs, WaitArgs, YesArgs};

const PROJECT_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "state",
    "visibility",
    "revision",
    "lastUpdateTime",
    "url",
];

const STATES: &[&str] = &[
    "all",
    "createPending",
    "deleted",
    "deleting",
    "new",
    "unchanged",
    "wellFormed",
];

/// Arguments for `azdo project list`
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub org: OrgArgs,

    /// Maximum number of projects to fetch
    #[arg(short = 'L', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Only list projects in this state
    #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(STATES))]
    pub state: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo project create`
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project to create, as [ORGANIZATION/]NAME
    #[arg(value_name = "[ORGANIZATION/]NAME")]
    pub name: String,

    /// Project description
    #[arg(short = 'd', long)]
    pub description: Option<String>,

    /// Process template name; defaults to the organization's default process
    #[arg(short = 'p', long)]
    pub process: Option<String>,

    /// Project visibility
    #[arg(long, value_parser = ["private", "public"], default_value = "private")]
    pub visibility: String,

    #[command(flatten)]
    pub wait: WaitArgs,
}

/// Arguments for `azdo project delete`
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Project to delete, as [ORGANIZATION/]PROJECT
    #[arg(value_name = "[ORGANIZATION/]PROJECT")]
    pub project: String,

    #[command(flatten)]
    pub yes: YesArgs,

    #[command(flatten)]
    pub wait: WaitArgs,
}

fn status_text(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::NotSet => "notSet",
        OperationStatus::Queued => "queued",
        OperationStatus::InProgress => "inProgress",
        OperationStatus::Cancelled => "cancelled",
        OperationStatus::Succeeded => "succeeded",
        OperationStatus::Failed => "failed",
    }
}

/// Poll an operation until it is final; anything but success is an error
async fn finish_operation(
    factory: &Factory,
    client: &AzdoClient,
    wait: &WaitArgs,
    reference: &OperationReference,
) -> Result<Operation> {
    let operation = wait_for(factory, wait, || {
        let api = client.operations();
        let id = reference.id.clone();
        async move {
            let operation = api.get(&id).await?;
            tracing::debug!("operation {} is {}", id, status_text(operation.status));
            Ok(operation.status.is_final().then_some(operation))
        }
    })
    .await?;
    if operation.status != OperationStatus::Succeeded {
        return Err(anyhow!(
            "operation {} {}: {}",
            operation.id,
            status_text(operation.status),
            operation.result_message.as_deref().unwrap_or("no details")
        ));
    }
    Ok(operation)
}

fn pick_process<'a>(processes: &'a [Process], name: Option<&str>) -> Result<&'a Process> {
    match name {
        Some(name) => processes
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let known: Vec<&str> = processes.iter().map(|p| p.name.as_str()).collect();
                CliError::flag(format!(
                    "unknown process {name:?}; available processes: {}",
                    known.join(", ")
                ))
                .into()
            }),
        None => processes
            .iter()
            .find(|p| p.is_default)
            .or_else(|| processes.first())
            .ok_or_else(|| anyhow!("the organization has no process templates")),
    }
}

/// Execute `project list`
pub async fn list(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, PROJECT_FIELDS)?;
    let organization = factory.organization(args.org.organization.as_deref())?;
    let client = factory.client(&organization)?;

    let projects = client
        .core()
        .projects(args.state.as_deref(), args.limit)
        .await?;
    if projects.is_empty() {
        return Err(CliError::NoResults(format!("no projects found in organization {organization}")).into());
    }

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &projects);
    }

    let mut printer = factory.printer(Default::default());
    printer.add_columns(&["ID", "Name", "State", "Visibility"]);
    for project in &projects {
        printer.add_field_with(&project.id, FieldOpts::no_truncate());
        printer.add_field(&project.name);
        printer.add_field(&project.state);
        printer.add_field(&project.visibility);
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `project create`
pub async fn create(factory: Arc<Factory>, args: CreateArgs) -> Result<()> {
    let scope = factory.resolve_scope(&args.name)?;
    let client = factory.client(&scope.organization)?;

    let processes = client.core().processes().await?;
    let process = pick_process(&processes, args.process.as_deref())?;
    let request = CreateProjectRequest {
        name: scope.project.clone(),
        description: args.description.clone(),
        visibility: args.visibility.clone(),
        capabilities: json!({
            "versioncontrol": {"sourceControlType": "Git"},
            "processTemplate": {"templateTypeId": process.id},
        }),
    };
    let reference = client.core().create_project(&request).await?;

    let cs = ColorScheme::new(factory.io());
    if !args.wait.wait {
        output::success(
            factory.io(),
            &format!(
                "Project {} queued for creation (operation {})",
                cs.bold(&scope.project),
                reference.id
            ),
        );
        return Ok(());
    }
    finish_operation(&factory, &client, &args.wait, &reference).await?;
    output::success(
        factory.io(),
        &format!("Created project {} in {}", cs.bold(&scope.project), scope.organization),
    );
    Ok(())
}

/// Execute `project delete`
pub async fn delete(factory: Arc<Factory>, args: DeleteArgs) -> Result<()> {
    let scope = factory.resolve_scope(&args.project)?;
    let client = factory.client(&scope.organization)?;

    let project = match client.core().project(&scope.project).await {
        Ok(project) => project,
        Err(e) if e.is_not_found() => {
            return Err(CliError::NotFound(format!(
                "project {} not found in organization {}",
                scope.project, scope.organization
            ))
            .into())
        }
        Err(e) => return Err(e.into()),
    };

    factory
        .confirm(
            args.yes.yes,
            &format!("Delete project {}/{}? This cannot be undone", scope.organization, project.name),
        )
        .await?;

    let reference = client.core().delete_project(&project.id).await?;
    let cs = ColorScheme::new(factory.io());
    if args.wait.wait {
        finish_operation(&factory, &client, &args.wait, &reference).await?;
        output::success(factory.io(), &format!("Deleted project {}", cs.bold(&project.name)));
    } else {
        output::success(
            factory.io(),
            &format!(
                "Project {} queued for deletion (operation {})",
                cs.bold(&project.name),
                reference.id
            ),
        );
    }
    Ok(())
}

/// `azdo project`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("project", "Work with Azure DevOps projects")
        .child(
            CommandNode::leaf("list", "List the projects of an organization", factory, list)
                .alias("ls")
                .json_fields(PROJECT_FIELDS)
                .example("azdo project list --state wellFormed -o contoso"),
        )
        .child(
            CommandNode::leaf("create", "Create a project", factory, create)
                .example("azdo project create contoso/website --process Agile --wait"),
        )
        .child(
            CommandNode::leaf("delete", "Delete a project", factory, delete)
                .example("azdo project delete contoso/website --yes"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use crate::error::is_cancel;
    use crate::infra::prompter::Answer;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    async fn mount_project(h: &Harness) {
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/projects/web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p-1", "name": "web", "state": "wellFormed", "visibility": "private"
            })))
            .mount(&h.server)
            .await;
    }

    fn delete_args(yes: bool) -> DeleteArgs {
        DeleteArgs {
            project: "web".into(),
            yes: YesArgs { yes },
            wait: WaitArgs::default(),
        }
    }

    #[test]
    fn test_pick_process() {
        let processes = vec![
            Process {
                id: "1".into(),
                name: "Basic".into(),
                is_default: false,
            },
            Process {
                id: "2".into(),
                name: "Agile".into(),
                is_default: true,
            },
        ];
        assert_eq!(pick_process(&processes, None).unwrap().id, "2");
        assert_eq!(pick_process(&processes, Some("basic")).unwrap().id, "1");
        let err = pick_process(&processes, Some("Scrum")).unwrap_err();
        assert!(err.to_string().contains("available processes: Basic, Agile"));
    }

    #[tokio::test]
    async fn test_list_renders_table() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/projects"))
            .and(query_param("stateFilter", "wellFormed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "value": [{"id": "p-1", "name": "web", "state": "wellFormed", "visibility": "private"}]
            })))
            .mount(&h.server)
            .await;

        list(
            Arc::clone(&h.factory),
            ListArgs {
                org: OrgArgs::default(),
                limit: None,
                state: Some("wellFormed".into()),
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(h.out(), "p-1\tweb\twellFormed\tprivate\n");
    }

    #[tokio::test]
    async fn test_create_waits_for_operation() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/process/processes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": "agile-id", "name": "Agile", "isDefault": true}]
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contoso/_apis/projects"))
            .and(body_partial_json(json!({
                "name": "web",
                "capabilities": {"processTemplate": {"templateTypeId": "agile-id"}}
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "op-1", "status": "queued"})))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "op-1", "status": "succeeded"})))
            .mount(&h.server)
            .await;

        create(
            Arc::clone(&h.factory),
            CreateArgs {
                name: "web".into(),
                description: None,
                process: None,
                visibility: "private".into(),
                wait: WaitArgs {
                    wait: true,
                    ..WaitArgs::default()
                },
            },
        )
        .await
        .unwrap();
        assert!(h.err().contains("Created project web in contoso"));
    }

    #[tokio::test]
    async fn test_failed_operation_is_an_error() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/operations/op-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "op-2", "status": "failed", "resultMessage": "name already in use"
            })))
            .mount(&h.server)
            .await;
        let client = h.factory.client("contoso").unwrap();
        let reference = OperationReference {
            id: "op-2".into(),
            status: OperationStatus::Queued,
            url: String::new(),
        };
        let err = finish_operation(&h.factory, &client, &WaitArgs::default(), &reference)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "operation op-2 failed: name already in use");
    }

    #[tokio::test]
    async fn test_delete_declined_does_not_call_server() {
        let h = Harness::with_answers(vec![Answer::Confirm(false)]).await;
        mount_project(&h).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = delete(Arc::clone(&h.factory), delete_args(false)).await.unwrap_err();
        assert!(is_cancel(&err));
        assert_eq!(h.prompter.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_with_yes_skips_prompt() {
        let h = Harness::start().await;
        mount_project(&h).await;
        Mock::given(method("DELETE"))
            .and(path("/contoso/_apis/projects/p-1"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "op-3", "status": "queued"})))
            .expect(1)
            .mount(&h.server)
            .await;

        delete(Arc::clone(&h.factory), delete_args(true)).await.unwrap();
        assert!(h.prompter.asked().is_empty());
        assert!(h.err().contains("queued for deletion (operation op-3)"));
    }
}
