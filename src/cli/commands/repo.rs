//! Repo command implementation
//!
//! Repository arguments are `[ORG/]PROJECT/REPO`; when omitted, the
//! repository of the current git working copy is used.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::output::{self, ColorScheme};
use crate::cli::printer::{FieldOpts, OutputFormat};
use crate::client::types::{CreateRepositoryRequest, ParentRepository, ProjectRef, Repository};
use crate::client::AzdoClient;
use crate::core::scope::{self, RepoRef, ScopeRef};
use crate::error::CliError;
use crate::infra::process;

use super::YesArgs;

const REPO_FIELDS: &[&str] = &[
    "id",
    "name",
    "project",
    "defaultBranch",
    "remoteUrl",
    "sshUrl",
    "webUrl",
    "size",
    "isDisabled",
    "isFork",
    "parentRepository",
];

/// Arguments for `azdo repo list`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project to list, as [ORGANIZATION/]PROJECT; defaults to the current repository's project
    #[arg(value_name = "[ORGANIZATION/]PROJECT")]
    pub project: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo repo create`
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Repository to create, as [ORGANIZATION/]PROJECT/NAME
    #[arg(value_name = "[ORGANIZATION/]PROJECT/NAME")]
    pub repository: String,

    /// Create a fork of this repository
    #[arg(long, value_name = "[ORGANIZATION/]PROJECT/REPO")]
    pub parent: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo repo clone`
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Repository to clone, as [ORGANIZATION/]PROJECT/REPO
    #[arg(value_name = "[ORGANIZATION/]PROJECT/REPO")]
    pub repository: String,

    /// Target directory
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Extra flags passed to git clone after `--`
    #[arg(last = true, value_name = "GITFLAGS")]
    pub git_flags: Vec<String>,
}

/// Arguments for `azdo repo view`
#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Repository to show, as [ORGANIZATION/]PROJECT/REPO
    #[arg(value_name = "[ORGANIZATION/]PROJECT/REPO")]
    pub repository: Option<String>,

    /// Open the repository in the browser
    #[arg(short = 'w', long)]
    pub web: bool,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo repo delete`
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Repository to delete, as [ORGANIZATION/]PROJECT/REPO
    #[arg(value_name = "[ORGANIZATION/]PROJECT/REPO")]
    pub repository: String,

    #[command(flatten)]
    pub yes: YesArgs,
}

fn short_branch(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

/// URL to clone from for a git protocol setting
pub fn clone_url<'a>(repo: &'a Repository, protocol: &str) -> &'a str {
    if protocol == "ssh" && !repo.ssh_url.is_empty() {
        &repo.ssh_url
    } else {
        &repo.remote_url
    }
}

async fn fetch_repository(client: &AzdoClient, repo: &RepoRef) -> Result<Repository> {
    match client.git().repository(&repo.project, &repo.repository).await {
        Ok(repository) => Ok(repository),
        Err(e) if e.is_not_found() => Err(CliError::NotFound(format!("repository {repo} not found")).into()),
        Err(e) => Err(e.into()),
    }
}

/// Execute `repo list`
pub async fn list(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, REPO_FIELDS)?;
    let (organization, project) = match &args.project {
        Some(input) => {
            let scope = factory.resolve_scope(input)?;
            if scope.target.is_some() {
                return Err(CliError::flag(format!("{input:?} is not a valid project reference")).into());
            }
            (scope.organization, scope.project)
        }
        None => {
            let repo = factory.repo_context().await?;
            (repo.organization, repo.project)
        }
    };
    let client = factory.client(&organization)?;
    let mut repos = client.git().repositories(&project).await?;
    if repos.is_empty() {
        return Err(CliError::NoResults(format!("no repositories found in {organization}/{project}")).into());
    }
    repos.sort_by_key(|r| r.name.to_lowercase());

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &repos);
    }

    let cs = ColorScheme::new(factory.io());
    let mut printer = factory.printer(OutputFormat::Table);
    printer.add_columns(&["Name", "Default Branch", "Type", "URL"]);
    for repo in &repos {
        printer.add_field(&repo.name);
        printer.add_field(repo.default_branch.as_deref().map(short_branch).unwrap_or(""));
        let kind = match (repo.is_fork, repo.is_disabled) {
            (_, true) => cs.gray("disabled"),
            (true, false) => "fork".to_string(),
            (false, false) => "source".to_string(),
        };
        printer.add_field(&kind);
        printer.add_field_with(&repo.web_url, FieldOpts::no_truncate());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `repo create`
pub async fn create(factory: Arc<Factory>, args: CreateArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, REPO_FIELDS)?;
    let target = RepoRef::from_scope(factory.resolve_target(&args.repository)?, &args.repository)?;

    let parent = match &args.parent {
        Some(input) => {
            let parsed = ScopeRef::parse_with_target(input)?;
            let organization = parsed
                .organization
                .clone()
                .unwrap_or_else(|| target.organization.clone());
            scope::ensure_same_organization(&target.organization, &organization)?;
            let scope = parsed.resolve(|| Ok(organization))?;
            Some(RepoRef::from_scope(scope, input)?)
        }
        None => None,
    };

    let client = factory.client(&target.organization)?;
    let project = client.core().project(&target.project).await.with_context(|| {
        format!("could not find project {}/{}", target.organization, target.project)
    })?;
    let parent_repository = match &parent {
        Some(parent) => {
            let repo = fetch_repository(&client, parent).await?;
            Some(ParentRepository {
                id: repo.id,
                name: repo.name,
                project: repo.project,
            })
        }
        None => None,
    };

    let request = CreateRepositoryRequest {
        name: target.repository.clone(),
        project: ProjectRef {
            id: project.id,
            name: project.name,
        },
        parent_repository,
    };
    let created = client.git().create_repository(&target.project, &request).await?;

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &created);
    }
    let cs = ColorScheme::new(factory.io());
    let verb = if parent.is_some() { "Forked" } else { "Created" };
    output::success(
        factory.io(),
        &format!("{verb} repository {}", cs.bold(&target.to_string())),
    );
    writeln!(factory.io().out(), "{}", created.web_url)?;
    Ok(())
}

/// Execute `repo clone`
pub async fn clone(factory: Arc<Factory>, args: CloneArgs) -> Result<()> {
    let target = RepoRef::from_scope(factory.resolve_target(&args.repository)?, &args.repository)?;
    let client = factory.client(&target.organization)?;
    let repo = fetch_repository(&client, &target).await?;

    let protocol = factory
        .config()
        .get_scoped(Some(&target.organization), "git_protocol")?;
    let url = clone_url(&repo, &protocol);
    tracing::debug!("cloning {} over {}", url, protocol);
    factory
        .git()?
        .clone(url, args.directory.as_deref(), &args.git_flags)
        .await?;
    Ok(())
}

/// Execute `repo view`
pub async fn view(factory: Arc<Factory>, args: ViewArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, REPO_FIELDS)?;
    let target = factory.repo_ref(args.repository.as_deref()).await?;
    let client = factory.client(&target.organization)?;
    let repo = fetch_repository(&client, &target).await?;

    if args.web {
        if factory.io().is_stdout_tty() {
            writeln!(factory.io().err(), "Opening {} in your browser.", repo.web_url)?;
        }
        process::open_browser(factory.browser()?.as_deref(), &repo.web_url).await?;
        return Ok(());
    }
    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &repo);
    }

    let mut printer = factory.printer(OutputFormat::List);
    printer.add_columns(&["Name", "Project", "Default Branch", "Size", "Fork Of", "Clone URL", "SSH URL", "URL"]);
    printer.add_field(&repo.name);
    printer.add_field(&repo.project.name);
    printer.add_field(repo.default_branch.as_deref().map(short_branch).unwrap_or(""));
    printer.add_field(&repo.size.to_string());
    printer.add_field(
        &repo
            .parent_repository
            .as_ref()
            .map(|p| format!("{}/{}", p.project.name, p.name))
            .unwrap_or_default(),
    );
    printer.add_field_with(&repo.remote_url, FieldOpts::no_truncate());
    printer.add_field_with(&repo.ssh_url, FieldOpts::no_truncate());
    printer.add_field_with(&repo.web_url, FieldOpts::no_truncate());
    printer.end_row();
    printer.render()?;
    Ok(())
}

/// Execute `repo delete`
pub async fn delete(factory: Arc<Factory>, args: DeleteArgs) -> Result<()> {
    let target = RepoRef::from_scope(factory.resolve_target(&args.repository)?, &args.repository)?;
    let client = factory.client(&target.organization)?;
    let repo = fetch_repository(&client, &target).await?;

    factory
        .confirm(args.yes.yes, &format!("Delete repository {target}? This cannot be undone"))
        .await?;
    client.git().delete_repository(&target.project, &repo.id).await?;

    let cs = ColorScheme::new(factory.io());
    output::success(factory.io(), &format!("Deleted repository {}", cs.bold(&target.to_string())));
    Ok(())
}

/// `azdo repo`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("repo", "Work with Azure DevOps repositories")
        .child(
            CommandNode::leaf("list", "List the repositories of a project", factory, list)
                .alias("ls")
                .json_fields(REPO_FIELDS)
                .example("azdo repo list contoso/website"),
        )
        .child(
            CommandNode::leaf("create", "Create a repository or a fork", factory, create)
                .json_fields(REPO_FIELDS)
                .example("azdo repo create website/api")
                .example("azdo repo create contoso/website/api-fork --parent contoso/platform/api"),
        )
        .child(
            CommandNode::leaf("clone", "Clone a repository locally", factory, clone)
                .long_about(
                    "Clone an Azure DevOps repository locally.\n\n\
                     The clone URL follows the git_protocol setting of the organization.\n\
                     Pass additional git clone flags after \"--\".",
                )
                .example("azdo repo clone contoso/website/api -- --depth=1"),
        )
        .child(
            CommandNode::leaf("view", "Show the details of a repository", factory, view)
                .json_fields(REPO_FIELDS)
                .example("azdo repo view --web"),
        )
        .child(
            CommandNode::leaf("delete", "Delete a repository", factory, delete)
                .example("azdo repo delete contoso/website/api --yes"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use crate::error::is_cancel;
    use crate::infra::prompter::Answer;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn repository(name: &str) -> serde_json::Value {
        json!({
            "id": format!("{name}-id"),
            "name": name,
            "project": {"id": "proj-id", "name": "myproj"},
            "defaultBranch": "refs/heads/main",
            "remoteUrl": format!("https://contoso@dev.azure.com/contoso/myproj/_git/{name}"),
            "sshUrl": format!("git@ssh.dev.azure.com:v3/contoso/myproj/{name}"),
            "webUrl": format!("https://dev.azure.com/contoso/myproj/_git/{name}"),
        })
    }

    #[test]
    fn test_clone_url_follows_protocol() {
        let repo: Repository = serde_json::from_value(repository("api")).unwrap();
        assert!(clone_url(&repo, "https").starts_with("https://"));
        assert!(clone_url(&repo, "ssh").starts_with("git@ssh"));
    }

    #[tokio::test]
    async fn test_fork_across_organizations_fails_early() {
        let h = Harness::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = create(
            Arc::clone(&h.factory),
            CreateArgs {
                repository: "org1/proj1/repo1".into(),
                parent: Some("org2/pX/rX".into()),
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot fork across organizations: \"org1\" and \"org2\""
        );
    }

    #[tokio::test]
    async fn test_fork_parent_defaults_to_target_organization() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/projects/myproj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "proj-id", "name": "myproj"})))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contoso/platform/_apis/git/repositories/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "parent-id", "name": "api", "project": {"id": "platform-id", "name": "platform"}
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contoso/myproj/_apis/git/repositories"))
            .and(body_partial_json(json!({
                "name": "api-fork",
                "project": {"id": "proj-id"},
                "parentRepository": {"id": "parent-id", "project": {"id": "platform-id"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(repository("api-fork")))
            .expect(1)
            .mount(&h.server)
            .await;

        create(
            Arc::clone(&h.factory),
            CreateArgs {
                repository: "myproj/api-fork".into(),
                parent: Some("platform/api".into()),
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(h.out(), "https://dev.azure.com/contoso/myproj/_git/api-fork\n");
    }

    #[tokio::test]
    async fn test_list_uses_current_repository_project() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/myproj/_apis/git/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2, "value": [repository("web"), repository("api")]
            })))
            .mount(&h.server)
            .await;

        list(
            Arc::clone(&h.factory),
            ListArgs {
                project: None,
                export: ExportArgs {
                    json: Some(vec!["name".into()]),
                    ..ExportArgs::default()
                },
            },
        )
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&h.out()).unwrap();
        assert_eq!(value, json!([{"name": "api"}, {"name": "web"}]));
    }

    #[tokio::test]
    async fn test_view_prints_record() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository("myrepo")))
            .mount(&h.server)
            .await;

        view(
            Arc::clone(&h.factory),
            ViewArgs {
                repository: None,
                web: false,
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        assert!(h.out().contains("myrepo"));
        assert!(h.out().contains("main"));
    }

    #[tokio::test]
    async fn test_delete_prompts_once_and_cancels() {
        let h = Harness::with_answers(vec![Answer::Confirm(false)]).await;
        Mock::given(method("GET"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository("myrepo")))
            .mount(&h.server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = delete(
            Arc::clone(&h.factory),
            DeleteArgs {
                repository: "myproj/myrepo".into(),
                yes: YesArgs { yes: false },
            },
        )
        .await
        .unwrap_err();
        assert!(is_cancel(&err));
        assert_eq!(h.prompter.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_with_yes() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repository("myrepo")))
            .mount(&h.server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo-id"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&h.server)
            .await;

        delete(
            Arc::clone(&h.factory),
            DeleteArgs {
                repository: "myproj/myrepo".into(),
                yes: YesArgs { yes: true },
            },
        )
        .await
        .unwrap();
        assert!(h.prompter.asked().is_empty());
        assert!(h.err().contains("Deleted repository contoso/myproj/myrepo"));
    }
}
