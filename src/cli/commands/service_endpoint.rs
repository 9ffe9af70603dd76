//! Service endpoint command implementation
//!
//! Endpoints hold credentials for external services. They are created in
//! one project and can be shared with more projects of the organization.

use anyhow::{anyhow, Context as _, Result};
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::commands::{ask, project_scope, wait_for, WaitArgs, YesArgs};
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::output::{self, ColorScheme};
use crate::cli::printer::{FieldOpts, OutputFormat};
use crate::client::types::{
    EndpointAuthorization, EndpointProjectReference, Project, ProjectRef, ServiceEndpoint,
};
use crate::client::AzdoClient;
use crate::core::scope::Scope;
use crate::error::CliError;

const ENDPOINT_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "url",
    "description",
    "owner",
    "isReady",
    "isShared",
    "data",
    "createdBy",
    "serviceEndpointProjectReferences",
];

const GITHUB_URL: &str = "https://github.com";
const AZURERM_URL: &str = "https://management.azure.com/";

/// Arguments for `azdo service-endpoint list`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project, as [ORGANIZATION/]PROJECT; defaults to the current repository's project
    #[arg(value_name = "[ORGANIZATION/]PROJECT")]
    pub project: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo service-endpoint create github`
#[derive(Args, Debug)]
pub struct GithubArgs {
    /// Endpoint to create, as [ORGANIZATION/]PROJECT/NAME
    #[arg(value_name = "[ORGANIZATION/]PROJECT/NAME")]
    pub target: String,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "AZDO_GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// ID of an existing GitHub app configuration
    #[arg(long, value_name = "ID", conflicts_with = "token")]
    pub configuration_id: Option<String>,

    /// GitHub server URL
    #[arg(long, value_name = "URL", default_value = GITHUB_URL)]
    pub url: String,

    /// Endpoint description
    #[arg(short = 'd', long, value_name = "TEXT")]
    pub description: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo service-endpoint create azurerm`
#[derive(Args, Debug)]
pub struct AzureRmArgs {
    /// Endpoint to create, as [ORGANIZATION/]PROJECT/NAME
    #[arg(value_name = "[ORGANIZATION/]PROJECT/NAME")]
    pub target: String,

    /// Microsoft Entra tenant ID
    #[arg(long, value_name = "UUID")]
    pub tenant_id: String,

    /// Azure subscription ID
    #[arg(long, value_name = "UUID")]
    pub subscription_id: String,

    /// Azure subscription name; defaults to the subscription ID
    #[arg(long, value_name = "NAME")]
    pub subscription_name: Option<String>,

    /// Application (client) ID of the service principal
    #[arg(long, value_name = "UUID")]
    pub service_principal_id: String,

    /// Client secret of the service principal
    #[arg(long, value_name = "SECRET", env = "AZDO_AZURERM_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// PEM certificate of the service principal
    #[arg(long, value_name = "PATH", conflicts_with = "secret")]
    pub certificate_path: Option<PathBuf>,

    /// Endpoint description
    #[arg(short = 'd', long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Ask the service to verify the credentials after creation
    #[arg(long)]
    pub validate_connection: bool,

    #[command(flatten)]
    pub wait: WaitArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo service-endpoint delete`
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Endpoint, as [ORGANIZATION/]PROJECT/NAME or [ORGANIZATION/]PROJECT/ID
    #[arg(value_name = "[ORGANIZATION/]PROJECT/ENDPOINT")]
    pub target: String,

    #[command(flatten)]
    pub yes: YesArgs,
}

/// Arguments for `azdo service-endpoint share`
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Endpoint, as [ORGANIZATION/]PROJECT/NAME or [ORGANIZATION/]PROJECT/ID
    #[arg(value_name = "[ORGANIZATION/]PROJECT/ENDPOINT")]
    pub target: String,

    /// Project to share the endpoint with
    #[arg(short = 'p', long = "project", value_name = "PROJECT", required = true)]
    pub projects: Vec<String>,
}

fn endpoint_name(scope: &Scope) -> Result<String> {
    scope
        .target
        .clone()
        .ok_or_else(|| CliError::flag(format!("missing endpoint name in {scope}")).into())
}

async fn fetch_project(client: &AzdoClient, name: &str) -> Result<Project> {
    match client.core().project(name).await {
        Ok(project) => Ok(project),
        Err(e) if e.is_not_found() => Err(CliError::NotFound(format!("project {name} not found")).into()),
        Err(e) => Err(e.into()),
    }
}

fn project_reference(project: &Project, name: &str, description: Option<&str>) -> EndpointProjectReference {
    EndpointProjectReference {
        project_reference: ProjectRef {
            id: project.id.clone(),
            name: project.name.clone(),
        },
        name: name.to_string(),
        description: description.map(str::to_string),
    }
}

/// Endpoint of a project by ID or case-insensitive name
pub async fn find_endpoint(client: &AzdoClient, project: &str, key: &str) -> Result<ServiceEndpoint> {
    let endpoints = client.endpoints().list(project).await?;
    endpoints
        .into_iter()
        .find(|e| e.id.as_deref() == Some(key) || e.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| CliError::NotFound(format!("service endpoint {key} not found in {project}")).into())
}

/// Body for a GitHub endpoint
pub fn github_endpoint(name: &str, url: &str, authorization: EndpointAuthorization) -> ServiceEndpoint {
    ServiceEndpoint {
        id: None,
        name: name.to_string(),
        kind: "github".to_string(),
        url: url.to_string(),
        description: None,
        owner: Some("library".to_string()),
        is_ready: false,
        is_shared: false,
        authorization: Some(authorization),
        data: HashMap::new(),
        created_by: None,
        service_endpoint_project_references: Vec::new(),
    }
}

/// Service principal credential of an Azure Resource Manager endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalCredential {
    Secret(String),
    Certificate(String),
}

/// Body for an Azure Resource Manager endpoint
pub fn azurerm_endpoint(
    name: &str,
    args: &AzureRmArgs,
    credential: PrincipalCredential,
) -> ServiceEndpoint {
    let mut parameters = HashMap::from([
        ("tenantid".to_string(), args.tenant_id.clone()),
        ("serviceprincipalid".to_string(), args.service_principal_id.clone()),
    ]);
    match credential {
        PrincipalCredential::Secret(secret) => {
            parameters.insert("authenticationType".into(), "spnKey".into());
            parameters.insert("serviceprincipalkey".into(), secret);
        }
        PrincipalCredential::Certificate(pem) => {
            parameters.insert("authenticationType".into(), "spnCertificate".into());
            parameters.insert("servicePrincipalCertificate".into(), pem);
        }
    }
    let subscription_name = args
        .subscription_name
        .clone()
        .unwrap_or_else(|| args.subscription_id.clone());
    let data = HashMap::from([
        ("subscriptionId".to_string(), args.subscription_id.clone()),
        ("subscriptionName".to_string(), subscription_name),
        ("environment".to_string(), "AzureCloud".to_string()),
        ("scopeLevel".to_string(), "Subscription".to_string()),
        ("creationMode".to_string(), "Manual".to_string()),
    ]);
    ServiceEndpoint {
        id: None,
        name: name.to_string(),
        kind: "azurerm".to_string(),
        url: AZURERM_URL.to_string(),
        description: None,
        owner: Some("library".to_string()),
        is_ready: false,
        is_shared: false,
        authorization: Some(EndpointAuthorization {
            scheme: "ServicePrincipal".to_string(),
            parameters,
        }),
        data,
        created_by: None,
        service_endpoint_project_references: Vec::new(),
    }
}

async fn create(
    factory: &Factory,
    scope: &Scope,
    mut endpoint: ServiceEndpoint,
    description: Option<&str>,
) -> Result<(AzdoClient, Project, ServiceEndpoint)> {
    let client = factory.client(&scope.organization)?;
    let project = fetch_project(&client, &scope.project).await?;
    endpoint.description = description.map(str::to_string);
    endpoint.service_endpoint_project_references =
        vec![project_reference(&project, &endpoint.name, description)];

    let created = client
        .endpoints()
        .create(&endpoint)
        .await
        .with_context(|| format!("failed to create service endpoint {}", endpoint.name))?;
    Ok((client, project, created))
}

fn report_created(factory: &Factory, endpoint: &ServiceEndpoint, project: &str) {
    let cs = ColorScheme::new(factory.io());
    output::success(
        factory.io(),
        &format!(
            "Created service endpoint {} ({}) in {project}",
            cs.bold(&endpoint.name),
            endpoint.id.as_deref().unwrap_or("")
        ),
    );
}

/// Execute `service-endpoint list`
pub async fn list(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, ENDPOINT_FIELDS)?;
    let scope = project_scope(&factory, args.project.as_deref()).await?;
    let client = factory.client(&scope.organization)?;
    let mut endpoints = client.endpoints().list(&scope.project).await?;
    if endpoints.is_empty() {
        return Err(CliError::NoResults(format!("no service endpoints found in {}", scope.project)).into());
    }
    endpoints.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &endpoints);
    }
    let mut printer = factory.printer(OutputFormat::Table);
    printer.add_columns(&["ID", "Name", "Type", "Ready", "Shared"]);
    for endpoint in &endpoints {
        printer.add_field_with(endpoint.id.as_deref().unwrap_or(""), FieldOpts::no_truncate());
        printer.add_field(&endpoint.name);
        printer.add_field(&endpoint.kind);
        printer.add_field(&endpoint.is_ready.to_string());
        printer.add_field(&endpoint.is_shared.to_string());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `service-endpoint create github`
pub async fn create_github(factory: Arc<Factory>, args: GithubArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, ENDPOINT_FIELDS)?;
    let scope = factory.resolve_target(&args.target)?;
    let name = endpoint_name(&scope)?;

    let authorization = match (&args.token, &args.configuration_id) {
        (_, Some(id)) => EndpointAuthorization {
            scheme: "InstallationToken".to_string(),
            parameters: HashMap::from([("ConfigurationId".to_string(), id.clone())]),
        },
        (Some(token), None) => personal_access_token(token.clone()),
        (None, None) => {
            let token = ask(&factory, "--token", |p| p.password("GitHub personal access token")).await?;
            if token.trim().is_empty() {
                return Err(CliError::flag("token can't be blank").into());
            }
            personal_access_token(token)
        }
    };

    let endpoint = github_endpoint(&name, &args.url, authorization);
    let (_, project, created) = create(&factory, &scope, endpoint, args.description.as_deref()).await?;
    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &created);
    }
    report_created(&factory, &created, &project.name);
    Ok(())
}

fn personal_access_token(token: String) -> EndpointAuthorization {
    EndpointAuthorization {
        scheme: "PersonalAccessToken".to_string(),
        parameters: HashMap::from([("accessToken".to_string(), token)]),
    }
}

/// Execute `service-endpoint create azurerm`
pub async fn create_azurerm(factory: Arc<Factory>, args: AzureRmArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, ENDPOINT_FIELDS)?;
    let scope = factory.resolve_target(&args.target)?;
    let name = endpoint_name(&scope)?;

    let credential = match (&args.secret, &args.certificate_path) {
        (_, Some(path)) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read certificate {}", path.display()))?;
            PrincipalCredential::Certificate(pem)
        }
        (Some(secret), None) => PrincipalCredential::Secret(secret.clone()),
        (None, None) => {
            return Err(CliError::flag("one of --secret or --certificate-path is required").into())
        }
    };

    let endpoint = azurerm_endpoint(&name, &args, credential);
    let (client, project, mut created) =
        create(&factory, &scope, endpoint, args.description.as_deref()).await?;
    let id = created
        .id
        .clone()
        .ok_or_else(|| anyhow!("service returned endpoint {name} without an id"))?;

    if args.wait.wait && !created.is_ready {
        created = wait_for(&factory, &args.wait, || {
            let endpoints = client.endpoints();
            let (project, id) = (project.id.clone(), id.clone());
            async move {
                let current = endpoints.get(&project, &id).await?;
                Ok(current.is_ready.then_some(current))
            }
        })
        .await?;
    }

    if args.validate_connection {
        let result = client.endpoints().test_connection(&project.id, &created).await?;
        if !result.status_code.eq_ignore_ascii_case("ok") {
            return Err(anyhow!(
                "service endpoint {name} failed validation: {}",
                result.error_message.as_deref().unwrap_or(&result.status_code)
            ));
        }
    }

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &created);
    }
    report_created(&factory, &created, &project.name);
    if args.validate_connection {
        output::success(factory.io(), "Connection verified");
    }
    Ok(())
}

/// Execute `service-endpoint delete`
pub async fn delete(factory: Arc<Factory>, args: DeleteArgs) -> Result<()> {
    let scope = factory.resolve_target(&args.target)?;
    let key = endpoint_name(&scope)?;
    let client = factory.client(&scope.organization)?;
    let project = fetch_project(&client, &scope.project).await?;
    let endpoint = find_endpoint(&client, &scope.project, &key).await?;
    let id = endpoint
        .id
        .clone()
        .ok_or_else(|| anyhow!("service endpoint {key} has no id"))?;

    factory
        .confirm(
            args.yes.yes,
            &format!("Delete service endpoint {} from {}?", endpoint.name, project.name),
        )
        .await?;
    client.endpoints().delete(&id, &[project.id.clone()]).await?;

    let cs = ColorScheme::new(factory.io());
    output::success(
        factory.io(),
        &format!("Deleted service endpoint {} from {}", cs.bold(&endpoint.name), project.name),
    );
    Ok(())
}

/// Execute `service-endpoint share`
pub async fn share(factory: Arc<Factory>, args: ShareArgs) -> Result<()> {
    let scope = factory.resolve_target(&args.target)?;
    let key = endpoint_name(&scope)?;
    let client = factory.client(&scope.organization)?;
    let endpoint = find_endpoint(&client, &scope.project, &key).await?;
    let id = endpoint
        .id
        .clone()
        .ok_or_else(|| anyhow!("service endpoint {key} has no id"))?;

    let mut references = Vec::with_capacity(args.projects.len());
    let mut names = Vec::with_capacity(args.projects.len());
    for name in &args.projects {
        let project = fetch_project(&client, name).await?;
        references.push(project_reference(&project, &endpoint.name, endpoint.description.as_deref()));
        names.push(project.name);
    }
    client.endpoints().share(&id, &references).await?;

    let cs = ColorScheme::new(factory.io());
    output::success(
        factory.io(),
        &format!("Shared service endpoint {} with {}", cs.bold(&endpoint.name), names.join(", ")),
    );
    Ok(())
}

/// `azdo service-endpoint`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("service-endpoint", "Manage service endpoints")
        .child(
            CommandNode::leaf("list", "List the service endpoints of a project", factory, list)
                .alias("ls")
                .json_fields(ENDPOINT_FIELDS),
        )
        .child(
            CommandNode::parent("create", "Create a service endpoint")
                .child(
                    CommandNode::leaf("github", "Create a GitHub service endpoint", factory, create_github)
                        .json_fields(ENDPOINT_FIELDS)
                        .example("azdo service-endpoint create github contoso/website/github --token $GITHUB_TOKEN")
                        .example("azdo service-endpoint create github website/github --configuration-id 42"),
                )
                .child(
                    CommandNode::leaf(
                        "azurerm",
                        "Create an Azure Resource Manager service endpoint",
                        factory,
                        create_azurerm,
                    )
                    .json_fields(ENDPOINT_FIELDS)
                    .example(
                        "azdo service-endpoint create azurerm contoso/website/prod \\\n  \
                         --tenant-id <uuid> --subscription-id <uuid> --service-principal-id <uuid> \\\n  \
                         --secret $SECRET --validate-connection --wait",
                    ),
                ),
        )
        .child(
            CommandNode::leaf("delete", "Delete a service endpoint", factory, delete)
                .example("azdo service-endpoint delete contoso/website/github --yes"),
        )
        .child(
            CommandNode::leaf("share", "Share a service endpoint with other projects", factory, share)
                .example("azdo service-endpoint share website/github --project api --project docs"),
        )
}
