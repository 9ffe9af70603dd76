//! Auth command implementation
//!
//! `login` validates a personal access token against `connectionData` before
//! storing it, registers the organization and makes the first one the
//! default. The other leaves inspect or remove what `login` stored.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::sync::Arc;
use url::Url;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::output::{self, ColorScheme};
use crate::cli::printer::FieldOpts;
use crate::client::types::ConnectionData;
use crate::client::AzdoClient;
use crate::config::store::OrganizationConfig;
use crate::config::urls;
use crate::core::scope;
use crate::error::CliError;
use crate::infra::keyring::StorageOutcome;
use crate::infra::prompter;

use super::{ask, OrgArgs};

/// Arguments for `azdo auth login`
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Organization name or URL
    #[arg(short = 'o', long = "organization", value_name = "ORG")]
    pub organization: Option<String>,

    /// Read the token from standard input
    #[arg(long)]
    pub with_token: bool,

    /// Save the token in plain text instead of the system keyring
    #[arg(long)]
    pub insecure_storage: bool,

    /// Protocol for git operations in this organization
    #[arg(long, value_name = "PROTOCOL", value_parser = ["https", "ssh"])]
    pub git_protocol: Option<String>,
}

/// Arguments for `azdo auth logout`
#[derive(Args, Debug)]
pub struct LogoutArgs {
    #[command(flatten)]
    pub org: OrgArgs,
}

/// Arguments for `azdo auth status`
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub org: OrgArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo auth token`
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(flatten)]
    pub org: OrgArgs,
}

/// Arguments for `azdo auth switch`
#[derive(Args, Debug)]
pub struct SwitchArgs {
    #[command(flatten)]
    pub org: OrgArgs,
}

/// Fields accepted by `auth status --json`
pub const STATUS_FIELDS: &[&str] = &["organization", "url", "tokenSource", "isDefault"];

/// Organization name and URL from `--organization`
///
/// Names and `dev.azure.com`/`visualstudio.com` URLs map to the hosted
/// service; any other URL is taken as-is, named after its last path segment.
pub fn organization_target(value: &str) -> Result<(String, String)> {
    let value = value.trim().trim_end_matches('/');
    let name = scope::organization_name(value);
    if name != value {
        return Ok((name.clone(), urls::organization_url(&name)));
    }
    match Url::parse(value) {
        Ok(url) => {
            let name = url
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
                .filter(|s| !s.is_empty())
                .ok_or_else(|| CliError::flag(format!("cannot infer an organization name from {value:?}")))?;
            Ok((name, value.to_string()))
        }
        Err(_) if value.is_empty() => Err(CliError::flag("organization name must not be empty").into()),
        Err(_) => Ok((value.to_string(), urls::organization_url(value))),
    }
}

async fn read_token(factory: &Factory, args: &LoginArgs, organization: &str) -> Result<String> {
    if args.with_token {
        let io = Arc::clone(factory.io());
        let text = tokio::task::spawn_blocking(move || io.read_all())
            .await
            .context("reading token")??;
        return Ok(text.trim().to_string());
    }
    let prompt = format!(
        "Paste your personal access token (create one at {})",
        urls::token_page(organization)
    );
    prompter::prompt(factory.prompter(), factory.cancel(), move |p| p.password(&prompt))
        .await
        .map(|t| t.trim().to_string())
}

/// Execute `auth login`
pub async fn login(factory: Arc<Factory>, args: LoginArgs) -> Result<()> {
    if factory.credentials().has_env_token() {
        return Err(CliError::flag(
            "The value of the AZDO_TOKEN environment variable is being used for authentication.\n\
             To have azdo store credentials instead, first clear the value from the environment.",
        )
        .into());
    }

    let input = match &args.organization {
        Some(org) => org.clone(),
        None => {
            ask(&factory, "--organization", |p| p.input("Organization name or URL", None)).await?
        }
    };
    let (organization, url) = organization_target(&input)?;

    let token = read_token(&factory, &args, &organization).await?;
    if token.is_empty() {
        return Err(CliError::flag("no token provided").into());
    }

    factory.io().start_progress("Validating token");
    let client = AzdoClient::builder()
        .organization(&organization)
        .base_url(&url)
        .token(&token)
        .cancel(factory.cancel().clone())
        .build()?;
    let validated: std::result::Result<ConnectionData, _> = client.core().connection_data().await;
    factory.io().stop_progress();
    let data = validated.map_err(|e| -> anyhow::Error {
        if e.is_auth_error() {
            CliError::Auth(format!("the token was rejected by {url}: {e}")).into()
        } else {
            anyhow::Error::new(e).context(format!("validating token against {url}"))
        }
    })?;

    let outcome = factory
        .credentials()
        .store(&organization, &token, args.insecure_storage)?;
    if let StorageOutcome::Plaintext { reason } = &outcome {
        output::warning(
            factory.io(),
            &format!(
                "Token stored in plain text at {} ({reason})",
                factory.dirs().credentials_path().display()
            ),
        );
    }

    let config = factory.config();
    config.add_organization(&OrganizationConfig {
        name: organization.clone(),
        url,
        git_protocol: args.git_protocol.clone(),
    })?;
    if config.default_organization()?.is_none() {
        config.set_default_organization(&organization)?;
    }

    let who = data
        .authenticated_user
        .account()
        .map(str::to_string)
        .unwrap_or_else(|| data.authenticated_user.provider_display_name.clone());
    tracing::info!("logged in to {} as {}", organization, who);
    output::success(factory.io(), &format!("Logged in to {organization} as {who}"));
    Ok(())
}

fn configured_organization(factory: &Factory, flag: Option<&str>) -> Result<String> {
    let organization = factory.organization(flag)?;
    if factory.config().organization(&organization)?.is_none() {
        return Err(scope::ScopeError::UnknownOrganization(organization).into());
    }
    Ok(organization)
}

/// Execute `auth logout`
pub async fn logout(factory: Arc<Factory>, args: LogoutArgs) -> Result<()> {
    let organization = configured_organization(&factory, args.org.organization.as_deref())?;
    factory.credentials().remove(&organization)?;
    factory.config().remove_organization(&organization)?;
    output::success(factory.io(), &format!("Logged out of {organization}"));
    Ok(())
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusEntry {
    organization: String,
    url: String,
    token_source: Option<String>,
    is_default: bool,
}

/// Execute `auth status`
pub async fn status(factory: Arc<Factory>, args: StatusArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, STATUS_FIELDS)?;
    let config = factory.config();
    let credentials = factory.credentials();
    let default = config.default_organization()?;

    let mut names = config.organizations()?;
    if let Some(org) = &args.org.organization {
        let org = scope::organization_name(org);
        names.retain(|n| n.eq_ignore_ascii_case(&org));
    }
    if names.is_empty() {
        return Err(CliError::NoResults(
            "You are not logged into any Azure DevOps organizations. Run azdo auth login to authenticate."
                .to_string(),
        )
        .into());
    }

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let url = config
            .organization(&name)?
            .map(|o| o.url)
            .unwrap_or_else(|| urls::organization_url(&name));
        let token_source = credentials.token(&name)?.map(|t| t.source.to_string());
        entries.push(StatusEntry {
            is_default: default.as_deref() == Some(name.as_str()),
            organization: name,
            url,
            token_source,
        });
    }

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &entries);
    }

    let cs = ColorScheme::new(factory.io());
    let mut printer = factory.printer(Default::default());
    printer.add_columns(&["Organization", "URL", "Token", "Default"]);
    for entry in &entries {
        printer.add_field(&entry.organization);
        printer.add_field_with(&entry.url, FieldOpts::no_truncate());
        match &entry.token_source {
            Some(source) => printer.add_field(source),
            None => printer.add_field(&cs.red("missing")),
        }
        printer.add_field(if entry.is_default { "*" } else { "" });
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `auth token`
pub async fn token(factory: Arc<Factory>, args: TokenArgs) -> Result<()> {
    let organization = factory.organization(args.org.organization.as_deref())?;
    let token = factory.credentials().token(&organization)?.ok_or_else(|| {
        CliError::Auth(format!("no token found for organization \"{organization}\""))
    })?;
    writeln!(factory.io().out(), "{}", token.value)?;
    Ok(())
}

/// Execute `auth switch`
pub async fn switch(factory: Arc<Factory>, args: SwitchArgs) -> Result<()> {
    let config = factory.config();
    let organization = match &args.org.organization {
        Some(org) => scope::organization_name(org),
        None => {
            let names = config.organizations()?;
            if names.is_empty() {
                return Err(CliError::NoResults("no organizations configured; run azdo auth login".into()).into());
            }
            let current = config.default_organization()?;
            let default = current.and_then(|c| names.iter().position(|n| *n == c));
            let options = names.clone();
            let index = prompter::prompt(factory.prompter(), factory.cancel(), move |p| {
                p.select("Default organization", default, &options)
            })
            .await?;
            names[index].clone()
        }
    };
    if config.organization(&organization)?.is_none() {
        return Err(scope::ScopeError::UnknownOrganization(organization).into());
    }
    config.set_default_organization(&organization)?;
    output::success(factory.io(), &format!("Default organization set to {organization}"));
    Ok(())
}

/// `azdo auth`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("auth", "Authenticate azdo and git with Azure DevOps")
        .skip_auth()
        .child(
            CommandNode::leaf("login", "Log in to an Azure DevOps organization", factory, login)
                .long_about(
                    "Authenticate with an Azure DevOps organization using a personal access token.\n\n\
                     The token is validated before it is stored in the system keyring. When no\n\
                     keyring is available, or --insecure-storage is given, it is written to the\n\
                     credentials file in the config directory instead.",
                )
                .example("azdo auth login --organization contoso")
                .example("azdo auth login -o contoso --with-token < token.txt"),
        )
        .child(CommandNode::leaf("logout", "Log out of an organization", factory, logout))
        .child(
            CommandNode::leaf("status", "Show the organizations you are logged in to", factory, status)
                .json_fields(STATUS_FIELDS),
        )
        .child(CommandNode::leaf("token", "Print the token for an organization", factory, token))
        .child(
            CommandNode::leaf("switch", "Change the default organization", factory, switch)
                .example("azdo auth switch -o fabrikam"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use crate::cli::context::FactoryBuilder;
    use crate::config::{ConfigStore, EnvVars};
    use crate::infra::keyring::{CredentialStore, MemorySecrets};
    use crate::infra::IoStreams;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_organization_target() {
        assert_eq!(
            organization_target("contoso").unwrap(),
            ("contoso".to_string(), "https://dev.azure.com/contoso".to_string())
        );
        assert_eq!(
            organization_target("https://fabrikam.visualstudio.com/").unwrap(),
            ("fabrikam".to_string(), "https://dev.azure.com/fabrikam".to_string())
        );
        assert_eq!(
            organization_target("https://tfs.local/tfs/Main").unwrap(),
            ("Main".to_string(), "https://tfs.local/tfs/Main".to_string())
        );
    }

    #[tokio::test]
    async fn test_login_with_token_stores_and_sets_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/connectionData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authenticatedUser": {"id": "u1", "descriptor": "d", "providerDisplayName": "Mona"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (io, _) = IoStreams::test_with_input("secret-pat\n");
        let credentials = CredentialStore::new(None, Arc::new(MemorySecrets::new()), ConfigStore::in_memory());
        let factory = Arc::new(FactoryBuilder::new(io).credentials(credentials).build());

        login(
            Arc::clone(&factory),
            LoginArgs {
                organization: Some(format!("{}/contoso", server.uri())),
                with_token: true,
                insecure_storage: false,
                git_protocol: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(factory.config().default_organization().unwrap().as_deref(), Some("contoso"));
        let token = factory.credentials().token("contoso").unwrap().unwrap();
        assert_eq!(token.value, "secret-pat");
    }

    #[tokio::test]
    async fn test_rejected_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/contoso/_apis/connectionData"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let (io, _) = IoStreams::test_with_input("bad\n");
        let factory = Arc::new(FactoryBuilder::new(io).build());
        let err = login(
            Arc::clone(&factory),
            LoginArgs {
                organization: Some(format!("{}/contoso", server.uri())),
                with_token: true,
                insecure_storage: false,
                git_protocol: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(crate::error::exit_code(&err), crate::error::exit::AUTH);
        assert!(factory.config().organizations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_refuses_with_env_token() {
        let (io, _) = IoStreams::test();
        let factory = Arc::new(
            FactoryBuilder::new(io)
                .env(EnvVars::from_pairs([("AZDO_TOKEN", "x")]))
                .build(),
        );
        let err = login(
            factory,
            LoginArgs {
                organization: Some("contoso".into()),
                with_token: true,
                insecure_storage: false,
                git_protocol: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("AZDO_TOKEN"));
    }

    #[tokio::test]
    async fn test_status_json_marks_default() {
        let h = Harness::start().await;
        status(
            Arc::clone(&h.factory),
            StatusArgs {
                org: OrgArgs::default(),
                export: ExportArgs {
                    json: Some(vec!["organization".into(), "isDefault".into(), "tokenSource".into()]),
                    jq: None,
                    template: None,
                },
            },
        )
        .await
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&h.out()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"organization": "contoso", "isDefault": true, "tokenSource": "AZDO_TOKEN"}])
        );
    }

    #[tokio::test]
    async fn test_switch_rejects_unknown_organization() {
        let h = Harness::start().await;
        let err = switch(
            Arc::clone(&h.factory),
            SwitchArgs {
                org: OrgArgs {
                    organization: Some("fabrikam".into()),
                },
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("\"fabrikam\" is not configured"));
    }

    #[tokio::test]
    async fn test_token_prints_env_token() {
        let h = Harness::start().await;
        token(Arc::clone(&h.factory), TokenArgs { org: OrgArgs::default() })
            .await
            .unwrap();
        assert_eq!(h.out(), "pat\n");
    }
}
