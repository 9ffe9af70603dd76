//! Execution context
//!
//! One [`Factory`] per invocation. Every collaborator is built on first use
//! and memoized: config, credentials, prompter, per-organization clients and
//! the repository discovered from the working copy. Tests assemble a
//! factory with [`FactoryBuilder`] to swap any of them out.

use anyhow::Context;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::printer::{self, OutputFormat, Printer};
use crate::client::AzdoClient;
use crate::config::env::{self, EnvVars};
use crate::config::{urls, ConfigStore};
use crate::core::duration;
use crate::core::scope::{self, RepoRef, Scope, ScopeError, ScopeRef};
use crate::error::CliError;
use crate::infra::dirs::AzdoDirs;
use crate::infra::git::{Git, RemoteRepo};
use crate::infra::keyring::{CredentialStore, MemorySecrets, ResolvedToken, SystemKeyring};
use crate::infra::prompter::{self, DialoguerPrompter, DisabledPrompter, PromptError, Prompter};
use crate::infra::process;
use crate::infra::IoStreams;

/// How much diagnostic output was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    /// Warnings only
    #[default]
    Off,
    /// `AZDO_DEBUG` set
    On,
    /// `AZDO_DEBUG=api`: also log HTTP traffic
    Api,
}

impl DebugMode {
    /// Mode selected by the environment
    pub fn from_env(env: &EnvVars) -> Self {
        match env.get(env::AZDO_DEBUG) {
            Some(v) if v.eq_ignore_ascii_case("api") => Self::Api,
            Some(_) if env.is_truthy(env::AZDO_DEBUG) => Self::On,
            _ => Self::Off,
        }
    }

    /// Whether anything beyond warnings is shown
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Organization URL and token
#[derive(Debug, Clone)]
pub struct Connection {
    /// Organization name
    pub organization: String,
    /// Organization URL
    pub url: String,
    /// Resolved token
    pub token: ResolvedToken,
}

/// Collaborators for one invocation
pub struct Factory {
    io: Arc<IoStreams>,
    env: EnvVars,
    dirs: AzdoDirs,
    config: OnceCell<Arc<ConfigStore>>,
    credentials: OnceCell<Arc<CredentialStore>>,
    prompter: OnceCell<Arc<dyn Prompter>>,
    clients: Mutex<HashMap<String, AzdoClient>>,
    repo: tokio::sync::OnceCell<RemoteRepo>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("io", &self.io)
            .field("dirs", &self.dirs)
            .finish()
    }
}

impl Factory {
    /// Factory over the real process environment
    pub fn system(io: IoStreams, env: EnvVars) -> Self {
        let dirs = AzdoDirs::from_env(&env);
        Self {
            io: Arc::new(io),
            env,
            dirs,
            config: OnceCell::new(),
            credentials: OnceCell::new(),
            prompter: OnceCell::new(),
            clients: Mutex::new(HashMap::new()),
            repo: tokio::sync::OnceCell::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Isolated factory: in-memory streams and config, no prompts
    pub fn for_tests() -> Self {
        let (io, _) = IoStreams::test();
        FactoryBuilder::new(io).build()
    }

    /// Standard streams
    pub fn io(&self) -> &Arc<IoStreams> {
        &self.io
    }

    /// Environment snapshot
    pub fn env(&self) -> &EnvVars {
        &self.env
    }

    /// Config directories
    pub fn dirs(&self) -> &AzdoDirs {
        &self.dirs
    }

    /// Cancellation token for the whole invocation
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Diagnostic output level
    pub fn debug_mode(&self) -> DebugMode {
        DebugMode::from_env(&self.env)
    }

    /// Config store
    pub fn config(&self) -> Arc<ConfigStore> {
        Arc::clone(
            self.config
                .get_or_init(|| Arc::new(ConfigStore::from_file(self.dirs.config_path()))),
        )
    }

    /// Credential store
    pub fn credentials(&self) -> Arc<CredentialStore> {
        Arc::clone(self.credentials.get_or_init(|| {
            Arc::new(CredentialStore::new(
                self.env.get(env::AZDO_TOKEN).map(str::to_string),
                Arc::new(SystemKeyring),
                ConfigStore::from_file(self.dirs.credentials_path()),
            ))
        }))
    }

    /// Prompter; disabled off a terminal or when prompting is turned off
    pub fn prompter(&self) -> Arc<dyn Prompter> {
        Arc::clone(self.prompter.get_or_init(|| {
            if self.env.is_truthy(env::AZDO_PROMPT_DISABLED) {
                return Arc::new(DisabledPrompter::new("prompts disabled by AZDO_PROMPT_DISABLED"));
            }
            let configured = self.config().get_scoped(None, "prompt").unwrap_or_default();
            if configured == "disabled" {
                return Arc::new(DisabledPrompter::new("prompts disabled by config"));
            }
            if !self.io.can_prompt() {
                return Arc::new(DisabledPrompter::new("not attached to a terminal"));
            }
            Arc::new(DialoguerPrompter)
        }))
    }

    /// Printer for a format
    pub fn printer(&self, format: OutputFormat) -> Box<dyn Printer> {
        printer::new_printer(Arc::clone(&self.io), format)
    }

    /// Global deadline from the `timeout` config key
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        let value = self.config().get_scoped(None, "timeout")?;
        if value.trim().is_empty() {
            return Ok(None);
        }
        let timeout = duration::parse(&value).context("invalid 'timeout' in config")?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }

    /// Editor command: environment, then config
    pub fn editor(&self) -> anyhow::Result<Option<String>> {
        if let Some(editor) = self.env.first_of(env::EDITOR_VARS) {
            return Ok(Some(editor.to_string()));
        }
        let configured = self.config().get_scoped(None, "editor")?;
        Ok((!configured.is_empty()).then_some(configured))
    }

    /// Edit `initial` in the configured editor on the alternate screen
    pub async fn edit_text(&self, initial: &str) -> anyhow::Result<String> {
        let editor = self
            .editor()?
            .ok_or_else(|| CliError::flag("no editor configured; set AZDO_EDITOR or the editor setting"))?;
        self.io.start_alternate_screen()?;
        let edited = process::edit_text(&editor, initial).await;
        self.io.stop_alternate_screen()?;
        Ok(edited?)
    }

    /// Browser command: environment, then config
    pub fn browser(&self) -> anyhow::Result<Option<String>> {
        if let Some(browser) = self.env.first_of(env::BROWSER_VARS) {
            return Ok(Some(browser.to_string()));
        }
        let configured = self.config().get_scoped(None, "browser")?;
        Ok((!configured.is_empty()).then_some(configured))
    }

    /// Start the pager: `AZDO_PAGER`, then config, then `PAGER`
    pub fn start_pager(&self) -> anyhow::Result<()> {
        if self.env.get(env::AZDO_PAGER).is_none() {
            let configured = self.config().get_scoped(None, "pager")?;
            if !configured.is_empty() {
                self.io.set_pager_command(Some(configured));
            }
        }
        self.io.start_pager().context("failed to start pager")?;
        Ok(())
    }

    /// Default organization: flag, `AZDO_ORGANIZATION`, then config
    pub fn organization(&self, flag: Option<&str>) -> anyhow::Result<String> {
        let configured = self.config().default_organization()?;
        Ok(scope::default_organization(
            flag,
            self.env.get(env::AZDO_ORGANIZATION),
            configured.as_deref(),
        )?)
    }

    /// Resolve `[ORG/]PROJECT[/TARGET]`
    pub fn resolve_scope(&self, input: &str) -> anyhow::Result<Scope> {
        let parsed = ScopeRef::parse(input)?;
        self.resolve(parsed)
    }

    /// Resolve `[ORG/]PROJECT/TARGET`
    pub fn resolve_target(&self, input: &str) -> anyhow::Result<Scope> {
        let parsed = ScopeRef::parse_with_target(input)?;
        self.resolve(parsed)
    }

    fn resolve(&self, parsed: ScopeRef) -> anyhow::Result<Scope> {
        let configured = self.config().default_organization()?;
        let env_org = self.env.get(env::AZDO_ORGANIZATION).map(str::to_string);
        Ok(parsed.resolve(|| {
            scope::default_organization(None, env_org.as_deref(), configured.as_deref())
        })?)
    }

    /// Repository from `--repo`, or the current repository
    pub async fn repo_ref(&self, flag: Option<&str>) -> anyhow::Result<RepoRef> {
        match flag {
            Some(input) => {
                let scope = self.resolve_target(input)?;
                Ok(RepoRef::from_scope(scope, input)?)
            }
            None => {
                let repo = self.repo_context().await?;
                Ok(RepoRef {
                    organization: repo.organization,
                    project: repo.project,
                    repository: repo.repository,
                })
            }
        }
    }

    /// Repository of the working copy, discovered once
    pub async fn repo_context(&self) -> anyhow::Result<RemoteRepo> {
        let repo = self
            .repo
            .get_or_try_init(|| async {
                let git = Git::locate()?;
                let (remote, repo) = git.azure_remote().await?;
                tracing::debug!("current repository {}/{}/{} from remote {}", repo.organization, repo.project, repo.repository, remote.name);
                Ok::<_, anyhow::Error>(repo)
            })
            .await
            .context("could not determine the current repository; pass --repo ORG/PROJECT/REPO")?;
        Ok(repo.clone())
    }

    /// Git in the working directory
    pub fn git(&self) -> anyhow::Result<Git> {
        Ok(Git::locate()?)
    }

    /// Whether any credential can be resolved
    pub fn has_credentials(&self) -> anyhow::Result<bool> {
        let credentials = self.credentials();
        if credentials.has_env_token() {
            return Ok(true);
        }
        for org in self.config().organizations()? {
            if credentials.token(&org)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// URL and token of an organization
    pub fn connection(&self, organization: &str) -> anyhow::Result<Connection> {
        let credentials = self.credentials();
        let url = match self.config().organization(organization)? {
            Some(org) => org.url,
            None if credentials.has_env_token() => urls::organization_url(organization),
            None => return Err(ScopeError::UnknownOrganization(organization.to_string()).into()),
        };
        let token = credentials.token(organization)?.ok_or_else(|| {
            CliError::Auth(format!(
                "no token found for organization \"{organization}\"; run 'azdo auth login --organization {organization}'"
            ))
        })?;
        Ok(Connection {
            organization: organization.to_string(),
            url,
            token,
        })
    }

    /// REST client for an organization, cached for the invocation
    pub fn client(&self, organization: &str) -> anyhow::Result<AzdoClient> {
        let key = organization.to_ascii_lowercase();
        if let Some(client) = self.clients.lock().get(&key) {
            return Ok(client.clone());
        }
        let connection = self.connection(organization)?;
        tracing::debug!(
            "connecting to {} with token from {}",
            connection.url,
            connection.token.source
        );
        let client = AzdoClient::builder()
            .organization(&connection.organization)
            .base_url(&connection.url)
            .token(&connection.token.value)
            .cancel(self.cancel.clone())
            .build()?;
        self.clients.lock().insert(key, client.clone());
        Ok(client)
    }

    /// Ask before a destructive action unless `yes` was given
    ///
    /// A negative answer is [`CliError::Cancel`]; a session that cannot
    /// prompt must pass `--yes`.
    pub async fn confirm(&self, yes: bool, question: &str) -> anyhow::Result<()> {
        if yes {
            return Ok(());
        }
        let question = question.to_string();
        let answer =
            prompter::prompt(self.prompter(), &self.cancel, move |p| p.confirm(&question, false))
                .await;
        match answer {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::Cancel.into()),
            Err(e) if matches!(e.downcast_ref::<PromptError>(), Some(PromptError::Disabled(_))) => {
                Err(CliError::flag("--yes required when not running interactively").into())
            }
            Err(e) => Err(e),
        }
    }
}

/// Assembles a [`Factory`] from explicit parts
pub struct FactoryBuilder {
    io: IoStreams,
    env: EnvVars,
    dirs: Option<AzdoDirs>,
    config: Option<ConfigStore>,
    credentials: Option<CredentialStore>,
    prompter: Option<Arc<dyn Prompter>>,
    repo: Option<RemoteRepo>,
    cancel: CancellationToken,
}

impl FactoryBuilder {
    /// Start from the given streams with an empty environment
    pub fn new(io: IoStreams) -> Self {
        Self {
            io,
            env: EnvVars::default(),
            dirs: None,
            config: None,
            credentials: None,
            prompter: None,
            repo: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Environment snapshot
    #[must_use]
    pub fn env(mut self, env: EnvVars) -> Self {
        self.env = env;
        self
    }

    /// Config directories
    #[must_use]
    pub fn dirs(mut self, dirs: AzdoDirs) -> Self {
        self.dirs = Some(dirs);
        self
    }

    /// Config store
    #[must_use]
    pub fn config(mut self, config: ConfigStore) -> Self {
        self.config = Some(config);
        self
    }

    /// Credential store
    #[must_use]
    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Prompter
    #[must_use]
    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Current repository, skipping git discovery
    #[must_use]
    pub fn repo(mut self, repo: RemoteRepo) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Cancellation token
    #[must_use]
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the factory; unset parts default to in-memory stand-ins
    pub fn build(self) -> Factory {
        let dirs = self
            .dirs
            .unwrap_or_else(|| AzdoDirs::with_config_dir(std::env::temp_dir().join("azdo-test-config")));
        let config = self.config.unwrap_or_else(ConfigStore::in_memory);
        let credentials = self.credentials.unwrap_or_else(|| {
            CredentialStore::new(
                self.env.get(env::AZDO_TOKEN).map(str::to_string),
                Arc::new(MemorySecrets::new()),
                ConfigStore::in_memory(),
            )
        });
        let prompter = self
            .prompter
            .unwrap_or_else(|| Arc::new(DisabledPrompter::new("not attached to a terminal")));
        Factory {
            io: Arc::new(self.io),
            env: self.env,
            dirs,
            config: OnceCell::with_value(Arc::new(config)),
            credentials: OnceCell::with_value(Arc::new(credentials)),
            prompter: OnceCell::with_value(prompter),
            clients: Mutex::new(HashMap::new()),
            repo: tokio::sync::OnceCell::new_with(self.repo),
            cancel: self.cancel,
        }
    }
}
