//! CLI command implementations
//!
//! Each command group lives in its own submodule and exposes a `command`
//! function returning its subtree. Leaves are `execute` functions taking the
//! shared [`Factory`] and their parsed arguments.

pub mod alias;
pub mod auth;
pub mod boards;
pub mod config;
pub mod graph;
pub mod pr;
pub mod project;
pub mod repo;
pub mod security;
pub mod service_endpoint;
pub mod topics;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

use clap::Args;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::command::{CommandNode, Group};
use crate::cli::context::Factory;
use crate::config::defaults;
use crate::core::duration::{self, DurationError};
use crate::core::poll::{self, PollOptions};
use crate::core::scope::Scope;
use crate::error::CliError;
use crate::infra::prompter::{self, PromptError, Prompter};

/// `-o/--organization`
#[derive(Args, Debug, Clone, Default)]
pub struct OrgArgs {
    /// Organization name or URL; defaults to the configured organization
    #[arg(short = 'o', long = "organization", value_name = "ORG")]
    pub organization: Option<String>,
}

/// `-y/--yes`
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct YesArgs {
    /// Do not prompt for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// `--wait` and `--timeout` for long-running operations
#[derive(Args, Debug, Clone, Copy)]
pub struct WaitArgs {
    /// Wait for the operation to complete
    #[arg(long)]
    pub wait: bool,

    /// Maximum time to wait, e.g. 90s or 5m
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, default_value = "5m")]
    pub timeout: Duration,
}

impl Default for WaitArgs {
    fn default() -> Self {
        Self {
            wait: false,
            timeout: defaults::WAIT_TIMEOUT,
        }
    }
}

impl WaitArgs {
    /// Poll limits for `--timeout`
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::with_timeout(self.timeout)
    }
}

/// Clap value parser for duration flags
pub fn parse_duration(value: &str) -> Result<Duration, DurationError> {
    duration::parse(value)
}

/// Poll an asynchronous server operation until it reaches a final state
///
/// `check` returns `Ok(Some(value))` when done, `Ok(None)` while still
/// running.
pub async fn wait_for<T, F, Fut>(factory: &Factory, wait: &WaitArgs, mut check: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Option<T>>>,
{
    poll::poll(factory.cancel(), wait.poll_options(), || {
        let pending = check();
        async move {
            match pending.await? {
                Some(value) => Ok(value),
                None => Err(CliError::transient("operation still in progress").into()),
            }
        }
    })
    .await
}

/// Run a prompt; without a terminal the user is told which flag to pass
pub async fn ask<T, F>(factory: &Factory, flag: &str, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Prompter) -> Result<T, PromptError> + Send + 'static,
{
    prompter::prompt(factory.prompter(), factory.cancel(), f)
        .await
        .map_err(|e| match e.downcast_ref::<PromptError>() {
            Some(PromptError::Disabled(_)) => {
                CliError::flag(format!("{flag} required when not running interactively")).into()
            }
            _ => e,
        })
}

/// Project named by an optional `[ORG/]PROJECT` argument
///
/// Without one, the project of the current repository is used.
pub async fn project_scope(factory: &Factory, input: Option<&str>) -> anyhow::Result<Scope> {
    match input {
        Some(input) => {
            let scope = factory.resolve_scope(input)?;
            if scope.target.is_some() {
                return Err(CliError::flag(format!("{input:?} is not a valid project reference")).into());
            }
            Ok(scope)
        }
        None => {
            let repo = factory.repo_context().await?;
            Ok(Scope {
                organization: repo.organization,
                project: repo.project,
                target: None,
            })
        }
    }
}

/// The full command tree
pub fn root(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent(defaults::PROGRAM_NAME, "Work seamlessly with Azure DevOps from the command line.")
        .long_about(
            "Work seamlessly with Azure DevOps from the command line.\n\n\
             Manage organizations, projects, repositories, pull requests, boards,\n\
             security and service endpoints without leaving the terminal.",
        )
        .child(auth::command(factory).group(Group::Core))
        .child(boards::command(factory).group(Group::Core))
        .child(config::command(factory).group(Group::Core))
        .child(pr::command(factory).group(Group::Core))
        .child(project::command(factory).group(Group::Core))
        .child(repo::command(factory).group(Group::Core))
        .child(graph::command(factory).group(Group::Security))
        .child(security::command(factory).group(Group::Security))
        .child(service_endpoint::command(factory).group(Group::Security))
        .child(alias::command(factory).group(Group::Alias))
        .child(version::command(factory))
        .child(topics::mintty())
        .child(topics::environment())
        .child(topics::exit_codes())
        .child(topics::formatting())
        .child(topics::reference())
}
