//! Config command implementation
//!
//! Implements `azdo config get|set|list`. Values are looked up in the
//! organization scope first, then at the root, then fall back to the
//! built-in default of a known key.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::output;
use crate::config::store::{known_option, KNOWN_OPTIONS};

use super::OrgArgs;

/// Arguments for `azdo config get`
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Config key
    #[arg(value_name = "KEY")]
    pub key: String,

    #[command(flatten)]
    pub org: OrgArgs,
}

/// Arguments for `azdo config set`
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Config key
    #[arg(value_name = "KEY")]
    pub key: String,

    /// New value
    #[arg(value_name = "VALUE")]
    pub value: String,

    #[command(flatten)]
    pub org: OrgArgs,
}

/// Arguments for `azdo config list`
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub org: OrgArgs,
}

/// Execute `config get`
pub async fn get(factory: Arc<Factory>, args: GetArgs) -> Result<()> {
    let value = factory
        .config()
        .get_scoped(args.org.organization.as_deref(), &args.key)?;
    if !value.is_empty() {
        writeln!(factory.io().out(), "{value}")?;
    }
    Ok(())
}

/// Execute `config set`
pub async fn set(factory: Arc<Factory>, args: SetArgs) -> Result<()> {
    if known_option(&args.key).is_none() {
        output::warning(
            factory.io(),
            &format!("'{}' is not a known configuration key", args.key),
        );
    }
    let organization = args.org.organization.as_deref();
    if let Some(org) = organization {
        if factory.config().organization(org)?.is_none() {
            return Err(crate::core::scope::ScopeError::UnknownOrganization(org.to_string()).into());
        }
    }
    factory.config().set_scoped(organization, &args.key, &args.value)?;
    Ok(())
}

/// Execute `config list`
pub async fn list(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    let config = factory.config();
    let mut out = factory.io().out();
    for option in KNOWN_OPTIONS {
        let value = config.get_scoped(args.org.organization.as_deref(), option.key)?;
        writeln!(out, "{}={}", option.key, value)?;
    }
    Ok(())
}

fn keys_help() -> String {
    let mut text = String::from("Display or change configuration settings for azdo.\n\nCurrent respected settings:\n");
    for option in KNOWN_OPTIONS {
        text.push_str(&format!("- {}: {}", option.key, option.description));
        if !option.allowed.is_empty() {
            text.push_str(&format!(" {{{}}}", option.allowed.join(" | ")));
        }
        if !option.default.is_empty() {
            text.push_str(&format!(" (default {})", option.default));
        }
        text.push('\n');
    }
    text
}

/// `azdo config`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("config", "Manage configuration for azdo")
        .long_about(&keys_help())
        .skip_auth()
        .child(
            CommandNode::leaf("get", "Print the value of a given configuration key", factory, get)
                .example("azdo config get git_protocol"),
        )
        .child(
            CommandNode::leaf("set", "Update configuration with a value for the given key", factory, set)
                .example("azdo config set editor \"code --wait\"")
                .example("azdo config set git_protocol ssh -o contoso"),
        )
        .child(
            CommandNode::leaf("list", "Print a list of configuration keys and values", factory, list)
                .alias("ls"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;

    #[tokio::test]
    async fn test_get_falls_back_to_default() {
        let h = Harness::start().await;
        get(
            Arc::clone(&h.factory),
            GetArgs {
                key: "git_protocol".into(),
                org: OrgArgs::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(h.out(), "https\n");
    }

    #[tokio::test]
    async fn test_set_scoped_then_list() {
        let h = Harness::start().await;
        let org = OrgArgs {
            organization: Some("contoso".into()),
        };
        set(
            Arc::clone(&h.factory),
            SetArgs {
                key: "git_protocol".into(),
                value: "ssh".into(),
                org: org.clone(),
            },
        )
        .await
        .unwrap();
        list(Arc::clone(&h.factory), ListArgs { org }).await.unwrap();
        assert!(h.out().contains("git_protocol=ssh\n"));
        assert!(h.out().contains("prompt=enabled\n"));
    }

    #[tokio::test]
    async fn test_set_rejects_disallowed_value() {
        let h = Harness::start().await;
        let err = set(
            Arc::clone(&h.factory),
            SetArgs {
                key: "prompt".into(),
                value: "sometimes".into(),
                org: OrgArgs::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("valid values are enabled, disabled"));
    }

    #[tokio::test]
    async fn test_set_unknown_key_warns() {
        let h = Harness::start().await;
        set(
            Arc::clone(&h.factory),
            SetArgs {
                key: "colour".into(),
                value: "yes".into(),
                org: OrgArgs::default(),
            },
        )
        .await
        .unwrap();
        assert!(h.err().contains("'colour' is not a known configuration key"));
    }
}
