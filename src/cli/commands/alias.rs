//! Alias command implementation
//!
//! Aliases are stored under `aliases` in the config file. An expansion is
//! either an azdo command line using `$1..$N` placeholders or, with a
//! leading `!`, a script for `sh`.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::output::{self, ColorScheme};
use crate::cli::printer::FieldOpts;
use crate::core::alias::is_shell;
use crate::error::CliError;

/// Arguments for `azdo alias set`
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Alias name
    #[arg(value_name = "ALIAS")]
    pub name: String,

    /// Expansion; `-` reads it from standard input
    #[arg(value_name = "EXPANSION")]
    pub expansion: String,

    /// Declare an alias to be passed through a shell interpreter
    #[arg(short = 's', long)]
    pub shell: bool,

    /// Overwrite an existing alias of the same name
    #[arg(long)]
    pub clobber: bool,
}

/// Arguments for `azdo alias list`
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Arguments for `azdo alias delete`
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Alias name
    #[arg(value_name = "ALIAS", required_unless_present = "all")]
    pub name: Option<String>,

    /// Delete all aliases
    #[arg(long, conflicts_with = "name")]
    pub all: bool,
}

/// Check a new alias against the command tree
///
/// The alias path must not resolve to an existing command, and an in-tree
/// expansion must start with a top-level command.
pub fn validate(root: &CommandNode, name: &str, expansion: &str, shell: bool) -> Result<()> {
    let path: Vec<&str> = name.split_whitespace().collect();
    if path.is_empty() {
        return Err(CliError::flag("could not create alias: empty alias name").into());
    }
    let mut node = Some(root);
    for word in &path {
        node = node.and_then(|n| n.find_child(word));
    }
    if node.is_some() {
        return Err(CliError::flag(format!(
            "could not create alias: \"{name}\" is already an azdo command"
        ))
        .into());
    }
    if shell || is_shell(expansion) {
        return Ok(());
    }
    let words = shell_words::split(expansion)
        .with_context(|| format!("could not create alias: invalid expansion {expansion:?}"))?;
    match words.first() {
        Some(command) if root.find_child(command).is_some() => Ok(()),
        _ => Err(CliError::flag(format!(
            "could not create alias: {expansion} does not correspond to an azdo command"
        ))
        .into()),
    }
}

/// Execute `alias set`
pub async fn set(factory: Arc<Factory>, args: SetArgs) -> Result<()> {
    let mut expansion = args.expansion.clone();
    if expansion == "-" {
        let io = Arc::clone(factory.io());
        expansion = tokio::task::spawn_blocking(move || io.read_all())
            .await
            .context("reading alias expansion")??
            .trim()
            .to_string();
    }
    validate(&super::root(&factory), &args.name, &expansion, args.shell)?;
    if args.shell && !is_shell(&expansion) {
        expansion = format!("!{expansion}");
    }

    let config = factory.config();
    let existing = config.alias(&args.name)?;
    if existing.is_some() && !args.clobber {
        return Err(CliError::flag(format!(
            "could not create alias {}: name already taken; use --clobber to overwrite",
            args.name
        ))
        .into());
    }
    config.set_alias(&args.name, &expansion)?;

    let cs = ColorScheme::new(factory.io());
    let verb = if existing.is_some() { "Changed" } else { "Added" };
    output::success(
        factory.io(),
        &format!("{verb} alias {}: {}", cs.bold(&args.name), expansion),
    );
    Ok(())
}

/// Execute `alias list`
pub async fn list(factory: Arc<Factory>, _args: ListArgs) -> Result<()> {
    let aliases = factory.config().aliases()?;
    if aliases.is_empty() {
        return Err(CliError::NoResults("no aliases configured".to_string()).into());
    }
    let mut printer = factory.printer(Default::default());
    printer.add_columns(&["Name", "Expansion"]);
    for (name, expansion) in &aliases {
        printer.add_field(name);
        printer.add_field_with(expansion, FieldOpts::no_truncate());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `alias delete`
pub async fn delete(factory: Arc<Factory>, args: DeleteArgs) -> Result<()> {
    let config = factory.config();
    let names: Vec<String> = match &args.name {
        Some(name) => vec![name.clone()],
        None => config.aliases()?.into_keys().collect(),
    };
    if names.is_empty() {
        return Err(CliError::NoResults("no aliases configured".to_string()).into());
    }
    for name in names {
        let expansion = config
            .alias(&name)?
            .ok_or_else(|| CliError::NotFound(format!("no such alias {name}")))?;
        config.delete_alias(&name)?;
        output::success(factory.io(), &format!("Deleted alias {name}; was {expansion}"));
    }
    Ok(())
}

/// `azdo alias`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("alias", "Create command shortcuts")
        .long_about(
            "Aliases can be used to make shortcuts for azdo commands or to compose multiple commands.\n\n\
             Run 'azdo help alias set' to learn more.",
        )
        .skip_auth()
        .child(
            CommandNode::leaf("set", "Create a shortcut for an azdo command", factory, set)
                .long_about(
                    "Define a word that will expand to a full azdo command when invoked.\n\n\
                     The expansion may specify additional arguments and flags. If the expansion includes\n\
                     positional placeholders such as \"$1\", extra arguments that follow the alias will be\n\
                     inserted appropriately. Otherwise, extra arguments will be appended to the expanded\n\
                     command.\n\n\
                     Use \"-\" as expansion argument to read the expansion string from standard input.\n\n\
                     Quotes must always be used when defining a command as in the examples unless you pass\n\
                     \"-\" as the expansion parameter and pipe your command to azdo alias set.\n\n\
                     If --shell is specified, the alias will be run through a shell interpreter (sh).\n\
                     This allows you to compose commands with \"|\" or redirect with \">\".",
                )
                .example("azdo alias set prls 'pr list --state=all'")
                .example("azdo alias set co 'pr checkout'")
                .example("azdo alias set --shell igrep 'azdo repo list \"$1\" | grep \"$2\"'"),
        )
        .child(CommandNode::leaf("list", "List your aliases", factory, list).alias("ls"))
        .child(CommandNode::leaf("delete", "Delete set aliases", factory, delete))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;

    fn tree() -> CommandNode {
        CommandNode::parent("azdo", "Work with Azure DevOps")
            .child(
                CommandNode::parent("pr", "Manage pull requests")
                    .child(CommandNode::parent("list", "List pull requests")),
            )
            .child(CommandNode::parent("repo", "Manage repositories"))
    }

    #[test]
    fn test_validate() {
        let root = tree();
        assert!(validate(&root, "prls", "pr list --state=all", false).is_ok());
        assert!(validate(&root, "open", "!xdg-open", false).is_ok());
        assert!(validate(&root, "g", "git status", true).is_ok());
        let shadow = validate(&root, "pr", "repo list", false).unwrap_err();
        assert!(shadow.to_string().contains("already an azdo command"));
        let bogus = validate(&root, "x", "frobnicate now", false).unwrap_err();
        assert!(bogus.to_string().contains("does not correspond to an azdo command"));
    }

    #[test]
    fn test_validate_accepts_new_path_under_a_command() {
        let root = tree();
        assert!(validate(&root, "pr ls", "pr list --state=all", false).is_ok());
        let shadow = validate(&root, "pr list", "repo list", false).unwrap_err();
        assert!(shadow.to_string().contains("\"pr list\" is already an azdo command"));
    }

    #[tokio::test]
    async fn test_set_requires_clobber_to_replace() {
        let h = Harness::start().await;
        let args = |expansion: &str, clobber| SetArgs {
            name: "prls".into(),
            expansion: expansion.into(),
            shell: false,
            clobber,
        };
        set(Arc::clone(&h.factory), args("pr list", false)).await.unwrap();
        let err = set(Arc::clone(&h.factory), args("pr list -L 5", false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--clobber"));
        set(Arc::clone(&h.factory), args("pr list -L 5", true)).await.unwrap();
        assert_eq!(
            h.factory.config().alias("prls").unwrap().as_deref(),
            Some("pr list -L 5")
        );
    }

    #[tokio::test]
    async fn test_shell_flag_prefixes_expansion() {
        let h = Harness::start().await;
        set(
            Arc::clone(&h.factory),
            SetArgs {
                name: "open".into(),
                expansion: "xdg-open".into(),
                shell: true,
                clobber: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(h.factory.config().alias("open").unwrap().as_deref(), Some("!xdg-open"));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let h = Harness::start().await;
        h.factory.config().set_alias("co", "pr checkout").unwrap();
        list(Arc::clone(&h.factory), ListArgs {}).await.unwrap();
        assert_eq!(h.out(), "co\tpr checkout\n");

        delete(
            Arc::clone(&h.factory),
            DeleteArgs {
                name: Some("co".into()),
                all: false,
            },
        )
        .await
        .unwrap();
        assert!(h.factory.config().aliases().unwrap().is_empty());

        let err = delete(
            Arc::clone(&h.factory),
            DeleteArgs {
                name: Some("co".into()),
                all: false,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no such alias co"));
    }
}
