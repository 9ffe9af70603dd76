//! Argument dispatch
//!
//! Turns `argv` into a handler call: user aliases are expanded first, then
//! the command tree is walked word by word. Help, topics and bare `--json`
//! are answered here; everything else goes through the auth check and into
//! the leaf handler.

use clap::ArgMatches;
use std::io::Write;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::{exporter, help};
use crate::config::defaults;
use crate::core::alias::{self, AliasError, Expansion};
use crate::core::suggest;
use crate::error::CliError;
use crate::infra::process;

/// Name of the hidden topic that prints every command's help
pub const REFERENCE_TOPIC: &str = "reference";

/// Routes arguments through the command tree
pub struct Dispatcher {
    root: CommandNode,
    factory: Arc<Factory>,
}

impl Dispatcher {
    /// Dispatcher over a built tree
    pub fn new(root: CommandNode, factory: Arc<Factory>) -> Self {
        Self { root, factory }
    }

    /// Command tree
    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    /// Run one invocation; `args` excludes the program name
    pub async fn run(&self, args: Vec<String>) -> anyhow::Result<()> {
        let mut args = args;
        for _ in 0..=defaults::MAX_ALIAS_DEPTH {
            match self.expand_alias(&args)? {
                None => return self.dispatch(&args).await,
                Some(Expansion::Command(expanded)) => {
                    tracing::debug!("alias expanded to {:?}", expanded);
                    args = expanded;
                }
                Some(Expansion::Shell { script, args }) => {
                    tracing::debug!("running shell alias {:?}", script);
                    let code = process::run_shell_alias(&script, &args).await?;
                    if code != 0 {
                        return Err(CliError::ExternalCommandExit {
                            command: "sh".to_string(),
                            code,
                        }
                        .into());
                    }
                    return Ok(());
                }
            }
        }
        Err(AliasError::TooDeep(defaults::MAX_ALIAS_DEPTH).into())
    }

    /// Whether the leading words name a built-in command
    fn is_command_path(&self, words: &[String]) -> bool {
        let mut node = &self.root;
        for word in words {
            match node.find_child(word) {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    fn expand_alias(&self, args: &[String]) -> anyhow::Result<Option<Expansion>> {
        let Some(first) = args.first() else {
            return Ok(None);
        };
        if first.starts_with('-') || first == "help" {
            return Ok(None);
        }
        let aliases = self.factory.config().aliases()?;
        let Some((expansion, consumed)) = alias::find(&aliases, args) else {
            return Ok(None);
        };
        if self.is_command_path(&args[..consumed]) {
            return Ok(None);
        }
        Ok(Some(alias::expand(expansion, &args[consumed..])?))
    }

    async fn dispatch(&self, args: &[String]) -> anyhow::Result<()> {
        let mut node = &self.root;
        let mut path: Vec<&str> = vec![defaults::PROGRAM_NAME];
        let mut rest = args;
        let mut skip_auth = node.skips_auth();

        if rest.first().is_some_and(|a| a == "help") {
            return self.help_command(&rest[1..]);
        }

        while let Some(word) = rest.first() {
            if word.starts_with('-') {
                break;
            }
            match node.find_child(word) {
                Some(child) => {
                    node = child;
                    path.push(child.name());
                    skip_auth |= child.skips_auth();
                    rest = &rest[1..];
                }
                None if node.is_runnable() => break,
                None => return Err(unknown_command(&path, node, word).into()),
            }
        }

        if wants_help(rest) {
            return self.print(&help::render(&path, node));
        }
        if node.is_topic() {
            return self.topic(node);
        }
        let Some(handler) = node.handler() else {
            if let Some(flag) = rest.first() {
                return Err(CliError::flag_with_usage(
                    format!("unknown flag: {flag}"),
                    usage_hint(&path, node),
                )
                .into());
            }
            return self.print(&help::render(&path, node));
        };

        let matches = node
            .parse(rest)
            .map_err(|e| CliError::flag_with_usage(clap_message(&e), usage_hint(&path, node)))?;

        let fields = node.declared_json_fields();
        if !fields.is_empty() && bare_json(&matches) {
            return self.print(&exporter::field_list(fields));
        }

        if !skip_auth && !self.factory.has_credentials()? {
            return Err(CliError::Auth(format!(
                "To get started with {program}, please run:  {program} auth login\n\
                 Alternatively, populate the AZDO_TOKEN environment variable with a personal access token.",
                program = defaults::PROGRAM_NAME
            ))
            .into());
        }

        tracing::debug!("running {}", path.join(" "));
        handler(&matches).await
    }

    fn help_command(&self, words: &[String]) -> anyhow::Result<()> {
        let mut node = &self.root;
        let mut path: Vec<&str> = vec![defaults::PROGRAM_NAME];
        for word in words {
            match node.find_child(word) {
                Some(child) => {
                    node = child;
                    path.push(child.name());
                }
                None => return Err(unknown_command(&path, node, word).into()),
            }
        }
        if node.is_topic() {
            return self.topic(node);
        }
        self.print(&help::render(&path, node))
    }

    fn topic(&self, node: &CommandNode) -> anyhow::Result<()> {
        if node.name() == REFERENCE_TOPIC {
            let io = self.factory.io();
            if io.is_stdout_tty() {
                self.factory.start_pager()?;
            }
            let written = self.print(&help::reference(&self.root));
            io.stop_pager();
            return written;
        }
        let mut body = node.description().trim_end().to_string();
        body.push('\n');
        self.print(&body)
    }

    fn print(&self, text: &str) -> anyhow::Result<()> {
        let mut out = self.factory.io().out();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

fn wants_help(args: &[String]) -> bool {
    args.iter()
        .take_while(|a| *a != "--")
        .any(|a| a == "-h" || a == "--help")
}

fn bare_json(matches: &ArgMatches) -> bool {
    match matches.try_get_many::<String>("json") {
        Ok(Some(mut values)) => values.all(String::is_empty),
        _ => false,
    }
}

fn usage_hint(path: &[&str], node: &CommandNode) -> String {
    format!(
        "Usage:  {}\n\nRun '{} --help' for more information.",
        help::usage(path, node),
        path.join(" ")
    )
}

fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn unknown_command(path: &[&str], node: &CommandNode, word: &str) -> CliError {
    let mut message = format!("unknown command {:?} for {:?}", word, path.join(" "));
    let names = node
        .children()
        .iter()
        .filter(|c| !c.is_hidden())
        .map(CommandNode::name);
    let suggestions = suggest::suggestions(word, names);
    if !suggestions.is_empty() {
        message.push_str("\n\nDid you mean this?\n");
        for suggestion in &suggestions {
            message.push('\t');
            message.push_str(suggestion);
            message.push('\n');
        }
    }
    CliError::flag_with_usage(message.trim_end().to_string(), usage_hint(path, node))
}
