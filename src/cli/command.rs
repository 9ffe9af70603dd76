//! Command tree
//!
//! Each [`CommandNode`] pairs a `clap::Command` (its own flags and
//! positionals, built from a derive `Args` struct) with the annotations the
//! dispatcher and help renderer need. Leaves capture the shared
//! [`Factory`] at construction and parse their arguments when run.

use clap::{ArgMatches, Args, ColorChoice, FromArgMatches};
use futures::future::LocalBoxFuture;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use crate::cli::context::Factory;
use crate::error::CliError;

/// Handler invoked with the parsed matches of a leaf
pub type RunFn = Rc<dyn Fn(&ArgMatches) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

/// Help sections for subcommands, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    /// Everyday commands
    Core,
    /// Identity and access commands
    Security,
    /// Alias management
    Alias,
}

impl Group {
    /// Every group, in display order
    pub const ALL: [Group; 3] = [Group::Core, Group::Security, Group::Alias];

    /// Section title
    pub fn title(self) -> &'static str {
        match self {
            Self::Core => "Core commands",
            Self::Security => "Security commands",
            Self::Alias => "Alias commands",
        }
    }
}

/// A node in the command tree
pub struct CommandNode {
    name: String,
    about: String,
    long_about: Option<String>,
    aliases: Vec<String>,
    examples: Vec<String>,
    group: Option<Group>,
    json_fields: &'static [&'static str],
    skip_auth: bool,
    hidden: bool,
    topic: bool,
    args: clap::Command,
    children: Vec<CommandNode>,
    run: Option<RunFn>,
}

impl std::fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("children", &self.children)
            .field("runnable", &self.run.is_some())
            .finish()
    }
}

fn base_command(name: &str) -> clap::Command {
    clap::Command::new(name.to_string())
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .disable_help_subcommand(true)
        .color(ColorChoice::Never)
}

impl CommandNode {
    fn new(name: &str, about: &str, args: clap::Command) -> Self {
        Self {
            name: name.to_string(),
            about: about.to_string(),
            long_about: None,
            aliases: Vec::new(),
            examples: Vec::new(),
            group: None,
            json_fields: &[],
            skip_auth: false,
            hidden: false,
            topic: false,
            args,
            children: Vec::new(),
            run: None,
        }
    }

    /// A node that only groups subcommands
    pub fn parent(name: &str, about: &str) -> Self {
        Self::new(name, about, base_command(name))
    }

    /// A runnable command whose arguments are `A`
    pub fn leaf<A, F, Fut>(name: &str, about: &str, factory: &Arc<Factory>, handler: F) -> Self
    where
        A: Args + FromArgMatches + 'static,
        F: Fn(Arc<Factory>, A) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let args = A::augment_args(base_command(name)).about(about.to_string());
        let factory = Arc::clone(factory);
        let run: RunFn = Rc::new(move |matches: &ArgMatches| {
            let factory = Arc::clone(&factory);
            let future: LocalBoxFuture<'static, anyhow::Result<()>> =
                match A::from_arg_matches(matches) {
                    Ok(parsed) => Box::pin(handler(factory, parsed)),
                    Err(e) => {
                        let message = e.to_string();
                        Box::pin(async move { Err(CliError::flag(message).into()) })
                    }
                };
            future
        });
        let mut node = Self::new(name, about, args);
        node.run = Some(run);
        node
    }

    /// A help topic: a page of text with no flags
    pub fn topic(name: &str, about: &str, body: &str) -> Self {
        let mut node = Self::new(name, about, base_command(name));
        node.long_about = Some(body.to_string());
        node.topic = true;
        node.skip_auth = true;
        node
    }

    /// Longer description shown at the top of help
    #[must_use]
    pub fn long_about(mut self, text: &str) -> Self {
        self.long_about = Some(text.to_string());
        self
    }

    /// Alternative name
    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Usage example shown in help
    #[must_use]
    pub fn example(mut self, example: &str) -> Self {
        self.examples.push(example.to_string());
        self
    }

    /// Help section of this node in its parent
    #[must_use]
    pub fn group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    /// Field names accepted by `--json`
    #[must_use]
    pub fn json_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.json_fields = fields;
        self
    }

    /// Run without credentials
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Leave out of help listings
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Add a subcommand
    ///
    /// # Panics
    ///
    /// When a sibling already uses the name; the tree is static so this is a
    /// programming error caught by the tree tests.
    #[must_use]
    pub fn child(mut self, child: CommandNode) -> Self {
        assert!(
            self.find_child(&child.name).is_none(),
            "duplicate command {:?} under {:?}",
            child.name,
            self.name
        );
        self.children.push(child);
        self
    }

    /// Canonical name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line description
    pub fn about(&self) -> &str {
        &self.about
    }

    /// Long description, falling back to the one-liner
    pub fn description(&self) -> &str {
        self.long_about.as_deref().unwrap_or(&self.about)
    }

    /// Alternative names
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Examples
    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// Help section
    pub fn group_id(&self) -> Option<Group> {
        self.group
    }

    /// Declared `--json` fields
    pub fn declared_json_fields(&self) -> &'static [&'static str] {
        self.json_fields
    }

    /// Whether this node runs without credentials
    pub fn skips_auth(&self) -> bool {
        self.skip_auth
    }

    /// Whether the node is hidden from listings
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the node is a help topic
    pub fn is_topic(&self) -> bool {
        self.topic
    }

    /// Whether the node has a handler
    pub fn is_runnable(&self) -> bool {
        self.run.is_some()
    }

    /// Flag and positional definitions
    pub fn args(&self) -> &clap::Command {
        &self.args
    }

    /// Subcommands
    pub fn children(&self) -> &[CommandNode] {
        &self.children
    }

    /// Subcommands that are commands rather than topics
    pub fn commands(&self) -> impl Iterator<Item = &CommandNode> {
        self.children.iter().filter(|c| !c.topic)
    }

    /// Child by name or alias
    pub fn find_child(&self, name: &str) -> Option<&CommandNode> {
        self.children
            .iter()
            .find(|c| c.name == name || c.aliases.iter().any(|a| a == name))
    }

    /// Parse `args` against this node's flags
    pub fn parse(&self, args: &[String]) -> Result<ArgMatches, clap::Error> {
        self.args.clone().try_get_matches_from(args)
    }

    /// Run the handler with parsed matches
    pub(crate) fn handler(&self) -> Option<&RunFn> {
        self.run.as_ref()
    }

    /// Visit every node depth-first with its full path
    pub fn walk<'a>(&'a self, path: &mut Vec<&'a str>, visit: &mut dyn FnMut(&[&'a str], &'a CommandNode)) {
        path.push(&self.name);
        visit(path, self);
        for child in &self.children {
            child.walk(path, visit);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_child_by_alias() {
        let root = CommandNode::parent("azdo", "root")
            .child(CommandNode::parent("pr", "Pull requests").alias("pull-request"));
        assert_eq!(root.find_child("pull-request").map(CommandNode::name), Some("pr"));
        assert!(root.find_child("nope").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate command")]
    fn test_duplicate_children_are_rejected() {
        let _ = CommandNode::parent("azdo", "root")
            .child(CommandNode::parent("pr", "a"))
            .child(CommandNode::parent("pr", "b"));
    }

    #[test]
    fn test_topic_skips_auth_and_has_body() {
        let topic = CommandNode::topic("environment", "Environment variables", "AZDO_TOKEN ...");
        assert!(topic.is_topic());
        assert!(topic.skips_auth());
        assert_eq!(topic.description(), "AZDO_TOKEN ...");
    }
}
