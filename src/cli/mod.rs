//! Command-line interface module
//!
//! The command tree, its dispatcher and everything that renders output.
//! Service calls live in [`crate::client`], pure rules in [`crate::core`].

pub mod command;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod exporter;
pub mod help;
pub mod output;
pub mod printer;

use std::sync::Arc;

use context::Factory;
use dispatch::Dispatcher;

/// Build the command tree and run one invocation
///
/// `args` excludes the program name.
pub async fn run(factory: Arc<Factory>, args: Vec<String>) -> anyhow::Result<()> {
    let root = commands::root(&factory);
    Dispatcher::new(root, factory).run(args).await
}
