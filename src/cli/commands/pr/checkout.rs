//! `azdo pr checkout`

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::output;

use super::{select, short_branch, SelectorArgs};

/// Arguments for `azdo pr checkout`
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Local branch name to use; defaults to the source branch
    #[arg(short = 'b', long, value_name = "NAME")]
    pub branch: Option<String>,
}

/// Refspec fetching a source branch into its remote-tracking ref
pub fn tracking_refspec(remote: &str, branch: &str) -> String {
    format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}")
}

/// Execute `pr checkout`
pub async fn execute(factory: Arc<Factory>, args: CheckoutArgs) -> Result<()> {
    let selected = select(&factory, &args.selector).await?;
    let source = short_branch(&selected.pr.source_ref_name).to_string();
    let local = args.branch.clone().unwrap_or_else(|| source.clone());

    let git = factory.git()?;
    let (remote, _) = git.azure_remote().await?;
    git.fetch(&remote.name, &tracking_refspec(&remote.name, &source))
        .await?;
    git.checkout(&local, &format!("{}/{}", remote.name, source))
        .await?;
    output::success(
        factory.io(),
        &format!("Checked out pull request #{} on {}", selected.pr.pull_request_id, local),
    );
    Ok(())
}

pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("checkout", "Check out a pull request in git", factory, execute)
        .alias("co")
        .example("azdo pr checkout 42")
        .example("azdo pr checkout 42 --branch review/42")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_refspec() {
        assert_eq!(
            tracking_refspec("origin", "feature/x"),
            "+refs/heads/feature/x:refs/remotes/origin/feature/x"
        );
    }
}
