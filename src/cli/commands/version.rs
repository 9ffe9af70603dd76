//! Version command implementation

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::config::urls;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from
pub const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

/// Build timestamp
pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

/// Target triple
pub const TARGET: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Arguments for `azdo version`
#[derive(Args, Debug)]
pub struct VersionArgs {}

/// `azdo version [--help]` output
pub fn version_text() -> String {
    let date = BUILD_TIMESTAMP.split('T').next().unwrap_or(BUILD_TIMESTAMP);
    format!(
        "azdo version {VERSION} ({date})\ncommit {GIT_SHA} ({TARGET})\n{}/tag/v{VERSION}\n",
        urls::RELEASES
    )
}

/// Execute the version command
pub async fn execute(factory: Arc<Factory>, _args: VersionArgs) -> Result<()> {
    let mut out = factory.io().out();
    out.write_all(version_text().as_bytes())?;
    Ok(())
}

/// `azdo version`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("version", "Show azdo version", factory, execute).skip_auth()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_text_starts_with_package_version() {
        let text = version_text();
        assert!(text.starts_with(&format!("azdo version {VERSION} (")));
        assert!(text.contains(GIT_SHA));
    }
}
