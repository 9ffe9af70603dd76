//! `azdo pr close` and `azdo pr reopen`
//!
//! Closing abandons an active pull request; reopening reactivates an
//! abandoned one. Completed pull requests cannot change state.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::output::{self, ColorScheme};
use crate::client::types::UpdatePullRequest;
use crate::error::CliError;

use super::{select, SelectorArgs};

/// Arguments for `azdo pr close`
#[derive(Args, Debug)]
pub struct CloseArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,
}

/// Arguments for `azdo pr reopen`
#[derive(Args, Debug)]
pub struct ReopenArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,
}

/// Status a transition needs and the status it sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Close,
    Reopen,
}

impl Transition {
    fn required(self) -> &'static str {
        match self {
            Self::Close => "active",
            Self::Reopen => "abandoned",
        }
    }

    fn target(self) -> &'static str {
        match self {
            Self::Close => "abandoned",
            Self::Reopen => "active",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Close => "Closed",
            Self::Reopen => "Reopened",
        }
    }
}

/// Check a transition against the current status
pub fn check(transition: Transition, id: u64, status: &str) -> Result<(), CliError> {
    if status.eq_ignore_ascii_case(transition.required()) {
        return Ok(());
    }
    let state = match status {
        "abandoned" => "closed",
        "completed" => "merged",
        other => other,
    };
    Err(CliError::flag(format!("pull request #{id} is {state}")))
}

async fn transition(factory: Arc<Factory>, selector: SelectorArgs, transition: Transition) -> Result<()> {
    let selected = select(&factory, &selector).await?;
    let id = selected.pr.pull_request_id;
    check(transition, id, &selected.pr.status)?;

    let update = UpdatePullRequest {
        status: Some(transition.target().to_string()),
        ..UpdatePullRequest::default()
    };
    selected
        .client
        .git()
        .update_pull_request(&selected.repo.project, &selected.repo.repository, id, &update)
        .await?;

    let cs = ColorScheme::new(factory.io());
    output::success(
        factory.io(),
        &format!(
            "{} pull request {} {}",
            transition.past(),
            cs.bold(&format!("#{id}")),
            selected.pr.title
        ),
    );
    Ok(())
}

/// Execute `pr close`
pub async fn close(factory: Arc<Factory>, args: CloseArgs) -> Result<()> {
    transition(factory, args.selector, Transition::Close).await
}

/// Execute `pr reopen`
pub async fn reopen(factory: Arc<Factory>, args: ReopenArgs) -> Result<()> {
    transition(factory, args.selector, Transition::Reopen).await
}

pub fn close_command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("close", "Abandon a pull request", factory, close).example("azdo pr close 42")
}

pub fn reopen_command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::leaf("reopen", "Reactivate an abandoned pull request", factory, reopen)
        .example("azdo pr reopen 42")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::pr::RepoArgs;
    use crate::cli::commands::testing::Harness;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_check_transitions() {
        assert!(check(Transition::Close, 1, "active").is_ok());
        assert!(check(Transition::Reopen, 1, "abandoned").is_ok());
        assert_eq!(
            check(Transition::Close, 3, "completed").unwrap_err().to_string(),
            "pull request #3 is merged"
        );
        assert_eq!(
            check(Transition::Reopen, 4, "active").unwrap_err().to_string(),
            "pull request #4 is active"
        );
    }

    #[tokio::test]
    async fn test_close_abandons() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/git/pullrequests/8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pullRequestId": 8, "title": "Spike", "status": "active"
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/contoso/myproj/_apis/git/repositories/myrepo/pullrequests/8"))
            .and(body_json(json!({"status": "abandoned"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pullRequestId": 8, "status": "abandoned"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        close(
            Arc::clone(&h.factory),
            CloseArgs {
                selector: SelectorArgs {
                    number: Some(8),
                    repo: RepoArgs::default(),
                },
            },
        )
        .await
        .unwrap();
        assert!(h.err().contains("Closed pull request #8 Spike"));
    }
}
