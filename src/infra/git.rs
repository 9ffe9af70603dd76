//! Git operations
//!
//! Drives the external `git` binary for remote discovery, cloning and
//! branch checkout, and parses Azure DevOps remote URLs.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use url::Url;

use crate::config::urls;

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// `git` is not on PATH
    #[error("unable to find git executable in PATH; please install Git")]
    NotInstalled,

    /// A git command exited with an error
    #[error("git {command} failed: {error}")]
    CommandFailed { command: String, error: String },

    /// The working directory is not inside a repository
    #[error("not a git repository (or any of the parent directories)")]
    NotARepository,

    /// No remote points at Azure DevOps
    #[error("none of the git remotes configured for this repository point to a known Azure DevOps host")]
    NoAzureRemote,

    /// Spawning git failed
    #[error("failed to run git: {0}")]
    Spawn(String),
}

/// A repository location parsed from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    /// Organization name
    pub organization: String,
    /// Project name
    pub project: String,
    /// Repository name
    pub repository: String,
}

/// A configured git remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Remote name, e.g. `origin`
    pub name: String,
    /// Fetch URL
    pub url: String,
    /// Parsed location, when the URL points at Azure DevOps
    pub repo: Option<RemoteRepo>,
}

/// Parse an Azure DevOps remote URL
///
/// Understands `https://dev.azure.com/ORG/PROJECT/_git/REPO`,
/// `https://ORG.visualstudio.com[/DefaultCollection]/PROJECT/_git/REPO`,
/// `git@ssh.dev.azure.com:v3/ORG/PROJECT/REPO` and
/// `ORG@vs-ssh.visualstudio.com:v3/ORG/PROJECT/REPO`.
pub fn parse_remote_url(remote: &str) -> Option<RemoteRepo> {
    let remote = remote.trim();

    // scp-like ssh syntax
    if !remote.contains("://") {
        let (host_part, path) = remote.split_once(':')?;
        let host = host_part.rsplit('@').next()?;
        if host != urls::SSH_HOST && host != "vs-ssh.visualstudio.com" {
            return None;
        }
        return parse_ssh_path(path);
    }

    let url = Url::parse(remote).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    if url.scheme() == "ssh" {
        if host != urls::SSH_HOST && host != "vs-ssh.visualstudio.com" {
            return None;
        }
        return parse_ssh_path(&segments.join("/"));
    }

    let git_index = segments.iter().position(|s| *s == "_git")?;
    let repository = decode(segments.get(git_index + 1)?);

    if host == urls::SERVICE_HOST {
        // ORG/PROJECT/_git/REPO or ORG/_git/REPO (project named like the repo)
        let organization = decode(segments.first()?);
        let project = match git_index {
            1 => repository.clone(),
            2 => decode(segments[1]),
            _ => return None,
        };
        return Some(RemoteRepo {
            organization,
            project,
            repository,
        });
    }

    if let Some(organization) = host.strip_suffix(".visualstudio.com") {
        let mut before: Vec<&str> = segments[..git_index].to_vec();
        if before.first().is_some_and(|s| s.eq_ignore_ascii_case("DefaultCollection")) {
            before.remove(0);
        }
        let project = match before.as_slice() {
            [] => repository.clone(),
            [project] => decode(project),
            _ => return None,
        };
        return Some(RemoteRepo {
            organization: organization.to_string(),
            project,
            repository,
        });
    }

    None
}

fn parse_ssh_path(path: &str) -> Option<RemoteRepo> {
    let path = path.trim_start_matches('/');
    let rest = path.strip_prefix("v3/")?;
    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        [org, project, repo] if !org.is_empty() && !project.is_empty() && !repo.is_empty() => {
            Some(RemoteRepo {
                organization: decode(org),
                project: decode(project),
                repository: decode(repo.trim_end_matches(".git")),
            })
        }
        _ => None,
    }
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Parse `git remote -v` output, keeping one entry per fetch remote
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        if fields.next().is_some_and(|kind| kind != "(fetch)") {
            continue;
        }
        if remotes.iter().any(|r| r.name == name) {
            continue;
        }
        remotes.push(Remote {
            name: name.to_string(),
            url: url.to_string(),
            repo: parse_remote_url(url),
        });
    }
    // Conventional remote names first
    remotes.sort_by_key(|r| match r.name.as_str() {
        "upstream" => 0,
        "origin" => 1,
        _ => 2,
    });
    remotes
}

/// Handle on the `git` binary
#[derive(Debug, Clone)]
pub struct Git {
    binary: PathBuf,
    dir: Option<PathBuf>,
}

impl Git {
    /// Locate git on PATH
    pub fn locate() -> Result<Self, GitError> {
        let binary = which::which("git").map_err(|_| GitError::NotInstalled)?;
        Ok(Self { binary, dir: None })
    }

    /// Run commands inside `dir`
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn output(&self, args: &[&str]) -> Result<String, GitError> {
        tracing::debug!("running git {}", args.join(" "));
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("not a git repository") {
                return Err(GitError::NotARepository);
            }
            return Err(GitError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                error: stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_inherited(&self, args: &[&str]) -> Result<(), GitError> {
        tracing::debug!("running git {}", args.join(" "));
        let status = self
            .command(args)
            .status()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                error: format!("exit status {}", status.code().unwrap_or(-1)),
            })
        }
    }

    /// Configured remotes, preferred ones first
    pub async fn remotes(&self) -> Result<Vec<Remote>, GitError> {
        Ok(parse_remotes(&self.output(&["remote", "-v"]).await?))
    }

    /// First remote pointing at Azure DevOps
    pub async fn azure_remote(&self) -> Result<(Remote, RemoteRepo), GitError> {
        self.remotes()
            .await?
            .into_iter()
            .find_map(|r| r.repo.clone().map(|repo| (r, repo)))
            .ok_or(GitError::NoAzureRemote)
    }

    /// Name of the checked-out branch
    pub async fn current_branch(&self) -> Result<String, GitError> {
        let out = self
            .output(&["symbolic-ref", "--quiet", "--short", "HEAD"])
            .await?;
        Ok(out.trim().to_string())
    }

    /// Whether a local branch exists
    pub async fn has_local_branch(&self, branch: &str) -> bool {
        let reference = format!("refs/heads/{branch}");
        self.output(&["rev-parse", "--verify", "--quiet", &reference])
            .await
            .is_ok()
    }

    /// Clone a repository into `dir` (or git's default directory)
    pub async fn clone(&self, url: &str, dir: Option<&Path>, extra: &[String]) -> Result<(), GitError> {
        let mut args: Vec<&str> = vec!["clone"];
        args.extend(extra.iter().map(String::as_str));
        args.push(url);
        let dir_str;
        if let Some(dir) = dir {
            dir_str = dir.display().to_string();
            args.push(&dir_str);
        }
        self.run_inherited(&args).await
    }

    /// Fetch a refspec from a remote
    pub async fn fetch(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.run_inherited(&["fetch", remote, refspec]).await
    }

    /// Check out `branch`, creating it from `start_point` when missing
    pub async fn checkout(&self, branch: &str, start_point: &str) -> Result<(), GitError> {
        if self.has_local_branch(branch).await {
            self.run_inherited(&["checkout", branch]).await?;
            self.run_inherited(&["merge", "--ff-only", start_point]).await
        } else {
            self.run_inherited(&["checkout", "-b", branch, "--track", start_point])
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(org: &str, project: &str, name: &str) -> Option<RemoteRepo> {
        Some(RemoteRepo {
            organization: org.into(),
            project: project.into(),
            repository: name.into(),
        })
    }

    #[test]
    fn test_parse_dev_azure_https() {
        assert_eq!(
            parse_remote_url("https://contoso@dev.azure.com/contoso/My%20Project/_git/web"),
            repo("contoso", "My Project", "web")
        );
        assert_eq!(
            parse_remote_url("https://dev.azure.com/contoso/_git/web"),
            repo("contoso", "web", "web")
        );
    }

    #[test]
    fn test_parse_visualstudio_https() {
        assert_eq!(
            parse_remote_url("https://contoso.visualstudio.com/DefaultCollection/proj/_git/api"),
            repo("contoso", "proj", "api")
        );
        assert_eq!(
            parse_remote_url("https://contoso.visualstudio.com/proj/_git/api"),
            repo("contoso", "proj", "api")
        );
    }

    #[test]
    fn test_parse_ssh_forms() {
        assert_eq!(
            parse_remote_url("git@ssh.dev.azure.com:v3/contoso/proj/api"),
            repo("contoso", "proj", "api")
        );
        assert_eq!(
            parse_remote_url("contoso@vs-ssh.visualstudio.com:v3/contoso/proj/api"),
            repo("contoso", "proj", "api")
        );
        assert_eq!(
            parse_remote_url("ssh://git@ssh.dev.azure.com/v3/contoso/proj/api"),
            repo("contoso", "proj", "api")
        );
    }

    #[test]
    fn test_foreign_remotes_are_ignored() {
        assert_eq!(parse_remote_url("https://github.com/owner/repo.git"), None);
        assert_eq!(parse_remote_url("git@github.com:owner/repo.git"), None);
        assert_eq!(parse_remote_url("https://dev.azure.com/contoso/proj"), None);
    }

    #[test]
    fn test_parse_remotes_prefers_upstream() {
        let out = "origin\thttps://dev.azure.com/me/p/_git/r (fetch)\n\
                   origin\thttps://dev.azure.com/me/p/_git/r (push)\n\
                   upstream\tgit@ssh.dev.azure.com:v3/up/p/r (fetch)\n\
                   upstream\tgit@ssh.dev.azure.com:v3/up/p/r (push)\n";
        let remotes = parse_remotes(out);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[0].name, "upstream");
        assert_eq!(remotes[0].repo, repo("up", "p", "r"));
        assert_eq!(remotes[1].name, "origin");
    }
}
