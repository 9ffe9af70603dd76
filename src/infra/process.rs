//! External processes
//!
//! Shell aliases, the text editor and the web browser.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// No POSIX shell is available
    #[error("unable to locate sh to execute the shell alias with; shell aliases require a POSIX shell")]
    NoShell,

    /// No editor configured or found
    #[error("no editor configured; set AZDO_EDITOR, VISUAL or EDITOR, or run 'azdo config set editor <program>'")]
    NoEditor,

    /// The command string could not be split into words
    #[error("invalid command {command:?}: {error}")]
    InvalidCommand { command: String, error: String },

    /// Spawning or waiting on the child failed
    #[error("failed to run {program}: {error}")]
    Spawn { program: String, error: String },

    /// Editor scratch file I/O failed
    #[error("editor file '{path}': {error}")]
    File { path: PathBuf, error: String },
}

/// Locate `sh`
pub fn find_sh() -> Result<PathBuf, ProcessError> {
    if let Ok(path) = which::which("sh") {
        return Ok(path);
    }
    if cfg!(windows) {
        // Git for Windows ships sh next to git.exe
        if let Ok(git) = which::which("git") {
            if let Some(root) = git.parent().and_then(Path::parent) {
                let candidate = root.join("bin").join("sh.exe");
                if candidate.exists() {
                    return Ok(candidate);
                }
            }
        }
    }
    Err(ProcessError::NoShell)
}

/// Arguments passed to `sh` for a shell alias
pub fn shell_alias_args(script: &str, args: &[String]) -> Vec<String> {
    let mut argv = vec!["-c".to_string(), script.to_string(), "--".to_string()];
    argv.extend(args.iter().cloned());
    argv
}

/// Run a shell alias with inherited standard streams; returns the exit code
pub async fn run_shell_alias(script: &str, args: &[String]) -> Result<i32, ProcessError> {
    let sh = find_sh()?;
    tracing::debug!("running shell alias {:?} with {:?}", script, args);
    let status = Command::new(&sh)
        .args(shell_alias_args(script, args))
        .status()
        .await
        .map_err(|e| ProcessError::Spawn {
            program: sh.display().to_string(),
            error: e.to_string(),
        })?;
    Ok(status.code().unwrap_or(1))
}

fn split_command(command: &str) -> Result<(String, Vec<String>), ProcessError> {
    let mut words = shell_words::split(command).map_err(|e| ProcessError::InvalidCommand {
        command: command.to_string(),
        error: e.to_string(),
    })?;
    if words.is_empty() {
        return Err(ProcessError::InvalidCommand {
            command: command.to_string(),
            error: "empty command".to_string(),
        });
    }
    let program = words.remove(0);
    Ok((program, words))
}

fn default_browser_command() -> (&'static str, Vec<&'static str>) {
    if cfg!(target_os = "macos") {
        ("open", vec![])
    } else if cfg!(windows) {
        ("cmd", vec!["/c", "start", ""])
    } else {
        ("xdg-open", vec![])
    }
}

/// Open a URL in the configured browser, or the platform default
pub async fn open_browser(browser: Option<&str>, url: &str) -> Result<(), ProcessError> {
    let (program, mut args) = match browser {
        Some(command) => split_command(command)?,
        None => {
            let (program, args) = default_browser_command();
            (
                program.to_string(),
                args.into_iter().map(str::to_string).collect(),
            )
        }
    };
    args.push(url.to_string());
    let status = Command::new(&program)
        .args(&args)
        .status()
        .await
        .map_err(|e| ProcessError::Spawn {
            program: program.clone(),
            error: e.to_string(),
        })?;
    if !status.success() {
        return Err(ProcessError::Spawn {
            program,
            error: format!("exit status {}", status.code().unwrap_or(-1)),
        });
    }
    Ok(())
}

/// Let the user edit `initial` in their editor and return the result
pub async fn edit_text(editor: &str, initial: &str) -> Result<String, ProcessError> {
    if editor.trim().is_empty() {
        return Err(ProcessError::NoEditor);
    }
    let (program, mut args) = split_command(editor)?;
    let path = std::env::temp_dir().join(format!("azdo-{}.md", uuid::Uuid::new_v4()));
    let file_err = |path: &Path, e: std::io::Error| ProcessError::File {
        path: path.to_path_buf(),
        error: e.to_string(),
    };
    tokio::fs::write(&path, initial)
        .await
        .map_err(|e| file_err(&path, e))?;
    args.push(path.display().to_string());

    let status = Command::new(&program)
        .args(&args)
        .status()
        .await
        .map_err(|e| ProcessError::Spawn {
            program: program.clone(),
            error: e.to_string(),
        });
    let text = tokio::fs::read_to_string(&path).await;
    let _ = tokio::fs::remove_file(&path).await;

    let status = status?;
    if !status.success() {
        return Err(ProcessError::Spawn {
            program,
            error: format!("exit status {}", status.code().unwrap_or(-1)),
        });
    }
    text.map_err(|e| file_err(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_alias_args_pass_extra_args_after_dashes() {
        let argv = shell_alias_args("xdg-open", &["https://example".to_string()]);
        assert_eq!(argv, vec!["-c", "xdg-open", "--", "https://example"]);
    }

    #[test]
    fn test_split_command_honours_quotes() {
        let (program, args) = split_command("code --wait 'my file'").unwrap();
        assert_eq!(program, "code");
        assert_eq!(args, vec!["--wait", "my file"]);
        assert!(split_command("   ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_alias_exit_code_propagates() {
        let code = run_shell_alias("exit \"$1\"", &["3".to_string()]).await.unwrap();
        assert_eq!(code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_edit_text_with_scripted_editor() {
        let edited = edit_text("sh -c 'echo edited > \"$0\"'", "original").await.unwrap();
        assert_eq!(edited.trim(), "edited");
    }
}
