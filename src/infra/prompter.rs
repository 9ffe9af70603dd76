//! Interactive prompts
//!
//! [`Prompter`] is synchronous; async callers go through [`prompt`], which
//! runs the prompt on a blocking thread and races it against cancellation.

use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// Prompt errors
#[derive(Error, Debug)]
pub enum PromptError {
    /// Prompting is not possible in this session
    #[error("cannot prompt: {0}")]
    Disabled(String),

    /// The user aborted the prompt
    #[error("prompt interrupted")]
    Interrupted,

    /// Terminal I/O failed
    #[error("prompt failed: {0}")]
    Io(String),
}

impl From<dialoguer::Error> for PromptError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => Self::Interrupted,
            dialoguer::Error::IO(e) => Self::Io(e.to_string()),
        }
    }
}

/// Interactive input
pub trait Prompter: Send + Sync {
    /// Pick one option; returns its index
    fn select(&self, prompt: &str, default: Option<usize>, options: &[String])
        -> Result<usize, PromptError>;

    /// Pick any number of options; returns their indices
    fn multi_select(
        &self,
        prompt: &str,
        defaults: &[usize],
        options: &[String],
    ) -> Result<Vec<usize>, PromptError>;

    /// Free-form text
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Hidden text
    fn password(&self, prompt: &str) -> Result<String, PromptError>;

    /// Yes/no question
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Require the user to type `required` back
    fn confirm_deletion(&self, required: &str) -> Result<(), PromptError>;
}

/// Terminal prompts backed by `dialoguer`
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn select(
        &self,
        prompt: &str,
        default: Option<usize>,
        options: &[String],
    ) -> Result<usize, PromptError> {
        Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(default.unwrap_or(0))
            .interact_opt()?
            .ok_or(PromptError::Interrupted)
    }

    fn multi_select(
        &self,
        prompt: &str,
        defaults: &[usize],
        options: &[String],
    ) -> Result<Vec<usize>, PromptError> {
        let checked: Vec<bool> = (0..options.len()).map(|i| defaults.contains(&i)).collect();
        MultiSelect::new()
            .with_prompt(prompt)
            .items(options)
            .defaults(&checked)
            .interact_opt()?
            .ok_or(PromptError::Interrupted)
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn password(&self, prompt: &str) -> Result<String, PromptError> {
        Ok(Password::new().with_prompt(prompt).interact()?)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact_opt()?
            .ok_or(PromptError::Interrupted)
    }

    fn confirm_deletion(&self, required: &str) -> Result<(), PromptError> {
        let expected = required.to_string();
        Input::<String>::new()
            .with_prompt(format!("Type {required} to confirm deletion"))
            .validate_with(move |value: &String| -> Result<(), String> {
                if value.trim() == expected {
                    Ok(())
                } else {
                    Err(format!("You entered {}", value.trim()))
                }
            })
            .interact_text()?;
        Ok(())
    }
}

/// Prompter used when input cannot be requested
#[derive(Debug, Clone)]
pub struct DisabledPrompter {
    reason: String,
}

impl DisabledPrompter {
    /// Create a disabled prompter that reports `reason`
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, PromptError> {
        Err(PromptError::Disabled(self.reason.clone()))
    }
}

impl Prompter for DisabledPrompter {
    fn select(&self, _: &str, _: Option<usize>, _: &[String]) -> Result<usize, PromptError> {
        self.fail()
    }

    fn multi_select(&self, _: &str, _: &[usize], _: &[String]) -> Result<Vec<usize>, PromptError> {
        self.fail()
    }

    fn input(&self, _: &str, _: Option<&str>) -> Result<String, PromptError> {
        self.fail()
    }

    fn password(&self, _: &str) -> Result<String, PromptError> {
        self.fail()
    }

    fn confirm(&self, _: &str, _: bool) -> Result<bool, PromptError> {
        self.fail()
    }

    fn confirm_deletion(&self, _: &str) -> Result<(), PromptError> {
        self.fail()
    }
}

/// A scripted answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Index for `select`
    Select(usize),
    /// Indices for `multi_select`
    MultiSelect(Vec<usize>),
    /// Text for `input`, `password` or `confirm_deletion`
    Text(String),
    /// Answer for `confirm`
    Confirm(bool),
}

/// Prompter that replays queued answers and records every question
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Create a prompter with the given answers
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }

    fn next(&self, prompt: &str) -> Result<Answer, PromptError> {
        self.asked.lock().push(prompt.to_string());
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| PromptError::Io(format!("no scripted answer for {prompt:?}")))
    }

    fn mismatch<T>(prompt: &str, answer: Answer) -> Result<T, PromptError> {
        Err(PromptError::Io(format!(
            "scripted answer {answer:?} does not fit prompt {prompt:?}"
        )))
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&self, prompt: &str, _: Option<usize>, _: &[String]) -> Result<usize, PromptError> {
        match self.next(prompt)? {
            Answer::Select(i) => Ok(i),
            other => Self::mismatch(prompt, other),
        }
    }

    fn multi_select(&self, prompt: &str, _: &[usize], _: &[String]) -> Result<Vec<usize>, PromptError> {
        match self.next(prompt)? {
            Answer::MultiSelect(v) => Ok(v),
            other => Self::mismatch(prompt, other),
        }
    }

    fn input(&self, prompt: &str, _: Option<&str>) -> Result<String, PromptError> {
        match self.next(prompt)? {
            Answer::Text(s) => Ok(s),
            other => Self::mismatch(prompt, other),
        }
    }

    fn password(&self, prompt: &str) -> Result<String, PromptError> {
        self.input(prompt, None)
    }

    fn confirm(&self, prompt: &str, _: bool) -> Result<bool, PromptError> {
        match self.next(prompt)? {
            Answer::Confirm(b) => Ok(b),
            other => Self::mismatch(prompt, other),
        }
    }

    fn confirm_deletion(&self, required: &str) -> Result<(), PromptError> {
        let prompt = format!("Type {required} to confirm deletion");
        match self.next(&prompt)? {
            Answer::Text(s) if s == required => Ok(()),
            Answer::Text(_) => Err(PromptError::Interrupted),
            other => Self::mismatch(&prompt, other),
        }
    }
}

/// Run a prompt on a blocking thread, honouring cancellation
///
/// An interrupted prompt or a cancelled token becomes [`CliError::Cancel`].
pub async fn prompt<T, F>(
    prompter: Arc<dyn Prompter>,
    cancel: &CancellationToken,
    f: F,
) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Prompter) -> Result<T, PromptError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || f(prompter.as_ref()));
    let result = tokio::select! {
        joined = task => joined.map_err(|e| anyhow::anyhow!("prompt task failed: {e}"))?,
        () = cancel.cancelled() => return Err(CliError::Cancel.into()),
    };
    match result {
        Ok(value) => Ok(value),
        Err(PromptError::Interrupted) => Err(CliError::Cancel.into()),
        Err(e) => Err(e.into()),
    }
}
