//! Alias expansion
//!
//! An alias maps an invocation path (`co`, `pr ls`) to either an in-tree
//! command template using `$1..$N` placeholders, or a `!`-prefixed script
//! run by `sh`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+)").expect("Invalid placeholder regex"));

/// Alias errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    /// A placeholder had no matching argument
    #[error("not enough arguments for alias: {0}")]
    NotEnoughArguments(String),

    /// The expansion is not valid shell syntax
    #[error("invalid alias expansion {expansion:?}: {error}")]
    Split { expansion: String, error: String },

    /// Aliases kept expanding into aliases
    #[error("alias expansion exceeded {0} levels; check for recursive aliases")]
    TooDeep(usize),
}

/// Result of expanding an alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Re-dispatch these arguments through the command tree
    Command(Vec<String>),
    /// Run `script` with `sh -c`, passing `args` as positional parameters
    Shell { script: String, args: Vec<String> },
}

/// Whether an expansion is a shell alias
pub fn is_shell(expansion: &str) -> bool {
    expansion.starts_with('!')
}

/// Expand an alias template with the arguments that followed it
pub fn expand(template: &str, args: &[String]) -> Result<Expansion, AliasError> {
    if let Some(script) = template.strip_prefix('!') {
        return Ok(Expansion::Shell {
            script: script.to_string(),
            args: args.to_vec(),
        });
    }

    let mut used = vec![false; args.len()];
    let mut missing = false;
    let substituted = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let index = caps[1].parse::<usize>().unwrap_or(0);
        match index.checked_sub(1).and_then(|i| args.get(i).map(|a| (i, a))) {
            Some((i, arg)) => {
                used[i] = true;
                shell_words::quote(arg).into_owned()
            }
            None => {
                missing = true;
                caps[0].to_string()
            }
        }
    });
    if missing {
        return Err(AliasError::NotEnoughArguments(substituted.into_owned()));
    }

    let mut words = shell_words::split(&substituted).map_err(|e| AliasError::Split {
        expansion: substituted.to_string(),
        error: e.to_string(),
    })?;
    words.extend(
        args.iter()
            .zip(used)
            .filter(|(_, used)| !used)
            .map(|(arg, _)| arg.clone()),
    );
    Ok(Expansion::Command(words))
}

/// Find the longest alias matching the leading words of `args`
///
/// Returns the alias expansion and the number of words it consumed.
pub fn find<'a>(aliases: &'a BTreeMap<String, String>, args: &[String]) -> Option<(&'a str, usize)> {
    let words = args.iter().take_while(|a| !a.starts_with('-')).count();
    (1..=words).rev().find_map(|n| {
        let key = args[..n].join(" ");
        aliases.get(&key).map(|expansion| (expansion.as_str(), n))
    })
}
