//! Environment variables
//!
//! Commands read the environment through an [`EnvVars`] snapshot taken at
//! startup so tests can run with an isolated environment.

use std::collections::HashMap;

/// Auth token; overrides stored credentials
pub const AZDO_TOKEN: &str = "AZDO_TOKEN";
/// Default organization (name or URL)
pub const AZDO_ORGANIZATION: &str = "AZDO_ORGANIZATION";
/// Config directory override
pub const AZDO_CONFIG_DIR: &str = "AZDO_CONFIG_DIR";
/// Editor, highest precedence
pub const AZDO_EDITOR: &str = "AZDO_EDITOR";
/// Browser, highest precedence
pub const AZDO_BROWSER: &str = "AZDO_BROWSER";
/// Pager, highest precedence
pub const AZDO_PAGER: &str = "AZDO_PAGER";
/// Verbose diagnostics; `api` also logs HTTP traffic
pub const AZDO_DEBUG: &str = "AZDO_DEBUG";
/// Treat stdout as a terminal
pub const AZDO_FORCE_TTY: &str = "AZDO_FORCE_TTY";
/// Disable all prompts
pub const AZDO_PROMPT_DISABLED: &str = "AZDO_PROMPT_DISABLED";
/// Disable colour
pub const NO_COLOR: &str = "NO_COLOR";
/// `0` disables colour
pub const CLICOLOR: &str = "CLICOLOR";
/// Non-zero forces colour even when redirected
pub const CLICOLOR_FORCE: &str = "CLICOLOR_FORCE";
/// Markdown rendering style, passed through to renderers
pub const GLAMOUR_STYLE: &str = "GLAMOUR_STYLE";

/// Editor lookup order
pub const EDITOR_VARS: &[&str] = &[AZDO_EDITOR, "GIT_EDITOR", "VISUAL", "EDITOR"];
/// Browser lookup order
pub const BROWSER_VARS: &[&str] = &[AZDO_BROWSER, "BROWSER"];
/// Pager lookup order
pub const PAGER_VARS: &[&str] = &[AZDO_PAGER, "PAGER"];

/// Snapshot of the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build an environment from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of a variable, treating empty values as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// First set variable in a lookup order
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// Whether a variable is set to a truthy value
    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
    }

    /// Set a variable on the snapshot
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_unset() {
        let env = EnvVars::from_pairs([("AZDO_TOKEN", "")]);
        assert_eq!(env.get(AZDO_TOKEN), None);
    }

    #[test]
    fn test_first_of_respects_order() {
        let env = EnvVars::from_pairs([("EDITOR", "vi"), ("VISUAL", "code")]);
        assert_eq!(env.first_of(EDITOR_VARS), Some("code"));
    }

    #[test]
    fn test_truthy() {
        let env = EnvVars::from_pairs([("A", "1"), ("B", "false"), ("C", "api")]);
        assert!(env.is_truthy("A"));
        assert!(!env.is_truthy("B"));
        assert!(env.is_truthy("C"));
        assert!(!env.is_truthy("D"));
    }
}
