//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Isolated azdo environment
///
/// Owns a temporary config directory and runs the built binary with a
/// cleared environment, so no host configuration or token leaks in.
pub struct TestEnv {
    /// Temporary directory holding `config.yml`
    pub dir: TempDir,
    vars: Vec<(String, String)>,
}

impl TestEnv {
    /// Create an environment with an empty config directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
            vars: Vec::new(),
        }
    }

    /// Create an environment whose `config.yml` has the given content
    pub fn with_config(yaml: &str) -> Self {
        let env = Self::new();
        std::fs::write(env.config_path(), yaml).expect("Failed to write config");
        env
    }

    /// Path of `config.yml`
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yml")
    }

    /// Set an extra environment variable for every run
    #[allow(dead_code)]
    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.push((key.to_string(), value.to_string()));
        self
    }

    /// Run azdo with the given arguments
    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_azdo"));
        cmd.env_clear()
            .current_dir(self.dir.path())
            .env("AZDO_CONFIG_DIR", self.dir.path())
            .env("HOME", self.dir.path())
            .env("NO_COLOR", "1")
            .env("AZDO_PROMPT_DISABLED", "1");
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
        cmd.args(args).output().expect("Failed to execute azdo")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard output as text
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Standard error as text
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Config with one organization and no stored token
#[allow(dead_code)]
pub const SAMPLE_CONFIG: &str = r#"
default_organization: contoso
organizations:
  contoso:
    url: https://dev.azure.com/contoso
"#;
