//! Tests for the azdo binary: help, exit codes and JSON field listing

mod common;

use common::{stderr, stdout, TestEnv, SAMPLE_CONFIG};
use predicates::prelude::*;

#[test]
fn test_root_help_lists_command_groups() {
    let env = TestEnv::new();
    let output = env.run(&["--help"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Core commands"), "{out}");
    assert!(out.contains("Security commands"), "{out}");
    assert!(out.contains("Help topics"), "{out}");
}

#[test]
fn test_nested_help_exits_zero() {
    let env = TestEnv::new();
    for args in [
        &["pr", "list", "--help"][..],
        &["security", "permission", "update", "--help"],
        &["help", "service-endpoint", "create"],
    ] {
        let output = env.run(args);
        assert_eq!(output.status.code(), Some(0), "{args:?}: {}", stderr(&output));
        assert!(!stdout(&output).trim().is_empty(), "{args:?}");
    }
}

#[test]
fn test_unknown_command_exits_one() {
    let env = TestEnv::new();
    let output = env.run(&["frobnicate"]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(predicate::str::starts_with("error: unknown command \"frobnicate\"").eval(err.as_str()), "{err}");
}

#[test]
fn test_missing_credentials_exit_four() {
    let env = TestEnv::with_config(SAMPLE_CONFIG);
    let output = env.run(&["project", "list"]);

    assert_eq!(output.status.code(), Some(4), "{}", stderr(&output));
    let mentions_login = predicate::str::contains("azdo auth login").and(predicate::str::contains("AZDO_TOKEN"));
    assert!(mentions_login.eval(stderr(&output).as_str()));
}

#[test]
fn test_bare_json_lists_fields_without_credentials() {
    let env = TestEnv::new();
    let output = env.run(&["project", "list", "--json"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let fields: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    let mut sorted = fields.clone();
    sorted.sort();
    assert_eq!(fields, sorted);
    assert!(fields.iter().any(|f| f == "name"), "{fields:?}");
}

#[test]
fn test_unknown_json_field_is_rejected() {
    let env = TestEnv::new().var("AZDO_TOKEN", "pat");
    let output = env.run(&["repo", "list", "contoso/website", "--json", "nope"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown JSON field: \"nope\""), "{}", stderr(&output));
}

#[test]
fn test_version_prints_package_version() {
    let env = TestEnv::new();
    let output = env.run(&["version"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with(&format!("azdo version {}", env!("CARGO_PKG_VERSION"))));
}
