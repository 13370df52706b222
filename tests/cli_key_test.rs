//! Integration tests for key commands via CLI.
//!
//! These tests verify that key commands work correctly through the CLI:
//! - `inistore set` creates files and sections as needed
//! - `inistore get` prints the value, or fails with a not-found error
//! - `inistore rename-key` / `delete-key` report whether anything changed
//! - Errors are JSON on stderr by default and plain text with `-H`

mod common;

use common::{TestEnv, parse_json};
use predicates::prelude::*;

#[test]
fn test_set_then_get_json() {
    let env = TestEnv::new();

    env.inistore()
        .args(["set", "app.ini", "Main", "Title", "Hello World"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""value":"Hello World""#));

    let output = env
        .inistore()
        .args(["get", "app.ini", "main", "TITLE"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = parse_json(&output.stdout);
    assert_eq!(json["value"], "Hello World");
    assert_eq!(json["section"], "main");

    assert_eq!(env.read(&env.file("app.ini")), "[Main]\nTitle=Hello World\n");
}

#[test]
fn test_get_human_prints_bare_value() {
    let env = TestEnv::new();
    env.write("app.ini", "[Main]\nTitle = Spaced \n");

    env.inistore()
        .args(["-H", "get", "app.ini", "Main", "Title"])
        .assert()
        .success()
        .stdout("Spaced\n");
}

#[test]
fn test_get_missing_key_fails() {
    let env = TestEnv::new();
    env.write("app.ini", "[Main]\nTitle=x\n");

    env.inistore()
        .args(["get", "app.ini", "Main", "Nope"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(r#""error""#))
        .stderr(predicate::str::contains("Not found"));

    env.inistore()
        .args(["get", "missing.ini", "Main", "Title", "-H"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: Not found"));
}

#[test]
fn test_rename_and_delete_key() {
    let env = TestEnv::new();
    let path = env.write("app.ini", "[Main]\nOld=1\nKeep=2\n");

    let output = env
        .inistore()
        .args(["rename-key", "app.ini", "Main", "Old", "New"])
        .output()
        .unwrap();
    assert_eq!(parse_json(&output.stdout)["changed"], true);

    let output = env
        .inistore()
        .args(["delete-key", "app.ini", "Main", "Absent"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(parse_json(&output.stdout)["changed"], false);

    env.inistore()
        .args(["delete-key", "app.ini", "Main", "Keep"])
        .assert()
        .success();
    assert_eq!(env.read(&path), "[Main]\nNew=1\n");
}

#[test]
fn test_set_rejects_key_with_equals() {
    let env = TestEnv::new();
    env.inistore()
        .args(["set", "app.ini", "Main", "a=b", "v"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
    assert!(!env.file("app.ini").exists());
}

#[test]
fn test_config_flag_sets_line_ending() {
    let env = TestEnv::new();
    let config = env.write("store.toml", "line-ending = \"crlf\"\n");

    env.inistore()
        .args(["set", "app.ini", "S", "K", "V", "--config"])
        .arg(&config)
        .assert()
        .success();
    assert_eq!(env.read(&env.file("app.ini")), "[S]\r\nK=V\r\n");
}

#[test]
fn test_config_env_var_and_bad_config() {
    let env = TestEnv::new();
    let bad = env.write("bad.toml", "no-such-setting = 1\n");

    env.inistore()
        .env("INISTORE_CONFIG", &bad)
        .args(["set", "app.ini", "S", "K", "V"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config error"));
    assert!(!env.file("app.ini").exists());
}

#[test]
fn test_version_includes_build_info() {
    let env = TestEnv::new();
    env.inistore()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
