//! Integration tests for the `qlik-embed` CLI binary.
//!
//! Argument parsing, help output, shell completions, local commands and
//! configuration errors, all without a live tenant.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const ISOLATED_HOME: &str = "/tmp/qlik-embed-cli-test-nonexistent";

/// Build a [`Command`] for the binary with env isolation.
///
/// Clears all `QLIK_EMBED_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn qlik_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("qlik-embed");
    cmd.env("HOME", ISOLATED_HOME)
        .env("XDG_CONFIG_HOME", ISOLATED_HOME)
        .env("XDG_DATA_HOME", ISOLATED_HOME)
        .env_remove("QLIK_EMBED_PROFILE")
        .env_remove("QLIK_EMBED_TENANT")
        .env_remove("QLIK_EMBED_WEB_INTEGRATION_ID")
        .env_remove("QLIK_EMBED_APP")
        .env_remove("QLIK_EMBED_OBJECTS")
        .env_remove("QLIK_EMBED_IDENTITY")
        .env_remove("QLIK_EMBED_AUTH_TYPE")
        .env_remove("QLIK_EMBED_CLIENT_ID")
        .env_remove("QLIK_EMBED_STORE")
        .env_remove("QLIK_EMBED_OUTPUT")
        .env_remove("QLIK_EMBED_INSECURE")
        .env_remove("QLIK_EMBED_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = qlik_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    qlik_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Qlik Cloud")
            .and(predicate::str::contains("probe"))
            .and(predicate::str::contains("fetch"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("login-url")),
    );
}

#[test]
fn test_version_flag() {
    qlik_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qlik-embed"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    qlik_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    qlik_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = qlik_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_fetch_without_tenant() {
    qlik_cmd()
        .arg("fetch")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No tenant configured"));
}

#[test]
fn test_fetch_without_objects() {
    qlik_cmd()
        .args([
            "--tenant",
            "acme.eu.qlikcloud.com",
            "--web-integration-id",
            "wid",
            "fetch",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("App ID and Object IDs are required"));
}

#[test]
fn test_web_integration_requires_id() {
    qlik_cmd()
        .args([
            "--tenant",
            "acme.eu.qlikcloud.com",
            "--app",
            "app-1",
            "--objects",
            "a,b",
            "probe",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Web integration ID is required"));
}

#[test]
fn test_unknown_profile() {
    qlik_cmd()
        .args(["--profile", "nope", "fetch"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_invalid_output_format() {
    let output = qlik_cmd()
        .args(["--output", "invalid", "fetch"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Offline commands ────────────────────────────────────────────────

#[test]
fn test_login_url_for_web_integration() {
    qlik_cmd()
        .args([
            "--tenant",
            "acme.eu.qlikcloud.com/",
            "--web-integration-id",
            "wid-1",
            "--app",
            "app-1",
            "--objects",
            "a",
            "login-url",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("https://acme.eu.qlikcloud.com/login?")
                .and(predicate::str::contains("qlik-web-integration-id=wid-1"))
                .and(predicate::str::contains("returnto=")),
        );
}

#[test]
fn test_login_url_not_available_for_oauth2() {
    qlik_cmd()
        .args([
            "--tenant",
            "acme.eu.qlikcloud.com",
            "--auth-type",
            "oauth2",
            "--client-id",
            "cid",
            "--app",
            "app-1",
            "--objects",
            "a",
            "login-url",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("web-integration"));
}

#[test]
fn test_token_set_show_clear() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let store = store.to_str().unwrap();
    let base = ["--tenant", "acme.eu.qlikcloud.com", "--store", store];

    qlik_cmd()
        .args(base)
        .args(["token", "set", "eyJhbGciOiJIUzI1NiJ9.payload.sig"])
        .assert()
        .success();

    qlik_cmd()
        .args(base)
        .args(["token", "show", "--reveal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("eyJhbGciOiJIUzI1NiJ9.payload.sig"));

    qlik_cmd()
        .args(base)
        .args(["token", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("(32 chars)").and(predicate::str::contains("payload").not()),
        );

    qlik_cmd()
        .args(base)
        .args(["token", "clear"])
        .assert()
        .success();

    qlik_cmd()
        .args(base)
        .args(["token", "show"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no cached token"));
}

#[test]
fn test_config_show_no_config() {
    // Renders the default config when no file exists.
    qlik_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_path_lists_both_files() {
    qlik_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("config.toml").and(predicate::str::contains("store.json")),
        );
}

#[test]
fn test_profiles_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("qlik-embed");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        r#"
default_profile = "sales"

[profiles.sales]
host = "acme.eu.qlikcloud.com"
web_integration_id = "wid"
app_id = "app-1"
object_ids = "a,b"
"#,
    )
    .unwrap();

    qlik_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["--output", "plain", "config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sales"));
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_token_subcommands_exist() {
    qlik_cmd()
        .args(["token", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("show")
                .and(predicate::str::contains("set"))
                .and(predicate::str::contains("clear")),
        );
}

#[test]
fn test_config_subcommands_exist() {
    qlik_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("path")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("profiles")),
        );
}
