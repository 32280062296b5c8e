use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "OPENAI_API_KEY",
    "AZURE_OPENAI_API_KEY",
    "NEW_RELIC_USER_API_KEY",
    "NEW_RELIC_API_ENDPOINT",
    "NEW_RELIC_ACCOUNT_ID",
    "TYTUX_PROTOCOL",
    "TYTUX_MODEL",
    "TYTUX_EXECUTOR",
];

/// A command isolated from the caller's config files and variables
fn tytux(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tytux").unwrap();
    cmd.current_dir(workdir.path())
        .env("XDG_CONFIG_HOME", workdir.path())
        .env("NO_COLOR", "1");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    tytux(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tools"))
        .stdout(predicate::str::contains("check-env"));
}

#[test]
fn test_check_env_reports_missing_variables() {
    let dir = TempDir::new().unwrap();
    tytux(&dir)
        .arg("check-env")
        .assert()
        .success()
        .stdout(predicate::str::contains("GEMINI_API_KEY not set"))
        .stdout(predicate::str::contains("Missing environment variables"));
}

#[test]
fn test_check_env_json_previews_values() {
    let dir = TempDir::new().unwrap();
    tytux(&dir)
        .args(["check-env", "--json"])
        .env("GEMINI_API_KEY", "AIzaSyExample")
        .env("NEW_RELIC_USER_API_KEY", "NRAK-EXAMPLE")
        .env("NEW_RELIC_ACCOUNT_ID", "1234567")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "success""#))
        .stdout(predicate::str::contains(r#""preview": "NRA...""#))
        .stdout(predicate::str::contains(r#""length": 13"#));
}

#[test]
fn test_question_without_keys_fails() {
    let dir = TempDir::new().unwrap();
    tytux(&dir)
        .arg("list my accounts")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No configuration found"));
}

#[test]
fn test_unknown_protocol_is_rejected() {
    let dir = TempDir::new().unwrap();
    tytux(&dir)
        .args(["--protocol", "anthropic", "hello"])
        .env("GEMINI_API_KEY", "AIzaSyExample")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown protocol"));
}

#[test]
fn test_unknown_executor_is_rejected() {
    let dir = TempDir::new().unwrap();
    tytux(&dir)
        .args(["--executor", "carrier-pigeon", "hello"])
        .env("GEMINI_API_KEY", "AIzaSyExample")
        .env("NEW_RELIC_USER_API_KEY", "NRAK-EXAMPLE")
        .env("NEW_RELIC_ACCOUNT_ID", "1234567")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown executor"));
}

#[test]
fn test_config_file_in_working_directory_is_used() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("tytux.json"),
        r#"{ "protocol": "gemini", "api_key": "env:TYTUX_TEST_MISSING_KEY" }"#,
    )
    .unwrap();

    tytux(&dir)
        .arg("hello")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TYTUX_TEST_MISSING_KEY"));
}
