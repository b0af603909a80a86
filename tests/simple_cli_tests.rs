use assert_cmd::prelude::*;
use assert_cmd::cargo::cargo_bin_cmd;

/// Tests that `--help` is handled successfully by the CLI.
///
/// This test verifies:
/// 1. Running `tarot-cli --help` exits successfully
/// 2. The help text is written to stdout
/// 3. No unexpected stderr output is produced
#[test]
fn test_cli_help_success() {
    let mut cmd = cargo_bin_cmd!("tarot-cli");

    let assert = cmd.arg("--help").assert().success();

    let out = assert.get_output();
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("data"), "expected the data command in:\n{}", stdout);
    assert!(stdout.contains("images"), "expected the images command in:\n{}", stdout);
    assert!(
        out.stderr.is_empty(),
        "expected empty stderr for --help, got:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
}

/// Tests that the bundled dataset passes `data validate`.
#[test]
fn test_cli_validates_bundled_dataset() {
    let mut cmd = cargo_bin_cmd!("tarot-cli");
    let data = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/tarot-images.json");

    let assert = cmd
        .env_remove("DATA_PATH")
        .args(["data", "validate", "--data"])
        .arg(&data)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("OK: 78 cards"), "unexpected output: {}", stdout);
}

/// Tests that a dataset missing cards fails validation with a non-zero exit.
#[test]
fn test_cli_rejects_short_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.json");
    std::fs::write(&path, r#"[{"id": 0, "name": "The Fool", "arcana": "Major Arcana"}]"#).unwrap();

    let mut cmd = cargo_bin_cmd!("tarot-cli");
    let assert = cmd.args(["data", "validate", "--data"]).arg(&path).assert().failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("expected at least 78 cards"), "unexpected stderr: {}", stderr);
}

/// Tests that an unreachable server is reported as a connection problem.
#[test]
fn test_cli_health_without_server() {
    let mut cmd = cargo_bin_cmd!("tarot-cli");

    let assert = cmd
        .args(["--server-url", "http://127.0.0.1:9", "health"])
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.starts_with("Error:"), "unexpected stderr: {}", stderr);
}

/// Tests that `--server-url` takes precedence over `TAROT_URL`.
///
/// The container health check passes the port through this flag.
#[test]
fn test_cli_server_url_flag_overrides_env() {
    let mut cmd = cargo_bin_cmd!("tarot-cli");

    let assert = cmd
        .env("TAROT_URL", "http://127.0.0.1:7")
        .args(["--server-url", "http://127.0.0.1:9", "health"])
        .assert()
        .failure();

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("127.0.0.1:9/health"), "unexpected stderr: {}", stderr);
}
