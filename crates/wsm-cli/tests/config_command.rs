use std::fs;

use predicates::str::contains;
use tempfile::TempDir;

macro_rules! wsm {
    () => {
        assert_cmd::cargo::cargo_bin_cmd!("wsm")
    };
}

#[test]
fn config_without_file_prints_defaults() {
    let dir = TempDir::new().expect("create temp dir");

    wsm!()
        .arg("config")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(contains("[retry.cloud]"))
        .stdout(contains("[retry.long_sync]"))
        .stdout(contains("[retry.short_database]"))
        .stdout(contains("max_attempts = 72"))
        .stdout(contains("# directory not set"));
}

#[test]
fn config_reads_wsm_toml_from_working_directory() {
    let dir = TempDir::new().expect("create temp dir");
    fs::write(
        dir.path().join("wsm.toml"),
        r#"[retry.cloud]
max_retries = 3

[flight_store]
directory = "flights"
"#,
    )
    .expect("write wsm.toml");

    wsm!()
        .arg("config")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(contains("max_retries = 3"))
        .stdout(contains("directory = \"flights\""));
}

#[test]
fn config_path_can_be_given_explicitly() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[bucket_deletion]\nmax_attempts = 5\n").expect("write config");

    wsm!()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(contains("max_attempts = 5"));
}

#[test]
fn invalid_config_fails_with_cause() {
    let dir = TempDir::new().expect("create temp dir");
    fs::write(
        dir.path().join("wsm.toml"),
        "[retry.cloud]\ninitial_interval_secs = 0\n",
    )
    .expect("write wsm.toml");

    wsm!()
        .arg("config")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("error: configuration error"))
        .stderr(contains("caused by: invalid config value 'retry.cloud'"));
}

#[test]
fn unknown_config_key_fails() {
    let dir = TempDir::new().expect("create temp dir");
    fs::write(dir.path().join("wsm.toml"), "[retry.clod]\nmax_retries = 1\n")
        .expect("write wsm.toml");

    wsm!()
        .arg("config")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(contains("failed to parse config"));
}
