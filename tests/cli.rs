// End-to-end checks of the sql-corpus binary.
// Requires: assert_cmd, predicates, tempfile in [dev-dependencies]

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

fn corpus() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("corpus");
    fs::create_dir(&input).expect("create corpus dir");
    fs::write(input.join("good.txt"), "SELECT a FROM t;\nSELECT b FROM u;\n").expect("write");
    fs::write(input.join("bad.txt"), "SELEC a FROM t;\nSELECT 1;\n").expect("write");
    dir
}

#[test]
fn validate_writes_ledgers() {
    let dir = corpus();
    let out = dir.path().join("out");

    let mut cmd = Command::cargo_bin("sql-corpus").expect("binary");
    cmd.arg("validate")
        .arg("--input-dir")
        .arg(dir.path().join("corpus"))
        .arg("--output-dir")
        .arg(&out);
    cmd.assert()
        .success()
        .stdout(contains("Validated 2 files: 4 statements, 1 with errors"));

    let stats = fs::read_to_string(out.join("error_stats.csv")).expect("stats ledger");
    let rows: Vec<&str> = stats.lines().collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], "bad.txt,2,1,0,50.00,0");
    assert_eq!(rows[2], "good.txt,2,0,0,0.00,0");

    let errors = fs::read_to_string(out.join("errors.csv")).expect("error ledger");
    assert_eq!(errors, "error,code\nLine 1:0,bad\n");
    assert!(out.join("bad_errors.txt").exists());
    assert!(!out.join("good_errors.txt").exists());
}

#[test]
fn validate_with_jobs_matches_sequential() {
    let dir = corpus();
    let seq = dir.path().join("seq");
    let pool = dir.path().join("pool");

    for (out, jobs) in [(&seq, "1"), (&pool, "3")] {
        Command::cargo_bin("sql-corpus")
            .expect("binary")
            .args(["validate", "--jobs", jobs, "--input-dir"])
            .arg(dir.path().join("corpus"))
            .arg("--output-dir")
            .arg(out)
            .assert()
            .success();
    }

    assert_eq!(
        fs::read_to_string(seq.join("error_stats.csv")).expect("seq"),
        fs::read_to_string(pool.join("error_stats.csv")).expect("pool")
    );
}

#[test]
fn validate_from_config_file() {
    let dir = corpus();
    let out = dir.path().join("configured");
    let config = dir.path().join("config.json");
    let body = serde_json::json!({
        "input_dir": dir.path().join("corpus"),
        "output_dir": out,
        "stats_ledger": dir.path().join("stats.csv"),
    });
    fs::write(&config, body.to_string()).expect("write config");

    Command::cargo_bin("sql-corpus")
        .expect("binary")
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    assert!(dir.path().join("stats.csv").exists());
    assert!(out.join("errors.csv").exists());
}

#[test]
fn export_writes_documents() {
    let dir = corpus();
    let out = dir.path().join("out");

    Command::cargo_bin("sql-corpus")
        .expect("binary")
        .arg("export")
        .arg("--input-dir")
        .arg(dir.path().join("corpus"))
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(contains("Exported 2 files: 1 complete, 1 partial, 0 failed"));

    assert!(out.join("json_trees").join("good.json").exists());
    assert!(out.join("json_trees").join("bad_partial.json").exists());

    let summary = fs::read_to_string(out.join("export_summary.csv")).expect("summary");
    assert!(summary.starts_with("FileName,DurationSeconds,JsonFile,Status\n"));
    assert!(summary.contains("bad.txt,0,bad_partial.json,PARTIAL"));

    let log = fs::read_to_string(out.join("timeout_log.txt")).expect("timeout log");
    assert!(log.contains("- bad.txt_query_1: SELEC a FROM t..."));
}

#[test]
fn missing_directories_fail() {
    Command::cargo_bin("sql-corpus")
        .expect("binary")
        .arg("validate")
        .assert()
        .failure()
        .stderr(contains("--input-dir and --output-dir are required"));
}

#[test]
fn unwritable_output_directory_fails() {
    let dir = corpus();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "file, not a directory").expect("write");

    Command::cargo_bin("sql-corpus")
        .expect("binary")
        .arg("validate")
        .arg("--input-dir")
        .arg(dir.path().join("corpus"))
        .arg("--output-dir")
        .arg(blocker.join("out"))
        .assert()
        .failure()
        .stderr(contains("Failed to create output directory"));
}

#[test]
fn deeply_nested_statement_survives_every_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("corpus");
    fs::create_dir(&input).expect("create corpus dir");
    let depth = 400;
    let deep = format!("SELECT {}1{} FROM t;", "(".repeat(depth), ")".repeat(depth));
    fs::write(input.join("a.txt"), deep).expect("write");
    fs::write(input.join("b.txt"), "SELECT 1;").expect("write");

    for (name, jobs) in [("seq", "1"), ("pool", "2")] {
        let out = dir.path().join(name);
        Command::cargo_bin("sql-corpus")
            .expect("binary")
            .args(["validate", "--jobs", jobs, "--input-dir"])
            .arg(&input)
            .arg("--output-dir")
            .arg(&out)
            .assert()
            .success();
        let stats = fs::read_to_string(out.join("error_stats.csv")).expect("stats ledger");
        let rows: Vec<&str> = stats.lines().skip(1).collect();
        assert_eq!(rows, ["a.txt,1,0,0,0.00,0", "b.txt,1,0,0,0.00,0"], "{name}");
    }

    Command::cargo_bin("sql-corpus")
        .expect("binary")
        .arg("export")
        .arg("--input-dir")
        .arg(&input)
        .arg("--output-dir")
        .arg(dir.path().join("export"))
        .assert()
        .success()
        .stdout(contains("Exported 2 files: 2 complete, 0 partial, 0 failed"));
}
