//! CLI integration tests

use astro_test_helpers::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_help_and_version() {
    astro_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("AstroSync"));

    astro_command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_init_creates_config() {
    let temp = temp_dir();

    astro_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Workspace initialized"));

    assert!(temp.path().join(".astrosync/config.toml").exists());

    astro_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_workspace_flag() {
    let workspace = init_workspace();
    let elsewhere = temp_dir();

    astro_command()
        .current_dir(elsewhere.path())
        .arg("--workspace")
        .arg(workspace.path())
        .args(["--offline", "enqueue", "/api/sessions"])
        .assert()
        .success();

    assert!(workspace.path().join(".astrosync/offline.db").exists());
    assert!(!elsewhere.path().join(".astrosync").exists());
}

#[test]
fn test_enqueue_prints_id_and_updates_status() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args([
            "--offline",
            "enqueue",
            "/api/sessions",
            "--method",
            "put",
            "--data",
            r#"{"target":"M31"}"#,
            "--priority",
            "critical",
        ])
        .assert()
        .success()
        .stdout(contains_sync_id());

    let output = astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let status: Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(status["totalItems"], 1);
    assert_eq!(status["byPriority"]["critical"], 1);
    assert_eq!(status["isOnline"], false);
    assert_eq!(status["isSyncing"], false);
}

#[test]
fn test_status_human_output() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("offline"))
        .stdout(predicate::str::contains("Queued:   0"));
}

#[test]
fn test_enqueue_rejects_bad_input() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "enqueue", "/api/x", "--priority", "urgent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "enqueue", "/api/x", "--data", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--data must be valid JSON"));

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "enqueue", "/api/x", "--strategy", "eventually"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("eventually"));
}

#[test]
fn test_sync_offline_reports_offline() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "enqueue", "/api/frames"])
        .assert()
        .success();

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "sync", "all"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Offline"));

    let output = astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "sync", "batch", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let result: Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["errors"][0], "Offline");
    assert_eq!(result["syncedItems"], 0);
}

#[test]
fn test_clear_queue() {
    let workspace = init_workspace();
    for url in ["/api/a", "/api/b"] {
        astro_command()
            .current_dir(workspace.path())
            .args(["--offline", "enqueue", url])
            .assert()
            .success();
    }

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "clear-queue"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Cleared 2"));

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalItems\": 0"));
}

#[test]
fn test_cache_round_trip() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "put", "weather", r#"{"seeing":2.5}"#])
        .assert()
        .success();

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "get", "weather"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.5"));

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "put", "note", "clear skies"])
        .assert()
        .success();

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "get", "note"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"clear skies\""));

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "delete", "weather"])
        .assert()
        .success();

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "get", "weather"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No cached value"));
}

#[test]
fn test_expired_cache_entry_is_absent_and_swept() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "put", "forecast", "1", "--ttl", "0"])
        .assert()
        .success();

    astro_command()
        .current_dir(workspace.path())
        .arg("cleanup")
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed 1 expired"));

    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "get", "forecast"])
        .assert()
        .failure();
}

#[test]
fn test_stats_json() {
    let workspace = init_workspace();

    astro_command()
        .current_dir(workspace.path())
        .args(["--offline", "enqueue", "/api/a"])
        .assert()
        .success();
    astro_command()
        .current_dir(workspace.path())
        .args(["cache", "put", "k", "1"])
        .assert()
        .success();

    let output = astro_command()
        .current_dir(workspace.path())
        .args(["stats", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(stats["partitions"]["syncQueue"], 1);
    assert_eq!(stats["partitions"]["cache"], 1);
    assert_eq!(stats["total"], 2);
}

#[test]
fn test_export_then_import_into_fresh_workspace() {
    let source = init_workspace();
    let backup = source.path().join("backup.json");

    astro_command()
        .current_dir(source.path())
        .args(["--offline", "enqueue", "/api/sequences", "--priority", "high"])
        .assert()
        .success();
    astro_command()
        .current_dir(source.path())
        .args(["cache", "put", "k", "\"v\""])
        .assert()
        .success();

    astro_command()
        .current_dir(source.path())
        .arg("export")
        .arg(&backup)
        .assert()
        .success()
        .stderr(predicate::str::contains("Exported 2"));
    assert!(valid_json().eval(&std::fs::read_to_string(&backup).unwrap()));

    let target = init_workspace();
    astro_command()
        .current_dir(target.path())
        .arg("import")
        .arg(&backup)
        .assert()
        .success()
        .stderr(predicate::str::contains("Imported 2"));

    astro_command()
        .current_dir(target.path())
        .args(["--offline", "status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"high\": 1"));
}

#[test]
fn test_import_rejects_malformed_backup() {
    let workspace = init_workspace();
    let path = workspace.path().join("broken.json");
    std::fs::write(&path, r#"{"version": 99, "exportedAt": 0, "partitions": {}}"#).unwrap();

    astro_command()
        .current_dir(workspace.path())
        .arg("import")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid backup"));
}

#[test]
fn test_invalid_config_exits_with_config_error() {
    let workspace = workspace_with_config("[sync]\nrequest_timeout_ms = 0\n");

    astro_command()
        .current_dir(workspace.path())
        .arg("status")
        .assert()
        .code(astro_common::EXIT_CONFIG_ERROR)
        .stderr(predicate::str::contains("request_timeout_ms"));
}
