//! Temporary workspaces for integration tests

use assert_fs::TempDir;
use std::fs;

/// Config that keeps the CLI away from the network: offline at start and an
/// API base that nothing listens on
pub const OFFLINE_CONFIG: &str = r#"[storage]
db_path = "offline.db"

[sync]
api_base_url = "http://127.0.0.1:9"
request_timeout_ms = 500

[network]
assume_online = false
"#;

/// Temporary directory, removed on drop
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Workspace with a `.astrosync` directory holding [`OFFLINE_CONFIG`]
///
/// ```rust
/// use astro_test_helpers::workspace::init_workspace;
///
/// let workspace = init_workspace();
/// assert!(workspace.path().join(".astrosync/config.toml").exists());
/// ```
pub fn init_workspace() -> TempDir {
    workspace_with_config(OFFLINE_CONFIG)
}

/// Workspace whose `.astrosync/config.toml` holds `config`
pub fn workspace_with_config(config: &str) -> TempDir {
    let temp = temp_dir();
    let dir = temp.path().join(".astrosync");
    fs::create_dir_all(&dir).expect("Failed to create .astrosync directory");
    fs::write(dir.join("config.toml"), config).expect("Failed to write config.toml");
    temp
}
