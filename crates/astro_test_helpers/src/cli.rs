//! CLI command builders for tests

use assert_cmd::Command;

/// The `astrosync` binary with logs reduced to errors and no user overrides
#[allow(deprecated)]
pub fn astro_command() -> Command {
    command_for("astrosync")
}

/// Any workspace binary, configured like [`astro_command`]
#[allow(deprecated)]
pub fn command_for(bin_name: &str) -> Command {
    let mut cmd = Command::cargo_bin(bin_name)
        .unwrap_or_else(|_| panic!("Failed to find {} binary", bin_name));
    cmd.env("RUST_LOG", "error");
    cmd.env_remove("ASTROSYNC_WORKSPACE");
    cmd.env_remove("ASTROSYNC_API_TOKEN");
    cmd
}
