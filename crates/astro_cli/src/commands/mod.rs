//! Command implementations
//!
//! Data goes to stdout; progress and confirmations go to stderr.

pub mod run;
pub mod storage;
pub mod sync;

use astro_config::{Config, CONFIG_DIR, CONFIG_FILE};
use std::path::Path;

pub fn cmd_init(root: &Path) -> anyhow::Result<()> {
    if Config::init_workspace(root)? {
        eprintln!("✓ Created {}/{}", CONFIG_DIR, CONFIG_FILE);
    } else {
        eprintln!("✓ {}/{} already exists", CONFIG_DIR, CONFIG_FILE);
    }

    eprintln!("\n✅ Workspace initialized successfully!");
    Ok(())
}
