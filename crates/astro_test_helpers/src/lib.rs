//! Shared test utilities for AstroSync test suites
//!
//! # Modules
//!
//! - [`workspace`]: temporary workspaces with a `.astrosync` directory
//! - [`cli`]: `astrosync` command builders with a clean environment
//! - [`logging`]: test logging configuration
//! - [`assertions`]: predicates for CLI output
//!
//! # Example
//!
//! ```rust,no_run
//! use astro_test_helpers::prelude::*;
//!
//! let workspace = init_workspace();
//! astro_command()
//!     .current_dir(workspace.path())
//!     .args(["--offline", "status"])
//!     .assert()
//!     .success();
//! ```

pub mod assertions;
pub mod cli;
pub mod logging;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::cli::{astro_command, command_for};
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::workspace::{init_workspace, temp_dir, workspace_with_config, OFFLINE_CONFIG};
}
