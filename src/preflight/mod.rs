//! Preflight checks for bake hosts.
//!
//! Validates that every configured external tool can be started before any
//! project is synchronized or baked. This prevents cryptic `Fatal: could not
//! start command` lines halfway through a build.
//!
//! # Example
//!
//! ```rust,no_run
//! use font_bakery::config::EngineConfig;
//! use font_bakery::preflight::check_required_tools;
//!
//! let config = EngineConfig::new("/srv/bakery/data");
//! if let Err(e) = check_required_tools(&config) {
//!     eprintln!("{e}");
//! }
//! ```

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::config::{EngineConfig, Tool};

/// Locate `program`: paths are checked as given, bare names are looked up
/// in `PATH`.
pub fn locate(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    which::which(program).ok()
}

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    locate(Path::new(cmd)).is_some()
}

/// Check that every configured tool's program can be found.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` listing every missing tool with its config key
pub fn check_required_tools(config: &EngineConfig) -> Result<()> {
    let mut missing = Vec::new();

    for tool in Tool::ALL {
        let cmd = config.tool(*tool)?;
        let program = Path::new(cmd.program());
        if locate(program).is_none() {
            missing.push((tool.key(), program.display().to_string()));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(key, program)| format!("  {} (tools.{})", program, key))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required tools:\n{}", msg);
    }

    Ok(())
}
