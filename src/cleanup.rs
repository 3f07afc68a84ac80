//! Cleanup collaborators.
//!
//! Emulated networks leave OS-level state behind when a run dies early;
//! these routines are the resource safety net. They run on `--clean`, after
//! unhandled errors, and from the interrupt handler, so they are
//! best-effort: every step is attempted and failures are logged rather than
//! propagated when invoked through [`cleanup_all`].

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use log::{info, warn};

/// Scratch directory for general emulation state.
pub const STATE_DIR: &str = "/tmp/emunet";
/// Scratch directory for wireless radio/medium state.
pub const WIRELESS_STATE_DIR: &str = "/tmp/emunet-wireless";

pub trait Cleanup {
    fn run(&mut self) -> Result<()>;
}

/// Removes general emulation leftovers.
pub struct GeneralCleanup {
    state_dir: String,
}

impl Default for GeneralCleanup {
    fn default() -> Self {
        GeneralCleanup {
            state_dir: STATE_DIR.to_string(),
        }
    }
}

impl GeneralCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_dir(dir: &str) -> Self {
        GeneralCleanup {
            state_dir: dir.to_string(),
        }
    }
}

impl Cleanup for GeneralCleanup {
    fn run(&mut self) -> Result<()> {
        let dir = Path::new(&self.state_dir);
        if dir.exists() {
            info!("Removing emulation state directory {}", dir.display());
            std::fs::remove_dir_all(dir)
                .wrap_err_with(|| format!("failed to remove '{}'", dir.display()))?;
        }
        Ok(())
    }
}

/// Removes wireless-specific leftovers (virtual radios, medium state).
pub struct WirelessCleanup {
    state_dir: String,
}

impl Default for WirelessCleanup {
    fn default() -> Self {
        WirelessCleanup {
            state_dir: WIRELESS_STATE_DIR.to_string(),
        }
    }
}

impl WirelessCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state_dir(dir: &str) -> Self {
        WirelessCleanup {
            state_dir: dir.to_string(),
        }
    }
}

impl Cleanup for WirelessCleanup {
    fn run(&mut self) -> Result<()> {
        let dir = Path::new(&self.state_dir);
        if dir.exists() {
            info!("Removing wireless state directory {}", dir.display());
            std::fs::remove_dir_all(dir)
                .wrap_err_with(|| format!("failed to remove '{}'", dir.display()))?;
        }
        Ok(())
    }
}

/// Unconditionally attempt both general and wireless cleanup, regardless of
/// which lifecycle state was active. Never fails; used from the interrupt
/// handler and the top-level error path.
pub fn cleanup_all() {
    if let Err(err) = GeneralCleanup::new().run() {
        warn!("general cleanup failed: {err:#}");
    }
    if let Err(err) = WirelessCleanup::new().run() {
        warn!("wireless cleanup failed: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_general_cleanup_removes_state_dir() {
        let scratch = tempdir().unwrap();
        let state = scratch.path().join("state");
        std::fs::create_dir_all(state.join("nested")).unwrap();

        let mut cleanup = GeneralCleanup::with_state_dir(state.to_str().unwrap());
        cleanup.run().unwrap();
        assert!(!state.exists());
    }

    #[test]
    fn test_cleanup_is_a_noop_without_state() {
        let scratch = tempdir().unwrap();
        let state = scratch.path().join("absent");
        let mut cleanup = WirelessCleanup::with_state_dir(state.to_str().unwrap());
        assert!(cleanup.run().is_ok());
    }
}
