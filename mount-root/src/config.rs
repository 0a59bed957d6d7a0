//! Runtime configuration for one `mount_root` invocation.

use std::path::PathBuf;

use fstools_shared::constants::{cmdline, volumes};
use fstools_shared::layout;
use fstools_shared::{FstoolsError, FstoolsResult};

/// Paths and names the phases work with.
///
/// Defaults match a stock device; the CLI can override each of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountRootConfig {
    /// Kernel command line source
    pub cmdline_path: PathBuf,
    /// Marker allowing `start` outside preinit
    pub preinit_marker: PathBuf,
    /// Overlay directory holding the readiness flag
    pub overlay_dir: PathBuf,
    /// Volume used when the command line has no hint
    pub default_volume: String,
}

impl Default for MountRootConfig {
    fn default() -> Self {
        Self {
            cmdline_path: PathBuf::from(cmdline::PROC_CMDLINE),
            preinit_marker: PathBuf::from(layout::PREINIT_MARKER),
            overlay_dir: PathBuf::from(layout::OVERLAY_DIR),
            default_volume: volumes::DEFAULT_DATA.to_string(),
        }
    }
}

impl MountRootConfig {
    /// Reject values that would make resolution or state tracking meaningless.
    pub fn validate(&self) -> FstoolsResult<()> {
        if self.default_volume.trim().is_empty() {
            return Err(FstoolsError::Config(
                "default volume name must not be empty".to_string(),
            ));
        }
        if !self.overlay_dir.is_absolute() {
            return Err(FstoolsError::Config(format!(
                "overlay directory must be absolute: {}",
                self.overlay_dir.display()
            )));
        }
        Ok(())
    }
}
