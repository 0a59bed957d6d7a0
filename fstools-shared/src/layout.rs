//! Fixed filesystem layout used while building the root overlay.
//!
//! ```text
//! /                       # overlay (lower: old root, upper: <base>/upper)
//! ├── rom/                # old read-only root after pivot
//! │   └── overlay/        # conversion target while copying
//! ├── overlay/            # persistent overlay volume (or ram base)
//! │   ├── .fs_state
//! │   ├── upper/
//! │   └── work/
//! └── tmp/
//!     ├── root/           # tmpfs backing the ram overlay
//!     └── overlay/        # first mount point of a persistent volume
//! ```

use std::path::{Path, PathBuf};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Overlay directory names.
pub mod dirs {
    /// Overlayfs upper directory name
    pub const UPPER: &str = "upper";

    /// Overlayfs work directory name
    pub const WORK: &str = "work";
}

/// Root block device remounted in place when no overlay volume exists
pub const ROOT_DEVICE: &str = "/dev/root";

/// Final location of the persistent overlay volume
pub const OVERLAY_DIR: &str = "/overlay";

/// Pre-init marker; its presence lets `start` run outside preinit
pub const PREINIT_MARKER: &str = "/tmp/.preinit";

/// tmpfs backing the ram overlay
pub const RAM_ROOT: &str = "/tmp/root";

/// First mount point of a persistent volume before it is moved
pub const OVERLAY_STAGING: &str = "/tmp/overlay";

/// Old root after pivot
pub const ROM: &str = "/rom";

/// Mount point of the merged overlay before pivot
pub const PIVOT_MOUNT: &str = "/mnt";

/// Mounts carried over to the new root on pivot, `/proc` first
pub const CARRIED_MOUNTS: &[&str] = &["/proc", "/dev", "/tmp", "/sys", "/overlay"];

/// External helpers
pub mod helpers {
    /// Block utility, handles `block extroot`
    pub const BLOCK: &str = "/sbin/block";

    /// Snapshot utility, handles `snapshot unpack`
    pub const SNAPSHOT: &str = "/sbin/snapshot";

    /// ext4 formatter used for block volumes during conversion
    pub const MKFS_EXT4: &str = "mkfs.ext4";

    /// Flash utility, erases MTD partitions during conversion
    pub const MTD: &str = "/sbin/mtd";

    /// Truncates UBI volumes during conversion
    pub const UBIUPDATEVOL: &str = "ubiupdatevol";
}

// ============================================================================
// OVERLAY BASE LAYOUT
// ============================================================================

/// Layout of an overlay base directory (tmpfs or persistent volume).
///
/// ```text
/// {base}/
/// ├── upper/    # writable layer
/// └── work/     # overlayfs work directory
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayBaseLayout {
    base: PathBuf,
}

impl OverlayBaseLayout {
    /// Create a layout rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Writable layer: {base}/upper
    pub fn upper_dir(&self) -> PathBuf {
        self.base.join(dirs::UPPER)
    }

    /// Work directory: {base}/work
    pub fn work_dir(&self) -> PathBuf {
        self.base.join(dirs::WORK)
    }

    /// Mount source label shown in the mount table, e.g. `overlayfs:/tmp/root`.
    pub fn source_label(&self) -> String {
        format!("overlayfs:{}", self.base.display())
    }

    /// Overlayfs mount data with `/` as the single lower layer.
    pub fn mount_data(&self) -> String {
        format!(
            "lowerdir=/,upperdir={},workdir={}",
            self.upper_dir().display(),
            self.work_dir().display()
        )
    }
}

/// Path of `abs` re-rooted under `root`, e.g. (`/mnt`, `/proc`) -> `/mnt/proc`.
pub fn rerooted(root: &Path, abs: &str) -> PathBuf {
    root.join(abs.trim_start_matches('/'))
}
