//! Well-known names and values shared between `mount_root` and the volume library.

/// Volume names
pub mod volumes {
    /// Default overlay data volume, used when the command line gives no hint
    pub const DEFAULT_DATA: &str = "rootfs_data";
}

/// Kernel command line
pub mod cmdline {
    /// Source of the kernel command line
    pub const PROC_CMDLINE: &str = "/proc/cmdline";

    /// Upper bound on the command line length (`COMMAND_LINE_SIZE` on arm/arm64)
    pub const COMMAND_LINE_SIZE: usize = 4096;

    /// Key of the overlay device override, e.g. `overlay=/dev/mmcblk0p3`
    pub const OVERLAY_KEY: &str = "overlay=";

    /// Prefix stripped from the override value
    pub const DEV_PREFIX: &str = "/dev/";
}

/// Environment indicators set by the init system.
///
/// Only their presence is checked, never their value.
pub mod env {
    /// Set while running inside preinit
    pub const PREINIT: &str = "PREINIT";

    /// Set while the system is shutting down
    pub const SHUTDOWN: &str = "SHUTDOWN";

    /// Passed to the snapshot helper so it restores instead of creating
    pub const SNAPSHOT: &str = "SNAPSHOT";

    /// Value of [`SNAPSHOT`] understood by the snapshot helper
    pub const SNAPSHOT_MAGIC: &str = "magic";
}

/// Readiness flag stored in the overlay directory
pub mod state {
    /// Symlink whose target is the decimal overlay state
    pub const FS_STATE_FILE: &str = ".fs_state";
}

/// On-disk magic numbers used to classify a volume.
pub mod magic {
    /// "OWRT", marks a snapshot volume (big-endian)
    pub const SNAPSHOT: u32 = 0x4f57_5254;

    /// Erased volume marker written by sysupgrade
    pub const DEADCODE: u32 = 0xdead_c0de;

    /// JFFS2 node magic (low 16 bits of the first word)
    pub const JFFS2: u16 = 0x1985;

    /// UBIFS node magic (little-endian)
    pub const UBIFS: u32 = 0x0610_1831;

    /// ext2/3/4 superblock magic
    pub const EXT4: u16 = 0xef53;

    /// Byte offset of the ext superblock magic (1024 + 0x38)
    pub const EXT4_MAGIC_OFFSET: usize = 0x438;

    /// Bytes read from a volume to classify it
    pub const PROBE_LEN: usize = 0x440;
}
