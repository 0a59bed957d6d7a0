//! Volume handle, filesystem conditions and the volume library seam.
//!
//! The decision logic in [`crate::strategy`] and [`crate::finalize`] only
//! talks to storage through [`VolumeLibrary`]. [`crate::system::SystemVolumes`]
//! is the Linux implementation; tests use an in-memory one.

use std::fmt;
use std::path::{Path, PathBuf};

use fstools_shared::FstoolsResult;

/// How a volume is exposed by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    /// Raw flash partition, `/dev/mtdblockN`
    Mtd { index: u32 },
    /// UBI volume, `/dev/ubiX_Y`
    Ubi,
    /// Regular block device partition (eMMC, SD, disk)
    Block,
}

/// Transient handle on a storage volume, valid for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    name: String,
    kind: VolumeKind,
    device: PathBuf,
}

impl Volume {
    pub fn new(name: impl Into<String>, kind: VolumeKind, device: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            device: device.into(),
        }
    }

    /// Name the volume was found under (partition label or device name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VolumeKind {
        self.kind
    }

    /// Device node used to read and mount the volume.
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Filesystem a fresh conversion produces on this kind of volume.
    pub fn native_filesystem(&self) -> Filesystem {
        match self.kind {
            VolumeKind::Mtd { .. } => Filesystem::Jffs2,
            VolumeKind::Ubi => Filesystem::Ubifs,
            VolumeKind::Block => Filesystem::Ext4,
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.device.display())
    }
}

/// Condition of a volume as reported by the classifier.
///
/// Exactly one holds per query. Never cache it across invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemCondition {
    /// No recognizable filesystem
    None,
    /// Filesystem marker present but the volume is not mountable yet
    Deadcode,
    Jffs2,
    Ubifs,
    Ext4,
    /// Snapshot-format volume
    Snapshot,
}

impl FilesystemCondition {
    /// The mountable filesystem, for conditions that can back an overlay directly.
    pub fn persistent(self) -> Option<Filesystem> {
        match self {
            FilesystemCondition::Jffs2 => Some(Filesystem::Jffs2),
            FilesystemCondition::Ubifs => Some(Filesystem::Ubifs),
            FilesystemCondition::Ext4 => Some(Filesystem::Ext4),
            FilesystemCondition::None
            | FilesystemCondition::Deadcode
            | FilesystemCondition::Snapshot => None,
        }
    }
}

/// Filesystems that can back a persistent overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filesystem {
    Jffs2,
    Ubifs,
    Ext4,
}

impl Filesystem {
    /// Kernel filesystem type passed to mount(2).
    pub fn fstype(self) -> &'static str {
        match self {
            Filesystem::Jffs2 => "jffs2",
            Filesystem::Ubifs => "ubifs",
            Filesystem::Ext4 => "ext4",
        }
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fstype())
    }
}

/// Persisted overlay readiness flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Unknown = 0,
    Pending = 1,
    Ready = 2,
}

impl OverlayState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OverlayState::Unknown),
            1 => Some(OverlayState::Pending),
            2 => Some(OverlayState::Ready),
            _ => None,
        }
    }
}

/// What the extroot procedure did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtrootOutcome {
    /// An external overlay was mounted and the root switched to it
    Switched,
    /// No extroot configuration applies to this device
    NotConfigured,
}

/// Storage operations the decision logic depends on.
pub trait VolumeLibrary {
    /// Look up a volume by exact name.
    fn find(&self, name: &str) -> Option<Volume>;

    /// Report the current condition of `volume`.
    fn classify(&self, volume: &Volume) -> FstoolsResult<FilesystemCondition>;

    /// Remount the read-only root device on `/` in place.
    fn mount_root_in_place(&mut self) -> FstoolsResult<()>;

    /// Try to mount the overlay from external storage.
    fn mount_extroot(&mut self) -> FstoolsResult<ExtrootOutcome>;

    /// Mount `volume` as the persistent overlay.
    fn mount_overlay(&mut self, volume: &Volume, filesystem: Filesystem) -> FstoolsResult<()>;

    /// Mount a snapshot-format volume.
    fn mount_snapshot(&mut self, volume: &Volume) -> FstoolsResult<()>;

    /// Mount a memory-backed overlay.
    fn mount_ram_overlay(&mut self) -> FstoolsResult<()>;

    /// One-time irreversible conversion of `volume` into a mountable overlay.
    fn convert_in_place(&mut self, volume: &Volume) -> FstoolsResult<()>;

    /// Persist the readiness flag of the overlay at `path`.
    fn set_state(&mut self, path: &Path, state: OverlayState) -> FstoolsResult<()>;
}
