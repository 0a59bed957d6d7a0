//! Linux volume library.
//!
//! [`SystemVolumes`] implements [`VolumeLibrary`] on top of procfs/sysfs
//! probing, mount(2)/pivot_root(2) and the stock flash helpers.

pub mod copy;
pub mod helpers;
pub mod mounts;
pub mod probe;
pub mod state;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use fstools_shared::layout::{self, helpers as tools, OverlayBaseLayout};
use fstools_shared::{FstoolsError, FstoolsResult};

use crate::config::MountRootConfig;
use crate::volume::{
    ExtrootOutcome, Filesystem, FilesystemCondition, OverlayState, Volume, VolumeKind,
    VolumeLibrary,
};
use probe::ProbeRoots;

/// Volume library backed by the running kernel.
#[derive(Clone, Debug)]
pub struct SystemVolumes {
    roots: ProbeRoots,
    root_device: String,
    overlay_dir: PathBuf,
    ram_base: OverlayBaseLayout,
    staging: PathBuf,
    rom: String,
    block_helper: PathBuf,
    snapshot_helper: PathBuf,
}

impl SystemVolumes {
    pub fn new(config: &MountRootConfig) -> Self {
        Self {
            roots: ProbeRoots::default(),
            root_device: layout::ROOT_DEVICE.to_string(),
            overlay_dir: config.overlay_dir.clone(),
            ram_base: OverlayBaseLayout::new(layout::RAM_ROOT),
            staging: PathBuf::from(layout::OVERLAY_STAGING),
            rom: layout::ROM.to_string(),
            block_helper: PathBuf::from(tools::BLOCK),
            snapshot_helper: PathBuf::from(tools::SNAPSHOT),
        }
    }

    /// Mount point of the conversion target: `<rom>/overlay`.
    fn conversion_target(&self) -> PathBuf {
        let overlay = self.overlay_dir.to_string_lossy();
        layout::rerooted(Path::new(&self.rom), &overlay)
    }

    /// Whether `device` shows up as a mount source.
    fn is_mounted(device: &Path) -> FstoolsResult<bool> {
        let mounts = procfs::process::Process::myself()
            .and_then(|p| p.mountinfo())
            .map_err(|e| FstoolsError::Storage(format!("Failed to read mount table: {}", e)))?;

        Ok(mounts
            .0
            .iter()
            .any(|m| m.mount_source.as_deref().map(Path::new) == Some(device)))
    }

    /// Leave `volume` in a state its native filesystem can be mounted from.
    fn prepare(volume: &Volume) -> FstoolsResult<()> {
        match volume.kind() {
            VolumeKind::Block => helpers::run_tool(
                tools::MKFS_EXT4,
                &[OsStr::new("-F"), volume.device().as_os_str()],
            ),
            // jffs2 formats erased flash on first mount
            VolumeKind::Mtd { index } => {
                let mtd = format!("mtd{}", index);
                helpers::run_tool(tools::MTD, &[OsStr::new("erase"), OsStr::new(&mtd)])
            }
            // ubifs formats an empty volume on first mount
            VolumeKind::Ubi => helpers::run_tool(
                tools::UBIUPDATEVOL,
                &[volume.device().as_os_str(), OsStr::new("-t")],
            ),
        }
    }
}

impl VolumeLibrary for SystemVolumes {
    fn find(&self, name: &str) -> Option<Volume> {
        probe::find_volume(&self.roots, name)
    }

    fn classify(&self, volume: &Volume) -> FstoolsResult<FilesystemCondition> {
        probe::identify(volume.device())
    }

    fn mount_root_in_place(&mut self) -> FstoolsResult<()> {
        mounts::remount_root(&self.root_device)
    }

    fn mount_extroot(&mut self) -> FstoolsResult<ExtrootOutcome> {
        helpers::run_extroot(&self.block_helper)
    }

    fn mount_overlay(&mut self, volume: &Volume, filesystem: Filesystem) -> FstoolsResult<()> {
        mounts::mount_device(volume.device(), &self.staging, filesystem.fstype())?;

        if state::get_state(&self.staging) == OverlayState::Pending {
            tracing::warn!("overlay filesystem has not been fully initialized yet");
        }

        mounts::move_mount(&self.staging, &self.overlay_dir)?;
        mounts::overlay_pivot(&OverlayBaseLayout::new(&self.overlay_dir), &self.rom)
    }

    fn mount_snapshot(&mut self, volume: &Volume) -> FstoolsResult<()> {
        self.mount_ram_overlay()?;
        tracing::info!("restoring snapshot data from {}", volume);
        helpers::run_snapshot_unpack(&self.snapshot_helper)
    }

    fn mount_ram_overlay(&mut self) -> FstoolsResult<()> {
        mounts::mount_tmpfs(self.ram_base.base())?;
        mounts::overlay_pivot(&self.ram_base, &self.rom)
    }

    fn convert_in_place(&mut self, volume: &Volume) -> FstoolsResult<()> {
        if Self::is_mounted(volume.device())? {
            return Err(FstoolsError::InvalidState(format!(
                "{} is already mounted",
                volume
            )));
        }

        let filesystem = volume.native_filesystem();
        tracing::info!("converting {} to {}", volume, filesystem);
        Self::prepare(volume)?;

        let target = self.conversion_target();
        mounts::mount_device(volume.device(), &target, filesystem.fstype())?;

        let new_base = OverlayBaseLayout::new(&target);
        copy::copy_upper(&self.ram_base.upper_dir(), &new_base.upper_dir())?;
        mounts::ensure_dir(&new_base.work_dir())?;

        mounts::move_mount(&target, &self.overlay_dir)?;
        tracing::info!(
            "{} now holds the overlay, used as root from next boot",
            volume
        );
        Ok(())
    }

    fn set_state(&mut self, path: &Path, state: OverlayState) -> FstoolsResult<()> {
        state::set_state(path, state)
    }
}
