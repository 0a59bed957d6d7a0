//! Mount strategy for the early (`start`) phase.
//!
//! Called in preinit, when a writable filesystem is needed immediately. There
//! is no waiting here: anything not mountable right now gets a ram overlay
//! and `done` sorts it out later.

use fstools_shared::FstoolsResult;

use crate::volume::{ExtrootOutcome, Filesystem, FilesystemCondition, Volume, VolumeLibrary};

/// Why the ram overlay was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamReason {
    /// Volume carries no usable filesystem
    NoFilesystem,
    /// Volume is still being prepared
    NotReady,
    /// Volume could not be classified
    Unclassified,
    /// Requested explicitly with `mount_root ram`
    Requested,
}

/// Exactly one of these runs per `start` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStrategy {
    /// No overlay volume: remount `/dev/root` and try extroot
    RootInPlace,
    /// Memory-backed overlay
    RamOverlay(RamReason),
    /// Volume mounted as the persistent overlay
    Overlay(Filesystem),
    /// Snapshot-specific mount procedure
    Snapshot,
}

impl MountStrategy {
    /// Pick the strategy for a resolved volume's condition (`None` if no volume).
    pub fn select(condition: Option<FilesystemCondition>) -> Self {
        let Some(condition) = condition else {
            return MountStrategy::RootInPlace;
        };

        if let Some(filesystem) = condition.persistent() {
            return MountStrategy::Overlay(filesystem);
        }

        match condition {
            FilesystemCondition::Snapshot => MountStrategy::Snapshot,
            FilesystemCondition::Deadcode => MountStrategy::RamOverlay(RamReason::NotReady),
            _ => MountStrategy::RamOverlay(RamReason::NoFilesystem),
        }
    }
}

/// What `start` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTransition {
    pub strategy: MountStrategy,
    pub volume: Option<String>,
    /// Only set for [`MountStrategy::RootInPlace`]; `None` if extroot errored
    pub extroot: Option<ExtrootOutcome>,
}

/// Classify `volume` (if any), select a strategy and carry it out.
pub fn mount_start<L: VolumeLibrary + ?Sized>(
    library: &mut L,
    volume: Option<&Volume>,
) -> FstoolsResult<StartTransition> {
    let strategy = match volume {
        None => MountStrategy::select(None),
        Some(volume) => match library.classify(volume) {
            Ok(condition) => {
                tracing::debug!("{} classified as {:?}", volume, condition);
                MountStrategy::select(Some(condition))
            }
            Err(e) => {
                tracing::warn!("Failed to identify {}: {}", volume, e);
                MountStrategy::RamOverlay(RamReason::Unclassified)
            }
        },
    };

    let mut transition = StartTransition {
        strategy,
        volume: volume.map(|v| v.name().to_string()),
        extroot: None,
    };

    match strategy {
        MountStrategy::RootInPlace => {
            tracing::info!("mounting /dev/root");
            library.mount_root_in_place()?;

            // Whatever extroot reports, having / mounted is enough here.
            match library.mount_extroot() {
                Ok(ExtrootOutcome::Switched) => {
                    tracing::info!("switched to extroot");
                    transition.extroot = Some(ExtrootOutcome::Switched);
                }
                Ok(ExtrootOutcome::NotConfigured) => {
                    tracing::debug!("extroot not configured");
                    transition.extroot = Some(ExtrootOutcome::NotConfigured);
                }
                Err(e) => tracing::warn!("extroot failed, staying on /dev/root: {}", e),
            }
        }
        MountStrategy::RamOverlay(reason) => {
            match reason {
                RamReason::NotReady => {
                    tracing::info!("overlay filesystem not ready yet, using temporary tmpfs overlay")
                }
                _ => tracing::warn!("no usable overlay filesystem found, using tmpfs overlay"),
            }
            library.mount_ram_overlay()?;
        }
        MountStrategy::Overlay(filesystem) => {
            let volume = require(volume)?;
            tracing::info!("mounting {} as {} overlay", volume, filesystem);
            library.mount_overlay(volume, filesystem)?;
        }
        MountStrategy::Snapshot => {
            let volume = require(volume)?;
            tracing::info!("mounting snapshot volume {}", volume);
            library.mount_snapshot(volume)?;
        }
    }

    Ok(transition)
}

/// Mount the ram overlay without looking at any volume.
pub fn mount_ram<L: VolumeLibrary + ?Sized>(library: &mut L) -> FstoolsResult<StartTransition> {
    tracing::info!("mounting tmpfs overlay on request");
    library.mount_ram_overlay()?;
    Ok(StartTransition {
        strategy: MountStrategy::RamOverlay(RamReason::Requested),
        volume: None,
        extroot: None,
    })
}

fn require(volume: Option<&Volume>) -> FstoolsResult<&Volume> {
    volume.ok_or_else(|| "volume strategy selected without a volume".into())
}
