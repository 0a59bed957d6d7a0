//! Late boot finalize (`done`).
//!
//! Runs at the end of init, when the overlay volume may have become usable.
//! A volume that got a ram overlay at `start` is converted here; a volume
//! that already carries a filesystem is marked ready.

use std::path::Path;

use fstools_shared::{FstoolsError, FstoolsResult};

use crate::volume::{FilesystemCondition, OverlayState, Volume, VolumeLibrary};

/// Decision taken for the resolved volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeAction {
    /// Run the one-time conversion
    Convert,
    /// Persist the ready flag
    MarkReady,
    /// Nothing to do
    Skip,
}

impl FinalizeAction {
    pub fn decide(condition: FilesystemCondition) -> Self {
        if condition.persistent().is_some() {
            return FinalizeAction::MarkReady;
        }

        match condition {
            FilesystemCondition::None | FilesystemCondition::Deadcode => FinalizeAction::Convert,
            // TODO: confirm with product owners whether snapshot volumes need a ready mark.
            _ => FinalizeAction::Skip,
        }
    }
}

/// What `done` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneTransition {
    pub action: FinalizeAction,
    pub volume: String,
    pub condition: FilesystemCondition,
    /// Readiness written to persisted state, if any
    pub state_written: Option<OverlayState>,
}

/// Finalize the overlay on `volume`.
///
/// A missing volume means there is nothing to finalize and is an error.
pub fn finalize<L: VolumeLibrary + ?Sized>(
    library: &mut L,
    volume: Option<&Volume>,
    overlay_dir: &Path,
) -> FstoolsResult<DoneTransition> {
    let volume = volume.ok_or_else(|| {
        FstoolsError::NotFound("no overlay volume to finalize".to_string())
    })?;

    // Conversion is irreversible: never run it on a failed probe.
    let condition = library.classify(volume)?;
    let action = FinalizeAction::decide(condition);

    let mut transition = DoneTransition {
        action,
        volume: volume.name().to_string(),
        condition,
        state_written: None,
    };

    match action {
        FinalizeAction::Convert => {
            tracing::info!("{} is {:?}, switching overlay to it", volume, condition);
            library.convert_in_place(volume)?;
        }
        FinalizeAction::MarkReady => {
            library.set_state(overlay_dir, OverlayState::Ready)?;
            transition.state_written = Some(OverlayState::Ready);
            tracing::info!("{} marked ready", overlay_dir.display());
        }
        FinalizeAction::Skip => {
            tracing::warn!("{} holds a snapshot, leaving it as is", volume);
        }
    }

    Ok(transition)
}
