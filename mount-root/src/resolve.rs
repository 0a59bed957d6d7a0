//! Overlay volume resolution shared by every phase.
//!
//! Priority, first match wins:
//! 1. volume named by the command line hint
//! 2. the default data volume (`rootfs_data`)
//! 3. nothing

use crate::volume::{Volume, VolumeLibrary};

/// Resolve the overlay volume for this invocation.
///
/// `start` and `done` both call this with a freshly parsed hint; nothing from
/// an earlier phase is reused.
pub fn resolve_volume<L: VolumeLibrary + ?Sized>(
    library: &L,
    hint: Option<&str>,
    default_name: &str,
) -> Option<Volume> {
    if let Some(name) = hint {
        match library.find(name) {
            Some(volume) => {
                tracing::info!("Using overlay device from commandline: {}", volume);
                return Some(volume);
            }
            None => tracing::warn!(
                "Overlay device {} from commandline not found, trying {}",
                name,
                default_name
            ),
        }
    }

    let volume = library.find(default_name);
    match &volume {
        Some(volume) => tracing::debug!("Using default overlay volume: {}", volume),
        None => tracing::info!("No {} volume found", default_name),
    }
    volume
}
