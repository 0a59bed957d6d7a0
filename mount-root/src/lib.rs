//! Root overlay orchestration for read-only firmware images.
//!
//! `mount_root` runs once per boot phase:
//! - `start` (preinit): pick the overlay volume and mount it, or fall back to
//!   a ram overlay / the bare root device
//! - `done` (end of init): mark the overlay ready, or convert a volume that
//!   was not usable at `start`
//! - `ram`: ram overlay, no questions asked
//! - `stop`: shutdown hook
//!
//! The decision logic only sees storage through [`volume::VolumeLibrary`].

#[cfg(not(target_os = "linux"))]
compile_error!("mount_root is Linux-only; build with a Linux target");

pub mod cmdline;
pub mod config;
pub mod env;
pub mod finalize;
pub mod logging;
pub mod phase;
pub mod resolve;
pub mod strategy;
pub mod system;
pub mod volume;

pub use config::MountRootConfig;
pub use env::BootEnv;
pub use phase::{run_phase, BootPhase, PhaseOutcome, PhaseReport, Transition};
pub use system::SystemVolumes;
pub use volume::{
    ExtrootOutcome, Filesystem, FilesystemCondition, OverlayState, Volume, VolumeKind,
    VolumeLibrary,
};
