//! Test helpers for fstools crates.
//!
//! [`FakeVolumes`] is an in-memory [`VolumeLibrary`]: volumes have scripted
//! conditions, any operation can be made to fail, and every call is journaled
//! so tests can assert on what a phase did and did not touch.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use fstools_shared::{FstoolsError, FstoolsResult};
use mount_root::{
    BootEnv, ExtrootOutcome, Filesystem, FilesystemCondition, OverlayState, Volume, VolumeKind,
    VolumeLibrary,
};

/// One call made against [`FakeVolumes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find(String),
    Classify(String),
    MountRootInPlace,
    MountExtroot,
    MountOverlay(String, Filesystem),
    MountSnapshot(String),
    MountRamOverlay,
    ConvertInPlace(String),
    SetState(PathBuf, OverlayState),
}

impl Call {
    /// Whether the call changes the mount table or persisted state.
    pub fn is_side_effect(&self) -> bool {
        !matches!(self, Call::Find(_) | Call::Classify(_))
    }
}

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Classify,
    MountRootInPlace,
    MountExtroot,
    MountOverlay,
    MountSnapshot,
    MountRamOverlay,
    ConvertInPlace,
    SetState,
}

/// In-memory volume library.
#[derive(Debug)]
pub struct FakeVolumes {
    volumes: BTreeMap<String, FilesystemCondition>,
    extroot: ExtrootOutcome,
    failing: HashSet<Op>,
    states: BTreeMap<PathBuf, OverlayState>,
    calls: std::cell::RefCell<Vec<Call>>,
}

impl Default for FakeVolumes {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVolumes {
    pub fn new() -> Self {
        Self {
            volumes: BTreeMap::new(),
            extroot: ExtrootOutcome::NotConfigured,
            failing: HashSet::new(),
            states: BTreeMap::new(),
            calls: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Add a volume named `name` in `condition`.
    pub fn with_volume(mut self, name: &str, condition: FilesystemCondition) -> Self {
        self.volumes.insert(name.to_string(), condition);
        self
    }

    /// Outcome reported by extroot.
    pub fn with_extroot(mut self, outcome: ExtrootOutcome) -> Self {
        self.extroot = outcome;
        self
    }

    /// Make `op` return an error.
    pub fn failing(mut self, op: Op) -> Self {
        self.failing.insert(op);
        self
    }

    /// Change the condition of an existing volume, as a later boot would see it.
    pub fn set_condition(&mut self, name: &str, condition: FilesystemCondition) {
        self.volumes.insert(name.to_string(), condition);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Calls that changed mounts or persisted state.
    pub fn side_effects(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.is_side_effect())
            .cloned()
            .collect()
    }

    /// Forget recorded calls, keeping volumes and persisted state.
    pub fn clear_calls(&mut self) {
        self.calls.borrow_mut().clear();
    }

    /// Readiness flag persisted for `path`.
    pub fn state(&self, path: &Path) -> Option<OverlayState> {
        self.states.get(path).copied()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, op: Op) -> FstoolsResult<()> {
        if self.failing.contains(&op) {
            return Err(FstoolsError::Mount(format!("{:?} failed (scripted)", op)));
        }
        Ok(())
    }
}

impl VolumeLibrary for FakeVolumes {
    fn find(&self, name: &str) -> Option<Volume> {
        self.record(Call::Find(name.to_string()));
        self.volumes
            .contains_key(name)
            .then(|| Volume::new(name, VolumeKind::Block, format!("/dev/{}", name)))
    }

    fn classify(&self, volume: &Volume) -> FstoolsResult<FilesystemCondition> {
        self.record(Call::Classify(volume.name().to_string()));
        self.check(Op::Classify)?;
        self.volumes
            .get(volume.name())
            .copied()
            .ok_or_else(|| FstoolsError::NotFound(volume.name().to_string()))
    }

    fn mount_root_in_place(&mut self) -> FstoolsResult<()> {
        self.record(Call::MountRootInPlace);
        self.check(Op::MountRootInPlace)
    }

    fn mount_extroot(&mut self) -> FstoolsResult<ExtrootOutcome> {
        self.record(Call::MountExtroot);
        self.check(Op::MountExtroot)?;
        Ok(self.extroot)
    }

    fn mount_overlay(&mut self, volume: &Volume, filesystem: Filesystem) -> FstoolsResult<()> {
        self.record(Call::MountOverlay(volume.name().to_string(), filesystem));
        self.check(Op::MountOverlay)
    }

    fn mount_snapshot(&mut self, volume: &Volume) -> FstoolsResult<()> {
        self.record(Call::MountSnapshot(volume.name().to_string()));
        self.check(Op::MountSnapshot)
    }

    fn mount_ram_overlay(&mut self) -> FstoolsResult<()> {
        self.record(Call::MountRamOverlay);
        self.check(Op::MountRamOverlay)
    }

    fn convert_in_place(&mut self, volume: &Volume) -> FstoolsResult<()> {
        self.record(Call::ConvertInPlace(volume.name().to_string()));
        self.check(Op::ConvertInPlace)
    }

    fn set_state(&mut self, path: &Path, state: OverlayState) -> FstoolsResult<()> {
        self.record(Call::SetState(path.to_path_buf(), state));
        self.check(Op::SetState)?;
        self.states.insert(path.to_path_buf(), state);
        Ok(())
    }
}

// ============================================================================
// BOOT ENVIRONMENT BUILDERS
// ============================================================================

/// Environment of a preinit `start` with the given command line.
pub fn preinit_env(cmdline: &str) -> BootEnv {
    BootEnv {
        preinit: true,
        cmdline: Some(cmdline.to_string()),
        ..Default::default()
    }
}

/// Environment of a late `done` with the given command line.
pub fn late_env(cmdline: &str) -> BootEnv {
    BootEnv {
        cmdline: Some(cmdline.to_string()),
        ..Default::default()
    }
}

/// Environment during shutdown.
pub fn shutdown_env() -> BootEnv {
    BootEnv {
        shutdown: true,
        ..Default::default()
    }
}
