//! Phase dispatch.
//!
//! Each invocation runs exactly one phase and reports back an explicit
//! [`PhaseReport`]; the only state that outlives it is what the volume
//! library persisted (mounts, readiness flag).

use std::fmt;
use std::str::FromStr;

use fstools_shared::{FstoolsError, FstoolsResult};

use crate::cmdline;
use crate::config::MountRootConfig;
use crate::env::BootEnv;
use crate::finalize::{self, DoneTransition};
use crate::resolve::resolve_volume;
use crate::strategy::{self, StartTransition};
use crate::volume::{OverlayState, VolumeLibrary};

/// Exit status for a completed phase.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a refused or failed phase.
pub const EXIT_FAILURE: i32 = -1;

/// Boot phase selected by the command line argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// Early preinit mount (no argument)
    Start,
    /// Forced ram overlay
    Ram,
    /// Shutdown probe
    Stop,
    /// Late finalize
    Done,
}

impl BootPhase {
    /// Map the optional phase argument; anything unknown is an error.
    pub fn from_arg(arg: Option<&str>) -> FstoolsResult<Self> {
        match arg {
            None => Ok(BootPhase::Start),
            Some(arg) => arg.parse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BootPhase::Start => "start",
            BootPhase::Ram => "ram",
            BootPhase::Stop => "stop",
            BootPhase::Done => "done",
        }
    }
}

impl FromStr for BootPhase {
    type Err = FstoolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ram" => Ok(BootPhase::Ram),
            "stop" => Ok(BootPhase::Stop),
            "done" => Ok(BootPhase::Done),
            other => Err(FstoolsError::InvalidArgument(format!(
                "unknown phase '{}': expected ram, stop or done",
                other
            ))),
        }
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase precondition that was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// `start` outside preinit without the marker file
    NotPreinit,
    /// `stop` without `SHUTDOWN`
    NotShuttingDown,
}

impl Guard {
    /// Check the precondition of `phase`; `Some` means the phase must not run.
    pub fn check(phase: BootPhase, env: &BootEnv) -> Option<Guard> {
        match phase {
            BootPhase::Start if !env.preinit && !env.preinit_marker => Some(Guard::NotPreinit),
            BootPhase::Stop if !env.shutdown => Some(Guard::NotShuttingDown),
            _ => None,
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::NotPreinit => f.write_str("not in preinit and no preinit marker"),
            Guard::NotShuttingDown => f.write_str("system is not shutting down"),
        }
    }
}

/// What a completed phase did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Start(StartTransition),
    Ram(StartTransition),
    Stop,
    Done(DoneTransition),
}

/// How a phase ended.
#[derive(Debug)]
pub enum PhaseOutcome {
    Completed(Transition),
    Refused(Guard),
    Failed(FstoolsError),
}

/// Explicit output of one phase invocation.
#[derive(Debug)]
pub struct PhaseReport {
    pub phase: BootPhase,
    pub outcome: PhaseOutcome,
}

impl PhaseReport {
    /// Process exit status for the init system.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            PhaseOutcome::Completed(_) => EXIT_SUCCESS,
            PhaseOutcome::Refused(_) | PhaseOutcome::Failed(_) => EXIT_FAILURE,
        }
    }

    /// Readiness flag value persisted by this phase, if any.
    pub fn state_written(&self) -> Option<OverlayState> {
        match &self.outcome {
            PhaseOutcome::Completed(Transition::Done(done)) => done.state_written,
            _ => None,
        }
    }
}

/// Run `phase` against `library` with the captured environment.
pub fn run_phase<L: VolumeLibrary + ?Sized>(
    phase: BootPhase,
    env: &BootEnv,
    config: &MountRootConfig,
    library: &mut L,
) -> PhaseReport {
    if let Some(guard) = Guard::check(phase, env) {
        tracing::debug!(%phase, %guard, "phase refused");
        return PhaseReport {
            phase,
            outcome: PhaseOutcome::Refused(guard),
        };
    }

    let result = match phase {
        BootPhase::Start => start(env, config, library).map(Transition::Start),
        BootPhase::Ram => strategy::mount_ram(library).map(Transition::Ram),
        BootPhase::Stop => Ok(Transition::Stop),
        BootPhase::Done => done(env, config, library).map(Transition::Done),
    };

    let outcome = match result {
        Ok(transition) => PhaseOutcome::Completed(transition),
        Err(e) => {
            tracing::error!(%phase, "phase failed: {}", e);
            PhaseOutcome::Failed(e)
        }
    };

    PhaseReport { phase, outcome }
}

fn start<L: VolumeLibrary + ?Sized>(
    env: &BootEnv,
    config: &MountRootConfig,
    library: &mut L,
) -> FstoolsResult<StartTransition> {
    let hint = cmdline::overlay_hint(env.cmdline.as_deref());
    let volume = resolve_volume(&*library, hint.as_deref(), &config.default_volume);
    strategy::mount_start(library, volume.as_ref())
}

fn done<L: VolumeLibrary + ?Sized>(
    env: &BootEnv,
    config: &MountRootConfig,
    library: &mut L,
) -> FstoolsResult<DoneTransition> {
    let hint = cmdline::overlay_hint(env.cmdline.as_deref());
    let volume = resolve_volume(&*library, hint.as_deref(), &config.default_volume);
    finalize::finalize(library, volume.as_ref(), &config.overlay_dir)
}
