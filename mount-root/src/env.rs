//! Inputs of one phase invocation.
//!
//! Everything a phase may look at besides storage is captured here once, so
//! the phase logic itself never reads ambient process state.

use fstools_shared::constants::env;

use crate::cmdline;
use crate::config::MountRootConfig;
use crate::phase::BootPhase;

/// Boot environment seen by a phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootEnv {
    /// `PREINIT` is set
    pub preinit: bool,
    /// `SHUTDOWN` is set
    pub shutdown: bool,
    /// Pre-init marker file exists
    pub preinit_marker: bool,
    /// Kernel command line, `None` if it could not be read
    pub cmdline: Option<String>,
}

impl BootEnv {
    /// Capture the environment for `phase`.
    ///
    /// The command line is only read by phases that resolve a volume.
    pub fn capture(config: &MountRootConfig, phase: BootPhase) -> Self {
        let cmdline = match phase {
            BootPhase::Start | BootPhase::Done => cmdline::read_cmdline(&config.cmdline_path),
            BootPhase::Ram | BootPhase::Stop => None,
        };

        Self {
            preinit: std::env::var_os(env::PREINIT).is_some(),
            shutdown: std::env::var_os(env::SHUTDOWN).is_some(),
            preinit_marker: config.preinit_marker.exists(),
            cmdline,
        }
    }
}
