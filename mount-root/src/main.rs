//! Entry point for `mount_root`.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;
use mount_root::logging::{self, LogTarget};
use mount_root::phase::EXIT_FAILURE;
use mount_root::{run_phase, BootEnv, BootPhase, MountRootConfig, SystemVolumes};

/// mount_root - set up the root overlay for the current boot phase
#[derive(Parser, Debug)]
#[command(author, version, about = "Root overlay setup for preinit and late boot")]
struct MountRootArgs {
    /// Boot phase: omitted for preinit start, or one of ram, stop, done
    phase: Option<String>,

    /// Kernel command line source
    #[arg(long, env = "MOUNT_ROOT_CMDLINE", default_value = "/proc/cmdline")]
    cmdline: PathBuf,

    /// Marker file allowing start outside preinit
    #[arg(long, env = "MOUNT_ROOT_PREINIT_MARKER", default_value = "/tmp/.preinit")]
    preinit_marker: PathBuf,

    /// Overlay directory holding the readiness flag
    #[arg(long, env = "MOUNT_ROOT_OVERLAY_DIR", default_value = "/overlay")]
    overlay_dir: PathBuf,

    /// Overlay volume used when the command line has no overlay= hint
    #[arg(long, env = "MOUNT_ROOT_DEFAULT_VOLUME", default_value = "rootfs_data")]
    default_volume: String,
}

impl MountRootArgs {
    fn config(&self) -> MountRootConfig {
        MountRootConfig {
            cmdline_path: self.cmdline.clone(),
            preinit_marker: self.preinit_marker.clone(),
            overlay_dir: self.overlay_dir.clone(),
            default_volume: self.default_volume.clone(),
        }
    }
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let args = match MountRootArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FAILURE;
        }
    };

    let preinit = std::env::var_os(fstools_shared::constants::env::PREINIT).is_some();
    logging::init(LogTarget::for_preinit(preinit));

    let phase = match BootPhase::from_arg(args.phase.as_deref()) {
        Ok(phase) => phase,
        Err(e) => {
            tracing::error!("{}", e);
            return EXIT_FAILURE;
        }
    };

    let config = args.config();
    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return EXIT_FAILURE;
    }

    let env = BootEnv::capture(&config, phase);
    let mut volumes = SystemVolumes::new(&config);

    let report = run_phase(phase, &env, &config, &mut volumes);
    tracing::debug!(?report, "phase finished");
    report.exit_code()
}
