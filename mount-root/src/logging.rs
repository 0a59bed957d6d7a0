//! Tracing setup.
//!
//! Respects `RUST_LOG`, defaulting to `info`. In preinit there is usually no
//! console worth writing to, so logs go to `/dev/kmsg` when it can be opened.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const KMSG: &str = "/dev/kmsg";

/// Where log lines end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Kernel log, falling back to stderr
    Kmsg,
}

impl LogTarget {
    /// Kernel log while in preinit, stderr otherwise.
    pub fn for_preinit(preinit: bool) -> Self {
        if preinit {
            LogTarget::Kmsg
        } else {
            LogTarget::Stderr
        }
    }
}

/// Install the global subscriber. Failure is reported and otherwise ignored.
pub fn init(target: LogTarget) {
    let writer = match target {
        LogTarget::Kmsg => match OpenOptions::new().write(true).open(KMSG) {
            Ok(kmsg) => BoxMakeWriter::new(Mutex::new(kmsg)),
            Err(_) => BoxMakeWriter::new(std::io::stderr),
        },
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    if let Err(e) = tracing_subscriber::fmt()
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(writer)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
    {
        eprintln!("[mount_root] Failed to initialize tracing: {}", e);
    }
}
