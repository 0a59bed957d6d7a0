//! Kernel command line overlay hint.
//!
//! Looks for `overlay=<device>` anywhere on the command line, e.g.
//! `console=ttyS0 overlay=/dev/mmcblk0p3 rootwait`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use fstools_shared::constants::cmdline::{COMMAND_LINE_SIZE, DEV_PREFIX, OVERLAY_KEY};

/// Read the command line from `path`, bounded to `COMMAND_LINE_SIZE` bytes.
///
/// Returns `None` (after a warning) when the source cannot be read; a missing
/// command line is never fatal.
pub fn read_cmdline(path: &Path) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Failed to open {} for reading: {}", path.display(), e);
            return None;
        }
    };

    let mut buf = Vec::with_capacity(COMMAND_LINE_SIZE);
    if let Err(e) = file.take(COMMAND_LINE_SIZE as u64).read_to_end(&mut buf) {
        tracing::warn!("Failed to read {}: {}", path.display(), e);
        return None;
    }

    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Extract the overlay device name from command line text.
///
/// The first `overlay=` token wins and a leading `/dev/` is stripped. An empty
/// value counts as no hint.
pub fn parse_overlay_hint(cmdline: &str) -> Option<String> {
    let value = cmdline
        .split_whitespace()
        .find_map(|token| token.strip_prefix(OVERLAY_KEY))?;

    let name = value.strip_prefix(DEV_PREFIX).unwrap_or(value);
    if name.is_empty() {
        return None;
    }

    Some(name.to_string())
}

/// Hint for this invocation from an already captured command line.
pub fn overlay_hint(cmdline: Option<&str>) -> Option<String> {
    let hint = parse_overlay_hint(cmdline?)?;
    tracing::info!("Looking for overlay device given on commandline: {}", hint);
    Some(hint)
}
