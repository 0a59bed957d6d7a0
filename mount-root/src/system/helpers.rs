//! External helper programs.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use fstools_shared::constants::env;
use fstools_shared::{FstoolsError, FstoolsResult};

use crate::volume::ExtrootOutcome;

/// Run `<block> extroot`.
///
/// The helper reads the extroot configuration from the current root on its
/// own. A missing helper or a non-zero exit means extroot does not apply.
pub fn run_extroot(block: &Path) -> FstoolsResult<ExtrootOutcome> {
    if !block.exists() {
        tracing::debug!("{} not present, skipping extroot", block.display());
        return Ok(ExtrootOutcome::NotConfigured);
    }

    let status = Command::new(block)
        .arg("extroot")
        .status()
        .map_err(|e| {
            FstoolsError::Internal(format!("Failed to run {} extroot: {}", block.display(), e))
        })?;

    if status.success() {
        Ok(ExtrootOutcome::Switched)
    } else {
        tracing::debug!("{} extroot exited with {}", block.display(), status);
        Ok(ExtrootOutcome::NotConfigured)
    }
}

/// Run `<snapshot> unpack` to restore snapshot data into the overlay.
pub fn run_snapshot_unpack(snapshot: &Path) -> FstoolsResult<()> {
    let output = Command::new(snapshot)
        .arg("unpack")
        .env(env::SNAPSHOT, env::SNAPSHOT_MAGIC)
        .output()
        .map_err(|e| {
            FstoolsError::Internal(format!("Failed to run {} unpack: {}", snapshot.display(), e))
        })?;

    if !output.status.success() {
        return Err(FstoolsError::Storage(format!(
            "{} unpack failed: {}",
            snapshot.display(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(())
}

/// Run a volume preparation tool, failing on non-zero exit.
pub fn run_tool(program: &str, args: &[&OsStr]) -> FstoolsResult<()> {
    tracing::info!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| FstoolsError::Storage(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(FstoolsError::Storage(format!(
            "{} failed ({}): {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(())
}
