//! Mount, move and pivot helpers.
//!
//! Everything that ends up as a mount(2) or pivot_root(2) call lives here.

use std::path::Path;

use fstools_shared::layout::{self, OverlayBaseLayout};
use fstools_shared::{FstoolsError, FstoolsResult};
use nix::mount::{mount, MsFlags};

/// Remount the root device on `/` with noatime.
pub fn remount_root(device: &str) -> FstoolsResult<()> {
    mount(
        Some(device),
        "/",
        None::<&str>,
        MsFlags::MS_NOATIME | MsFlags::MS_REMOUNT,
        None::<&str>,
    )
    .map_err(|e| FstoolsError::Mount(format!("Failed to remount {} on /: {}", device, e)))
}

/// Mount a fresh tmpfs on `target`.
pub fn mount_tmpfs(target: &Path) -> FstoolsResult<()> {
    ensure_dir(target)?;
    mount(
        Some("tmpfs"),
        target,
        Some("tmpfs"),
        MsFlags::MS_NOATIME,
        Some("mode=0755"),
    )
    .map_err(|e| {
        FstoolsError::Mount(format!(
            "Failed to mount tmpfs on {}: {}",
            target.display(),
            e
        ))
    })?;

    tracing::debug!("Mounted tmpfs on {}", target.display());
    Ok(())
}

/// Mount a block device with the given filesystem type.
pub fn mount_device(device: &Path, target: &Path, fstype: &str) -> FstoolsResult<()> {
    if !device.exists() {
        return Err(FstoolsError::NotFound(format!(
            "Block device not found: {}",
            device.display()
        )));
    }
    ensure_dir(target)?;

    mount(
        Some(device),
        target,
        Some(fstype),
        MsFlags::MS_NOATIME,
        None::<&str>,
    )
    .map_err(|e| {
        FstoolsError::Mount(format!(
            "Failed to mount {} ({}) on {}: {}",
            device.display(),
            fstype,
            target.display(),
            e
        ))
    })?;

    tracing::info!(
        "Mounted {} → {} ({})",
        device.display(),
        target.display(),
        fstype
    );
    Ok(())
}

/// Move the mount at `from` to `to`.
pub fn move_mount(from: &Path, to: &Path) -> FstoolsResult<()> {
    ensure_dir(to)?;
    mount(
        Some(from),
        to,
        None::<&str>,
        MsFlags::MS_MOVE,
        None::<&str>,
    )
    .map_err(|e| {
        FstoolsError::Mount(format!(
            "Failed to move mount {} → {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })
}

/// Layer an overlay over `/` with `base` as its writable side and pivot into it.
///
/// The old root ends up at `old_root` (usually `/rom`).
pub fn overlay_pivot(base: &OverlayBaseLayout, old_root: &str) -> FstoolsResult<()> {
    let merged = Path::new(layout::PIVOT_MOUNT);

    ensure_dir(&base.upper_dir())?;
    ensure_dir(&base.work_dir())?;

    let source = base.source_label();
    let data = base.mount_data();

    tracing::info!("Mounting overlayfs:");
    tracing::info!("  source:  {}", source);
    tracing::info!("  options: {}", data);
    tracing::info!("  merged:  {}", merged.display());

    mount(
        Some(source.as_str()),
        merged,
        Some("overlay"),
        MsFlags::MS_NOATIME,
        Some(data.as_str()),
    )
    .map_err(|e| FstoolsError::Mount(format!("Failed to mount overlayfs: {}", e)))?;

    pivot(merged, old_root)
}

/// pivot_root into `new_root`, keeping the runtime mounts visible.
///
/// `/proc` is moved before the pivot, the rest is moved back from the old
/// root afterwards.
pub fn pivot(new_root: &Path, old_root: &str) -> FstoolsResult<()> {
    let (proc_mount, rest) = layout::CARRIED_MOUNTS
        .split_first()
        .ok_or_else(|| FstoolsError::Internal("no carried mounts".to_string()))?;

    carry(Path::new(proc_mount), &layout::rerooted(new_root, proc_mount));

    let put_old = layout::rerooted(new_root, old_root);
    ensure_dir(&put_old)?;
    nix::unistd::pivot_root(new_root, put_old.as_path()).map_err(|e| {
        FstoolsError::Mount(format!(
            "Failed to pivot_root {} (old root {}): {}",
            new_root.display(),
            put_old.display(),
            e
        ))
    })?;
    nix::unistd::chdir("/")
        .map_err(|e| FstoolsError::Mount(format!("Failed to chdir to new root: {}", e)))?;

    let old_root = Path::new(old_root);
    for target in rest {
        carry(&layout::rerooted(old_root, target), Path::new(target));
    }

    tracing::info!("Pivoted root, old root at {}", old_root.display());
    Ok(())
}

/// Best-effort move of a runtime mount; absent mounts are skipped.
fn carry(from: &Path, to: &Path) {
    if let Err(e) = move_mount(from, to) {
        tracing::debug!("Not carrying {}: {}", from.display(), e);
    }
}

pub(crate) fn ensure_dir(path: &Path) -> FstoolsResult<()> {
    std::fs::create_dir_all(path).map_err(|e| {
        FstoolsError::Storage(format!(
            "Failed to create directory {}: {}",
            path.display(),
            e
        ))
    })
}
