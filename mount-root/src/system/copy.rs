//! Overlay upper directory copy.
//!
//! Moves the contents of the ram overlay onto a freshly converted volume.

use std::fs::{File, Metadata};
use std::os::unix::fs::{lchown, symlink, FileTypeExt, MetadataExt};
use std::path::Path;

use fstools_shared::{FstoolsError, FstoolsResult};
use nix::sys::stat::{mknod, Mode, SFlag};
use rayon::prelude::*;

/// Copy the upper layer at `src` into `dst`, then flush it to disk.
///
/// Directories, regular files, symlinks and overlay whiteouts (character
/// devices) are copied with their ownership, mode and overlay xattrs;
/// sockets and fifos are skipped.
pub fn copy_upper(src: &Path, dst: &Path) -> FstoolsResult<()> {
    if !src.is_dir() {
        return Err(FstoolsError::NotFound(format!(
            "Overlay upper directory does not exist: {}",
            src.display()
        )));
    }

    std::fs::create_dir_all(dst).map_err(|e| {
        FstoolsError::Storage(format!(
            "Failed to create directory {}: {}",
            dst.display(),
            e
        ))
    })?;

    tracing::info!("Copying overlay {} → {}", src.display(), dst.display());
    let start = std::time::Instant::now();

    copy_dir_recursive(src, dst).map_err(|e| {
        FstoolsError::Storage(format!(
            "Failed to copy overlay from {} to {}: {}",
            src.display(),
            dst.display(),
            e
        ))
    })?;

    sync_directory(dst)?;

    tracing::info!(
        "Copied overlay in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Flush filesystem buffers and fsync `dir`.
pub fn sync_directory(dir: &Path) -> FstoolsResult<()> {
    nix::unistd::sync();

    let dir_file = File::open(dir).map_err(|e| {
        FstoolsError::Storage(format!(
            "Failed to open directory {} for sync: {}",
            dir.display(),
            e
        ))
    })?;

    dir_file.sync_all().map_err(|e| {
        FstoolsError::Storage(format!("Failed to fsync directory {}: {}", dir.display(), e))
    })?;

    tracing::debug!("Filesystem sync completed for {}", dir.display());
    Ok(())
}

/// Recursively copy directory contents, one rayon task per entry.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    let entries: Vec<_> = std::fs::read_dir(src)?.collect::<Result<Vec<_>, _>>()?;

    entries
        .par_iter()
        .try_for_each(|entry| -> std::io::Result<()> {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());
            let meta = std::fs::symlink_metadata(&src_path)?;
            let file_type = meta.file_type();

            if file_type.is_symlink() {
                let link_target = std::fs::read_link(&src_path)?;
                let _ = std::fs::remove_file(&dst_path);
                symlink(&link_target, &dst_path)?;
            } else if file_type.is_dir() {
                std::fs::create_dir_all(&dst_path)?;
                copy_dir_recursive(&src_path, &dst_path)?;
            } else if file_type.is_file() {
                std::fs::copy(&src_path, &dst_path)?;
            } else if file_type.is_char_device() {
                // Overlay whiteout: 0/0 character device
                let _ = std::fs::remove_file(&dst_path);
                mknod(
                    &dst_path,
                    SFlag::S_IFCHR,
                    Mode::from_bits_truncate(meta.mode()),
                    meta.rdev(),
                )
                .map_err(std::io::Error::from)?;
            } else {
                tracing::debug!("Skipping special file {}", src_path.display());
                return Ok(());
            }

            copy_metadata(&src_path, &dst_path, &meta)
        })
}

/// Apply ownership, overlay xattrs and mode of `src` to `dst`.
///
/// Ownership goes first since chown clears setuid/setgid bits.
fn copy_metadata(src: &Path, dst: &Path, meta: &Metadata) -> std::io::Result<()> {
    lchown(dst, Some(meta.uid()), Some(meta.gid()))?;

    if meta.file_type().is_symlink() {
        return Ok(());
    }

    copy_xattrs(src, dst)?;
    std::fs::set_permissions(dst, meta.permissions())
}

/// Copy the xattrs overlayfs and the running system depend on.
///
/// `trusted.overlay.opaque` marks a directory that hides the lower layer's
/// contents.
fn copy_xattrs(src: &Path, dst: &Path) -> std::io::Result<()> {
    let attrs = match xattr::list(src) {
        Ok(attrs) => attrs,
        Err(e) => {
            tracing::debug!("No xattrs on {}: {}", src.display(), e);
            return Ok(());
        }
    };

    for attr in attrs {
        let name = attr.to_string_lossy();
        let wanted = name.starts_with("trusted.overlay.")
            || name.starts_with("user.")
            || name == "security.capability";
        if !wanted {
            continue;
        }
        if let Some(value) = xattr::get(src, &attr)? {
            xattr::set(dst, &attr, &value)?;
        }
    }
    Ok(())
}
