//! Persisted overlay readiness flag.
//!
//! Stored as a symlink `<overlay>/.fs_state -> <n>`.

use std::os::unix::fs::symlink;
use std::path::Path;

use fstools_shared::constants::state::FS_STATE_FILE;
use fstools_shared::{FstoolsError, FstoolsResult};

use crate::volume::OverlayState;

/// Read the readiness flag under `dir`. Missing or unreadable means `Unknown`.
pub fn get_state(dir: &Path) -> OverlayState {
    let path = dir.join(FS_STATE_FILE);
    let Ok(target) = std::fs::read_link(&path) else {
        return OverlayState::Unknown;
    };

    target
        .to_str()
        .and_then(|s| s.parse::<u8>().ok())
        .and_then(OverlayState::from_u8)
        .unwrap_or_else(|| {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), target.display());
            OverlayState::Unknown
        })
}

/// Replace the readiness flag under `dir` with `state`.
pub fn set_state(dir: &Path, state: OverlayState) -> FstoolsResult<()> {
    let path = dir.join(FS_STATE_FILE);

    match std::fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(FstoolsError::Storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            )));
        }
    }

    symlink(state.as_u8().to_string(), &path).map_err(|e| {
        FstoolsError::Storage(format!(
            "Failed to set {} to {:?}: {}",
            path.display(),
            state,
            e
        ))
    })?;

    tracing::debug!(state_file = %path.display(), ?state, "overlay state updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(get_state(dir.path()), OverlayState::Unknown);
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();

        set_state(dir.path(), OverlayState::Pending).unwrap();
        assert_eq!(get_state(dir.path()), OverlayState::Pending);

        set_state(dir.path(), OverlayState::Ready).unwrap();
        assert_eq!(get_state(dir.path()), OverlayState::Ready);

        let target = std::fs::read_link(dir.path().join(FS_STATE_FILE)).unwrap();
        assert_eq!(target.to_str(), Some("2"));
    }

    #[test]
    fn test_malformed_state_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        symlink("garbage", dir.path().join(FS_STATE_FILE)).unwrap();
        assert_eq!(get_state(dir.path()), OverlayState::Unknown);
    }

    #[test]
    fn test_set_state_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = set_state(&dir.path().join("absent"), OverlayState::Ready).unwrap_err();
        assert!(matches!(err, FstoolsError::Storage(_)));
    }
}
