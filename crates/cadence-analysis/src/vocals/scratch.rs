//! Per-run scratch directory

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Directory removed with its contents when dropped, unless retained
///
/// Cleanup runs on every exit path, including unwinding.
pub struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Create a fresh, uniquely named `run-*` directory under `root`
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("run-").tempdir_in(root)?;

        log::debug!("ScratchDir: Created {:?}", dir.path());
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory on disk and return its path
    pub fn retain(mut self) -> PathBuf {
        match self.dir.take() {
            Some(dir) => dir.keep(),
            None => self.path.clone(),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if let Err(e) = dir.close() {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("ScratchDir: Failed to remove {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).unwrap();
        std::fs::write(scratch.path().join("vocals.wav"), b"x").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("run-")));

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_removed_when_unwinding() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let _scratch = ScratchDir::create(&root_path).unwrap();
            panic!("stage failed");
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_retained_directory_survives() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).unwrap();
        std::fs::write(scratch.path().join("vocals.wav"), b"x").unwrap();
        let kept = scratch.retain();
        assert!(kept.join("vocals.wav").is_file());
        assert!(kept.starts_with(root.path()));
    }

    #[test]
    fn test_already_removed_directory_is_tolerated() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();
        drop(scratch);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("cadence-stems");
        let a = ScratchDir::create(&nested).unwrap();
        let b = ScratchDir::create(&nested).unwrap();
        assert!(a.path().starts_with(&nested));
        assert_ne!(a.path(), b.path());
    }
}
