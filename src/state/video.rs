/// Generated turntable video
///
/// The video lives in a file under the cache directory for as long as the
/// session holds it. Dropping the handle deletes that file, whether it is
/// released explicitly, replaced, or still held when the app exits.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, PartialEq, Eq)]
pub struct VideoHandle {
    path: PathBuf,
}

impl VideoHandle {
    /// Take ownership of a video file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the underlying file
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for VideoHandle {
    // A file that is already gone counts as released.
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released video"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release video"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turntable.mp4");
        std::fs::write(&path, b"mp4").unwrap();

        let handle = VideoHandle::new(path.clone());
        assert_eq!(handle.path(), path.as_path());
        handle.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_release_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        VideoHandle::new(dir.path().join("gone.mp4")).release();
    }

    #[test]
    fn test_dropping_handle_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held.mp4");
        std::fs::write(&path, b"mp4").unwrap();

        {
            let _handle = VideoHandle::new(path.clone());
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
