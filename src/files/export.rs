/// Export of generated assets
///
/// Each ready view is written as `character-<view>.<ext>`. Exporting
/// everything writes the views one after another with a short pause
/// between files.

use rfd::FileDialog;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::AppError;
use crate::state::data::{ImageArtifact, ViewId};

/// Pause between files when exporting everything
pub const EXPORT_STAGGER: Duration = Duration::from_millis(200);

const VIDEO_FILE_NAME: &str = "character-turntable.mp4";

/// Show the native folder picker
pub fn pick_folder() -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Choose an Export Folder")
        .pick_folder()
}

/// File name for an exported view
pub fn file_name(view: ViewId, artifact: &ImageArtifact) -> String {
    format!("character-{}.{}", view.as_str(), artifact.extension())
}

/// Write one view into `dir`
pub async fn export_view(
    dir: PathBuf,
    view: ViewId,
    artifact: ImageArtifact,
) -> Result<PathBuf, AppError> {
    let path = dir.join(file_name(view, &artifact));
    write(&path, artifact.bytes()).await?;
    info!(view = %view, path = %path.display(), "exported view");
    Ok(path)
}

/// Write every given view into `dir`, in order, staggered
pub async fn export_all(
    dir: PathBuf,
    views: Vec<(ViewId, ImageArtifact)>,
) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::with_capacity(views.len());
    for (index, (view, artifact)) in views.into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(EXPORT_STAGGER).await;
        }
        written.push(export_view(dir.clone(), view, artifact).await?);
    }
    Ok(written)
}

/// Copy the generated video into `dir`
pub async fn export_video(dir: PathBuf, video: PathBuf) -> Result<PathBuf, AppError> {
    let path = dir.join(VIDEO_FILE_NAME);
    tokio::fs::copy(&video, &path)
        .await
        .map_err(|e| AppError::Export(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), "exported video");
    Ok(path)
}

async fn write(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| AppError::Export(format!("{}: {}", path.display(), e)))
}
