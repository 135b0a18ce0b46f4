/// Upload decoding
///
/// Only JPEG and PNG are accepted. The format is sniffed from the file
/// content rather than trusted from the extension.

use image::ImageFormat;
use rfd::FileDialog;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::AppError;
use crate::state::data::ImageArtifact;

/// Extensions offered by the file picker
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Show the native file picker filtered to JPG/PNG
pub fn pick_image() -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Select a Character Image")
        .add_filter("JPG or PNG", &ACCEPTED_EXTENSIONS)
        .pick_file()
}

/// Read and validate an image file
pub async fn load_image(path: PathBuf) -> Result<ImageArtifact, AppError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::FileRead(e.to_string()))?;
    let artifact = decode_upload(bytes)?;
    info!(
        file = %display_name(&path),
        mime = artifact.mime(),
        width = artifact.width(),
        height = artifact.height(),
        "loaded upload"
    );
    Ok(artifact)
}

/// Validate uploaded bytes and wrap them as an artifact
pub fn decode_upload(bytes: Vec<u8>) -> Result<ImageArtifact, AppError> {
    let mime = match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(other) => {
            return Err(AppError::UnsupportedFileType(
                format!("{:?}", other).to_lowercase(),
            ))
        }
        Err(_) => return Err(AppError::UnsupportedFileType("unknown".to_string())),
    };
    ImageArtifact::from_bytes(mime, bytes).map_err(AppError::FileRead)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
