/// Error types for the studio
///
/// `AppError` is what the user sees: every failure is converted into one
/// of these at the controller boundary and rendered as a single inline
/// message. `ServiceError` is what the generative model client produces.

use thiserror::Error;

/// Fallback text when view generation fails without a message
pub const VIEW_GENERATION_FALLBACK: &str = "An error occurred while generating the views.";
/// Fallback text when an edit fails without a message
pub const EDIT_FALLBACK: &str = "An error occurred while editing the image.";
/// Fallback text when video generation fails without a message
pub const VIDEO_FALLBACK: &str = "An error occurred while generating the video.";

/// User-facing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("{}", or_fallback(.0, VIEW_GENERATION_FALLBACK))]
    ViewGeneration(String),

    #[error("{}", or_fallback(.0, EDIT_FALLBACK))]
    Edit(String),

    #[error("{}", or_fallback(.0, VIDEO_FALLBACK))]
    VideoGeneration(String),

    #[error("Unsupported file format ({0}). Please use JPG or PNG.")]
    UnsupportedFileType(String),

    #[error("Error while reading the file: {0}")]
    FileRead(String),

    #[error("Export failed: {0}")]
    Export(String),
}

fn or_fallback<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

/// Errors from the generative model collaborator
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status; carries the provider's error message when it sent one
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The model answered without an image part
    #[error("{0}")]
    NoImage(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The long-running video operation finished with an error
    #[error("video operation failed: {0}")]
    VideoOperation(String),

    #[error("could not store video: {0}")]
    Storage(#[from] std::io::Error),
}
