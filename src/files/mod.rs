/// Local file plumbing
///
/// This module handles:
/// - Picking and decoding the uploaded character image (upload.rs)
/// - Writing generated views and the video to disk (export.rs)

pub mod export;
pub mod upload;
