/// State management module
///
/// This module holds all application state, independent of the UI:
/// - Shared data structures: views, artifacts, status (data.rs)
/// - The view/status controller and its request lifecycle (controller.rs)
/// - The mask raster painted over the active view (mask.rs)
/// - Ownership of generated video files (video.rs)

pub mod controller;
pub mod data;
pub mod mask;
pub mod video;
