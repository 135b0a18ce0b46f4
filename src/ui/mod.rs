/// User interface components
///
/// - The preview canvas over the displayed image (canvas.rs)
/// - The viewer stage and view switcher (viewer.rs)
/// - The side panels and error screens (panels.rs)

pub mod canvas;
pub mod panels;
pub mod viewer;
