use cgmath::{Point2, Vector2};
use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Size, Theme};

use crate::state::mask::MaskSurface;
use crate::Message;

/// Radians of rotation per pixel of horizontal drag
const ROTATE_SENSITIVITY: f32 = 0.01;
const MIN_ZOOM: f32 = 0.5;
const MAX_ZOOM: f32 = 3.0;

const MASK_COLOR: Color = Color::from_rgba(1.0, 0.2, 0.3, 0.45);
const BRUSH_OUTLINE: Color = Color::from_rgba(1.0, 1.0, 1.0, 0.8);

/// Gestures reported by the preview canvas
///
/// Sent as `Message::Canvas(size, event)` with the current canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasEvent {
    /// The canvas box changed size and nothing else happened
    Resized,
    /// Drag delta in screen pixels
    Rotate(Vector2<f32>),
    Zoom(f32),
    /// Mask strokes, in image-box coordinates
    StrokeBegan(Point2<f32>),
    StrokeMoved(Point2<f32>),
    StrokeEnded,
}

/// Rotation and zoom applied to the still preview
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTransform {
    pub rotation: f32,
    pub zoom: f32,
}

impl Default for PreviewTransform {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            zoom: 1.0,
        }
    }
}

impl PreviewTransform {
    pub fn drag(&mut self, delta: Vector2<f32>) {
        self.rotation = (self.rotation + delta.x * ROTATE_SENSITIVITY) % std::f32::consts::TAU;
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Rectangle an image of `width`x`height` occupies when fitted (contain)
/// and centered inside `container`
pub fn fit_contain(container: Size, width: u32, height: u32) -> Rectangle {
    if width == 0 || height == 0 || container.width <= 0.0 || container.height <= 0.0 {
        return Rectangle::new(Point::ORIGIN, Size::ZERO);
    }
    let scale = (container.width / width as f32).min(container.height / height as f32);
    let size = Size::new(width as f32 * scale, height as f32 * scale);
    Rectangle::new(
        Point::new(
            (container.width - size.width) / 2.0,
            (container.height - size.height) / 2.0,
        ),
        size,
    )
}

/// Interaction layer over the displayed image
///
/// With mask mode off, drag rotates and the wheel zooms. With mask mode
/// on, the same gestures paint the mask instead.
pub struct PreviewCanvas<'a> {
    pub mask: &'a MaskSurface,
    pub mask_mode: bool,
    /// Pixel size of the displayed image, when there is one
    pub image_size: Option<(u32, u32)>,
}

impl<'a> PreviewCanvas<'a> {
    /// Where the image sits inside a canvas of the given size
    fn image_rect(&self, canvas: Size) -> Option<Rectangle> {
        let (width, height) = self.image_size?;
        Some(fit_contain(canvas, width, height))
    }

    fn to_mask_point(&self, bounds: Rectangle, position: Point) -> Option<Point2<f32>> {
        let rect = self.image_rect(bounds.size())?;
        Some(Point2::new(position.x - rect.x, position.y - rect.y))
    }

    fn update_mask(
        &self,
        state: &mut GestureState,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<CanvasEvent>) {
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if !self.mask.is_enabled() {
                    return (canvas::event::Status::Ignored, None);
                }
                if let Some(point) = cursor
                    .position_in(bounds)
                    .and_then(|pos| self.to_mask_point(bounds, pos))
                {
                    state.is_dragging = true;
                    return (
                        canvas::event::Status::Captured,
                        Some(CanvasEvent::StrokeBegan(point)),
                    );
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if state.is_dragging {
                    // keep following outside the box; the raster clips
                    if let Some(point) = cursor
                        .position()
                        .map(|pos| Point::new(pos.x - bounds.x, pos.y - bounds.y))
                        .and_then(|pos| self.to_mask_point(bounds, pos))
                    {
                        return (
                            canvas::event::Status::Captured,
                            Some(CanvasEvent::StrokeMoved(point)),
                        );
                    }
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.is_dragging {
                    state.is_dragging = false;
                    return (
                        canvas::event::Status::Captured,
                        Some(CanvasEvent::StrokeEnded),
                    );
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn update_transform(
        &self,
        state: &mut GestureState,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<CanvasEvent>) {
        match event {
            // Mouse wheel for zooming
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if cursor.position_in(bounds).is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                let zoom_delta = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 0.1,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                };
                return (
                    canvas::event::Status::Captured,
                    Some(CanvasEvent::Zoom(zoom_delta)),
                );
            }

            // Mouse button press - start dragging
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_in(bounds) {
                    state.is_dragging = true;
                    state.last_position = Some(pos);
                    return (canvas::event::Status::Captured, None);
                }
            }

            // Mouse button release - stop dragging
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.is_dragging {
                    state.is_dragging = false;
                    state.last_position = None;
                    return (canvas::event::Status::Captured, None);
                }
            }

            // Mouse move - rotate if dragging
            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if state.is_dragging {
                    if let (Some(current), Some(last)) = (cursor.position(), state.last_position)
                    {
                        let current = Point::new(current.x - bounds.x, current.y - bounds.y);
                        let delta = Vector2::new(current.x - last.x, current.y - last.y);
                        state.last_position = Some(current);
                        return (
                            canvas::event::Status::Captured,
                            Some(CanvasEvent::Rotate(delta)),
                        );
                    }
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }
}

impl<'a> Program<Message> for PreviewCanvas<'a> {
    type State = GestureState;

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        let size = bounds.size();
        let resized = state.last_bounds != Some(size);
        state.last_bounds = Some(size);

        // a mode switch mid-drag drops the gesture
        if state.mask_mode != self.mask_mode {
            state.mask_mode = self.mask_mode;
            state.is_dragging = false;
            state.last_position = None;
        }

        let (status, gesture) = if self.mask_mode {
            self.update_mask(state, event, bounds, cursor)
        } else {
            self.update_transform(state, event, bounds, cursor)
        };

        let gesture = match gesture {
            Some(gesture) => Some(gesture),
            None if resized => Some(CanvasEvent::Resized),
            None => None,
        };
        (status, gesture.map(|gesture| Message::Canvas(size, gesture)))
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        if !self.mask_mode {
            return vec![];
        }
        let Some(rect) = self.image_rect(bounds.size()) else {
            return vec![];
        };

        let mut frame = canvas::Frame::new(renderer, bounds.size());

        // One rectangle per covered run
        for (y, start, end) in self.mask.covered_runs() {
            frame.fill_rectangle(
                Point::new(rect.x + start as f32, rect.y + y as f32),
                Size::new((end - start) as f32, 1.0),
                MASK_COLOR,
            );
        }

        // Brush outline under the cursor
        if self.mask.is_enabled() {
            if let Some(pos) = cursor.position_in(bounds) {
                let outline = Path::circle(pos, self.mask.brush_size() as f32 / 2.0);
                frame.stroke(
                    &outline,
                    Stroke::default().with_color(BRUSH_OUTLINE).with_width(1.0),
                );
            }
        }

        vec![frame.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if cursor.position_in(bounds).is_none() || self.image_size.is_none() {
            return mouse::Interaction::default();
        }
        if self.mask_mode {
            if self.mask.is_enabled() {
                mouse::Interaction::Crosshair
            } else {
                mouse::Interaction::NotAllowed
            }
        } else if state.is_dragging {
            mouse::Interaction::Grabbing
        } else {
            mouse::Interaction::Grab
        }
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct GestureState {
    pub is_dragging: bool,
    pub last_position: Option<Point>,
    pub last_bounds: Option<Size>,
    pub mask_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_contain_letterboxes() {
        let rect = fit_contain(Size::new(800.0, 400.0), 512, 512);
        assert_eq!(rect.size(), Size::new(400.0, 400.0));
        assert_eq!(rect.position(), Point::new(200.0, 0.0));

        let rect = fit_contain(Size::new(300.0, 600.0), 100, 50);
        assert_eq!(rect.size(), Size::new(300.0, 150.0));
        assert_eq!(rect.position(), Point::new(0.0, 225.0));
    }

    #[test]
    fn test_fit_contain_degenerate() {
        assert_eq!(fit_contain(Size::ZERO, 10, 10).size(), Size::ZERO);
        assert_eq!(fit_contain(Size::new(10.0, 10.0), 0, 10).size(), Size::ZERO);
    }

    #[test]
    fn test_transform_zoom_is_clamped() {
        let mut transform = PreviewTransform::default();
        transform.zoom_by(10.0);
        assert_eq!(transform.zoom, MAX_ZOOM);
        transform.zoom_by(-10.0);
        assert_eq!(transform.zoom, MIN_ZOOM);
        transform.reset();
        assert_eq!(transform, PreviewTransform::default());
    }

    #[test]
    fn test_horizontal_drag_rotates() {
        let mut transform = PreviewTransform::default();
        transform.drag(Vector2::new(50.0, 30.0));
        assert!((transform.rotation - 0.5).abs() < 1e-6);
        assert_eq!(transform.zoom, 1.0);
    }

    fn press() -> canvas::Event {
        canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left))
    }

    #[test]
    fn test_press_on_new_size_still_starts_stroke() {
        let mask = MaskSurface::new();
        let program = PreviewCanvas {
            mask: &mask,
            mask_mode: true,
            image_size: Some((100, 100)),
        };
        let mut state = GestureState::default();
        let bounds = Rectangle::new(Point::new(10.0, 20.0), Size::new(200.0, 100.0));
        let cursor = Cursor::Available(Point::new(110.0, 70.0));

        let (status, message) = program.update(&mut state, press(), bounds, cursor);
        assert_eq!(status, canvas::event::Status::Captured);
        match message {
            Some(Message::Canvas(size, CanvasEvent::StrokeBegan(point))) => {
                assert_eq!(size, bounds.size());
                // the 100x100 image box sits 50px in from the left
                assert_eq!(point, Point2::new(50.0, 50.0));
            }
            other => panic!("expected a stroke start, got {other:?}"),
        }
        assert_eq!(state.last_bounds, Some(bounds.size()));
        assert!(state.is_dragging);
    }

    #[test]
    fn test_idle_event_reports_resize_once() {
        let mask = MaskSurface::new();
        let program = PreviewCanvas {
            mask: &mask,
            mask_mode: false,
            image_size: Some((100, 100)),
        };
        let mut state = GestureState::default();
        let bounds = Rectangle::new(Point::ORIGIN, Size::new(300.0, 200.0));
        let cursor = Cursor::Available(Point::new(5.0, 5.0));
        let moved = canvas::Event::Mouse(mouse::Event::CursorMoved {
            position: Point::new(5.0, 5.0),
        });

        let (_, message) = program.update(&mut state, moved.clone(), bounds, cursor);
        assert!(matches!(
            message,
            Some(Message::Canvas(size, CanvasEvent::Resized)) if size == bounds.size()
        ));
        let (_, message) = program.update(&mut state, moved, bounds, cursor);
        assert!(message.is_none());
    }
}
