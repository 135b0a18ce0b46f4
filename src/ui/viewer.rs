/// Character viewer: view switcher and the stage the active view is shown on
use std::collections::HashMap;

use iced::widget::{button, canvas, column, container, image, row, stack, text, Row};
use iced::{Alignment, Color, ContentFit, Element, Length, Radians, Rotation, Size};

use crate::state::controller::Controller;
use crate::state::data::{ActiveView, ViewId, ViewSet};
use crate::state::mask::MaskSurface;
use crate::ui::canvas::{PreviewCanvas, PreviewTransform};
use crate::Message;

/// Decoded image handles per view, keyed by artifact id
///
/// Handles are rebuilt only when the artifact in a slot changes, so the
/// renderer keeps its texture across unrelated updates.
#[derive(Debug, Default)]
pub struct PreviewCache {
    handles: HashMap<ViewId, (u64, image::Handle)>,
}

impl PreviewCache {
    pub fn sync(&mut self, views: &ViewSet) {
        for view in ViewId::ALL {
            match views.get(view) {
                Some(artifact) => {
                    let fresh = self
                        .handles
                        .get(&view)
                        .map_or(true, |(id, _)| *id != artifact.id());
                    if fresh {
                        let handle = image::Handle::from_bytes(artifact.bytes().to_vec());
                        self.handles.insert(view, (artifact.id(), handle));
                    }
                }
                None => {
                    self.handles.remove(&view);
                }
            }
        }
    }

    pub fn get(&self, view: ViewId) -> Option<&image::Handle> {
        self.handles.get(&view).map(|(_, handle)| handle)
    }

    #[cfg(test)]
    fn artifact_id(&self, view: ViewId) -> Option<u64> {
        self.handles.get(&view).map(|(id, _)| *id)
    }
}

/// Everything the stage needs to render
pub struct Stage<'a> {
    pub controller: &'a Controller,
    pub mask: &'a MaskSurface,
    pub previews: &'a PreviewCache,
    pub transform: PreviewTransform,
    pub canvas_size: Option<Size>,
}

/// Buttons for the four stills and the video
pub fn view_switcher(controller: &Controller) -> Row<'_, Message> {
    let mut switcher = row![].spacing(8).align_y(Alignment::Center);

    let entries = ViewId::ALL
        .iter()
        .map(|view| (ActiveView::Still(*view), view.label()))
        .chain(std::iter::once((ActiveView::Video, "Video")));

    for (target, label) in entries {
        let loading = controller.is_view_loading(target);
        let label = if loading {
            format!("{label}…")
        } else {
            label.to_string()
        };
        let selectable = controller.is_view_ready(target) && !loading;
        let style = if controller.active_view() == target {
            button::primary
        } else {
            button::secondary
        };
        switcher = switcher.push(
            button(text(label).size(14))
                .style(style)
                .padding([6, 12])
                .on_press_maybe(selectable.then_some(Message::SelectView(target))),
        );
    }

    switcher
}

impl<'a> Stage<'a> {
    pub fn view(self) -> Element<'a, Message> {
        let controller = self.controller;
        let active = controller.active_view();

        let content: Element<'a, Message> = match active {
            ActiveView::Video => self.video_panel(),
            ActiveView::Still(view) => match self.previews.get(view) {
                Some(handle) => self.still(view, handle.clone()),
                None => placeholder(),
            },
        };

        let mut layers = stack![content];
        if controller.is_view_loading(active) {
            layers = layers.push(loading_overlay(active));
        } else if let Some(view) = controller.editing_view() {
            if active == ActiveView::Still(view) {
                layers = layers.push(overlay(format!(
                    "Applying edit to the {} view…",
                    view.label().to_lowercase()
                )));
            }
        }

        container(layers)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(container::bordered_box)
            .into()
    }

    fn still(&self, view: ViewId, handle: image::Handle) -> Element<'a, Message> {
        let controller = self.controller;
        let mask_mode = controller.mask_mode();

        // the mask is painted over the untransformed image
        let rotation = if mask_mode {
            Rotation::default()
        } else {
            Rotation::Floating(Radians(self.transform.rotation))
        };
        let picture = image(handle)
            .content_fit(ContentFit::Contain)
            .rotation(rotation)
            .width(Length::Fill)
            .height(Length::Fill);

        let picture: Element<'a, Message> = match self.canvas_size {
            Some(size) if !mask_mode => container(picture)
                .width(Length::Fixed(size.width * self.transform.zoom))
                .height(Length::Fixed(size.height * self.transform.zoom))
                .into(),
            _ => picture.into(),
        };
        let picture = container(picture)
            .center(Length::Fill)
            .clip(true);

        let image_size = controller
            .views()
            .get(view)
            .map(|artifact| (artifact.width(), artifact.height()));
        let overlay = canvas(PreviewCanvas {
            mask: self.mask,
            mask_mode,
            image_size,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        stack![picture, overlay].into()
    }

    fn video_panel(&self) -> Element<'a, Message> {
        let body: Element<'a, Message> = match self.controller.video() {
            Some(video) => column![
                text("Turntable video").size(24),
                text(video.path().display().to_string()).size(13),
                button("Export video")
                    .on_press_maybe(self.controller.can_export().then_some(Message::ExportVideo))
                    .padding(10),
            ]
            .spacing(12)
            .align_x(Alignment::Center)
            .into(),
            None => text("No video yet").size(18).into(),
        };
        container(body).center(Length::Fill).into()
    }
}

fn placeholder<'a>() -> Element<'a, Message> {
    container(
        column![
            text("Character Viewer").size(32),
            text("Upload an image to get started.").size(16),
        ]
        .spacing(8)
        .align_x(Alignment::Center),
    )
    .center(Length::Fill)
    .into()
}

fn loading_overlay<'a>(view: ActiveView) -> Element<'a, Message> {
    overlay(match view {
        ActiveView::Video => "Generating video… this can take a few minutes".to_string(),
        ActiveView::Still(view) => format!("Generating {} view…", view.label().to_lowercase()),
    })
}

fn overlay<'a>(label: String) -> Element<'a, Message> {
    container(text(label).size(18))
        .center(Length::Fill)
        .style(|_theme| container::Style {
            background: Some(Color::from_rgba(0.0, 0.0, 0.0, 0.55).into()),
            text_color: Some(Color::WHITE),
            ..container::Style::default()
        })
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::fixtures::png;

    #[test]
    fn test_preview_cache_follows_view_set() {
        let mut cache = PreviewCache::default();
        let front = png(4, 4, 10);
        let mut views = ViewSet::with_front(front.clone());

        cache.sync(&views);
        assert_eq!(cache.artifact_id(ViewId::Front), Some(front.id()));
        assert!(cache.get(ViewId::Side).is_none());

        let edited = png(4, 4, 20);
        views.set(ViewId::Front, edited.clone());
        cache.sync(&views);
        assert_eq!(cache.artifact_id(ViewId::Front), Some(edited.id()));

        cache.sync(&ViewSet::default());
        assert!(cache.get(ViewId::Front).is_none());
    }
}
