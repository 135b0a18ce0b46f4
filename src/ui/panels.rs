/// Side panels: uploader, customization, mask tools, export and video
use iced::widget::{
    button, checkbox, column, container, horizontal_rule, row, scrollable, slider, text,
    text_input, Column,
};
use iced::{Alignment, Color, Element, Length};

use crate::config::ConfigError;
use crate::state::controller::Controller;
use crate::state::data::{ActiveView, Status, ViewId};
use crate::state::mask::{MaskSurface, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::Message;

const ERROR_COLOR: Color = Color::from_rgb(0.95, 0.4, 0.4);
const MUTED_COLOR: Color = Color::from_rgb(0.6, 0.6, 0.65);

pub struct Sidebar<'a> {
    pub controller: &'a Controller,
    pub mask: &'a MaskSurface,
    pub prompt: &'a str,
    pub upload_error: Option<&'a str>,
    pub export_status: Option<&'a str>,
}

impl<'a> Sidebar<'a> {
    pub fn view(self) -> Element<'a, Message> {
        let mut panels: Column<'a, Message> = column![text("AI Character Creator").size(28)]
            .spacing(16)
            .padding(16)
            .width(Length::Fixed(320.0));

        panels = panels.push(self.uploader());

        if self.controller.views().front.is_some() {
            panels = panels
                .push(horizontal_rule(1))
                .push(self.customization())
                .push(horizontal_rule(1))
                .push(self.exports())
                .push(horizontal_rule(1))
                .push(self.video());
        }

        if self.controller.status() != Status::Idle || !self.controller.views().is_empty() {
            panels = panels.push(horizontal_rule(1)).push(
                button("Reset")
                    .style(button::danger)
                    .on_press(Message::Reset)
                    .padding(10),
            );
        }

        scrollable(panels).height(Length::Fill).into()
    }

    fn uploader(&self) -> Element<'a, Message> {
        let (label, enabled) = match self.controller.views().front {
            Some(_) => ("Image loaded. Reset to start over", false),
            None => ("Click to upload (JPG or PNG)", self.controller.can_upload()),
        };
        let mut section = column![
            text("1. Upload").size(18),
            button(text(label))
                .on_press_maybe(enabled.then_some(Message::PickImage))
                .width(Length::Fill)
                .padding(12),
        ]
        .spacing(8);

        if let Some(error) = self.upload_error {
            section = section.push(text(error.to_string()).size(13).color(ERROR_COLOR));
        }
        section.into()
    }

    fn customization(&self) -> Element<'a, Message> {
        let controller = self.controller;
        let editable = controller.can_edit();

        let target = match controller.active_view() {
            ActiveView::Still(view) => format!("Editing the {} view", view.label().to_lowercase()),
            ActiveView::Video => "Select a still view to edit it".to_string(),
        };

        let submit = (editable && !self.prompt.trim().is_empty()).then_some(Message::ApplyEdit);
        let apply_label = if controller.status() == Status::Editing {
            "Applying…"
        } else {
            "Apply edit"
        };

        column![
            text("2. Customize").size(18),
            text(target).size(13).color(MUTED_COLOR),
            text_input("e.g. give the character a red scarf", self.prompt)
                .on_input_maybe(editable.then_some(Message::PromptChanged))
                .on_submit_maybe(submit.clone())
                .padding(8),
            button(apply_label).on_press_maybe(submit).padding(8),
            self.mask_tools(),
        ]
        .spacing(8)
        .into()
    }

    fn mask_tools(&self) -> Element<'a, Message> {
        let controller = self.controller;
        let toggle = checkbox("Paint a mask to limit the edit", controller.mask_mode())
            .on_toggle_maybe((controller.status() != Status::Editing).then_some(Message::ToggleMaskMode));

        if !controller.mask_mode() {
            return toggle.into();
        }

        let brush = self.mask.brush_size();
        let hint = if !self.mask.is_empty() {
            "Only the painted area will change."
        } else {
            "Paint over the area to change."
        };

        column![
            toggle,
            row![
                text(format!("Brush {brush}px")).size(13).width(Length::Fixed(90.0)),
                slider(
                    MIN_BRUSH_SIZE as f32..=MAX_BRUSH_SIZE as f32,
                    brush as f32,
                    Message::BrushSizeChanged
                )
                .step(1.0),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
            row![
                text(hint).size(13).color(MUTED_COLOR).width(Length::Fill),
                button(text("Clear mask").size(13))
                    .style(button::secondary)
                    .on_press_maybe(self.mask.is_enabled().then_some(Message::ClearMask)),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        ]
        .spacing(8)
        .into()
    }

    fn exports(&self) -> Element<'a, Message> {
        let controller = self.controller;
        let exportable = controller.can_export();

        let mut buttons = column![].spacing(6);
        for view in ViewId::ALL {
            let ready = controller.views().get(view).is_some();
            buttons = buttons.push(
                button(text(format!("Download {} view", view.label().to_lowercase())).size(14))
                    .style(button::secondary)
                    .width(Length::Fill)
                    .on_press_maybe((exportable && ready).then_some(Message::ExportView(view))),
            );
        }
        let any_ready = controller.views().ready().next().is_some();
        buttons = buttons.push(
            button(text("Download all").size(14))
                .width(Length::Fill)
                .on_press_maybe((exportable && any_ready).then_some(Message::ExportAll)),
        );

        let mut section = column![text("3. Export").size(18), buttons].spacing(8);
        if let Some(status) = self.export_status {
            section = section.push(text(status.to_string()).size(13).color(MUTED_COLOR));
        }
        section.into()
    }

    fn video(&self) -> Element<'a, Message> {
        let controller = self.controller;
        let label = match controller.status() {
            Status::GeneratingVideo => "Generating video…",
            _ if controller.video().is_some() => "Regenerate turntable video",
            _ => "Generate turntable video",
        };
        column![
            text("4. Video").size(18),
            button(label)
                .on_press_maybe(controller.can_generate_video().then_some(Message::GenerateVideo))
                .width(Length::Fill)
                .padding(10),
        ]
        .spacing(8)
        .into()
    }
}

/// Banner for the controller's error text
pub fn error_banner(controller: &Controller) -> Option<Element<'_, Message>> {
    let error = controller.error()?;
    let dismiss = button(text("Dismiss").size(13))
        .style(button::secondary)
        .on_press_maybe(controller.can_dismiss_error().then_some(Message::DismissError));

    Some(
        container(
            row![
                text(error.to_string()).color(ERROR_COLOR).width(Length::Fill),
                dismiss,
            ]
            .spacing(12)
            .align_y(Alignment::Center),
        )
        .padding(12)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into(),
    )
}

/// Replaces the whole UI when configuration failed
pub fn config_error(error: &ConfigError) -> Element<'_, Message> {
    let content = column![
        text("Configuration Error").size(36).color(ERROR_COLOR),
        text(error.to_string()).size(16),
        text(error.remediation()).size(14).color(MUTED_COLOR),
    ]
    .spacing(16)
    .padding(40)
    .max_width(640)
    .align_x(Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
