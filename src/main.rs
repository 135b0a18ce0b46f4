use iced::widget::{column, container, row, text};
use iced::{Element, Length, Size, Task, Theme};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod files;
mod service;
mod state;
mod ui;

use config::{AppConfig, ConfigError};
use error::AppError;
use files::{export, upload};
use service::{CharacterModel, GeminiClient};
use state::controller::{Controller, Outcome, Request};
use state::data::{ActiveView, ImageArtifact, Status, ViewId};
use state::mask::MaskSurface;
use ui::canvas::{fit_contain, CanvasEvent, PreviewTransform};
use ui::panels::{self, Sidebar};
use ui::viewer::{self, PreviewCache, Stage};

/// A settled request on its way back to the controller
///
/// Outcomes own video files and cannot be cloned, but messages must be.
/// The first receiver takes the outcome; clones see nothing.
#[derive(Clone)]
pub struct Settlement(Arc<Mutex<Option<Outcome>>>);

impl Settlement {
    fn new(outcome: Outcome) -> Self {
        Self(Arc::new(Mutex::new(Some(outcome))))
    }

    fn take(&self) -> Option<Outcome> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Settlement")
    }
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// User clicked the uploader
    PickImage,
    /// Background file read completed
    ImageLoaded(Result<ImageArtifact, AppError>),
    PromptChanged(String),
    ApplyEdit,
    GenerateVideo,
    Reset,
    DismissError,
    SelectView(ActiveView),
    ToggleMaskMode(bool),
    BrushSizeChanged(f32),
    ClearMask,
    /// Gesture from the preview canvas, with the canvas size
    Canvas(Size, CanvasEvent),
    /// A model request finished
    Settled(Settlement),
    ExportView(ViewId),
    ExportAll,
    ExportVideo,
    Exported(Result<Vec<PathBuf>, AppError>),
}

/// Main application state
enum CharacterStudio {
    /// Startup failed; only the remediation screen is shown
    Misconfigured(ConfigError),
    Running(Box<Studio>),
}

struct Studio {
    controller: Controller,
    mask: MaskSurface,
    model: Arc<dyn CharacterModel>,
    previews: PreviewCache,
    transform: PreviewTransform,
    /// Last size reported by the preview canvas
    canvas_size: Option<Size>,
    prompt: String,
    upload_error: Option<String>,
    export_status: Option<String>,
}

impl CharacterStudio {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let app = match build_model() {
            Ok(model) => {
                info!("character studio ready");
                CharacterStudio::Running(Box::new(Studio::new(model)))
            }
            Err(e) => {
                warn!(error = %e, "startup configuration failed");
                CharacterStudio::Misconfigured(e)
            }
        };
        (app, Task::none())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match self {
            CharacterStudio::Running(studio) => studio.update(message),
            CharacterStudio::Misconfigured(_) => Task::none(),
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        match self {
            CharacterStudio::Running(studio) => studio.view(),
            CharacterStudio::Misconfigured(error) => panels::config_error(error),
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn build_model() -> Result<Arc<dyn CharacterModel>, ConfigError> {
    let config = Arc::new(AppConfig::from_env()?);
    info!(
        image_model = %config.image_model,
        video_model = %config.video_model,
        video_dir = %config.video_dir.display(),
        "configuration loaded"
    );
    let client = GeminiClient::new(config).map_err(|e| ConfigError::HttpClient(e.to_string()))?;
    Ok(Arc::new(client))
}

impl Studio {
    fn new(model: Arc<dyn CharacterModel>) -> Self {
        Self {
            controller: Controller::new(),
            mask: MaskSurface::new(),
            model,
            previews: PreviewCache::default(),
            transform: PreviewTransform::default(),
            canvas_size: None,
            prompt: String::new(),
            upload_error: None,
            export_status: None,
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::PickImage => {
                if !self.controller.can_upload() || self.controller.views().front.is_some() {
                    return Task::none();
                }
                match upload::pick_image() {
                    Some(path) => Task::perform(upload::load_image(path), Message::ImageLoaded),
                    None => Task::none(),
                }
            }
            Message::ImageLoaded(Ok(image)) => {
                self.upload_error = None;
                self.export_status = None;
                self.transform.reset();
                let request = self.controller.upload(image);
                self.dispatch(request)
            }
            Message::ImageLoaded(Err(e)) => {
                warn!(error = %e, "upload rejected");
                self.upload_error = Some(e.to_string());
                Task::none()
            }
            Message::PromptChanged(prompt) => {
                self.prompt = prompt;
                Task::none()
            }
            Message::ApplyEdit => {
                let request = self.controller.apply_edit(&self.prompt);
                if request.is_some() {
                    self.prompt.clear();
                }
                self.dispatch(request)
            }
            Message::GenerateVideo => {
                let request = self.controller.generate_video();
                self.dispatch(request)
            }
            Message::Reset => {
                self.controller.reset();
                self.prompt.clear();
                self.transform.reset();
                self.upload_error = None;
                self.export_status = None;
                Task::none()
            }
            Message::DismissError => {
                self.controller.dismiss_error();
                Task::none()
            }
            Message::SelectView(view) => {
                self.controller.set_active_view(view);
                Task::none()
            }
            Message::ToggleMaskMode(enabled) => {
                self.controller.set_mask_mode(enabled);
                Task::none()
            }
            Message::BrushSizeChanged(size) => {
                self.mask.set_brush_size(size.round() as u32);
                Task::none()
            }
            Message::ClearMask => {
                self.controller.clear_mask();
                Task::none()
            }
            Message::Canvas(size, event) => {
                self.on_canvas(size, event);
                Task::none()
            }
            Message::Settled(settlement) => {
                if let Some(outcome) = settlement.take() {
                    self.controller.settle(outcome);
                }
                Task::none()
            }
            Message::ExportView(view) => self.export_view(view),
            Message::ExportAll => self.export_all(),
            Message::ExportVideo => self.export_video(),
            Message::Exported(Ok(paths)) => {
                self.export_status = Some(match paths.as_slice() {
                    [path] => format!("Saved {}", path.display()),
                    _ => format!("Saved {} files", paths.len()),
                });
                Task::none()
            }
            Message::Exported(Err(e)) => {
                warn!(error = %e, "export failed");
                self.export_status = Some(e.to_string());
                Task::none()
            }
        };

        self.sync();
        task
    }

    /// Send a controller request to the model
    fn dispatch(&self, request: Option<Request>) -> Task<Message> {
        let Some(request) = request else {
            return Task::none();
        };
        debug!(kind = ?request.ticket().kind(), "dispatching request");
        let model = Arc::clone(&self.model);
        Task::perform(service::execute(model, request), |outcome| {
            Message::Settled(Settlement::new(outcome))
        })
    }

    /// Bring derived UI state in line with the controller
    fn sync(&mut self) {
        self.previews.sync(self.controller.views());
        self.mask.sync(self.controller.mask_signal());
        self.fit_mask();
    }

    /// Size the mask raster to the displayed image
    fn fit_mask(&mut self) {
        let (Some(size), Some(image)) = (self.canvas_size, self.controller.active_image()) else {
            return;
        };
        let rect = fit_contain(size, image.width(), image.height());
        let resized = self
            .mask
            .resize(rect.width.round() as u32, rect.height.round() as u32);
        if resized {
            self.controller.set_mask(None);
        }
    }

    fn on_canvas(&mut self, size: Size, event: CanvasEvent) {
        // the raster must match the box before a stroke lands on it
        if self.canvas_size != Some(size) {
            self.canvas_size = Some(size);
            self.fit_mask();
        }

        match event {
            CanvasEvent::Resized => {}
            CanvasEvent::Rotate(delta) => {
                if !self.controller.mask_mode() {
                    self.transform.drag(delta);
                }
            }
            CanvasEvent::Zoom(delta) => {
                if !self.controller.mask_mode() {
                    self.transform.zoom_by(delta);
                }
            }
            CanvasEvent::StrokeBegan(point) => self.mask.begin_stroke(point),
            CanvasEvent::StrokeMoved(point) => self.mask.continue_stroke(point),
            CanvasEvent::StrokeEnded => match self.mask.end_stroke() {
                Ok(mask) => self.controller.set_mask(mask),
                Err(e) => warn!(error = %e, "could not serialize mask"),
            },
        }
    }

    fn export_view(&mut self, view: ViewId) -> Task<Message> {
        if !self.controller.can_export() {
            return Task::none();
        }
        let Some(artifact) = self.controller.views().get(view).cloned() else {
            return Task::none();
        };
        let Some(dir) = export::pick_folder() else {
            return Task::none();
        };
        Task::perform(
            async move { export::export_view(dir, view, artifact).await.map(|path| vec![path]) },
            Message::Exported,
        )
    }

    fn export_all(&mut self) -> Task<Message> {
        if !self.controller.can_export() {
            return Task::none();
        }
        let ready: Vec<(ViewId, ImageArtifact)> = self
            .controller
            .views()
            .ready()
            .map(|(view, artifact)| (view, artifact.clone()))
            .collect();
        if ready.is_empty() {
            return Task::none();
        }
        let Some(dir) = export::pick_folder() else {
            return Task::none();
        };
        Task::perform(export::export_all(dir, ready), Message::Exported)
    }

    fn export_video(&mut self) -> Task<Message> {
        if !self.controller.can_export() {
            return Task::none();
        }
        let Some(video) = self.controller.video().map(|video| video.path().to_path_buf()) else {
            return Task::none();
        };
        let Some(dir) = export::pick_folder() else {
            return Task::none();
        };
        Task::perform(
            async move { export::export_video(dir, video).await.map(|path| vec![path]) },
            Message::Exported,
        )
    }

    fn view(&self) -> Element<'_, Message> {
        let sidebar = Sidebar {
            controller: &self.controller,
            mask: &self.mask,
            prompt: &self.prompt,
            upload_error: self.upload_error.as_deref(),
            export_status: self.export_status.as_deref(),
        }
        .view();

        let stage = Stage {
            controller: &self.controller,
            mask: &self.mask,
            previews: &self.previews,
            transform: self.transform,
            canvas_size: self.canvas_size,
        }
        .view();

        let mut main = column![viewer::view_switcher(&self.controller), stage]
            .spacing(12)
            .padding(16)
            .width(Length::Fill)
            .height(Length::Fill);
        if let Some(banner) = panels::error_banner(&self.controller) {
            main = main.push(banner);
        }
        main = main.push(text(status_line(&self.controller)).size(13));

        container(row![sidebar, main])
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

fn status_line(controller: &Controller) -> String {
    match controller.status() {
        Status::Idle => "Waiting for an image".to_string(),
        Status::GeneratingViews => "Generating side, back and full views…".to_string(),
        Status::Ready => format!("Ready: {} views", controller.views().ready().count()),
        Status::Editing => "Applying edit…".to_string(),
        Status::GeneratingVideo => "Generating turntable video…".to_string(),
        Status::Error => "Something went wrong".to_string(),
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("character_studio=info")),
        )
        .init();

    iced::application(
        "Character Studio",
        CharacterStudio::update,
        CharacterStudio::view,
    )
    .theme(CharacterStudio::theme)
    .centered()
    .run_with(CharacterStudio::new)
}
