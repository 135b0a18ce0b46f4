/// Generative model collaborator
///
/// The studio talks to the model through the `CharacterModel` trait:
/// - `gemini.rs` - the hosted API client used by the app
///
/// `execute` runs a controller `Request` against a model and turns the
/// result into an `Outcome`, converting service errors into the
/// user-facing error for that kind of request.

pub mod gemini;

use async_trait::async_trait;
use futures::future::try_join3;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AppError, ServiceError};
use crate::state::controller::{Outcome, Request};
use crate::state::data::{GeneratedViews, ImageArtifact, ViewId};
use crate::state::video::VideoHandle;

pub use gemini::GeminiClient;

#[async_trait]
pub trait CharacterModel: Send + Sync {
    /// Generate one view of the character from the front image
    async fn generate_view(
        &self,
        source: &ImageArtifact,
        view: ViewId,
    ) -> Result<ImageArtifact, ServiceError>;

    /// Edit an image with a prompt, optionally confined to a mask
    async fn edit_image(
        &self,
        image: &ImageArtifact,
        prompt: &str,
        mask: Option<&ImageArtifact>,
    ) -> Result<ImageArtifact, ServiceError>;

    /// Generate a turntable video of the front image
    async fn generate_video(&self, source: &ImageArtifact) -> Result<VideoHandle, ServiceError>;

    /// Side, back and full views, requested together
    ///
    /// The three requests run concurrently and are joined as a unit: the
    /// first failure fails the batch and no partial result is returned.
    async fn generate_views(&self, source: &ImageArtifact) -> Result<GeneratedViews, ServiceError> {
        let (side, back, full) = try_join3(
            self.generate_view(source, ViewId::Side),
            self.generate_view(source, ViewId::Back),
            self.generate_view(source, ViewId::Full),
        )
        .await?;
        Ok(GeneratedViews { side, back, full })
    }
}

/// Run a request and package its settlement
pub async fn execute(model: Arc<dyn CharacterModel>, request: Request) -> Outcome {
    match request {
        Request::GenerateViews { ticket, source } => {
            let result = model.generate_views(&source).await.map_err(|e| {
                error!(error = %e, "view generation failed");
                AppError::ViewGeneration(e.to_string())
            });
            if result.is_ok() {
                info!("view batch complete");
            }
            Outcome::Views(ticket, result)
        }
        Request::Edit {
            ticket,
            view,
            image,
            prompt,
            mask,
        } => {
            let result = model
                .edit_image(&image, &prompt, mask.as_ref())
                .await
                .map_err(|e| {
                    error!(view = %view, error = %e, "edit failed");
                    AppError::Edit(e.to_string())
                });
            Outcome::Edited(ticket, result)
        }
        Request::GenerateVideo { ticket, source } => {
            let result = model.generate_video(&source).await.map_err(|e| {
                error!(error = %e, "video generation failed");
                AppError::VideoGeneration(e.to_string())
            });
            Outcome::Video(ticket, result)
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::state::data::fixtures::png;

    /// Scripted model: returns solid PNGs, fails the views it is told to
    #[derive(Default)]
    pub struct MockModel {
        pub failing_views: Mutex<HashSet<ViewId>>,
        pub fail_edit: bool,
        pub fail_video: bool,
        pub video_dir: Option<std::path::PathBuf>,
        pub view_calls: AtomicUsize,
        pub edit_calls: AtomicUsize,
        pub video_calls: AtomicUsize,
        pub last_mask: Mutex<Option<ImageArtifact>>,
    }

    impl MockModel {
        pub fn failing(views: &[ViewId]) -> Self {
            let model = Self::default();
            model.failing_views.lock().unwrap().extend(views.iter().copied());
            model
        }
    }

    #[async_trait]
    impl CharacterModel for MockModel {
        async fn generate_view(
            &self,
            _source: &ImageArtifact,
            view: ViewId,
        ) -> Result<ImageArtifact, ServiceError> {
            self.view_calls.fetch_add(1, Ordering::SeqCst);
            // the back view is slow, so failures elsewhere land first
            if view == ViewId::Back {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            if self.failing_views.lock().unwrap().contains(&view) {
                return Err(ServiceError::NoImage(format!(
                    "Failed to generate view: no {view} today"
                )));
            }
            Ok(png(8, 8, view as u8))
        }

        async fn edit_image(
            &self,
            _image: &ImageArtifact,
            prompt: &str,
            mask: Option<&ImageArtifact>,
        ) -> Result<ImageArtifact, ServiceError> {
            self.edit_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_mask.lock().unwrap() = mask.cloned();
            if self.fail_edit {
                return Err(ServiceError::NoImage(String::new()));
            }
            Ok(png(8, 8, prompt.len() as u8))
        }

        async fn generate_video(&self, _source: &ImageArtifact) -> Result<VideoHandle, ServiceError> {
            self.video_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_video {
                return Err(ServiceError::VideoOperation("quota exceeded".to_string()));
            }
            let dir = self
                .video_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir);
            let path = dir.join(format!("mock-{}.mp4", self.video_calls.load(Ordering::SeqCst)));
            std::fs::write(&path, b"mp4")?;
            Ok(VideoHandle::new(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockModel;
    use super::*;
    use crate::state::controller::Controller;
    use crate::state::data::fixtures::png;
    use crate::state::data::{ActiveView, Status};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_upload_scenario_end_to_end() {
        let model = Arc::new(MockModel::default());
        let mut controller = Controller::new();

        let request = controller.upload(png(512, 512, 0)).unwrap();
        assert!(controller.views().front.is_some());
        assert_eq!(controller.status(), Status::GeneratingViews);

        let outcome = execute(model.clone(), request).await;
        assert!(controller.settle(outcome));
        assert_eq!(controller.status(), Status::Ready);
        assert_eq!(controller.views().ready().count(), 4);
        assert_eq!(model.view_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batch_fails_as_a_unit() {
        let model = Arc::new(MockModel::failing(&[ViewId::Full]));
        let mut controller = Controller::new();
        let request = controller.upload(png(16, 16, 0)).unwrap();

        let outcome = execute(model, request).await;
        assert!(matches!(outcome, Outcome::Views(_, Err(AppError::ViewGeneration(_)))));
        controller.settle(outcome);

        assert_eq!(controller.status(), Status::Error);
        assert_eq!(
            controller.error(),
            Some("Failed to generate view: no full today")
        );
        // side and back succeeded in the batch, but nothing partial is attached
        assert!(controller.views().side.is_none());
        assert!(controller.views().back.is_none());
        assert!(controller.views().full.is_none());
        assert!(controller.views().front.is_some());
    }

    #[tokio::test]
    async fn test_edit_passes_mask_and_reports_fallback() {
        let model = Arc::new(MockModel {
            fail_edit: true,
            ..MockModel::default()
        });
        let mut controller = Controller::new();
        let request = controller.upload(png(16, 16, 0)).unwrap();
        controller.settle(execute(model.clone(), request).await);

        controller.set_mask_mode(true);
        let mask = png(16, 16, 255);
        controller.set_mask(Some(mask.clone()));
        let request = controller.apply_edit("add a hat").unwrap();
        controller.settle(execute(model.clone(), request).await);

        assert_eq!(model.last_mask.lock().unwrap().as_ref(), Some(&mask));
        assert_eq!(controller.status(), Status::Error);
        assert_eq!(controller.error(), Some(crate::error::EDIT_FALLBACK));
    }

    #[tokio::test]
    async fn test_video_without_front_never_calls_model() {
        let model = Arc::new(MockModel::default());
        let mut controller = Controller::new();
        assert!(controller.generate_video().is_none());
        assert_eq!(model.video_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.status(), Status::Idle);
    }

    #[tokio::test]
    async fn test_reset_while_video_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(MockModel {
            video_dir: Some(dir.path().to_path_buf()),
            ..MockModel::default()
        });
        let mut controller = Controller::new();
        let request = controller.upload(png(16, 16, 0)).unwrap();
        controller.settle(execute(model.clone(), request).await);

        let request = controller.generate_video().unwrap();
        let in_flight = tokio::spawn(execute(model.clone(), request));
        controller.reset();
        let outcome = in_flight.await.unwrap();

        assert!(!controller.settle(outcome));
        assert_eq!(controller.status(), Status::Idle);
        assert!(controller.video().is_none());
        assert_ne!(controller.active_view(), ActiveView::Video);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
