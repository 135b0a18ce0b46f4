/// View/Status controller
///
/// Owns the canonical studio state: the four stills, the video, the
/// active view, the status and the last error. Every change goes through
/// one of the transition methods below. Transitions that need the model
/// return a `Request`; the caller runs it and feeds the `Outcome` back
/// through `settle`.
///
/// Each request carries a `Ticket`. A settlement whose ticket is not the
/// one currently pending (because of a reset or a newer upload) is
/// discarded, so a late response can never resurrect cleared state.

use tracing::{debug, info, warn};

use super::data::{ActiveView, GeneratedViews, ImageArtifact, Status, ViewId, ViewSet};
use super::video::VideoHandle;
use crate::error::AppError;

/// Which collaborator call a ticket belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    GenerateViews,
    Edit,
    GenerateVideo,
}

/// Staleness token for one outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    kind: RequestKind,
}

impl Ticket {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

/// Work the controller wants done by the model
#[derive(Debug, Clone)]
pub enum Request {
    GenerateViews {
        ticket: Ticket,
        source: ImageArtifact,
    },
    Edit {
        ticket: Ticket,
        view: ViewId,
        image: ImageArtifact,
        prompt: String,
        mask: Option<ImageArtifact>,
    },
    GenerateVideo {
        ticket: Ticket,
        source: ImageArtifact,
    },
}

impl Request {
    pub fn ticket(&self) -> Ticket {
        match self {
            Request::GenerateViews { ticket, .. }
            | Request::Edit { ticket, .. }
            | Request::GenerateVideo { ticket, .. } => *ticket,
        }
    }
}

/// A settled request
#[derive(Debug)]
pub enum Outcome {
    Views(Ticket, Result<GeneratedViews, AppError>),
    Edited(Ticket, Result<ImageArtifact, AppError>),
    Video(Ticket, Result<VideoHandle, AppError>),
}

impl Outcome {
    pub fn ticket(&self) -> Ticket {
        match self {
            Outcome::Views(ticket, _) | Outcome::Edited(ticket, _) | Outcome::Video(ticket, _) => {
                *ticket
            }
        }
    }
}

/// What the mask surface needs to know from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskSignal {
    /// Bumped every time the mask must be wiped
    pub clear_generation: u64,
    /// Whether strokes are accepted right now
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub struct Controller {
    views: ViewSet,
    video: Option<VideoHandle>,
    active: ActiveView,
    status: Status,
    error: Option<String>,
    /// Advanced edit mode: gestures paint the mask instead of moving the preview
    mask_mode: bool,
    /// Last mask emitted by the surface
    mask: Option<ImageArtifact>,
    mask_clears: u64,
    generation: u64,
    pending: Option<Ticket>,
    /// View captured by the edit in flight
    edit_target: Option<ViewId>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Accessors ==========

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn views(&self) -> &ViewSet {
        &self.views
    }

    pub fn active_view(&self) -> ActiveView {
        self.active
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn video(&self) -> Option<&VideoHandle> {
        self.video.as_ref()
    }

    pub fn mask_mode(&self) -> bool {
        self.mask_mode
    }

    pub fn mask(&self) -> Option<&ImageArtifact> {
        self.mask.as_ref()
    }

    /// The still shown in the active view, if any
    pub fn active_image(&self) -> Option<&ImageArtifact> {
        match self.active {
            ActiveView::Still(view) => self.views.get(view),
            ActiveView::Video => None,
        }
    }

    /// The still an in-flight edit will replace
    pub fn editing_view(&self) -> Option<ViewId> {
        match self.status {
            Status::Editing => self.edit_target,
            _ => None,
        }
    }

    // ========== Derived flags ==========

    pub fn is_view_ready(&self, view: ActiveView) -> bool {
        match view {
            ActiveView::Still(view) => self.views.get(view).is_some(),
            ActiveView::Video => self.video.is_some(),
        }
    }

    /// True while the view is being produced by an outstanding request
    pub fn is_view_loading(&self, view: ActiveView) -> bool {
        match view {
            ActiveView::Still(ViewId::Front) => false,
            ActiveView::Still(still) => {
                self.status == Status::GeneratingViews && self.views.get(still).is_none()
            }
            ActiveView::Video => self.status == Status::GeneratingVideo,
        }
    }

    pub fn can_upload(&self) -> bool {
        matches!(self.status, Status::Idle | Status::Error)
    }

    pub fn can_edit(&self) -> bool {
        self.status == Status::Ready && self.active_image().is_some()
    }

    pub fn can_generate_video(&self) -> bool {
        self.status == Status::Ready && self.views.front.is_some()
    }

    /// Export follows readiness: allowed when ready or while work is in flight
    pub fn can_export(&self) -> bool {
        matches!(self.status, Status::Ready) || self.status.is_busy()
    }

    pub fn can_dismiss_error(&self) -> bool {
        self.status == Status::Error && ViewId::ALL.iter().all(|v| self.views.get(*v).is_some())
    }

    pub fn mask_signal(&self) -> MaskSignal {
        MaskSignal {
            clear_generation: self.mask_clears,
            enabled: self.mask_mode
                && self.status != Status::Editing
                && self.active_image().is_some(),
        }
    }

    // ========== Transitions ==========

    /// Load a new front image and request the three generated views
    pub fn upload(&mut self, image: ImageArtifact) -> Option<Request> {
        if !self.can_upload() {
            debug!(status = ?self.status, "upload ignored");
            return None;
        }

        self.release_video();
        self.views = ViewSet::with_front(image.clone());
        self.active = ActiveView::Still(ViewId::Front);
        self.error = None;
        self.wipe_mask();
        self.status = Status::GeneratingViews;

        let ticket = self.issue(RequestKind::GenerateViews);
        info!(
            width = image.width(),
            height = image.height(),
            "uploaded front view, generating side/back/full"
        );
        Some(Request::GenerateViews {
            ticket,
            source: image,
        })
    }

    /// Edit the active still with a prompt (and the current mask)
    ///
    /// Silently ignored unless Ready with an image in the active view.
    pub fn apply_edit(&mut self, prompt: &str) -> Option<Request> {
        let prompt = prompt.trim();
        if prompt.is_empty() || self.status != Status::Ready {
            return None;
        }
        let ActiveView::Still(view) = self.active else {
            return None;
        };
        let image = self.views.get(view)?.clone();

        let mask = if self.mask_mode { self.mask.clone() } else { None };
        self.error = None;
        self.status = Status::Editing;

        let ticket = self.issue(RequestKind::Edit);
        self.edit_target = Some(view);
        info!(view = %view, masked = mask.is_some(), "applying edit");
        Some(Request::Edit {
            ticket,
            view,
            image,
            prompt: prompt.to_string(),
            mask,
        })
    }

    /// Request a turntable video of the front view
    pub fn generate_video(&mut self) -> Option<Request> {
        if self.status != Status::Ready {
            return None;
        }
        let source = self.views.front.clone()?;

        self.error = None;
        self.status = Status::GeneratingVideo;

        let ticket = self.issue(RequestKind::GenerateVideo);
        info!("generating turntable video");
        Some(Request::GenerateVideo { ticket, source })
    }

    /// Switch the displayed view. Returns false when the view is still
    /// being generated.
    pub fn set_active_view(&mut self, view: ActiveView) -> bool {
        if self.is_view_loading(view) {
            return false;
        }
        if self.active != view {
            self.active = view;
            self.wipe_mask();
        }
        true
    }

    /// Back to Idle with nothing loaded. Any outstanding request becomes stale.
    pub fn reset(&mut self) {
        self.release_video();
        self.views = ViewSet::default();
        self.active = ActiveView::default();
        self.error = None;
        self.status = Status::Idle;
        self.mask_mode = false;
        self.wipe_mask();
        self.pending = None;
        self.edit_target = None;
        self.generation += 1;
        info!("studio reset");
    }

    /// Wipe the mask without touching status or views
    pub fn clear_mask(&mut self) {
        self.wipe_mask();
    }

    /// Store the mask emitted by the surface (None means no mask)
    pub fn set_mask(&mut self, mask: Option<ImageArtifact>) {
        if !self.mask_mode || self.status == Status::Editing {
            return;
        }
        self.mask = mask;
    }

    /// Toggle advanced edit mode. Either way the mask starts over.
    pub fn set_mask_mode(&mut self, enabled: bool) {
        if self.mask_mode == enabled {
            return;
        }
        self.mask_mode = enabled;
        self.wipe_mask();
        debug!(enabled, "mask mode");
    }

    /// Leave Error for Ready when the stills are intact
    pub fn dismiss_error(&mut self) {
        if self.can_dismiss_error() {
            self.error = None;
            self.status = Status::Ready;
        }
    }

    /// Apply a settled request. Returns false if it was stale and discarded.
    pub fn settle(&mut self, outcome: Outcome) -> bool {
        let ticket = outcome.ticket();
        if self.pending != Some(ticket) {
            warn!(kind = ?ticket.kind(), "discarding stale settlement");
            if let Outcome::Video(_, Ok(handle)) = outcome {
                handle.release();
            }
            return false;
        }
        self.pending = None;

        match outcome {
            Outcome::Views(_, Ok(generated)) => {
                self.views.attach_generated(generated);
                self.status = Status::Ready;
                info!("views generated");
            }
            Outcome::Edited(_, Ok(edited)) => {
                let view = self.edit_target.take().unwrap_or(ViewId::Front);
                self.views.set(view, edited);
                if self.mask_mode {
                    self.wipe_mask();
                }
                self.status = Status::Ready;
                info!(view = %view, "edit applied");
            }
            Outcome::Video(_, Ok(handle)) => {
                self.release_video();
                info!(path = %handle.path().display(), "video ready");
                self.video = Some(handle);
                self.status = Status::Ready;
                self.active = ActiveView::Video;
                self.wipe_mask();
            }
            Outcome::Views(_, Err(err))
            | Outcome::Edited(_, Err(err))
            | Outcome::Video(_, Err(err)) => {
                warn!(kind = ?ticket.kind(), error = %err, "request failed");
                self.edit_target = None;
                self.error = Some(err.to_string());
                self.status = Status::Error;
            }
        }
        true
    }

    // ========== Internals ==========

    fn issue(&mut self, kind: RequestKind) -> Ticket {
        self.generation += 1;
        let ticket = Ticket {
            generation: self.generation,
            kind,
        };
        self.pending = Some(ticket);
        ticket
    }

    fn release_video(&mut self) {
        if let Some(handle) = self.video.take() {
            handle.release();
        }
        if self.active == ActiveView::Video {
            self.active = ActiveView::default();
        }
    }

    fn wipe_mask(&mut self) {
        self.mask = None;
        self.mask_clears += 1;
    }
}
