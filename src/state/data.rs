/// Shared data structures for the application state
///
/// These structs represent the data model that flows between the
/// controller, the model client and the UI layer.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One of the four still perspectives of the character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    Front,
    Side,
    Back,
    Full,
}

impl ViewId {
    pub const ALL: [ViewId; 4] = [ViewId::Front, ViewId::Side, ViewId::Back, ViewId::Full];

    /// Identifier used in file names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewId::Front => "front",
            ViewId::Side => "side",
            ViewId::Back => "back",
            ViewId::Full => "full",
        }
    }

    /// Button label
    pub fn label(&self) -> &'static str {
        match self {
            ViewId::Front => "Front",
            ViewId::Side => "Side",
            ViewId::Back => "Back",
            ViewId::Full => "Full",
        }
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The selectable views: four stills plus the turntable video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActiveView {
    Still(ViewId),
    Video,
}

impl Default for ActiveView {
    fn default() -> Self {
        ActiveView::Still(ViewId::Front)
    }
}

/// Process-wide lifecycle status. Exactly one value holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    GeneratingViews,
    Ready,
    Editing,
    GeneratingVideo,
    Error,
}

impl Status {
    /// True while a collaborator request is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Status::GeneratingViews | Status::Editing | Status::GeneratingVideo
        )
    }
}

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

/// An encoded image: the uploaded source, a generated view, an edit
/// result or a serialized mask.
///
/// The bytes are shared, so cloning is cheap. Every artifact gets a fresh
/// `id`, which the UI uses to know when a decoded preview is stale.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    id: u64,
    mime: String,
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl ImageArtifact {
    /// Wrap encoded image bytes, reading the dimensions from the header
    pub fn from_bytes(mime: impl Into<String>, bytes: Vec<u8>) -> Result<Self, String> {
        let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| format!("Failed to inspect image: {}", e))?
            .into_dimensions()
            .map_err(|e| format!("Failed to decode image header: {}", e))?;

        Ok(Self {
            id: NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed),
            mime: mime.into(),
            bytes: bytes.into(),
            width,
            height,
        })
    }

    /// Parse a `data:<mime>;base64,<payload>` URI
    pub fn from_data_uri(uri: &str) -> Result<Self, String> {
        let (mime, payload) = split_data_uri(uri)?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| format!("Invalid base64 payload: {}", e))?;
        Self::from_bytes(mime, bytes)
    }

    /// Encode as a self-describing data URI
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64_payload())
    }

    /// The base64 payload alone, as the model API wants it
    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

impl std::fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageArtifact")
            .field("id", &self.id)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .field("size", &format_args!("{}x{}", self.width, self.height))
            .finish()
    }
}

/// Split a data URI into (mime, base64 payload)
fn split_data_uri(uri: &str) -> Result<(&str, &str), String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "Not a data URI".to_string())?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| "Data URI is not base64 encoded".to_string())?;
    if mime.is_empty() {
        return Err("Data URI has no MIME type".to_string());
    }
    Ok((mime, payload))
}

/// The four still slots
///
/// `front` is the uploaded image; `side`, `back` and `full` only ever
/// arrive together from one successful generation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSet {
    pub front: Option<ImageArtifact>,
    pub side: Option<ImageArtifact>,
    pub back: Option<ImageArtifact>,
    pub full: Option<ImageArtifact>,
}

impl ViewSet {
    /// A set holding only the uploaded front image
    pub fn with_front(front: ImageArtifact) -> Self {
        Self {
            front: Some(front),
            ..Self::default()
        }
    }

    pub fn get(&self, view: ViewId) -> Option<&ImageArtifact> {
        match view {
            ViewId::Front => self.front.as_ref(),
            ViewId::Side => self.side.as_ref(),
            ViewId::Back => self.back.as_ref(),
            ViewId::Full => self.full.as_ref(),
        }
    }

    pub fn set(&mut self, view: ViewId, artifact: ImageArtifact) {
        let slot = match view {
            ViewId::Front => &mut self.front,
            ViewId::Side => &mut self.side,
            ViewId::Back => &mut self.back,
            ViewId::Full => &mut self.full,
        };
        *slot = Some(artifact);
    }

    /// Attach a whole generation batch at once
    pub fn attach_generated(&mut self, views: GeneratedViews) {
        self.side = Some(views.side);
        self.back = Some(views.back);
        self.full = Some(views.full);
    }

    pub fn is_empty(&self) -> bool {
        ViewId::ALL.iter().all(|view| self.get(*view).is_none())
    }

    /// Populated slots in display order
    pub fn ready(&self) -> impl Iterator<Item = (ViewId, &ImageArtifact)> + '_ {
        ViewId::ALL
            .into_iter()
            .filter_map(move |view| self.get(view).map(|artifact| (view, artifact)))
    }
}

/// Result of one successful generation batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedViews {
    pub side: ImageArtifact,
    pub back: ImageArtifact,
    pub full: ImageArtifact,
}


#[cfg(test)]
mod tests {
    use super::fixtures::png;
    use super::*;

    #[test]
    fn test_data_uri_round_trip_keeps_mime_and_size() {
        let original = png(512, 512, 40);
        let uri = original.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));

        let parsed = ImageArtifact::from_data_uri(&uri).unwrap();
        assert_eq!(parsed.mime(), "image/png");
        assert_eq!((parsed.width(), parsed.height()), (512, 512));
        assert_eq!(parsed.bytes(), original.bytes());
        assert_ne!(parsed.id(), original.id());
    }

    #[test]
    fn test_rejects_malformed_data_uris() {
        assert!(ImageArtifact::from_data_uri("http://example.com/a.png").is_err());
        assert!(ImageArtifact::from_data_uri("data:image/png,abcd").is_err());
        assert!(ImageArtifact::from_data_uri("data:;base64,abcd").is_err());
        assert!(ImageArtifact::from_data_uri("data:image/png;base64,!!!").is_err());
        // valid base64, not an image
        assert!(ImageArtifact::from_data_uri("data:image/png;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn test_view_set_slots() {
        let mut views = ViewSet::with_front(png(4, 4, 0));
        assert!(views.front.is_some());
        assert_eq!(views.ready().count(), 1);
        assert!(!views.is_empty());

        views.attach_generated(GeneratedViews {
            side: png(4, 4, 1),
            back: png(4, 4, 2),
            full: png(4, 4, 3),
        });
        let ready: Vec<ViewId> = views.ready().map(|(view, _)| view).collect();
        assert_eq!(ready, ViewId::ALL.to_vec());

        assert!(ViewSet::default().is_empty());
    }

    #[test]
    fn test_busy_statuses() {
        assert!(Status::GeneratingViews.is_busy());
        assert!(Status::Editing.is_busy());
        assert!(Status::GeneratingVideo.is_busy());
        assert!(!Status::Idle.is_busy());
        assert!(!Status::Ready.is_busy());
        assert!(!Status::Error.is_busy());
    }
}
