/// Client for the hosted Gemini/Veo API
///
/// Image generation and editing are single `generateContent` calls that
/// carry the source image inline and answer with an inline image part.
/// Video generation is a long-running operation: create it, poll it until
/// done, then download the first generated sample into the video cache.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::CharacterModel;
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::state::data::{ImageArtifact, ViewId};
use crate::state::video::VideoHandle;

const API_KEY_HEADER: &str = "x-goog-api-key";

const COMMON_INSTRUCTIONS: &str = "Ensure the art style is consistent with the original image. \
The background should be transparent. Return ONLY the image. Do not include any text, labels, or explanations.";

const TURNTABLE_PROMPT: &str = "A smooth 360-degree turntable rotation of this character, \
standing in a neutral pose on a plain background, camera fixed, consistent lighting.";

const VIEW_FAILURE: &str = "Failed to generate view";
const EDIT_FAILURE: &str = "Failed to edit image";

/// Prompt asking for one view of the character
pub fn view_prompt(view: ViewId) -> String {
    let description = match view {
        ViewId::Front => "a clean front view of the character",
        ViewId::Side => "a side view of the character (profile view)",
        ViewId::Back => "a back view of the character",
        ViewId::Full => "a full-body view of the character from the front",
    };
    format!(
        "Based on this front-view image of a character, generate {}. {}",
        description, COMMON_INSTRUCTIONS
    )
}

/// Prompt wrapping a user edit instruction
pub fn edit_prompt(instruction: &str, masked: bool) -> String {
    let mut prompt = format!(
        "Edit the image based on this instruction: \"{}\". Return only the modified image with a transparent background. Do not include any text in your response.",
        instruction
    );
    if masked {
        prompt.push_str(
            " The second image is a mask: only change the area that is white in the mask and leave everything in the black area exactly as it is.",
        );
    }
    prompt
}

// ========== Wire types ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn image(image: &ImageArtifact) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime().to_string(),
                data: image.base64_payload(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

fn content_request(parts: Vec<Part>) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE", "TEXT"],
        },
    }
}

fn video_request(source: &ImageArtifact) -> serde_json::Value {
    serde_json::json!({
        "instances": [{
            "prompt": TURNTABLE_PROMPT,
            "image": {
                "bytesBase64Encoded": source.base64_payload(),
                "mimeType": source.mime(),
            }
        }],
        "parameters": {
            "aspectRatio": "16:9"
        }
    })
}

/// Pull the first inline image out of a response
///
/// Without one, the model's text (if any) becomes the error message.
fn extract_image(
    response: GenerateContentResponse,
    failure: &str,
) -> Result<ImageArtifact, ServiceError> {
    let parts: Vec<Part> = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    if let Some(inline) = parts.iter().find_map(|part| part.inline_data.as_ref()) {
        let uri = format!("data:{};base64,{}", inline.mime_type, inline.data);
        return ImageArtifact::from_data_uri(&uri).map_err(ServiceError::Malformed);
    }

    let text: String = parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        Err(ServiceError::NoImage(format!(
            "{}. The model did not return an image.",
            failure
        )))
    } else {
        Err(ServiceError::NoImage(format!("{}: {}", failure, text.trim())))
    }
}

/// URI of the first generated video in a finished operation
fn video_uri(operation: Operation) -> Result<String, ServiceError> {
    if let Some(error) = operation.error {
        return Err(ServiceError::VideoOperation(error.message));
    }
    operation
        .response
        .and_then(|response| response.generate_video_response)
        .and_then(|response| response.generated_samples.into_iter().next())
        .and_then(|sample| sample.video)
        .and_then(|video| video.uri)
        .ok_or_else(|| {
            ServiceError::VideoOperation("the operation finished without a video".to_string())
        })
}

/// Turn a non-success response into `ServiceError::Api`
async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

/// The hosted model, configured from `AppConfig`
pub struct GeminiClient {
    http: Client,
    config: Arc<AppConfig>,
}

impl GeminiClient {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, ServiceError> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    async fn generate_content(
        &self,
        parts: Vec<Part>,
    ) -> Result<GenerateContentResponse, ServiceError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base, self.config.image_model
        );
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&content_request(parts))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn poll_operation(&self, mut operation: Operation) -> Result<Operation, ServiceError> {
        let url = format!("{}/{}", self.config.api_base, operation.name);
        while !operation.done {
            tokio::time::sleep(self.config.video_poll_interval).await;
            let response = self
                .http
                .get(&url)
                .header(API_KEY_HEADER, &self.config.api_key)
                .send()
                .await?;
            operation = check_status(response).await?.json().await?;
            debug!(done = operation.done, "polled video operation");
        }
        Ok(operation)
    }

}

/// Write a downloaded video into `dir` and hand back its owner
///
/// The handle exists before the write starts, so a failed write drops it
/// and takes the partial file with it.
async fn store_video(dir: &Path, bytes: &[u8]) -> Result<VideoHandle, ServiceError> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!(
        "turntable-{}.mp4",
        chrono::Local::now().format("%Y%m%d-%H%M%S%.3f")
    );
    let handle = VideoHandle::new(dir.join(name));
    tokio::fs::write(handle.path(), bytes).await?;
    info!(path = %handle.path().display(), bytes = bytes.len(), "stored video");
    Ok(handle)
}

#[async_trait]
impl CharacterModel for GeminiClient {
    async fn generate_view(
        &self,
        source: &ImageArtifact,
        view: ViewId,
    ) -> Result<ImageArtifact, ServiceError> {
        debug!(view = %view, "requesting view");
        let response = self
            .generate_content(vec![Part::image(source), Part::text(view_prompt(view))])
            .await?;
        extract_image(response, VIEW_FAILURE)
    }

    async fn edit_image(
        &self,
        image: &ImageArtifact,
        prompt: &str,
        mask: Option<&ImageArtifact>,
    ) -> Result<ImageArtifact, ServiceError> {
        let mut parts = vec![Part::image(image)];
        if let Some(mask) = mask {
            parts.push(Part::image(mask));
        }
        parts.push(Part::text(edit_prompt(prompt, mask.is_some())));

        let response = self.generate_content(parts).await?;
        extract_image(response, EDIT_FAILURE)
    }

    async fn generate_video(&self, source: &ImageArtifact) -> Result<VideoHandle, ServiceError> {
        let url = format!(
            "{}/models/{}:predictLongRunning",
            self.config.api_base, self.config.video_model
        );
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&video_request(source))
            .send()
            .await?;
        let operation: Operation = check_status(response).await?.json().await?;
        info!(operation = %operation.name, "video operation started");

        let uri = video_uri(self.poll_operation(operation).await?)?;
        let response = self
            .http
            .get(&uri)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        store_video(&self.config.video_dir, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::fixtures::png;

    #[test]
    fn test_view_prompts() {
        let side = view_prompt(ViewId::Side);
        assert!(side.contains("side view of the character (profile view)"));
        assert!(side.ends_with(COMMON_INSTRUCTIONS));
        assert!(view_prompt(ViewId::Back).contains("back view"));
        assert!(view_prompt(ViewId::Full).contains("full-body view"));
    }

    #[test]
    fn test_edit_prompt_mentions_mask_only_when_masked() {
        let plain = edit_prompt("add a hat", false);
        assert!(plain.starts_with("Edit the image based on this instruction: \"add a hat\"."));
        assert!(!plain.contains("mask"));
        assert!(edit_prompt("add a hat", true).contains("white in the mask"));
    }

    #[test]
    fn test_request_body_shape() {
        let image = png(4, 4, 0);
        let body = serde_json::to_value(content_request(vec![
            Part::image(&image),
            Part::text("hello".to_string()),
        ]))
        .unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], image.base64_payload());
        assert!(parts[0].get("text").is_none());
        assert_eq!(parts[1]["text"], "hello");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_video_request_body_shape() {
        let image = png(4, 4, 0);
        let body = video_request(&image);
        assert_eq!(body["instances"][0]["image"]["mimeType"], "image/png");
        assert_eq!(
            body["instances"][0]["image"]["bytesBase64Encoded"],
            image.base64_payload()
        );
    }

    #[test]
    fn test_extract_image_from_response() {
        let image = png(6, 3, 12);
        let json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": image.base64_payload() } }
                    ]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(json).unwrap();
        let artifact = extract_image(response, VIEW_FAILURE).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (6, 3));
        assert_eq!(artifact.bytes(), image.bytes());
    }

    #[test]
    fn test_text_only_response_becomes_the_error() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't draw that." }] } }]
        });
        let response: GenerateContentResponse = serde_json::from_value(json).unwrap();
        let err = extract_image(response, EDIT_FAILURE).unwrap_err();
        assert_eq!(err.to_string(), "Failed to edit image: I can't draw that.");
    }

    #[test]
    fn test_empty_response_has_generic_error() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        let err = extract_image(response, VIEW_FAILURE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to generate view. The model did not return an image."
        );
    }

    #[test]
    fn test_finished_operation_yields_uri() {
        let json = serde_json::json!({
            "name": "models/veo/operations/abc",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": "https://files.example/v.mp4" } }]
                }
            }
        });
        let operation: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(video_uri(operation).unwrap(), "https://files.example/v.mp4");
    }

    #[test]
    fn test_failed_operation_reports_message() {
        let json = serde_json::json!({
            "name": "models/veo/operations/abc",
            "done": true,
            "error": { "code": 8, "message": "quota exceeded" }
        });
        let operation: Operation = serde_json::from_value(json).unwrap();
        let err = video_uri(operation).unwrap_err();
        assert_eq!(err.to_string(), "video operation failed: quota exceeded");
    }

    #[test]
    fn test_pending_operation_parses() {
        let operation: Operation =
            serde_json::from_value(serde_json::json!({ "name": "operations/1" })).unwrap();
        assert!(!operation.done);
        assert!(video_uri(operation).is_err());
    }

    #[tokio::test]
    async fn test_stored_video_is_owned_by_its_handle() {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");

        let handle = store_video(&videos, b"mp4 bytes").await.unwrap();
        assert!(handle.path().starts_with(&videos));
        assert_eq!(std::fs::read(handle.path()).unwrap(), b"mp4 bytes");

        let path = handle.path().to_path_buf();
        drop(handle);
        assert!(!path.exists());
    }
}
