use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::models::UploadedFile;

pub const GENERIC_FAILURE: &str = "Failed to generate design. Please try again.";

pub const LOGO_INSTRUCTION: &str = "The second image provided is the brand logo. Please incorporate it tastefully into the design if the user asks for it or if it fits the context.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("No image generated. The model might have returned only text.")]
    NoImageReturned,
    #[error("{0}")]
    Remote(String),
    #[error("Generation timed out after {0:?}")]
    TimedOut(Duration),
}

impl GenerationError {
    /// Message shown inline on the instructions step.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Remote(msg) if msg.trim().is_empty() => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub data: String,
    pub mime_type: String,
}

impl From<&UploadedFile> for ImagePart {
    fn from(file: &UploadedFile) -> Self {
        Self { data: file.base64.clone(), mime_type: file.mime_type.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub main_image: ImagePart,
    pub logo_image: Option<ImagePart>,
    pub prompt: String,
}

/// Remote image editing: product image, optional logo and instructions in,
/// a displayable PNG data URI out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    fn model(&self) -> &str;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", head(s, 50), s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

/// The first `max` characters of `s`, never splitting a character.
fn head(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

fn preview(data: &str) -> String {
    let shown = head(data, 50);
    if shown.len() < data.len() {
        format!("{}...[{} chars total]", shown, data.chars().count())
    } else {
        data.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        Self { client: Client::new(), api_key, base_url, model }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.gemini_api_key.clone(), config.gemini_api_base.clone(), config.gemini_model.clone())
    }

    pub fn is_demo(&self) -> bool {
        self.api_key.is_none()
    }

    /// Main image first; the logo and its usage note next when present; the prompt always last.
    pub fn build_parts(request: &GenerationRequest) -> Vec<Value> {
        let mut parts = vec![inline_part(&request.main_image)];
        if let Some(logo) = &request.logo_image {
            parts.push(inline_part(logo));
            parts.push(json!({ "text": LOGO_INSTRUCTION }));
        }
        parts.push(json!({ "text": request.prompt }));
        parts
    }

    async fn perform_api_call(&self, api_key: &str, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        info!("🔗 Making request to: {}", url);

        let request_body = json!({
            "contents": [{
                "parts": Self::build_parts(request)
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "candidateCount": 1
            }
        });

        let mut logged = request_body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Remote(e.without_url().to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GenerationError::Remote(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GenerationError::Remote(remote_message(status, &response_text)));
        }

        if let Ok(mut json_value) = serde_json::from_str::<Value>(&response_text) {
            truncate_base64_in_json(&mut json_value);
            info!("📥 Raw Gemini API response: {}", json_value);
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::Remote(format!("Unreadable response from the image service: {}", e)))?;

        let image_data = extract_first_image_b64(&parsed).ok_or(GenerationError::NoImageReturned)?;
        info!("🖼️ Extracted image from API response: {}", preview(&image_data));
        // The output is always labelled PNG for display, whatever the part declared.
        Ok(format!("data:image/png;base64,{}", image_data))
    }

    /// Demo mode: hands the product photo back as a PNG so the flow works offline.
    fn demo_image(request: &GenerationRequest) -> Result<String, GenerationError> {
        let source = STANDARD.decode(&request.main_image.data).ok()
            .and_then(|bytes| image::load_from_memory(&bytes).ok())
            .unwrap_or_else(|| DynamicImage::ImageRgb8(RgbImage::from_pixel(512, 512, Rgb([79, 70, 229]))));

        let mut png = Vec::new();
        source.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| GenerationError::Remote(format!("placeholder encoding failed: {}", e)))?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

fn inline_part(image: &ImagePart) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data
        }
    })
}

/// Pulls `error.message` out of a Gemini error body, falling back to the status line.
fn remote_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<GeminiErrorBody>(body).ok()
        .map(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("The image service returned {}", status))
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("Using demo mode - no real images generated");
            return Self::demo_image(request);
        };

        info!("Generating image with Gemini API (logo: {})...", request.logo_image.is_some());
        let result = self.perform_api_call(api_key, request).await;
        match &result {
            Ok(image_url) => info!("✅ Successfully generated image: {}", preview(image_url)),
            Err(GenerationError::NoImageReturned) => warn!("⚠️ No inline image data found in response"),
            Err(e) => error!("❌ Failed to generate image: {}", e),
        }
        result
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
}

fn extract_first_image_b64(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            match p {
                Part::Inline { inline_data } => {
                    info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                    return Some(inline_data.data.clone());
                }
                Part::Text { text } => info!("💬 Model text: {}", preview(text)),
                Part::Other(_) => {}
            }
        }
    }
    None
}
