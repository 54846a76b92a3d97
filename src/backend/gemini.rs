//! Gemini `generateContent` client used for lyric transcription.
//!
//! Audio is attached inline as base64 and the model is asked for a JSON
//! response. One request is made per transcription; there is no fallback
//! model.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::backend::{AudioClip, LyricsModel};
use crate::config::AppConfig;
use crate::error::AppError;

/// Client for the generative language REST API.
pub struct GeminiModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiModel {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        Self::with_endpoint(
            &cfg.gemini_base_url,
            &cfg.gemini_model,
            cfg.gemini_api_key.clone(),
            cfg.transcribe_timeout,
        )
    }

    pub fn with_endpoint(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LyricsModel for GeminiModel {
    async fn generate(&self, prompt: &str, audio: AudioClip) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::transcription("GEMINI_API_KEY is not configured"))?;

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": audio.mime_type,
                            "data": general_purpose::STANDARD.encode(&audio.bytes),
                        }
                    }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.0
            }
        });

        debug!(model = %self.model, audio_bytes = audio.bytes.len(), "sending audio to gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::transcription(format!("gemini request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::transcription(format!(
                "gemini returned {status}: {}",
                text.trim()
            )));
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|err| {
            AppError::transcription(format!("gemini response was not valid JSON: {err}"))
        })?;

        let text = payload.text().ok_or_else(|| {
            AppError::transcription(format!(
                "gemini returned no text ({})",
                payload.reason().unwrap_or_else(|| "no candidates".to_string())
            ))
        })?;

        info!(model = %self.model, chars = text.len(), "gemini transcription completed");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if any are non-empty.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Some(format!("blocked: {reason}"));
        }
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.clone())
            .map(|reason| format!("finish reason: {reason}"))
    }
}
