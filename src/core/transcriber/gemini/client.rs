//! Gemini transcription client
//!
//! Talks to the Google AI Studio `generateContent` endpoint, sending the
//! media inline and asking for a time-coded JSON transcript. The API key
//! travels as a `key=` query parameter, so transport errors can embed it
//! in the URL they report; callers must sanitize any error text they
//! surface.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::core::transcriber::error::TranscribeError;
use crate::core::transcriber::types::{Segment, TranscribeRequest, Transcript};
use crate::core::transcriber::Transcriber;

use super::error::GeminiErrorMapper;
use super::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Gemini-backed implementation of the transcription service boundary
#[derive(Debug, Clone)]
pub struct GeminiTranscriber {
    http_client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl GeminiTranscriber {
    pub fn new(request_timeout: Duration) -> Result<Self, TranscribeError> {
        let http_client = ClientBuilder::new()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TranscribeError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout,
        })
    }

    /// Point the client at a different endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn map_transport_error(&self, e: reqwest::Error) -> TranscribeError {
        if e.is_timeout() {
            TranscribeError::Timeout(self.request_timeout)
        } else {
            TranscribeError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(
        &self,
        request: &TranscribeRequest,
        credential: &str,
    ) -> Result<Transcript, TranscribeError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline_data(request.mime_type.clone(), STANDARD.encode(&request.media)),
                    Part::text(build_prompt(&request.language)),
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, credential
        );

        debug!(
            model = %request.model,
            media_bytes = request.media.len(),
            "sending transcription request"
        );

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeminiErrorMapper::from_http_status(
                status.as_u16(),
                &error_body,
            ));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Parse(format!("malformed response body: {}", e)))?;

        let text = payload
            .first_text()
            .ok_or_else(|| TranscribeError::Parse("response contained no text".to_string()))?;

        Ok(parse_transcript(&text, &request.language))
    }

    async fn verify_key(&self, credential: &str) -> Result<(), TranscribeError> {
        let url = format!("{}/models?key={}&pageSize=1", self.base_url, credential);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        Err(GeminiErrorMapper::from_http_status(
            status.as_u16(),
            &error_body,
        ))
    }
}

fn build_prompt(language: &str) -> String {
    format!(
        "Transcribe the speech in this media file completely and accurately. \
         The expected language is \"{}\". \
         Respond with JSON only, shaped as \
         {{\"full_text\": \"...\", \"language\": \"...\", \
         \"segments\": [{{\"start_secs\": 0.0, \"end_secs\": 4.2, \"text\": \"...\"}}]}}. \
         Timestamps are seconds from the start of the media.",
        language
    )
}

/// Lenient shape of the transcript JSON the model is asked for
#[derive(Deserialize)]
struct TranscriptPayload {
    full_text: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

/// Parse the model's reply into a [`Transcript`]
///
/// Models intermittently wrap JSON in markdown fences despite being told
/// otherwise; strip them before parsing. A reply that still fails to
/// parse as JSON is kept wholesale as plain text rather than discarded.
fn parse_transcript(text: &str, fallback_language: &str) -> Transcript {
    let stripped = strip_code_fences(text);

    match serde_json::from_str::<TranscriptPayload>(stripped) {
        Ok(payload) => Transcript {
            full_text: payload.full_text,
            language: if payload.language.is_empty() {
                fallback_language.to_string()
            } else {
                payload.language
            },
            segments: payload.segments,
        },
        Err(_) => Transcript {
            full_text: text.trim().to_string(),
            language: fallback_language.to_string(),
            segments: Vec::new(),
        },
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let opened = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let closed = opened.strip_suffix("```").unwrap_or(opened);
    closed.trim()
}
