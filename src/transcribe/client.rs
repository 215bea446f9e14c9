use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::audio::Segment;
use crate::config::TranscribeSettings;

/// Options passed through to the transcription service, opaque to the
/// dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeOptions {
    pub model: String,
    pub language: String,
    pub task: String,
}

impl From<&TranscribeSettings> for TranscribeOptions {
    fn from(settings: &TranscribeSettings) -> Self {
        Self {
            model: settings.model.clone(),
            language: settings.language.clone(),
            task: settings.task.clone(),
        }
    }
}

/// Where the service stored the uploaded segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMedia {
    pub filename: String,
    pub path: String,
}

/// Transcription service response: an embedded status code, the transcript
/// as newline-separated text, and the stored media location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub status: u16,
    #[serde(default)]
    pub out: String,
    #[serde(default)]
    pub file: Option<StoredMedia>,
}

/// Seam between the dispatcher and the transcription endpoint so tests can
/// inject fakes with controlled completion order.
#[async_trait::async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(
        &self,
        segment: &Segment,
        options: &TranscribeOptions,
    ) -> Result<TranscribeResponse>;
}

/// HTTP client for the transcription endpoint: multipart upload of the WAV
/// bytes plus a JSON-encoded options field.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl TranscriptionService for HttpTranscriber {
    async fn transcribe(
        &self,
        segment: &Segment,
        options: &TranscribeOptions,
    ) -> Result<TranscribeResponse> {
        debug!(
            "Uploading segment {} ({} bytes) to {}",
            segment.id,
            segment.wav.len(),
            self.endpoint
        );

        let audio_part = Part::bytes(segment.wav.clone())
            .file_name(segment.file_name())
            .mime_str("audio/wav")
            .context("Failed to create audio part")?;

        let form = Form::new()
            .part("file", audio_part)
            .text("options", serde_json::to_string(options)?);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let body = response
            .json::<TranscribeResponse>()
            .await
            .context("Malformed transcription response")?;

        Ok(body)
    }
}
