use super::ProviderError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One audio slice ready for upload.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, upload: AudioUpload) -> Result<String, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    text: String,
}

/// Transcription client for any OpenAI-compatible `audio/transcriptions`
/// endpoint.
pub struct HttpSpeechToText {
    client: reqwest::Client,
    base_url: String,
    model: String,
    language: Option<String>,
}

impl HttpSpeechToText {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        language: Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ProviderError::Config(format!("invalid API key header: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            language,
        })
    }
}

#[async_trait::async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, upload: AudioUpload) -> Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(
            "sending {} byte slice {} to {}",
            upload.bytes.len(),
            upload.file_name,
            url
        );

        let audio_part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;

        let mut form = Form::new()
            .part("file", audio_part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", "0");

        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let body: TranscriptionBody = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(format!("invalid transcription JSON: {}", e)))?;

        Ok(body.text.trim().to_string())
    }
}
