//! Boundary clients for the external transcription and chat providers.
//!
//! Both providers sit behind traits so the pipeline and session can be
//! exercised without network access.

mod chat;
mod stt;

pub use chat::{ChatModel, ChatRequest, HttpChatModel};
pub use stt::{AudioUpload, HttpSpeechToText, SpeechToText};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider quota or rate limit exceeded")]
    QuotaExhausted,
    #[error("provider rejected the API credentials")]
    InvalidApiKey,
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed provider response: {0}")]
    Response(String),
    #[error("invalid provider configuration: {0}")]
    Config(String),
}

impl ProviderError {
    /// Stable machine-readable code, suitable for surfacing to callers that
    /// need to show an actionable message.
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::QuotaExhausted => "insufficient_quota",
            ProviderError::InvalidApiKey => "invalid_api_key",
            ProviderError::Http { .. } => "provider_error",
            ProviderError::Request(_) => "request_failed",
            ProviderError::Response(_) => "bad_response",
            ProviderError::Config(_) => "provider_misconfigured",
        }
    }

    /// Map a non-success HTTP status from a provider to the taxonomy.
    ///
    /// Providers wrap failures as `{"error": {"message", "code"}}`; the code
    /// is honored even when the status alone is ambiguous, so a 400 carrying
    /// `insufficient_quota` still surfaces as a quota error.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error);
        let code = detail.as_ref().and_then(|d| d.code.as_deref());

        match (status.as_u16(), code) {
            (429, _) | (_, Some("insufficient_quota")) => ProviderError::QuotaExhausted,
            (401, _) | (_, Some("invalid_api_key")) => ProviderError::InvalidApiKey,
            (status, _) => ProviderError::Http {
                status,
                body: detail.and_then(|d| d.message).unwrap_or(body),
            },
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(serde::Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    code: Option<String>,
}
