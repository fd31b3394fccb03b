//! Server-side operations behind the recording client: slice submission,
//! transcription completion, and the per-user transcription and dictionary
//! CRUD. Callers pass an already-authenticated user id; ownership of every
//! addressed row is verified before any processing happens.

use crate::db::{self, DbPool, DictionaryRow, TranscriptionRow};
use crate::pipeline::{DictionaryEntry, format_text, merge_partials};
use crate::provider::{AudioUpload, ChatModel, ProviderError, SpeechToText};
use crate::session::{SlicePartial, SliceSubmission, TranscriptionBackend};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("not authorized to access this resource")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    /// Stable machine-readable code for callers that map errors to messages.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Provider(e) => e.code(),
            ServiceError::Database(_) => "database_error",
        }
    }
}

/// One audio slice submitted for transcription.
#[derive(Debug, Clone)]
pub struct SliceUpload {
    pub audio: Vec<u8>,
    pub file_name: String,
    pub slice_index: u32,
    pub transcription_id: Option<i64>,
}

/// Result of a slice submission: the owning transcription (created on demand
/// when none was supplied), the echoed index, and the partial text.
#[derive(Debug, Clone)]
pub struct SliceOutcome {
    pub transcription_id: i64,
    pub index: u32,
    pub text: String,
}

pub struct TranscriptionService {
    db: DbPool,
    stt: Arc<dyn SpeechToText>,
    chat: Arc<dyn ChatModel>,
}

impl TranscriptionService {
    pub fn new(db: DbPool, stt: Arc<dyn SpeechToText>, chat: Arc<dyn ChatModel>) -> Self {
        Self { db, stt, chat }
    }

    /// Fetch a transcription and verify it belongs to `user_id`. Missing and
    /// foreign rows are indistinguishable to the caller.
    async fn owned_transcription(
        &self,
        user_id: i64,
        transcription_id: i64,
    ) -> Result<TranscriptionRow, ServiceError> {
        let row = db::get_transcription(&self.db, transcription_id)
            .await?
            .ok_or(ServiceError::Unauthorized)?;
        if row.user_id != user_id {
            return Err(ServiceError::Unauthorized);
        }
        Ok(row)
    }

    /// Transcribe one audio slice and store the partial text at its index.
    ///
    /// When no transcription id is supplied a new transcription is created
    /// and its id returned for use on subsequent slices. A provider failure
    /// propagates as a typed error and leaves no slice row, producing an
    /// index gap the merge step tolerates.
    pub async fn submit_slice(
        &self,
        user_id: i64,
        upload: SliceUpload,
    ) -> Result<SliceOutcome, ServiceError> {
        if upload.audio.is_empty() {
            return Err(ServiceError::BadRequest("no audio"));
        }

        let transcription_id = match upload.transcription_id {
            Some(id) => self.owned_transcription(user_id, id).await?.id,
            None => {
                let id = db::create_transcription(&self.db, user_id).await?;
                info!("created transcription {} for user {}", id, user_id);
                id
            }
        };

        let text = self
            .stt
            .transcribe(AudioUpload {
                bytes: upload.audio,
                file_name: upload.file_name,
                mime_type: "audio/wav".to_string(),
            })
            .await?;

        db::insert_slice(&self.db, transcription_id, upload.slice_index, &text).await?;

        Ok(SliceOutcome { transcription_id, index: upload.slice_index, text })
    }

    /// Merge the stored slices, apply the user's dictionary, polish, and
    /// persist the final text.
    ///
    /// Completing an already-done transcription returns the stored final
    /// text without re-running the pipeline, so the processing to done
    /// transition happens exactly once.
    pub async fn complete_transcription(
        &self,
        user_id: i64,
        transcription_id: i64,
    ) -> Result<String, ServiceError> {
        let row = self.owned_transcription(user_id, transcription_id).await?;

        if row.status == db::STATUS_DONE {
            if let Some(final_text) = row.final_text {
                return Ok(final_text);
            }
            warn!("transcription {} is done but has no final text", row.id);
        }

        let slices = db::slices_for_transcription(&self.db, row.id).await?;
        let merged = merge_partials(
            slices
                .iter()
                .map(|s| (s.slice_index as u32, s.partial_text.clone().unwrap_or_default())),
        );

        let entries: Vec<DictionaryEntry> = db::dictionary_for_user(&self.db, user_id)
            .await?
            .into_iter()
            .map(DictionaryEntry::from)
            .collect();

        let final_text = format_text(&merged, &entries, self.chat.as_ref()).await;

        db::mark_transcription_done(&self.db, row.id, &final_text).await?;
        info!(
            "completed transcription {} ({} slices, {} chars)",
            row.id,
            slices.len(),
            final_text.len()
        );

        Ok(final_text)
    }

    pub async fn list_transcriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<TranscriptionRow>, ServiceError> {
        Ok(db::list_transcriptions(&self.db, user_id).await?)
    }

    pub async fn get_transcription(
        &self,
        user_id: i64,
        transcription_id: i64,
    ) -> Result<TranscriptionRow, ServiceError> {
        self.owned_transcription(user_id, transcription_id).await
    }

    pub async fn delete_transcription(
        &self,
        user_id: i64,
        transcription_id: i64,
    ) -> Result<(), ServiceError> {
        let row = self.owned_transcription(user_id, transcription_id).await?;
        db::delete_transcription(&self.db, row.id).await?;
        Ok(())
    }

    pub async fn dictionary_entries(
        &self,
        user_id: i64,
    ) -> Result<Vec<DictionaryRow>, ServiceError> {
        Ok(db::dictionary_for_user(&self.db, user_id).await?)
    }

    pub async fn add_dictionary_entry(
        &self,
        user_id: i64,
        phrase: &str,
        replacement: &str,
    ) -> Result<DictionaryRow, ServiceError> {
        if phrase.trim().is_empty() || replacement.trim().is_empty() {
            return Err(ServiceError::BadRequest("missing fields"));
        }
        Ok(db::add_dictionary_entry(&self.db, user_id, phrase, replacement).await?)
    }

    pub async fn delete_dictionary_entry(
        &self,
        user_id: i64,
        entry_id: i64,
    ) -> Result<(), ServiceError> {
        let entry = db::get_dictionary_entry(&self.db, entry_id)
            .await?
            .ok_or(ServiceError::Unauthorized)?;
        if entry.user_id != user_id {
            return Err(ServiceError::Unauthorized);
        }
        db::delete_dictionary_entry(&self.db, entry.id).await?;
        Ok(())
    }
}

/// In-process backend for a recording session, scoped to one user.
pub struct ServiceBackend {
    service: Arc<TranscriptionService>,
    user_id: i64,
}

impl ServiceBackend {
    pub fn new(service: Arc<TranscriptionService>, user_id: i64) -> Self {
        Self { service, user_id }
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for ServiceBackend {
    async fn submit_slice(
        &self,
        slice: SliceSubmission,
    ) -> Result<SlicePartial, crate::session::BackendError> {
        let outcome = self
            .service
            .submit_slice(
                self.user_id,
                SliceUpload {
                    audio: slice.audio,
                    file_name: slice.file_name,
                    slice_index: slice.index,
                    transcription_id: slice.transcription_id,
                },
            )
            .await?;

        Ok(SlicePartial {
            transcription_id: outcome.transcription_id,
            index: outcome.index,
            text: outcome.text,
        })
    }

    async fn complete(
        &self,
        transcription_id: i64,
    ) -> Result<String, crate::session::BackendError> {
        Ok(self
            .service
            .complete_transcription(self.user_id, transcription_id)
            .await?)
    }
}
