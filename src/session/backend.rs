/// Errors crossing the backend seam; concrete backends carry their own types.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// One cut slice on its way to the backend.
#[derive(Debug, Clone)]
pub struct SliceSubmission {
    pub audio: Vec<u8>,
    pub file_name: String,
    pub index: u32,
    /// Transcription this slice belongs to, once one is known. The first
    /// slice goes out without an id and the backend creates one.
    pub transcription_id: Option<i64>,
}

/// Partial transcript returned for one slice.
#[derive(Debug, Clone)]
pub struct SlicePartial {
    pub transcription_id: i64,
    pub index: u32,
    pub text: String,
}

/// The server-side collaborator a session records against.
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send + Sync + 'static {
    async fn submit_slice(&self, slice: SliceSubmission) -> Result<SlicePartial, BackendError>;

    /// Merge, format, and persist the final text for a transcription.
    async fn complete(&self, transcription_id: i64) -> Result<String, BackendError>;
}
