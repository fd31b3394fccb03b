//! Client-side recording orchestrator.
//!
//! A session cuts the captured audio into fixed-interval slices, submits each
//! slice without blocking the cutter, tracks outstanding submissions, and on
//! stop drains them all before asking the backend to finalize the
//! transcription.

mod backend;
mod recorder;
mod source;

pub use backend::{BackendError, SlicePartial, SliceSubmission, TranscriptionBackend};
pub use recorder::{DictationSession, SessionConfig, SessionError, SessionPhase};
pub use source::{AudioSource, ChannelSource, ChannelSourceHandle, WavFileSource};
