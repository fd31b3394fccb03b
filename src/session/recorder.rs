use super::backend::{SliceSubmission, TranscriptionBackend};
use super::source::AudioSource;
use crate::audio;
use crate::pipeline::merge_partials;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a recording is already active")]
    AlreadyRecording,
    #[error("no recording is active")]
    NotRecording,
}

/// Where the session currently is in its lifecycle. Observers can use this
/// to tell "still transcribing" apart from "formatting".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Recording,
    Draining,
    Completing,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How much audio goes into one slice.
    pub slice_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { slice_interval: Duration::from_secs(5) }
    }
}

/// State shared between the session, its capture task, and the submission
/// tasks. Owned by one session; cleared on reset so repeated start/stop
/// cycles cannot leak partials between runs.
struct Shared {
    partials: DashMap<u32, String>,
    transcription_id: Mutex<Option<i64>>,
    text_tx: watch::Sender<String>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl Shared {
    fn set_phase(&self, phase: SessionPhase) {
        let _ = self.phase_tx.send(phase);
    }

    /// Recompute the merged text from the partials and publish it.
    fn publish_merged(&self) {
        let merged =
            merge_partials(self.partials.iter().map(|e| (*e.key(), e.value().clone())));
        let _ = self.text_tx.send(merged);
    }
}

/// Recording orchestrator.
///
/// `start` spawns a capture loop that interleaves source chunks with a
/// fixed-interval cutter on one timeline. Each cut slice is submitted
/// without blocking the cutter; responses fill the partial map keyed by
/// slice index, so network reordering cannot scramble the transcript.
/// `stop` flushes the remaining buffer, releases the source immediately,
/// drains outstanding submissions, and asks the backend to finalize.
pub struct DictationSession {
    backend: Arc<dyn TranscriptionBackend>,
    config: SessionConfig,
    shared: Arc<Shared>,
    submissions: Arc<Mutex<JoinSet<()>>>,
    capture: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl DictationSession {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, config: SessionConfig) -> Self {
        let (text_tx, _) = watch::channel(String::new());
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);

        Self {
            backend,
            config,
            shared: Arc::new(Shared {
                partials: DashMap::new(),
                transcription_id: Mutex::new(None),
                text_tx,
                phase_tx,
            }),
            submissions: Arc::new(Mutex::new(JoinSet::new())),
            capture: None,
            stop_tx: None,
            started_at: None,
        }
    }

    /// Begin recording from `source`.
    pub async fn start<S: AudioSource>(&mut self, source: S) -> Result<(), SessionError> {
        if self.capture.is_some() {
            return Err(SessionError::AlreadyRecording);
        }

        self.shared.partials.clear();
        *self.shared.transcription_id.lock().await = None;
        let _ = self.shared.text_tx.send(String::new());
        self.shared.set_phase(SessionPhase::Recording);

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);
        self.started_at = Some(chrono::Utc::now());

        let shared = Arc::clone(&self.shared);
        let backend = Arc::clone(&self.backend);
        let submissions = Arc::clone(&self.submissions);
        let slice_interval = self.config.slice_interval;

        self.capture = Some(tokio::spawn(capture_loop(
            source,
            slice_interval,
            shared,
            backend,
            submissions,
            stop_rx,
        )));

        Ok(())
    }

    /// Stop recording, wait for every outstanding slice, and finalize.
    ///
    /// Returns the finalized text, or `None` when nothing was transcribed or
    /// the completion call failed; in the failure case the best available
    /// merged text stays published rather than being discarded.
    pub async fn stop(&mut self) -> Result<Option<String>, SessionError> {
        let handle = self.capture.take().ok_or(SessionError::NotRecording)?;
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Err(e) = handle.await {
            error!("capture task panicked: {:?}", e);
        }

        if let Some(started_at) = self.started_at.take() {
            let elapsed = chrono::Utc::now() - started_at;
            info!("recording stopped after {}s", elapsed.num_seconds());
        }

        // The source is released by now; only network completions remain.
        self.shared.set_phase(SessionPhase::Draining);
        {
            let mut submissions = self.submissions.lock().await;
            while let Some(result) = submissions.join_next().await {
                if let Err(e) = result {
                    error!("slice submission task failed: {:?}", e);
                }
            }
        }

        let transcription_id = *self.shared.transcription_id.lock().await;
        let final_text = match transcription_id {
            None => {
                info!("no slices produced a transcription, nothing to finalize");
                None
            }
            Some(id) => {
                self.shared.set_phase(SessionPhase::Completing);
                match self.backend.complete(id).await {
                    Ok(text) => {
                        let _ = self.shared.text_tx.send(text.clone());
                        self.shared.partials.clear();
                        *self.shared.transcription_id.lock().await = None;
                        Some(text)
                    }
                    Err(e) => {
                        error!("completing transcription {} failed, keeping merged text: {}", id, e);
                        None
                    }
                }
            }
        };

        self.shared.set_phase(SessionPhase::Idle);
        Ok(final_text)
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.shared.phase_tx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.shared.phase_tx.subscribe()
    }

    /// The latest merged (or finalized) text.
    pub fn merged_text(&self) -> String {
        self.shared.text_tx.borrow().clone()
    }

    pub fn subscribe_text(&self) -> watch::Receiver<String> {
        self.shared.text_tx.subscribe()
    }

    /// Slice submissions still waiting on the backend.
    pub async fn pending_slices(&self) -> usize {
        self.submissions.lock().await.len()
    }
}

async fn capture_loop<S: AudioSource>(
    mut source: S,
    slice_interval: Duration,
    shared: Arc<Shared>,
    backend: Arc<dyn TranscriptionBackend>,
    submissions: Arc<Mutex<JoinSet<()>>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let sample_rate = source.sample_rate();
    let mut buffer: Vec<i16> = Vec::new();
    let mut next_index: u32 = 0;

    // First cut happens one full interval in.
    let mut cutter = interval_at(Instant::now() + slice_interval, slice_interval);
    cutter.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            chunk = source.next_chunk() => match chunk {
                Some(samples) => buffer.extend_from_slice(&samples),
                None => break,
            },
            _ = cutter.tick() => {
                cut_and_submit(
                    &mut buffer,
                    &mut next_index,
                    sample_rate,
                    &shared,
                    &backend,
                    &submissions,
                )
                .await;
            }
            _ = stop_rx.changed() => break,
        }
    }

    // Flush whatever is still buffered as the final slice, then free the
    // input right away; outstanding submissions keep running on their own.
    cut_and_submit(&mut buffer, &mut next_index, sample_rate, &shared, &backend, &submissions)
        .await;
    source.release();

    info!("capture ended after {} slices", next_index);
}

/// Cut the buffered samples into a slice and submit it without waiting for
/// the response.
async fn cut_and_submit(
    buffer: &mut Vec<i16>,
    next_index: &mut u32,
    sample_rate: u32,
    shared: &Arc<Shared>,
    backend: &Arc<dyn TranscriptionBackend>,
    submissions: &Arc<Mutex<JoinSet<()>>>,
) {
    if buffer.is_empty() {
        return;
    }

    let samples = std::mem::take(buffer);
    let index = *next_index;
    *next_index += 1;

    let wav = match audio::encode_wav(&samples, sample_rate) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to encode slice {}: {}", index, e);
            return;
        }
    };

    let shared = Arc::clone(shared);
    let backend = Arc::clone(backend);

    submissions.lock().await.spawn(async move {
        let transcription_id = *shared.transcription_id.lock().await;
        let submission = SliceSubmission {
            audio: wav,
            file_name: format!("slice-{}.wav", index),
            index,
            transcription_id,
        };

        match backend.submit_slice(submission).await {
            Ok(partial) => {
                {
                    let mut id = shared.transcription_id.lock().await;
                    if id.is_none() {
                        *id = Some(partial.transcription_id);
                    }
                }
                shared.partials.insert(partial.index, partial.text);
                shared.publish_merged();
            }
            // No retry: the merge step tolerates the resulting gap.
            Err(e) => warn!("slice {} failed, leaving a gap: {}", index, e),
        }
    });
}
