use crate::audio;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// A live audio input. `next_chunk` yields mono 16-bit PCM as it is
/// captured and returns `None` when the stream ends. `release` frees the
/// underlying capture resource and is called on every capture exit path.
#[async_trait::async_trait]
pub trait AudioSource: Send + 'static {
    fn sample_rate(&self) -> u32;

    async fn next_chunk(&mut self) -> Option<Vec<i16>>;

    fn release(&mut self);
}

/// Source fed by an external producer over a channel, for callers that
/// capture audio elsewhere and push it in.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Vec<i16>>,
    sample_rate: u32,
    released: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct ChannelSourceHandle {
    tx: mpsc::UnboundedSender<Vec<i16>>,
    released: Arc<AtomicBool>,
}

impl ChannelSource {
    pub fn new(sample_rate: u32) -> (ChannelSourceHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let released = Arc::new(AtomicBool::new(false));
        let handle = ChannelSourceHandle { tx, released: Arc::clone(&released) };
        (handle, Self { rx, sample_rate, released })
    }
}

impl ChannelSourceHandle {
    pub fn feed(&self, samples: Vec<i16>) {
        let _ = self.tx.send(samples);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AudioSource for ChannelSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        self.rx.recv().await
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

/// Plays a WAV file back as if it were being captured live, pacing chunks at
/// real time so the slice cutter sees a realistic stream.
pub struct WavFileSource {
    samples: Vec<i16>,
    sample_rate: u32,
    position: usize,
    chunk_len: usize,
}

const CHUNK_MS: u64 = 100;

impl WavFileSource {
    pub fn open(path: &Path) -> Result<Self, hound::Error> {
        let (samples, sample_rate) = audio::read_wav_mono(path)?;
        let chunk_len = (sample_rate as u64 * CHUNK_MS / 1000) as usize;
        Ok(Self { samples, sample_rate, position: 0, chunk_len: chunk_len.max(1) })
    }

    /// Total playback duration of the file.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

#[async_trait::async_trait]
impl AudioSource for WavFileSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        if self.position >= self.samples.len() {
            return None;
        }

        tokio::time::sleep(Duration::from_millis(CHUNK_MS)).await;

        let end = (self.position + self.chunk_len).min(self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;
        Some(chunk)
    }

    fn release(&mut self) {
        self.position = self.samples.len();
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_yields_fed_chunks_then_ends() {
        let (handle, mut source) = ChannelSource::new(16_000);
        handle.feed(vec![1, 2, 3]);
        assert_eq!(source.next_chunk().await, Some(vec![1, 2, 3]));

        drop(handle);
        assert_eq!(source.next_chunk().await, None);
    }

    #[tokio::test]
    async fn channel_source_reports_release() {
        let (handle, mut source) = ChannelSource::new(16_000);
        assert!(!handle.is_released());
        source.release();
        assert!(handle.is_released());
        assert_eq!(source.next_chunk().await, None);
    }
}
