//! PCM helpers for slice encoding and file input.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;

/// Sample rate used when a source does not dictate one.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

pub fn stereo_to_mono(stereo: &[i16]) -> Vec<i16> {
    stereo
        .chunks(2)
        .map(|chunk| {
            if chunk.len() == 2 {
                ((chunk[0] as i32 + chunk[1] as i32) / 2) as i16
            } else {
                chunk[0]
            }
        })
        .collect()
}

/// Encode mono 16-bit PCM samples into an in-memory WAV file, ready to be
/// uploaded as one slice.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(buffer.into_inner())
}

/// Read a 16-bit PCM WAV file as mono samples, downmixing stereo.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<i16>, u32), hound::Error> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(hound::Error::Unsupported);
    }

    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    let mono = match spec.channels {
        1 => samples,
        2 => stereo_to_mono(&samples),
        _ => return Err(hound::Error::Unsupported),
    };

    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_pairs() {
        assert_eq!(stereo_to_mono(&[100, 200, -50, 50]), vec![150, 0]);
    }

    #[test]
    fn downmix_keeps_trailing_sample() {
        assert_eq!(stereo_to_mono(&[10, 20, 30]), vec![15, 30]);
    }

    #[test]
    fn encode_produces_riff_header() {
        let bytes = encode_wav(&[0, 1, -1, 32000], DEFAULT_SAMPLE_RATE).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }

    #[test]
    fn encode_then_read_round_trips() {
        let samples = vec![0i16, 128, -128, 1000];
        let bytes = encode_wav(&samples, DEFAULT_SAMPLE_RATE).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slice.wav");
        std::fs::write(&path, &bytes).unwrap();

        let (read, rate) = read_wav_mono(&path).unwrap();
        assert_eq!(read, samples);
        assert_eq!(rate, DEFAULT_SAMPLE_RATE);
    }
}
