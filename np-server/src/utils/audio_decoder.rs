//! Audio Decoding Utilities
//!
//! **Purpose:** Decode the leading portion of an uploaded file to mono f32 PCM
//! for tempo estimation.
//!
//! Uses symphonia for format-agnostic decoding (MP3, FLAC, AAC, WAV, OGG, ...).
//! Samples stay at the file's native sample rate; no resampling is done.

use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decoded audio result
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono audio samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration of the decoded prefix in seconds
    pub duration_seconds: f64,
}

/// Source of decoded audio for tempo estimation
///
/// Implementations block; callers run them on the blocking thread pool.
pub trait AudioLoader: Send + Sync {
    /// Decode at most `max_duration_seconds` of `path` at its native sample rate
    fn load(&self, path: &Path, max_duration_seconds: f64) -> Result<DecodedAudio>;
}

/// [`AudioLoader`] backed by symphonia
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaLoader;

impl AudioLoader for SymphoniaLoader {
    fn load(&self, path: &Path, max_duration_seconds: f64) -> Result<DecodedAudio> {
        decode_audio_prefix(path, max_duration_seconds)
    }
}

/// Decode up to `max_duration_seconds` of an audio file to mono f32 samples
///
/// **Algorithm:**
/// 1. Probe the container (extension used as a hint)
/// 2. Pick the first track with a known codec
/// 3. Decode packets until the duration ceiling or end of stream
/// 4. Average channels down to mono
///
/// Corrupt packets are skipped; any other decoder error aborts.
pub fn decode_audio_prefix(file_path: &Path, max_duration_seconds: f64) -> Result<DecodedAudio> {
    tracing::debug!(
        path = %file_path.display(),
        max_duration_seconds,
        "Decoding audio prefix"
    );

    let file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open audio file: {}", file_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio file: {}", file_path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in file")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate unknown")?;
    let channel_count = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("Failed to create decoder for: {}", file_path.display()))?;

    let max_samples = (max_duration_seconds.max(0.0) * sample_rate as f64) as usize;
    let mut samples: Vec<f32> = Vec::with_capacity(max_samples.min(sample_rate as usize * 60));

    while samples.len() < max_samples {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(anyhow::anyhow!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => samples.extend(mix_to_mono(&decoded)),
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!(path = %file_path.display(), error = msg, "Skipping corrupt packet");
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to decode packet in: {}", file_path.display()));
            }
        }
    }

    samples.truncate(max_samples);
    let duration_seconds = samples.len() as f64 / sample_rate as f64;

    tracing::debug!(
        path = %file_path.display(),
        sample_rate,
        channels = channel_count,
        duration_seconds = format!("{:.2}", duration_seconds),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channel_count,
        duration_seconds,
    })
}

/// Convert any symphonia buffer to mono f32 by averaging channels
fn mix_to_mono(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::U8(buf) => average_channels(&**buf),
        AudioBufferRef::U16(buf) => average_channels(&**buf),
        AudioBufferRef::U24(buf) => average_channels(&**buf),
        AudioBufferRef::U32(buf) => average_channels(&**buf),
        AudioBufferRef::S8(buf) => average_channels(&**buf),
        AudioBufferRef::S16(buf) => average_channels(&**buf),
        AudioBufferRef::S24(buf) => average_channels(&**buf),
        AudioBufferRef::S32(buf) => average_channels(&**buf),
        AudioBufferRef::F32(buf) => average_channels(&**buf),
        AudioBufferRef::F64(buf) => average_channels(&**buf),
    }
}

fn average_channels<S>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count();
    if num_channels == 0 {
        return Vec::new();
    }

    let mut mono = vec![0.0f32; buf.frames()];
    for ch in 0..num_channels {
        for (acc, &sample) in mono.iter_mut().zip(buf.chan(ch)) {
            *acc += f32::from_sample(sample);
        }
    }
    let scale = 1.0 / num_channels as f32;
    mono.iter_mut().for_each(|s| *s *= scale);
    mono
}
