//! Tempo resolution with fallback policy
//!
//! Explicit caller tempos pass through untouched. Auto-detection is
//! best-effort: any decode or estimation failure, or an implausible result,
//! degrades to [`FALLBACK_TEMPO`] plus an advisory message.

use crate::models::TempoRequest;
use crate::services::TempoEstimator;
use crate::utils::AudioLoader;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Tempo used whenever auto-detection fails
pub const FALLBACK_TEMPO: u32 = 120;

/// Inclusive band of detected tempos accepted as plausible
pub const PLAUSIBLE_TEMPO_RANGE: std::ops::RangeInclusive<i64> = 40..=250;

/// Tempo handed to the transcription engine, plus why detection failed (if it did)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoResolution {
    pub tempo: u32,
    pub error: Option<String>,
}

impl TempoResolution {
    fn fallback(error: String) -> Self {
        Self {
            tempo: FALLBACK_TEMPO,
            error: Some(error),
        }
    }
}

/// Decide the transcription tempo. Never fails.
pub fn resolve_tempo(
    request: TempoRequest,
    input_path: &Path,
    loader: &dyn AudioLoader,
    estimator: &dyn TempoEstimator,
    max_duration_seconds: f64,
) -> TempoResolution {
    match request {
        TempoRequest::Explicit(bpm) => {
            tracing::debug!(tempo = bpm, "Using caller-supplied tempo");
            TempoResolution {
                tempo: bpm,
                error: None,
            }
        }
        TempoRequest::AutoDetect => {
            auto_detect(input_path, loader, estimator, max_duration_seconds)
        }
    }
}

fn auto_detect(
    input_path: &Path,
    loader: &dyn AudioLoader,
    estimator: &dyn TempoEstimator,
    max_duration_seconds: f64,
) -> TempoResolution {
    // Third-party decoders can panic on malformed input; treat that like any other failure
    let estimate = catch_unwind(AssertUnwindSafe(|| {
        let audio = loader
            .load(input_path, max_duration_seconds)
            .map_err(|e| format!("{:#}", e))?;
        tracing::debug!(
            sample_rate = audio.sample_rate,
            channels = audio.channels,
            seconds = audio.duration_seconds,
            "Decoded audio for tempo detection"
        );
        estimator
            .estimate(&audio.samples, audio.sample_rate)
            .and_then(|estimate| estimate.to_scalar())
            .map_err(|e| e.to_string())
    }))
    .unwrap_or_else(|_| Err("Tempo estimation panicked".to_string()));

    let bpm = match estimate {
        Ok(raw) => raw.round() as i64,
        Err(error) => {
            tracing::warn!(path = %input_path.display(), error = %error, "Tempo detection failed");
            return TempoResolution::fallback(error);
        }
    };

    if !PLAUSIBLE_TEMPO_RANGE.contains(&bpm) {
        tracing::warn!(detected = bpm, "Detected tempo out of range, using fallback");
        return TempoResolution::fallback(format!("Tempo out of range: {}", bpm));
    }

    tracing::info!(tempo = bpm, "Detected tempo");
    TempoResolution {
        // In range, so the conversion cannot fail
        tempo: u32::try_from(bpm).unwrap_or(FALLBACK_TEMPO),
        error: None,
    }
}
