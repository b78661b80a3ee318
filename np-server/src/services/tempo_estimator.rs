//! Tempo estimation from decoded audio
//!
//! The default estimator hands mono samples to stratum-dsp, which runs onset
//! detection, tempogram and autocorrelation analysis and reports a BPM.

use stratum_dsp::{analyze_audio, AnalysisConfig};
use thiserror::Error;

/// Tempo estimator errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TempoError {
    /// Estimator produced an empty sequence
    #[error("Tempo estimator returned no value")]
    EmptyEstimate,

    /// Estimator produced NaN or infinity
    #[error("Tempo estimate is not a finite number")]
    NonFinite,

    /// Not enough audio to see at least a few beats
    #[error("Audio too short for tempo estimation ({0:.2}s)")]
    InsufficientAudio(f64),

    /// Sample rate of zero
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Analysis engine rejected the audio (silence, no onsets, ...)
    #[error("Tempo analysis failed: {0}")]
    Analysis(String),
}

/// Raw estimator output: a bare scalar or a sequence whose first element is the tempo
#[derive(Debug, Clone, PartialEq)]
pub enum TempoEstimate {
    Scalar(f64),
    Sequence(Vec<f64>),
}

impl TempoEstimate {
    /// Reduce to a single BPM value
    pub fn to_scalar(&self) -> Result<f64, TempoError> {
        let value = match self {
            TempoEstimate::Scalar(bpm) => *bpm,
            TempoEstimate::Sequence(values) => {
                *values.first().ok_or(TempoError::EmptyEstimate)?
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(TempoError::NonFinite)
        }
    }
}

/// Estimates beats-per-minute from mono samples
///
/// Implementations block; callers run them on the blocking thread pool.
pub trait TempoEstimator: Send + Sync {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<TempoEstimate, TempoError>;
}

/// [`TempoEstimator`] backed by stratum-dsp
#[derive(Debug, Clone)]
pub struct StratumTempoEstimator {
    /// BPM search band, wider than the plausibility band so outliers surface
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Minimum audio duration required
    pub min_duration_seconds: f64,
}

impl Default for StratumTempoEstimator {
    fn default() -> Self {
        Self {
            min_bpm: 30.0,
            max_bpm: 300.0,
            min_duration_seconds: 2.0,
        }
    }
}

impl StratumTempoEstimator {
    fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            min_bpm: self.min_bpm,
            max_bpm: self.max_bpm,
            ..AnalysisConfig::default()
        }
    }
}

impl TempoEstimator for StratumTempoEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<TempoEstimate, TempoError> {
        if sample_rate == 0 {
            return Err(TempoError::InvalidSampleRate(sample_rate));
        }

        let duration = samples.len() as f64 / sample_rate as f64;
        if duration < self.min_duration_seconds {
            return Err(TempoError::InsufficientAudio(duration));
        }

        let result = analyze_audio(samples, sample_rate, self.analysis_config())
            .map_err(|e| TempoError::Analysis(e.to_string()))?;

        let bpm = f64::from(result.bpm);
        tracing::debug!(
            bpm = format!("{:.2}", bpm),
            confidence = format!("{:.2}", result.bpm_confidence),
            "Tempo estimated"
        );
        Ok(TempoEstimate::Scalar(bpm))
    }
}
