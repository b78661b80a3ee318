//! Request parameters for `POST /predict`

/// Default onset detection threshold
pub const DEFAULT_ONSET_THRESHOLD: f32 = 0.5;
/// Default frame detection threshold
pub const DEFAULT_FRAME_THRESHOLD: f32 = 0.3;
/// Default minimum note length in milliseconds
pub const DEFAULT_MIN_NOTE_LENGTH: f32 = 58.0;

/// How the transcription tempo is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TempoRequest {
    /// Caller supplied a positive BPM; used verbatim, never range-checked
    Explicit(u32),
    /// Estimate the tempo from the audio
    #[default]
    AutoDetect,
}

impl TempoRequest {
    /// Interpret the `midi_tempo` form field: positive means explicit, anything else auto-detect
    pub fn from_form_value(value: i64) -> Self {
        if value > 0 {
            // Saturate absurdly large values instead of wrapping
            TempoRequest::Explicit(u32::try_from(value).unwrap_or(u32::MAX))
        } else {
            TempoRequest::AutoDetect
        }
    }
}

/// Note detection thresholds forwarded to the transcription engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThresholds {
    pub onset_threshold: f32,
    pub frame_threshold: f32,
    /// Minimum note length in milliseconds
    pub min_note_length: f32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            onset_threshold: DEFAULT_ONSET_THRESHOLD,
            frame_threshold: DEFAULT_FRAME_THRESHOLD,
            min_note_length: DEFAULT_MIN_NOTE_LENGTH,
        }
    }
}

/// A parsed prediction request. Lives only for the duration of one request.
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub audio: Vec<u8>,
    pub original_filename: String,
    pub thresholds: DetectionThresholds,
    pub tempo: TempoRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_form_value_is_explicit() {
        assert_eq!(TempoRequest::from_form_value(97), TempoRequest::Explicit(97));
        assert_eq!(TempoRequest::from_form_value(300), TempoRequest::Explicit(300));
    }

    #[test]
    fn zero_and_negative_mean_auto_detect() {
        assert_eq!(TempoRequest::from_form_value(0), TempoRequest::AutoDetect);
        assert_eq!(TempoRequest::from_form_value(-5), TempoRequest::AutoDetect);
    }

    #[test]
    fn huge_values_saturate() {
        assert_eq!(
            TempoRequest::from_form_value(i64::MAX),
            TempoRequest::Explicit(u32::MAX)
        );
    }

    #[test]
    fn threshold_defaults() {
        let t = DetectionThresholds::default();
        assert_eq!(t.onset_threshold, 0.5);
        assert_eq!(t.frame_threshold, 0.3);
        assert_eq!(t.min_note_length, 58.0);
    }
}
