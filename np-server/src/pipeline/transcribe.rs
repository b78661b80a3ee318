//! Transcription invocation and output verification

use super::tempo::TempoResolution;
use super::PipelineError;
use crate::models::{DetectionThresholds, TranscriptionResult, WorkItem};
use crate::services::{derive_output_path, TranscriptionEngine, TranscriptionJob};

/// Run the engine for one work item and confirm the MIDI file was written
///
/// Engine errors are not retried.
pub fn invoke_transcription(
    engine: &dyn TranscriptionEngine,
    work_item: &WorkItem,
    thresholds: DetectionThresholds,
    tempo: &TempoResolution,
) -> Result<TranscriptionResult, PipelineError> {
    let job = TranscriptionJob {
        input_path: work_item.input_path.clone(),
        output_dir: work_item.output_dir.clone(),
        thresholds,
        midi_tempo: tempo.tempo,
    };

    tracing::info!(
        input = %job.input_path.display(),
        tempo = job.midi_tempo,
        onset_threshold = thresholds.onset_threshold,
        frame_threshold = thresholds.frame_threshold,
        min_note_length = thresholds.min_note_length,
        "Running transcription"
    );

    engine
        .transcribe(&job)
        .map_err(|e| PipelineError::Transcription(e.to_string()))?;

    let output_path = derive_output_path(&work_item.output_dir, &work_item.input_path);
    if !output_path.exists() {
        return Err(PipelineError::MissingOutput(output_path));
    }

    Ok(TranscriptionResult {
        output_path,
        detected_tempo: tempo.tempo,
        tempo_error: tempo.error.clone(),
    })
}
