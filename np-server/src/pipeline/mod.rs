//! Prediction pipeline
//!
//! `Received → Stored → TempoResolved → Transcribed → {Completed | Failed}`
//!
//! Intake persists the upload, then tempo resolution and transcription run on
//! the blocking pool together with a [`TempInput`] guard that owns the
//! uploaded file. The guard is released as soon as transcription returns, on
//! success and failure alike, and before the outcome reaches the caller.
//! Nothing is retried.

pub mod cleanup;
pub mod intake;
pub mod response;
pub mod tempo;
pub mod transcribe;

pub use cleanup::TempInput;
pub use response::MidiResponse;
pub use tempo::{resolve_tempo, TempoResolution, FALLBACK_TEMPO};
pub use transcribe::invoke_transcription;

use crate::models::{PredictRequest, TranscriptionResult, WorkItem};
use crate::services::{TempoEstimator, TranscriptionEngine};
use crate::utils::AudioLoader;
use np_common::WorkDirs;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failures that abort a prediction request
///
/// Tempo estimation failures never appear here; they degrade to a fallback.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upload could not be persisted
    #[error("Could not save file: {0}")]
    Storage(String),

    /// Transcription engine reported an error
    #[error("Prediction failed: {0}")]
    Transcription(String),

    /// Engine returned normally but wrote no MIDI file
    #[error("Prediction failed: MIDI generation failed")]
    MissingOutput(PathBuf),

    /// Worker task died or the generated file could not be read back
    #[error("Prediction failed: {0}")]
    Internal(String),
}

/// Request lifecycle stage, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Stored,
    TempoResolved,
    Transcribed,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Stored => "stored",
            Stage::TempoResolved => "tempo_resolved",
            Stage::Transcribed => "transcribed",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Successful pipeline outcome, ready for response assembly
#[derive(Debug, Clone)]
pub struct CompletedPrediction {
    /// Request bookkeeping, including the original upload name
    pub work_item: WorkItem,
    pub result: TranscriptionResult,
    pub midi: Vec<u8>,
}

/// Collaborators and settings shared by all requests
///
/// Holds no per-request state; every request gets its own `WorkItem`.
pub struct PredictionPipeline {
    dirs: WorkDirs,
    engine: Arc<dyn TranscriptionEngine>,
    audio_loader: Arc<dyn AudioLoader>,
    tempo_estimator: Arc<dyn TempoEstimator>,
    tempo_max_seconds: f64,
}

impl PredictionPipeline {
    pub fn new(
        dirs: WorkDirs,
        engine: Arc<dyn TranscriptionEngine>,
        audio_loader: Arc<dyn AudioLoader>,
        tempo_estimator: Arc<dyn TempoEstimator>,
        tempo_max_seconds: f64,
    ) -> Self {
        Self {
            dirs,
            engine,
            audio_loader,
            tempo_estimator,
            tempo_max_seconds,
        }
    }

    pub fn dirs(&self) -> &WorkDirs {
        &self.dirs
    }

    /// Run one request through every stage
    pub async fn run(&self, request: PredictRequest) -> Result<CompletedPrediction, PipelineError> {
        let PredictRequest {
            audio,
            original_filename,
            thresholds,
            tempo,
        } = request;
        tracing::debug!(stage = %Stage::Received, filename = %original_filename, "Prediction request");

        let mut work_item = intake::store_upload(&self.dirs, &original_filename, &audio).await?;
        drop(audio);
        tracing::debug!(stage = %Stage::Stored, id = %work_item.unique_id, "Upload stored");

        // The guard travels with the blocking task, so a dropped request
        // future cannot delete the input while the engine is still reading it
        let input = TempInput::new(work_item.input_path.clone());
        let outcome = {
            let engine = Arc::clone(&self.engine);
            let loader = Arc::clone(&self.audio_loader);
            let estimator = Arc::clone(&self.tempo_estimator);
            let max_seconds = self.tempo_max_seconds;
            let item = work_item.clone();

            tokio::task::spawn_blocking(move || {
                let mut input = input;
                let resolution = resolve_tempo(
                    tempo,
                    input.path(),
                    loader.as_ref(),
                    estimator.as_ref(),
                    max_seconds,
                );
                tracing::debug!(stage = %Stage::TempoResolved, tempo = resolution.tempo, "Tempo resolved");
                let result = invoke_transcription(engine.as_ref(), &item, thresholds, &resolution);
                input.release();
                (resolution, result)
            })
            .await
        };

        let result = match outcome {
            Ok((resolution, result)) => {
                work_item.resolved_tempo = Some(resolution.tempo);
                work_item.tempo_error = resolution.error;
                result
            }
            Err(join_error) => Err(PipelineError::Internal(join_error.to_string())),
        };

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    stage = %Stage::Failed,
                    id = %work_item.unique_id,
                    tempo = ?work_item.resolved_tempo,
                    error = %e,
                    "Prediction failed"
                );
                return Err(e);
            }
        };
        tracing::debug!(stage = %Stage::Transcribed, output = %result.output_path.display(), "MIDI written");

        let midi = tokio::fs::read(&result.output_path).await.map_err(|e| {
            PipelineError::Internal(format!("Could not read generated MIDI: {}", e))
        })?;

        tracing::info!(
            stage = %Stage::Completed,
            id = %work_item.unique_id,
            tempo = ?work_item.resolved_tempo,
            tempo_error = ?work_item.tempo_error,
            output = %result.output_path.display(),
            "Prediction complete"
        );

        Ok(CompletedPrediction {
            work_item,
            result,
            midi,
        })
    }
}
