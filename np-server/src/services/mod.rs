//! External collaborators: transcription engine, tempo estimator, output retention

pub mod basic_pitch_client;
pub mod retention;
pub mod tempo_estimator;

pub use basic_pitch_client::{
    derive_output_path, BasicPitchCli, EngineError, TranscriptionEngine, TranscriptionJob,
};
pub use tempo_estimator::{StratumTempoEstimator, TempoError, TempoEstimate, TempoEstimator};
