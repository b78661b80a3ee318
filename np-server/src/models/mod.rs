//! Data models for the prediction pipeline

pub mod parameters;
pub mod work_item;

pub use parameters::{DetectionThresholds, PredictRequest, TempoRequest};
pub use work_item::{TranscriptionResult, WorkItem};
