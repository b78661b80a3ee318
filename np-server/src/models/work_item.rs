//! Per-request work tracking types

use std::path::PathBuf;
use uuid::Uuid;

/// Paths and resolved parameters tracked through one prediction request
///
/// Owned by exactly one request handler; never shared across requests.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Random prefix that keeps concurrent uploads of the same file apart
    pub unique_id: Uuid,
    /// Name the caller uploaded the file under (base name only)
    pub original_filename: String,
    /// `{upload_dir}/{unique_id}_{original_filename}`
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Filled in once tempo resolution has run
    pub resolved_tempo: Option<u32>,
    pub tempo_error: Option<String>,
}

/// Outcome of a successful transcription
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub output_path: PathBuf,
    pub detected_tempo: u32,
    pub tempo_error: Option<String>,
}
