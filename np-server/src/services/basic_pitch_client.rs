//! Basic Pitch transcription client
//!
//! Converts audio to MIDI by running the `basic-pitch` command-line tool.
//! The tool writes `{input_stem}_basic_pitch.mid` into the output directory;
//! success is judged by the caller from that file's existence.

use crate::models::DetectionThresholds;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Transcription engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found in PATH
    #[error("Transcription engine binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to launch the engine process
    #[error("Failed to execute transcription engine: {0}")]
    ExecutionError(String),

    /// Engine ran and reported failure
    #[error("{0}")]
    TranscriptionFailed(String),
}

/// Everything the engine needs for one file
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionJob {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub thresholds: DetectionThresholds,
    pub midi_tempo: u32,
}

/// Audio-to-MIDI transcription engine
///
/// Output flags are fixed: MIDI only, no sonification, no raw model
/// outputs, no note-event CSV. Implementations block.
pub trait TranscriptionEngine: Send + Sync {
    fn transcribe(&self, job: &TranscriptionJob) -> Result<(), EngineError>;
}

/// [`TranscriptionEngine`] that shells out to `basic-pitch`
#[derive(Debug, Clone)]
pub struct BasicPitchCli {
    binary_path: String,
    /// `None` uses the model packaged with basic-pitch
    model_path: Option<PathBuf>,
}

impl BasicPitchCli {
    pub fn new(binary_path: impl Into<String>, model_path: Option<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model_path,
        }
    }

    /// Check if the configured binary can be launched
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary_path).arg("--help").output().is_ok()
    }

    /// Command-line arguments for one job
    pub fn build_args(&self, job: &TranscriptionJob) -> Vec<String> {
        let mut args = vec![
            job.output_dir.display().to_string(),
            job.input_path.display().to_string(),
            "--save-midi".to_string(),
            "--onset-threshold".to_string(),
            job.thresholds.onset_threshold.to_string(),
            "--frame-threshold".to_string(),
            job.thresholds.frame_threshold.to_string(),
            "--minimum-note-length".to_string(),
            job.thresholds.min_note_length.to_string(),
            "--midi-tempo".to_string(),
            job.midi_tempo.to_string(),
        ];
        if let Some(model) = &self.model_path {
            args.push("--model-path".to_string());
            args.push(model.display().to_string());
        }
        args
    }
}

impl TranscriptionEngine for BasicPitchCli {
    fn transcribe(&self, job: &TranscriptionJob) -> Result<(), EngineError> {
        tracing::debug!(
            binary = %self.binary_path,
            input = %job.input_path.display(),
            output_dir = %job.output_dir.display(),
            "Running basic-pitch"
        );

        let output = Command::new(&self.binary_path)
            .args(self.build_args(job))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::BinaryNotFound(self.binary_path.clone()),
                _ => EngineError::ExecutionError(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(EngineError::TranscriptionFailed(failure_message(
                output.status.code(),
                &output.stderr,
            )));
        }

        Ok(())
    }
}

/// Last non-empty stderr line (usually the raised exception) plus exit code
fn failure_message(code: Option<i32>, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let last_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty());
    match (last_line, code) {
        (Some(line), Some(code)) => format!("{} (exit code {})", line, code),
        (Some(line), None) => line.to_string(),
        (None, Some(code)) => format!("basic-pitch exited with code {}", code),
        (None, None) => "basic-pitch terminated by signal".to_string(),
    }
}

/// `{output_dir}/{input stem}_basic_pitch.mid`
///
/// Only the final extension is stripped, so `a.b.wav` becomes `a.b_basic_pitch.mid`.
pub fn derive_output_path(output_dir: &Path, input_path: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{}_basic_pitch.mid", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TranscriptionJob {
        TranscriptionJob {
            input_path: PathBuf::from("uploads/abc_song.wav"),
            output_dir: PathBuf::from("outputs"),
            thresholds: DetectionThresholds::default(),
            midi_tempo: 97,
        }
    }

    #[test]
    fn test_args_use_packaged_model_by_default() {
        let cli = BasicPitchCli::new("basic-pitch", None);
        let args = cli.build_args(&job());

        assert_eq!(args[0], "outputs");
        assert_eq!(args[1], "uploads/abc_song.wav");
        assert!(args.contains(&"--save-midi".to_string()));
        assert!(!args.iter().any(|a| a == "--model-path"));
        assert!(!args.iter().any(|a| a == "--sonify-midi"));
        assert!(!args.iter().any(|a| a == "--save-model-outputs"));
        assert!(!args.iter().any(|a| a == "--save-note-events"));

        let tempo_idx = args.iter().position(|a| a == "--midi-tempo").unwrap();
        assert_eq!(args[tempo_idx + 1], "97");
        let note_idx = args.iter().position(|a| a == "--minimum-note-length").unwrap();
        assert_eq!(args[note_idx + 1], "58");
    }

    #[test]
    fn test_args_include_configured_model() {
        let cli = BasicPitchCli::new("basic-pitch", Some(PathBuf::from("/models/nmp.onnx")));
        let args = cli.build_args(&job());
        let idx = args.iter().position(|a| a == "--model-path").unwrap();
        assert_eq!(args[idx + 1], "/models/nmp.onnx");
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let cli = BasicPitchCli::new("np-definitely-not-installed-basic-pitch", None);
        assert!(!cli.is_available());
        let err = cli.transcribe(&job()).unwrap_err();
        assert!(matches!(err, EngineError::BinaryNotFound(_)));
    }

    #[test]
    fn test_failure_message_prefers_last_stderr_line() {
        let stderr = b"Traceback (most recent call last):\n  ...\nValueError: bad audio\n\n";
        assert_eq!(failure_message(Some(1), stderr), "ValueError: bad audio (exit code 1)");
        assert_eq!(failure_message(Some(2), b""), "basic-pitch exited with code 2");
    }

    #[test]
    fn test_output_path_derivation() {
        let out = Path::new("/srv/outputs");
        let cases = [
            ("/up/id_song.wav", "/srv/outputs/id_song_basic_pitch.mid"),
            ("/up/id_my song.mp3", "/srv/outputs/id_my song_basic_pitch.mid"),
            ("/up/id_tëst 音楽.flac", "/srv/outputs/id_tëst 音楽_basic_pitch.mid"),
            ("/up/id_a.b.c.wav", "/srv/outputs/id_a.b.c_basic_pitch.mid"),
            ("/up/id_noext", "/srv/outputs/id_noext_basic_pitch.mid"),
        ];
        for (input, expected) in cases {
            assert_eq!(derive_output_path(out, Path::new(input)), PathBuf::from(expected));
        }
    }
}
