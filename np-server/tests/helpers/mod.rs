//! Test Helper Utilities
//!
//! Fake collaborators and request builders for driving the np-server router.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use np_common::WorkDirs;
use np_server::models::DetectionThresholds;
use np_server::pipeline::PredictionPipeline;
use np_server::services::{
    derive_output_path, EngineError, TempoError, TempoEstimate, TempoEstimator,
    TranscriptionEngine, TranscriptionJob,
};
use np_server::utils::{AudioLoader, DecodedAudio};
use np_server::AppState;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const BOUNDARY: &str = "np-test-boundary-7d1f";

/// Bytes written as the "generated" MIDI file
pub const FAKE_MIDI: &[u8] = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x01\xe0";

/// What the fake engine does when called
#[derive(Debug, Clone)]
pub enum EngineBehavior {
    WriteMidi,
    /// Return normally without writing anything
    WriteNothing,
    Fail(String),
}

/// Observed state of one engine call
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub job: TranscriptionJob,
    pub input_existed: bool,
}

/// Engine that records its jobs and writes (or withholds) the expected output
pub struct FakeEngine {
    behavior: EngineBehavior,
    calls: Mutex<Vec<EngineCall>>,
}

impl FakeEngine {
    pub fn new(behavior: EngineBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TranscriptionEngine for FakeEngine {
    fn transcribe(&self, job: &TranscriptionJob) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(EngineCall {
            job: job.clone(),
            input_existed: job.input_path.exists(),
        });
        match &self.behavior {
            EngineBehavior::WriteMidi => {
                let output = derive_output_path(&job.output_dir, &job.input_path);
                std::fs::write(output, FAKE_MIDI)
                    .map_err(|e| EngineError::ExecutionError(e.to_string()))
            }
            EngineBehavior::WriteNothing => Ok(()),
            EngineBehavior::Fail(message) => Err(EngineError::TranscriptionFailed(message.clone())),
        }
    }
}

/// Loader returning one second of silence, or a fixed decode error
pub struct FakeLoader {
    error: Option<String>,
}

impl FakeLoader {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
        }
    }
}

impl AudioLoader for FakeLoader {
    fn load(&self, _path: &Path, _max_duration_seconds: f64) -> anyhow::Result<DecodedAudio> {
        if let Some(message) = &self.error {
            anyhow::bail!("{}", message);
        }
        Ok(DecodedAudio {
            samples: vec![0.0; 22_050],
            sample_rate: 22_050,
            channels: 1,
            duration_seconds: 1.0,
        })
    }
}

/// Estimator returning a fixed value and counting calls
pub struct FakeEstimator {
    bpm: f64,
    calls: AtomicUsize,
}

impl FakeEstimator {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TempoEstimator for FakeEstimator {
    fn estimate(&self, _samples: &[f32], _sample_rate: u32) -> Result<TempoEstimate, TempoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TempoEstimate::Scalar(self.bpm))
    }
}

/// Router plus handles on its fakes and working directories
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<FakeEngine>,
    pub estimator: Arc<FakeEstimator>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    _root: TempDir,
}

impl TestApp {
    pub fn new(engine: EngineBehavior, loader: FakeLoader, bpm: f64) -> Self {
        Self::with_retention(engine, loader, bpm, None)
    }

    pub fn with_retention(
        engine: EngineBehavior,
        loader: FakeLoader,
        bpm: f64,
        retention: Option<Duration>,
    ) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let upload_dir = root.path().join("uploads");
        let output_dir = root.path().join("outputs");
        let dirs = WorkDirs::new(&upload_dir, &output_dir);
        dirs.initialize(true).expect("Failed to initialize directories");

        let engine = Arc::new(FakeEngine::new(engine));
        let estimator = Arc::new(FakeEstimator::new(bpm));
        let pipeline = PredictionPipeline::new(
            dirs,
            engine.clone(),
            Arc::new(loader),
            estimator.clone(),
            60.0,
        );
        let router = np_server::build_router(AppState::new(pipeline, retention));

        Self {
            router,
            engine,
            estimator,
            upload_dir,
            output_dir,
            _root: root,
        }
    }

    /// Files currently left in the upload directory
    pub fn leftover_uploads(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.upload_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// Hand-assembled multipart/form-data body
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn thresholds(self, thresholds: DetectionThresholds) -> Self {
        self.text("onset_threshold", &thresholds.onset_threshold.to_string())
            .text("frame_threshold", &thresholds.frame_threshold.to_string())
            .text("min_note_length", &thresholds.min_note_length.to_string())
    }

    pub fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// A few bytes standing in for an audio upload; fakes never decode them
pub fn fake_audio() -> Vec<u8> {
    b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec()
}
