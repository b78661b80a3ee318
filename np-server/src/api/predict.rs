//! `POST /predict`: audio upload to MIDI

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::Router;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult};
use crate::models::{DetectionThresholds, PredictRequest, TempoRequest};
use crate::pipeline::MidiResponse;
use crate::services::retention;
use crate::AppState;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// POST /predict
///
/// Multipart fields: `file` (required), `onset_threshold`, `frame_threshold`,
/// `min_note_length`, `midi_tempo` (0 or negative = auto-detect).
pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<MidiResponse> {
    let request = parse_predict_form(multipart).await?;

    let done = match state.pipeline.run(request).await {
        Ok(done) => done,
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            return Err(e.into());
        }
    };

    if let Some(delay) = state.output_retention {
        retention::schedule_removal(done.result.output_path.clone(), delay);
    }

    Ok(MidiResponse::from_prediction(done))
}

/// Collect multipart fields into a [`PredictRequest`]
///
/// Unknown fields are ignored. Missing optional fields take their defaults.
pub async fn parse_predict_form(mut multipart: Multipart) -> ApiResult<PredictRequest> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut thresholds = DetectionThresholds::default();
    let mut midi_tempo: i64 = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Could not read upload: {}", e)))?;
                upload = Some((filename, bytes.to_vec()));
            }
            "onset_threshold" => thresholds.onset_threshold = parse_field(&name, field).await?,
            "frame_threshold" => thresholds.frame_threshold = parse_field(&name, field).await?,
            "min_note_length" => thresholds.min_note_length = parse_field(&name, field).await?,
            "midi_tempo" => midi_tempo = parse_field(&name, field).await?,
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let (original_filename, audio) =
        upload.ok_or_else(|| ApiError::Validation("Field required: file".to_string()))?;

    Ok(PredictRequest {
        audio,
        original_filename,
        thresholds,
        tempo: TempoRequest::from_form_value(midi_tempo),
    })
}

async fn parse_field<T: FromStr>(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> ApiResult<T> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("Could not read {}: {}", name, e)))?;
    text.trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid value for {}: '{}'", name, text)))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
