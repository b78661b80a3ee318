//! Response assembly for a completed prediction

use super::CompletedPrediction;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};

pub const DETECTED_BPM_HEADER: &str = "x-detected-bpm";
pub const BPM_ERROR_HEADER: &str = "x-bpm-error";
pub const GENERATED_FILENAME_HEADER: &str = "x-generated-filename";
pub const ABSOLUTE_PATH_HEADER: &str = "x-absolute-path";

/// Headers browsers may read cross-origin
pub const EXPOSED_HEADERS: [&str; 4] = [
    DETECTED_BPM_HEADER,
    BPM_ERROR_HEADER,
    GENERATED_FILENAME_HEADER,
    ABSOLUTE_PATH_HEADER,
];

/// Characters left unescaped in `filename*` (RFC 5987 attr-char subset)
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// MIDI download with pipeline metadata in headers
#[derive(Debug, Clone)]
pub struct MidiResponse {
    pub midi: Vec<u8>,
    /// Name offered to the caller: original upload name with `.mid`
    pub download_name: String,
    /// Internal name of the generated file
    pub generated_filename: String,
    pub absolute_path: PathBuf,
    pub tempo: u32,
    pub tempo_error: Option<String>,
}

impl MidiResponse {
    pub fn from_prediction(done: CompletedPrediction) -> Self {
        let output_path = &done.result.output_path;
        let generated_filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let absolute_path =
            std::path::absolute(output_path).unwrap_or_else(|_| output_path.clone());

        Self {
            download_name: download_name(&done.work_item.original_filename),
            generated_filename,
            absolute_path,
            tempo: done.result.detected_tempo,
            tempo_error: done.result.tempo_error,
            midi: done.midi,
        }
    }
}

/// `song.wav` → `song.mid`
pub fn download_name(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_filename.to_string());
    format!("{}.mid", stem)
}

/// `attachment; filename="..."`, or RFC 5987 `filename*` when escaping is needed
pub fn content_disposition(filename: &str) -> String {
    let encoded = utf8_percent_encode(filename, FILENAME_SAFE).to_string();
    if encoded == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!("attachment; filename*=utf-8''{}", encoded)
    }
}

/// Header value from arbitrary text
///
/// Visible ASCII and spaces pass through; anything else (controls, UTF-8)
/// is percent-encoded so the value is always plain ASCII.
pub fn header_value(text: &str) -> HeaderValue {
    let printable = text.bytes().all(|b| (0x20..0x7f).contains(&b));
    let encoded = if printable {
        text.to_string()
    } else {
        utf8_percent_encode(text, CONTROLS).to_string()
    };
    HeaderValue::from_str(&encoded).unwrap_or_else(|_| HeaderValue::from_static(""))
}

impl IntoResponse for MidiResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("audio/midi"));
        headers.insert(
            CONTENT_DISPOSITION,
            header_value(&content_disposition(&self.download_name)),
        );
        headers.insert(
            HeaderName::from_static(DETECTED_BPM_HEADER),
            HeaderValue::from(self.tempo),
        );
        headers.insert(
            HeaderName::from_static(GENERATED_FILENAME_HEADER),
            header_value(&self.generated_filename),
        );
        headers.insert(
            HeaderName::from_static(ABSOLUTE_PATH_HEADER),
            header_value(&self.absolute_path.to_string_lossy()),
        );
        if let Some(error) = &self.tempo_error {
            headers.insert(HeaderName::from_static(BPM_ERROR_HEADER), header_value(error));
        }

        (StatusCode::OK, headers, self.midi).into_response()
    }
}
