//! Upload intake: persist the uploaded bytes under a unique name

use super::PipelineError;
use crate::models::WorkItem;
use np_common::WorkDirs;
use uuid::Uuid;

/// Used when the client sends no usable filename
const FALLBACK_FILENAME: &str = "upload";

/// Reduce a client-supplied filename to a safe base name
///
/// Browsers may send full paths; only the last component is kept.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    if base.is_empty() || base == "." || base == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        base
    }
}

/// Write the upload to `{upload_dir}/{unique_id}_{filename}`
///
/// Both working directories are created if missing. A failed write leaves the
/// partial file behind; it is not referenced by any `WorkItem`.
pub async fn store_upload(
    dirs: &WorkDirs,
    original_filename: &str,
    bytes: &[u8],
) -> Result<WorkItem, PipelineError> {
    dirs.ensure_exists()
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

    let original_filename = sanitize_filename(original_filename);
    let unique_id = Uuid::new_v4();
    let input_path = dirs
        .upload_dir()
        .join(format!("{}_{}", unique_id, original_filename));

    tokio::fs::write(&input_path, bytes)
        .await
        .map_err(|e| PipelineError::Storage(e.to_string()))?;

    tracing::debug!(
        path = %input_path.display(),
        bytes = bytes.len(),
        "Stored upload"
    );

    Ok(WorkItem {
        unique_id,
        original_filename,
        input_path,
        output_dir: dirs.output_dir().to_path_buf(),
        resolved_tempo: None,
        tempo_error: None,
    })
}
