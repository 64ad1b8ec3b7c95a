//! Export orchestration: filters in, downloadable artifact out

use crate::api::AbstractApi;
use crate::errors::ClientError;
use crate::session::Session;
use atlas_common::export::{fallback_filename, ExportFilters};
use atlas_common::metrics;
use std::time::Instant;

/// Result of an export. Failures are folded in; the call never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub success: bool,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub message: Option<String>,
}

impl ExportOutcome {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            filename: None,
            content_type: None,
            bytes: Vec::new(),
            message: Some(message),
        }
    }
}

/// Request an export for `event_id`.
///
/// The filename comes from the server's `Content-Disposition` when it sent
/// one and falls back to `abstracts_{event}_{mode}.{ext}` otherwise.
pub async fn export_abstracts<A>(
    api: &A,
    session: &Session,
    event_id: &str,
    filters: &ExportFilters,
) -> ExportOutcome
where
    A: AbstractApi + ?Sized,
{
    let mode = filters.mode();
    if let Err(err) = filters.validate() {
        return ExportOutcome::failed(ClientError::from(err).user_message());
    }

    let started = Instant::now();
    let result = api.download(session, event_id, filters).await;
    let elapsed = started.elapsed().as_secs_f64();

    let outcome = match result {
        Ok(download) if download.bytes.is_empty() => {
            ExportOutcome::failed("The export returned an empty file".to_string())
        }
        Ok(download) => ExportOutcome {
            success: true,
            filename: Some(
                download
                    .filename
                    .unwrap_or_else(|| fallback_filename(event_id, mode)),
            ),
            content_type: download.content_type,
            bytes: download.bytes,
            message: None,
        },
        Err(err) => {
            tracing::warn!(event_id, mode = %mode, error = %err, "Export failed");
            ExportOutcome::failed(err.user_message())
        }
    };

    metrics::record_export(elapsed, mode.as_str(), outcome.success);
    if outcome.success {
        tracing::info!(
            event_id,
            mode = %mode,
            bytes = outcome.bytes.len(),
            elapsed_secs = elapsed,
            "Export downloaded"
        );
    }
    outcome
}
