//! Statement upload and import history handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, Principal, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE};
use finsight_core::models::{Bank, ImportSession, ImportSummary};
use finsight_core::{import_statement, StatementUpload};

/// Response from a statement upload
#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: ImportSummary,
}

/// POST /api/upload - Import a bank statement
///
/// Expects multipart form with:
/// - file: CSV or PDF statement (required, max 16MB)
/// - bank: sbi, hdfc or axis (required)
pub async fn upload_statement(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let user = principal.user()?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut bank: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;

                if bytes.len() > MAX_UPLOAD_SIZE {
                    return Err(AppError::bad_request(&format!(
                        "File too large. Maximum size is {} MB",
                        MAX_UPLOAD_SIZE / 1024 / 1024
                    )));
                }

                file = Some((filename, bytes.to_vec()));
            }
            "bank" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read bank"))?;
                bank = Some(value);
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| AppError::bad_request("No file part"))?;
    if filename.trim().is_empty() {
        return Err(AppError::bad_request("No selected file"));
    }
    let bank = bank
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Please select a bank"))?;
    let bank: Bank = bank
        .parse()
        .map_err(|e: String| AppError::bad_request(&format!("Unsupported bank: {}", e)))?;

    let summary = {
        let categorizer = state.categorizer()?;
        import_statement(
            &state.db,
            &categorizer,
            &StatementUpload {
                user_id: user.id,
                filename: &filename,
                bank,
                bytes: &bytes,
            },
        )?
    };

    info!(
        user = %user.username,
        imported = summary.imported,
        skipped = summary.skipped,
        "Statement uploaded"
    );
    state.db.log_audit(
        &user.username,
        "upload",
        Some("import_session"),
        Some(summary.import_session_id),
        Some(&format!(
            "{} ({}): {} imported, {} skipped",
            filename, bank, summary.imported, summary.skipped
        )),
    )?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "Successfully imported {} transactions ({} duplicates skipped)",
            summary.imported, summary.skipped
        ),
        summary,
    }))
}

/// Query parameters for import history
#[derive(Debug, Deserialize)]
pub struct ImportsQuery {
    #[serde(default = "default_imports_limit")]
    pub limit: i64,
}

fn default_imports_limit() -> i64 {
    50
}

/// GET /api/imports - The user's statement uploads, newest first
pub async fn list_imports(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ImportsQuery>,
) -> Result<Json<Vec<ImportSession>>, AppError> {
    let user = principal.user()?;
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let sessions = state.db.list_import_sessions(user.id, limit)?;
    Ok(Json(sessions))
}
