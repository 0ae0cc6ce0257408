//! PDF report handler

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Extension,
};
use chrono::Local;
use tracing::info;

use crate::{AppError, AppState, Principal};
use finsight_core::{Analyzer, ReportGenerator};

/// GET /report - Download the user's financial report as a PDF
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, AppError> {
    let user = principal.user()?;
    let transactions = state.db.list_user_transactions(user.id, None, None)?;

    let now = Local::now().naive_local();
    let pdf = ReportGenerator::from_analyzer(
        &Analyzer::new(&transactions),
        &user.username,
        now,
        now.date(),
    )
    .generate()?;

    info!(user = %user.username, bytes = pdf.len(), "Generated financial report");
    state
        .db
        .log_audit(&user.username, "report", Some("report"), None, None)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"Financial_Report.pdf\"",
        )
        .body(Body::from(pdf))
        .map_err(|e| AppError::internal(&e.to_string()))
}
