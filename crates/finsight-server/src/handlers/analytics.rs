//! Analytics handlers
//!
//! Every endpoint loads the user's transactions (optionally limited to a date
//! range) and runs one analyzer operation over them.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Local;

use super::transactions::DateRangeQuery;
use crate::{AppError, AppState, Principal};
use finsight_core::models::{
    Anomaly, BasicStats, CategoryTotal, HeatmapPoint, MonthlySummary, Projections,
    RecurringTransaction, Transaction,
};
use finsight_core::Analyzer;

fn load_transactions(
    state: &AppState,
    principal: &Principal,
    range: &DateRangeQuery,
) -> Result<Vec<Transaction>, AppError> {
    let user = principal.user()?;
    let (from, to) = range.parse()?;
    Ok(state.db.list_user_transactions(user.id, from, to)?)
}

/// GET /api/stats - Totals and cash flow
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<BasicStats>, AppError> {
    let transactions = load_transactions(&state, &principal, &range)?;
    Ok(Json(Analyzer::new(&transactions).basic_stats()))
}

/// GET /api/categories - Debit totals per category
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<CategoryTotal>>, AppError> {
    let transactions = load_transactions(&state, &principal, &range)?;
    Ok(Json(Analyzer::new(&transactions).category_breakdown()))
}

/// GET /api/monthly - Per-month debit and credit totals
pub async fn get_monthly(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<MonthlySummary>>, AppError> {
    let transactions = load_transactions(&state, &principal, &range)?;
    Ok(Json(Analyzer::new(&transactions).monthly_breakdown()))
}

/// GET /api/heatmap - Daily debit totals
pub async fn get_heatmap(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<HeatmapPoint>>, AppError> {
    let transactions = load_transactions(&state, &principal, &range)?;
    let heatmap = Analyzer::new(&transactions).daily_heatmap();
    tracing::debug!("Generated heatmap with {} data points", heatmap.len());
    Ok(Json(heatmap))
}

/// GET /api/anomalies - Transactions unusual for their category
pub async fn get_anomalies(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<Anomaly>>, AppError> {
    let transactions = load_transactions(&state, &principal, &range)?;
    Ok(Json(Analyzer::new(&transactions).anomalies()))
}

/// GET /api/projections - Month-end spend projections for today's month
pub async fn get_projections(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Projections>, AppError> {
    let transactions = load_transactions(&state, &principal, &DateRangeQuery::default())?;
    let today = Local::now().date_naive();
    Ok(Json(Analyzer::new(&transactions).projections(today)))
}

/// GET /api/recurring - Transactions that repeat with the same amount
pub async fn get_recurring(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<RecurringTransaction>>, AppError> {
    let transactions = load_transactions(&state, &principal, &range)?;
    Ok(Json(Analyzer::new(&transactions).recurring()))
}
