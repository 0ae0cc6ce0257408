//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, Principal};
use finsight_core::models::{Category, Transaction};

/// Optional inclusive date range, YYYY-MM-DD
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRangeQuery {
    pub fn parse(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), AppError> {
        let from = parse_date_param("from", self.from.as_deref())?;
        let to = parse_date_param("to", self.to.as_deref())?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AppError::bad_request("'from' must not be after 'to'"));
            }
        }
        Ok((from, to))
    }
}

fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::bad_request(&format!("Invalid '{}' date, expected YYYY-MM-DD", name))
            }),
        None => Ok(None),
    }
}

/// GET /api/transactions - The user's transactions, oldest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let user = principal.user()?;
    let (from, to) = range.parse()?;
    let transactions = state.db.list_user_transactions(user.id, from, to)?;
    Ok(Json(transactions))
}

/// Outcome of a category update
#[derive(Debug, Serialize)]
pub struct UpdateCategoryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateCategoryResponse {
    fn failed(error: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            error: Some(error.into()),
        })
    }
}

/// POST /api/update_category - Correct a transaction's category
///
/// Body: `{"transaction_id": 12, "category": "food"}`. Failures are reported
/// in the body as `{"success": false, "error": ...}` rather than as HTTP errors.
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<UpdateCategoryResponse>, AppError> {
    let user = principal.user()?;

    let transaction_id = body.get("transaction_id").and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    });
    let category = body
        .get("category")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty());

    let (Some(transaction_id), Some(category)) = (transaction_id, category) else {
        return Ok(UpdateCategoryResponse::failed("Missing required fields"));
    };

    let category: Category = match category.parse() {
        Ok(c) => c,
        Err(e) => return Ok(UpdateCategoryResponse::failed(e)),
    };

    match state
        .db
        .update_transaction_category(user.id, transaction_id, category)
    {
        Ok(()) => {
            state.db.log_audit(
                &user.username,
                "update_category",
                Some("transaction"),
                Some(transaction_id),
                Some(category.as_str()),
            )?;
            Ok(Json(UpdateCategoryResponse {
                success: true,
                error: None,
            }))
        }
        Err(e) => Ok(UpdateCategoryResponse::failed(e.to_string())),
    }
}
