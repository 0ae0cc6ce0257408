//! Category rule handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, Principal, SuccessResponse};
use finsight_core::models::{Category, CategoryRule, PatternType};
use finsight_core::CategoryAssignment;

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub pattern: String,
    #[serde(default)]
    pub pattern_type: PatternType,
    pub category: Category,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct TestRuleRequest {
    pub description: String,
}

/// GET /api/rules - The user's rules, highest priority first
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<CategoryRule>>, AppError> {
    let user = principal.user()?;
    Ok(Json(state.db.list_category_rules(user.id)?))
}

/// POST /api/rules - Add a rule
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<Json<CategoryRule>, AppError> {
    let user = principal.user()?;
    let id = state.db.create_category_rule(
        user.id,
        &req.pattern,
        req.pattern_type,
        req.category,
        req.priority,
    )?;

    state.db.log_audit(
        &user.username,
        "create",
        Some("category_rule"),
        Some(id),
        Some(&format!("{} {} -> {}", req.pattern_type, req.pattern.trim(), req.category)),
    )?;

    let rule = state
        .db
        .list_category_rules(user.id)?
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| AppError::internal("Created rule not found"))?;
    Ok(Json(rule))
}

/// DELETE /api/rules/:id - Remove a rule
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = principal.user()?;
    state.db.delete_category_rule(user.id, id)?;
    state
        .db
        .log_audit(&user.username, "delete", Some("category_rule"), Some(id), None)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/rules/test - Show how a description would be categorized
pub async fn test_rule(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<TestRuleRequest>,
) -> Result<Json<CategoryAssignment>, AppError> {
    let user = principal.user()?;
    let rules = state.db.list_category_rules(user.id)?;
    let assignment = state.categorizer()?.categorize(&req.description, &rules);
    Ok(Json(assignment))
}
