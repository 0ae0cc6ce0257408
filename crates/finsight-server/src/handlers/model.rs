//! Categorizer model handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppError, AppState, Principal};
use finsight_core::ingest::training_samples;
use finsight_core::{CategoryModel, Error as CoreError};

/// Outcome of a training request
#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub trained: bool,
    pub samples: usize,
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/model/train - Retrain the categorizer on the user's transactions
///
/// Too little data is reported as `{"trained": false}` rather than an error.
/// On success the new model replaces the running one and is saved to disk.
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<TrainResponse>, AppError> {
    let user = principal.user()?;

    let samples = {
        let categorizer = state.categorizer()?;
        training_samples(&state.db, &categorizer, user.id)?
    };

    let (model, report) = match CategoryModel::train(&samples) {
        Ok(trained) => trained,
        Err(CoreError::Model(msg)) => {
            warn!(user = %user.username, "Model not trained: {}", msg);
            return Ok(Json(TrainResponse {
                trained: false,
                samples: samples.len(),
                accuracy: None,
                error: Some(msg),
            }));
        }
        Err(e) => return Err(e.into()),
    };

    model.save(&state.config.model_path)?;
    state.categorizer_mut()?.set_model(model);

    info!(
        user = %user.username,
        samples = report.samples,
        accuracy = report.accuracy,
        "Categorizer model retrained"
    );
    state.db.log_audit(
        &user.username,
        "train",
        Some("model"),
        None,
        Some(&format!(
            "{} samples, accuracy {:.2}",
            report.samples, report.accuracy
        )),
    )?;

    Ok(Json(TrainResponse {
        trained: true,
        samples: report.samples,
        accuracy: Some(report.accuracy),
        error: None,
    }))
}
