//! Categorizer training command

use std::path::Path;

use anyhow::Result;
use finsight_core::db::Database;
use finsight_core::{train_user_model, Categorizer, Error as CoreError, TrainingReport};
use tracing::{info, warn};

use super::find_user;

/// Train and save a model; `Ok(None)` when there is too little data
pub fn cmd_train(db: &Database, username: &str, model_path: &Path) -> Result<Option<TrainingReport>> {
    let user = find_user(db, username)?;
    println!("🧠 Training categorizer on {}'s transactions...", user.username);

    // Train from rule and keyword labels, not from a previous model
    let categorizer = Categorizer::new();
    let report = match train_user_model(db, &categorizer, user.id, model_path) {
        Ok((_, report)) => report,
        Err(CoreError::Model(msg)) => {
            warn!("Training skipped for {}: {}", user.username, msg);
            println!("   ⚠️  {}", msg);
            println!("   Import more statements and try again.");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "Trained model for {} on {} samples, accuracy {:.3}",
        user.username, report.samples, report.accuracy
    );
    println!("✅ Model saved to {}", model_path.display());
    println!(
        "   Samples: {} ({} train, {} test)",
        report.samples, report.train_size, report.test_size
    );
    println!("   Categories: {}", report.categories);
    println!("   Accuracy: {:.1}%", report.accuracy * 100.0);

    Ok(Some(report))
}
