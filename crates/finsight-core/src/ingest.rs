//! Statement ingestion and model training over stored data
//!
//! Ties the parsers, the categorizer and the database together so the CLI
//! and the HTTP server import statements the same way.

use std::path::Path;

use tracing::{debug, info};

use crate::analyze::Analyzer;
use crate::categorize::{CategoryModel, Categorizer, TrainingReport};
use crate::db::{Database, TransactionInsertResult};
use crate::error::{Error, Result};
use crate::import::parse_statement;
use crate::models::{Bank, CategorySource, ImportSummary, NewImportSession, StatementFormat};

/// Largest statement accepted for import
pub const MAX_STATEMENT_SIZE: usize = 16 * 1024 * 1024;

/// An uploaded statement waiting to be imported
#[derive(Debug, Clone)]
pub struct StatementUpload<'a> {
    pub user_id: i64,
    pub filename: &'a str,
    pub bank: Bank,
    pub bytes: &'a [u8],
}

impl StatementUpload<'_> {
    /// Format implied by the file extension
    pub fn format(&self) -> Result<StatementFormat> {
        StatementFormat::from_filename(self.filename).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{} (expected a .csv or .pdf file)",
                self.filename
            ))
        })
    }
}

/// Parse, categorize and store one statement
///
/// Rows already imported by the same user are skipped. Recurring flags are
/// recomputed over the user's whole history afterwards.
pub fn import_statement(
    db: &Database,
    categorizer: &Categorizer,
    upload: &StatementUpload<'_>,
) -> Result<ImportSummary> {
    let format = upload.format()?;
    if upload.bytes.len() > MAX_STATEMENT_SIZE {
        return Err(Error::Import(format!(
            "File exceeds maximum size of {} MB",
            MAX_STATEMENT_SIZE / (1024 * 1024)
        )));
    }

    let transactions = parse_statement(upload.bytes, upload.bank, format)?;
    info!(
        "Parsed {} transactions from {} ({} {})",
        transactions.len(),
        upload.filename,
        upload.bank,
        format
    );

    let session_id = db.create_import_session(&NewImportSession {
        user_id: upload.user_id,
        filename: Some(upload.filename.to_string()),
        bank: upload.bank,
        format,
        file_size_bytes: Some(upload.bytes.len() as i64),
    })?;

    let rules = db.list_category_rules(upload.user_id)?;

    let mut summary = ImportSummary {
        import_session_id: session_id,
        bank: upload.bank,
        format,
        imported: 0,
        skipped: 0,
        by_rule: 0,
        by_keyword: 0,
        by_model: 0,
        fallback: 0,
        recurring: 0,
    };

    for tx in &transactions {
        let assignment = categorizer.categorize(&tx.description, &rules);
        match db.insert_transaction(
            upload.user_id,
            tx,
            assignment.category,
            assignment.source,
            Some(session_id),
        )? {
            TransactionInsertResult::Inserted(id) => {
                debug!(
                    "Imported transaction {} as {} ({})",
                    id, assignment.category, assignment.source
                );
                summary.imported += 1;
                match assignment.source {
                    CategorySource::Rule => summary.by_rule += 1,
                    CategorySource::Keyword => summary.by_keyword += 1,
                    CategorySource::Model => summary.by_model += 1,
                    CategorySource::Manual | CategorySource::Fallback => summary.fallback += 1,
                }
            }
            TransactionInsertResult::Duplicate(existing) => {
                debug!("Skipping duplicate of transaction {}", existing);
                summary.skipped += 1;
            }
        }
    }

    db.update_import_session_results(session_id, summary.imported, summary.skipped)?;
    summary.recurring = refresh_recurring(db, upload.user_id)? as i64;

    info!(
        "Import {} complete: {} imported, {} skipped",
        session_id, summary.imported, summary.skipped
    );
    Ok(summary)
}

/// Recompute and store the recurring flags for a user's transactions
pub fn refresh_recurring(db: &Database, user_id: i64) -> Result<usize> {
    let transactions = db.list_user_transactions(user_id, None, None)?;
    let ids = Analyzer::new(&transactions).recurring_ids();
    db.set_recurring_flags(user_id, &ids)
}

/// Labelled descriptions for training a user's model
///
/// Manual corrections win; otherwise the rule-based label is used.
pub fn training_samples(
    db: &Database,
    categorizer: &Categorizer,
    user_id: i64,
) -> Result<Vec<(String, crate::models::Category)>> {
    let transactions = db.list_user_transactions(user_id, None, None)?;
    let manual = db.manual_category_labels(user_id)?;
    let rules = db.list_category_rules(user_id)?;

    Ok(transactions
        .into_iter()
        .filter(|tx| !tx.description.trim().is_empty())
        .map(|tx| {
            let label = manual
                .get(&tx.id)
                .copied()
                .unwrap_or_else(|| categorizer.rule_label(&tx.description, &rules));
            (tx.description, label)
        })
        .collect())
}

/// Train a model on a user's transactions and save it to `model_path`
pub fn train_user_model(
    db: &Database,
    categorizer: &Categorizer,
    user_id: i64,
    model_path: &Path,
) -> Result<(CategoryModel, TrainingReport)> {
    let samples = training_samples(db, categorizer, user_id)?;
    let (model, report) = CategoryModel::train(&samples)?;
    model.save(model_path)?;

    info!(
        "Trained categorizer on {} samples (accuracy {:.2}), saved to {}",
        report.samples,
        report.accuracy,
        model_path.display()
    );
    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NewUser, PatternType};

    const SBI_CSV: &str = "Date,Description,Debit,Credit,Balance\n\
        01/03/2024,SWIGGY ORDER 1234,250.00,,9750.00\n\
        02/03/2024,SALARY MARCH,,50000.00,59750.00\n\
        05/03/2024,SOMETHING ODD,99.00,,59651.00\n";

    fn setup() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                name: "Asha".into(),
                username: "asha".into(),
                email: "asha@example.com".into(),
                password: "password123".into(),
            })
            .unwrap();
        (db, user.id)
    }

    fn upload(user_id: i64, filename: &'static str, bytes: &'static [u8]) -> StatementUpload<'static> {
        StatementUpload {
            user_id,
            filename,
            bank: Bank::Sbi,
            bytes,
        }
    }

    #[test]
    fn test_import_statement_counts_sources() {
        let (db, user_id) = setup();
        db.create_category_rule(user_id, "odd", PatternType::Contains, Category::Shopping, 0)
            .unwrap();

        let summary = import_statement(
            &db,
            &Categorizer::new(),
            &upload(user_id, "march.csv", SBI_CSV.as_bytes()),
        )
        .unwrap();

        assert_eq!(summary.imported, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.by_rule, 1);
        assert_eq!(summary.by_keyword, 2);
        assert_eq!(summary.format, StatementFormat::Csv);

        let session = db
            .get_import_session(user_id, summary.import_session_id)
            .unwrap()
            .unwrap();
        assert_eq!(session.imported_count, 3);
        assert_eq!(session.filename.as_deref(), Some("march.csv"));
    }

    #[test]
    fn test_reimport_skips_everything() {
        let (db, user_id) = setup();
        let categorizer = Categorizer::new();
        let up = upload(user_id, "march.csv", SBI_CSV.as_bytes());

        import_statement(&db, &categorizer, &up).unwrap();
        let second = import_statement(&db, &categorizer, &up).unwrap();

        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(db.count_user_transactions(user_id).unwrap(), 3);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let (db, user_id) = setup();
        let err = import_statement(
            &db,
            &Categorizer::new(),
            &upload(user_id, "march.xlsx", SBI_CSV.as_bytes()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_training_samples_prefer_manual_labels() {
        let (db, user_id) = setup();
        let categorizer = Categorizer::new();
        import_statement(
            &db,
            &categorizer,
            &upload(user_id, "march.csv", SBI_CSV.as_bytes()),
        )
        .unwrap();

        let odd = db
            .list_user_transactions(user_id, None, None)
            .unwrap()
            .into_iter()
            .find(|t| t.description == "SOMETHING ODD")
            .unwrap();
        db.update_transaction_category(user_id, odd.id, Category::Health)
            .unwrap();

        let samples = training_samples(&db, &categorizer, user_id).unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples.contains(&("SOMETHING ODD".to_string(), Category::Health)));
        assert!(samples.contains(&("SWIGGY ORDER 1234".to_string(), Category::Food)));
    }

    #[test]
    fn test_train_user_model_needs_enough_data() {
        let (db, user_id) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let err = train_user_model(&db, &Categorizer::new(), user_id, &path).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert!(!path.exists());
    }
}
