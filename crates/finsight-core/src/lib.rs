//! Finsight Core Library
//!
//! Shared functionality for the Finsight personal finance analyzer:
//! - Database access, migrations, users and sessions
//! - CSV and PDF statement parsers for Indian banks
//! - Rule, keyword and model based categorization
//! - Spending analytics (stats, anomalies, recurring, projections)
//! - PDF report generation

pub mod analyze;
pub mod categorize;
pub mod db;
pub mod error;
pub mod import;
pub mod ingest;
pub mod models;
pub mod report;

pub use analyze::{AnalysisConfig, Analyzer};
pub use categorize::{CategoryAssignment, CategoryModel, Categorizer, TrainingReport};
pub use db::{AuditEntry, Database, TransactionInsertResult};
pub use error::{Error, Result};
pub use ingest::{import_statement, refresh_recurring, train_user_model, StatementUpload};
pub use report::{ReportData, ReportGenerator};
