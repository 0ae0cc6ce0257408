//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::NaiveDate;
use clap::Parser;
use finsight_core::db::Database;
use finsight_core::models::Bank;

use crate::cli::{Cli, Commands, UserAction};
use crate::commands::{self, truncate};

const HDFC_CSV: &str = "Date,Narration,Withdrawal Amt.,Deposit Amt.,Closing Balance\n\
01/03/2024,SALARY CREDIT,,60000.00,60000.00\n\
03/03/2024,SWIGGY ORDER,320.00,,59680.00\n\
05/03/2024,NETFLIX SUBSCRIPTION,499.00,,59181.00\n\
05/04/2024,NETFLIX SUBSCRIPTION,499.00,,58682.00\n";

fn setup_test_db() -> Database {
    let db = Database::in_memory().unwrap();
    commands::cmd_user_add(&db, "Asha Rao", "asha", "asha@example.com", "password123").unwrap();
    db
}

fn write_statement(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_global_defaults() {
    let cli = Cli::try_parse_from(["finsight", "init"]).unwrap();
    assert_eq!(cli.db.to_str(), Some("finsight.db"));
    assert!(!cli.verbose);
    assert!(!cli.no_encrypt);
    assert!(matches!(cli.command, Commands::Init));
}

#[test]
fn test_parse_import() {
    let cli = Cli::try_parse_from([
        "finsight",
        "--no-encrypt",
        "import",
        "--file",
        "march.csv",
        "--user",
        "asha",
    ])
    .unwrap();
    assert!(cli.no_encrypt);
    match cli.command {
        Commands::Import { file, user, bank } => {
            assert_eq!(file.to_str(), Some("march.csv"));
            assert_eq!(user, "asha");
            assert!(bank.is_none());
        }
        _ => panic!("expected import"),
    }
}

#[test]
fn test_parse_user_add() {
    let cli = Cli::try_parse_from([
        "finsight",
        "user",
        "add",
        "--name",
        "Asha",
        "--username",
        "asha",
        "--email",
        "asha@example.com",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::User {
            action: UserAction::Add { .. }
        }
    ));
}

#[test]
fn test_parse_serve_defaults() {
    let cli = Cli::try_parse_from(["finsight", "serve"]).unwrap();
    match cli.command {
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            assert_eq!(port, 5000);
            assert_eq!(host, "127.0.0.1");
            assert!(static_dir.is_none());
        }
        _ => panic!("expected serve"),
    }
}

#[test]
fn test_parse_requires_user() {
    assert!(Cli::try_parse_from(["finsight", "stats"]).is_err());
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer description", 10), "a much ...");
}

#[test]
fn test_resolve_bank_detects_csv_header() {
    let bank = commands::resolve_bank(None, "march.csv", HDFC_CSV.as_bytes()).unwrap();
    assert_eq!(bank, Bank::Hdfc);
}

#[test]
fn test_resolve_bank_explicit() {
    let bank = commands::resolve_bank(Some("AXIS"), "march.pdf", b"").unwrap();
    assert_eq!(bank, Bank::Axis);

    let err = commands::resolve_bank(Some("icici"), "march.csv", b"").unwrap_err();
    assert!(err.to_string().contains("sbi, hdfc, axis"));
}

#[test]
fn test_resolve_bank_pdf_needs_flag() {
    assert!(commands::resolve_bank(None, "march.pdf", b"%PDF-1.4").is_err());
}

#[test]
fn test_resolve_bank_unknown_header() {
    let err = commands::resolve_bank(None, "march.csv", b"When,What,How Much\n").unwrap_err();
    assert!(err.to_string().contains("auto-detect"));
}

// ========== User Command Tests ==========

#[test]
fn test_cmd_user_add_and_list() {
    let db = setup_test_db();
    let user = commands::find_user(&db, "asha").unwrap();
    assert_eq!(user.email, "asha@example.com");
    assert!(commands::cmd_user_list(&db).is_ok());
}

#[test]
fn test_cmd_user_add_rejects_short_password() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_user_add(&db, "Ravi", "ravi", "ravi@example.com", "short").is_err());
}

#[test]
fn test_cmd_user_add_counts_password_characters() {
    let db = Database::in_memory().unwrap();
    // Seven characters, fourteen bytes
    let result = commands::cmd_user_add(&db, "Ravi", "ravi", "ravi@example.com", "äääääää");
    assert!(result.is_err());

    let result = commands::cmd_user_add(&db, "Ravi", "ravi", "ravi@example.com", "pässwörd");
    assert!(result.is_ok());
    assert!(commands::find_user(&db, "ravi").is_ok());
}

#[test]
fn test_cmd_user_add_duplicate() {
    let db = setup_test_db();
    let result =
        commands::cmd_user_add(&db, "Other", "asha", "other@example.com", "password123");
    assert!(result.is_err());
}

#[test]
fn test_find_user_missing() {
    let db = Database::in_memory().unwrap();
    let err = commands::find_user(&db, "nobody").unwrap_err();
    assert!(err.to_string().contains("nobody"));
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_and_reimport() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let path = write_statement(&dir, "march.csv", HDFC_CSV);

    let summary = commands::cmd_import(&db, &path, "asha", None).unwrap();
    assert_eq!(summary.bank, Bank::Hdfc);
    assert_eq!(summary.imported, 4);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.recurring, 2);

    let summary = commands::cmd_import(&db, &path, "asha", Some("hdfc")).unwrap();
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.skipped, 4);
}

#[test]
fn test_cmd_import_unknown_user() {
    let db = Database::in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_statement(&dir, "march.csv", HDFC_CSV);
    assert!(commands::cmd_import(&db, &path, "nobody", None).is_err());
}

#[test]
fn test_cmd_import_missing_file() {
    let db = setup_test_db();
    let result = commands::cmd_import(&db, std::path::Path::new("/nonexistent.csv"), "asha", None);
    assert!(result.is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_analytics_commands_run() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let path = write_statement(&dir, "march.csv", HDFC_CSV);
    commands::cmd_import(&db, &path, "asha", None).unwrap();

    assert!(commands::cmd_stats(&db, "asha").is_ok());
    assert!(commands::cmd_anomalies(&db, "asha").is_ok());
    assert!(commands::cmd_recurring(&db, "asha").is_ok());

    let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
    assert!(commands::cmd_projections(&db, "asha", today).is_ok());
}

#[test]
fn test_analytics_commands_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_stats(&db, "asha").is_ok());
    assert!(commands::cmd_anomalies(&db, "asha").is_ok());
    assert!(commands::cmd_recurring(&db, "asha").is_ok());
    let today = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
    assert!(commands::cmd_projections(&db, "asha", today).is_ok());
}

#[test]
fn test_cmd_report_writes_pdf() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let path = write_statement(&dir, "march.csv", HDFC_CSV);
    commands::cmd_import(&db, &path, "asha", None).unwrap();

    let output = dir.path().join("report.pdf");
    commands::cmd_report(&db, "asha", &output).unwrap();

    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

// ========== Train Command Tests ==========

#[test]
fn test_cmd_train_not_enough_data() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let path = write_statement(&dir, "march.csv", HDFC_CSV);
    commands::cmd_import(&db, &path, "asha", None).unwrap();

    let model_path = dir.path().join("model.json");
    let report = commands::cmd_train(&db, "asha", &model_path).unwrap();
    assert!(report.is_none());
    assert!(!model_path.exists());
}

#[test]
fn test_cmd_train_saves_model() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();

    let mut csv = String::from("Date,Narration,Withdrawal Amt.,Deposit Amt.,Closing Balance\n");
    for day in 1..=15 {
        csv.push_str(&format!(
            "{:02}/01/2024,ZOMATO ORDER {},{}.00,,1000.00\n",
            day,
            day,
            100 + day
        ));
        csv.push_str(&format!(
            "{:02}/02/2024,AMAZON PURCHASE {},{}.00,,1000.00\n",
            day,
            day,
            500 + day
        ));
    }
    let path = write_statement(&dir, "jan.csv", &csv);
    commands::cmd_import(&db, &path, "asha", None).unwrap();

    let model_path = dir.path().join("model.json");
    let report = commands::cmd_train(&db, "asha", &model_path)
        .unwrap()
        .expect("enough samples to train");
    assert_eq!(report.samples, 30);
    assert_eq!(report.categories, 2);
    assert!(model_path.exists());
}
