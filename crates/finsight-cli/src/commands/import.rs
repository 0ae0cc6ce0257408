//! Statement import command

use std::path::Path;

use anyhow::{Context, Result};
use finsight_core::{
    db::Database,
    import::detect_bank_format,
    ingest::{import_statement, StatementUpload},
    models::{Bank, ImportSummary, StatementFormat},
    Categorizer,
};
use tracing::info;

use super::{find_user, model_path};

/// Work out the bank from `--bank` or, for CSV files, the header line
pub fn resolve_bank(bank_str: Option<&str>, filename: &str, bytes: &[u8]) -> Result<Bank> {
    if let Some(bank_str) = bank_str {
        return bank_str
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Unsupported bank: {}", e));
    }

    if StatementFormat::from_filename(filename) != Some(StatementFormat::Csv) {
        anyhow::bail!("Specify --bank (sbi, hdfc or axis) for PDF statements");
    }

    let text = String::from_utf8_lossy(bytes);
    let header_line = text.lines().next().unwrap_or_default();
    detect_bank_format(header_line).ok_or_else(|| {
        anyhow::anyhow!(
            "Could not auto-detect bank format from CSV header.\n\
             Specify --bank with one of: {}",
            Bank::supported_list()
        )
    })
}

pub fn cmd_import(
    db: &Database,
    file: &Path,
    username: &str,
    bank_str: Option<&str>,
) -> Result<ImportSummary> {
    let user = find_user(db, username)?;
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let bank = resolve_bank(bank_str, &filename, &bytes)?;
    println!("📥 Importing {} statement from {}...", bank, file.display());

    let categorizer = Categorizer::load(&model_path());
    if categorizer.has_model() {
        println!("   🤖 Using trained categorizer model");
    }

    let summary = import_statement(
        db,
        &categorizer,
        &StatementUpload {
            user_id: user.id,
            filename: &filename,
            bank,
            bytes: &bytes,
        },
    )
    .context("Import failed")?;

    info!(
        "Imported {} transactions for {} from {} ({} skipped)",
        summary.imported, user.username, filename, summary.skipped
    );

    println!();
    println!("✅ Import complete!");
    println!("   Imported: {} transactions", summary.imported);
    if summary.skipped > 0 {
        println!("   Skipped:  {} duplicates", summary.skipped);
    }
    if summary.imported > 0 {
        println!(
            "   🏷️  Categorized: {} by rule, {} by keyword, {} by model, {} other",
            summary.by_rule, summary.by_keyword, summary.by_model, summary.fallback
        );
    }
    if summary.recurring > 0 {
        println!("   🔁 Recurring transactions: {}", summary.recurring);
    }

    Ok(summary)
}
