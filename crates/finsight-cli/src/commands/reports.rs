//! Analytics and report command implementations

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use finsight_core::db::Database;
use finsight_core::models::Transaction;
use finsight_core::report::format_currency;
use finsight_core::{Analyzer, ReportGenerator};

use super::{find_user, truncate};

fn load_transactions(db: &Database, username: &str) -> Result<Vec<Transaction>> {
    let user = find_user(db, username)?;
    db.list_user_transactions(user.id, None, None)
        .context("Failed to load transactions")
}

pub fn cmd_stats(db: &Database, username: &str) -> Result<()> {
    let transactions = load_transactions(db, username)?;
    let analyzer = Analyzer::new(&transactions);
    let stats = analyzer.basic_stats();

    println!("📊 Summary for {}", username);
    println!("   ─────────────────────────────");
    println!("   Transactions:   {}", stats.total_transactions);
    println!("   Total spent:    {}", format_currency(stats.total_debit));
    println!("   Total received: {}", format_currency(stats.total_credit));
    println!("   Net cash flow:  {}", format_currency(stats.net_cashflow));
    println!(
        "   Average:        {}",
        format_currency(stats.average_transaction)
    );

    let categories = analyzer.category_breakdown();
    if !categories.is_empty() {
        println!();
        println!("🏷️  Spending by category");
        for total in &categories {
            println!(
                "   {:<16} {:>16}",
                total.category.as_str(),
                format_currency(total.amount)
            );
        }
    }

    let monthly = analyzer.monthly_breakdown();
    if !monthly.is_empty() {
        println!();
        println!("📅 Monthly");
        for month in &monthly {
            println!(
                "   {}  out {:>16}  in {:>16}",
                month.month,
                format_currency(month.total_debit),
                format_currency(month.total_credit)
            );
        }
    }

    Ok(())
}

pub fn cmd_anomalies(db: &Database, username: &str) -> Result<()> {
    let transactions = load_transactions(db, username)?;
    let anomalies = Analyzer::new(&transactions).anomalies();

    if anomalies.is_empty() {
        println!("✅ No unusual transactions found.");
        return Ok(());
    }

    println!("⚠️  {} unusual transaction(s)", anomalies.len());
    println!("   ─────────────────────────────────────────────────────────");
    for a in &anomalies {
        println!(
            "   {}  {:<32} {:>16}  {:<14} z={:.2}",
            a.date,
            truncate(&a.description, 32),
            format_currency(a.amount),
            a.category.as_str(),
            a.z_score
        );
    }

    Ok(())
}

pub fn cmd_projections(db: &Database, username: &str, today: NaiveDate) -> Result<()> {
    let transactions = load_transactions(db, username)?;
    let projections = Analyzer::new(&transactions).projections(today);

    if projections.is_empty() {
        println!("No spending recorded this month yet.");
        return Ok(());
    }

    println!(
        "🔮 Month-end projections for {}",
        projections.month.as_deref().unwrap_or_default()
    );
    println!("   ─────────────────────────────────────────────────────────");
    for cp in &projections.categories {
        let p = &cp.projection;
        println!(
            "   {:<16} spent {:>14}  projected {:>14}  last month {:>14}{}",
            cp.category.as_str(),
            format_currency(p.current_spent),
            format_currency(p.projected_amount),
            format_currency(p.previous_month),
            if p.possible_overshoot { "  ⚠️" } else { "" }
        );
    }

    if let Some(total) = &projections.total {
        println!();
        println!(
            "   Total: {} projected against {} last month",
            format_currency(total.projected_amount),
            format_currency(total.previous_month)
        );
        if total.possible_overshoot {
            println!("   ⚠️  On track to overshoot last month's spending");
        }
    }

    Ok(())
}

pub fn cmd_recurring(db: &Database, username: &str) -> Result<()> {
    let transactions = load_transactions(db, username)?;
    let recurring = Analyzer::new(&transactions).recurring();

    if recurring.is_empty() {
        println!("No recurring transactions found.");
        return Ok(());
    }

    println!("🔁 Recurring transactions");
    println!("   ─────────────────────────────────────────────────────────");
    for r in &recurring {
        println!(
            "   {}  {:<32} {:>16}  {}",
            r.date,
            truncate(&r.description, 32),
            format_currency(r.amount),
            r.category.as_str()
        );
    }

    Ok(())
}

pub fn cmd_report(db: &Database, username: &str, output: &Path) -> Result<()> {
    let user = find_user(db, username)?;
    let transactions = db.list_user_transactions(user.id, None, None)?;

    let now = Local::now().naive_local();
    let pdf = ReportGenerator::from_analyzer(
        &Analyzer::new(&transactions),
        &user.username,
        now,
        now.date(),
    )
    .generate()
    .context("Failed to generate report")?;

    std::fs::write(output, &pdf)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "📄 Report written to {} ({} KB)",
        output.display(),
        pdf.len().div_ceil(1024)
    );
    Ok(())
}
