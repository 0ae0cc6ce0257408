//! Statement parsers for SBI, HDFC and Axis (CSV and PDF)

use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Bank, NewTransaction, StatementFormat, TransactionType};

/// Column names (with aliases) and date formats for one bank's CSV export
struct CsvLayout {
    date: &'static [&'static str],
    description: &'static [&'static str],
    debit: &'static [&'static str],
    credit: &'static [&'static str],
    date_formats: &'static [&'static str],
}

const SBI_LAYOUT: CsvLayout = CsvLayout {
    date: &["Date"],
    description: &["Description"],
    debit: &["Debit"],
    credit: &["Credit"],
    date_formats: &["%d/%m/%Y"],
};

const HDFC_LAYOUT: CsvLayout = CsvLayout {
    date: &["Date"],
    description: &["Narration", "Description"],
    debit: &["Withdrawal Amt.", "Withdrawal"],
    credit: &["Deposit Amt.", "Deposit"],
    date_formats: &["%d/%m/%Y"],
};

const AXIS_LAYOUT: CsvLayout = CsvLayout {
    date: &["Tran Date", "Date"],
    description: &["Particulars", "Description"],
    debit: &["Dr Amount", "Debit"],
    credit: &["Cr Amount", "Credit"],
    date_formats: &["%d-%m-%Y", "%d/%m/%Y"],
};

fn csv_layout(bank: Bank) -> &'static CsvLayout {
    match bank {
        Bank::Sbi => &SBI_LAYOUT,
        Bank::Hdfc => &HDFC_LAYOUT,
        Bank::Axis => &AXIS_LAYOUT,
    }
}

/// Parse an uploaded statement into transactions
pub fn parse_statement(
    bytes: &[u8],
    bank: Bank,
    format: StatementFormat,
) -> Result<Vec<NewTransaction>> {
    match format {
        StatementFormat::Csv => parse_csv(bytes, bank),
        StatementFormat::Pdf => parse_pdf(bytes, bank),
    }
}

/// Detect bank format from CSV header line
///
/// Returns None if the format is not recognized.
pub fn detect_bank_format(header: &str) -> Option<Bank> {
    let header = header.trim().trim_start_matches('\u{feff}');

    // Axis: "Tran Date,Particulars,Dr Amount,Cr Amount,Balance"
    if header.contains("Tran Date") || header.contains("Dr Amount") {
        return Some(Bank::Axis);
    }

    // HDFC: "Date,Narration,Withdrawal Amt.,Deposit Amt.,Closing Balance"
    if header.contains("Narration") || header.contains("Withdrawal") {
        return Some(Bank::Hdfc);
    }

    // SBI: "Date,Description,Debit,Credit,Balance"
    if header.starts_with("Date,Description,Debit,Credit") {
        return Some(Bank::Sbi);
    }

    None
}

/// Generate a unique hash for deduplication
///
/// `occurrence` counts identical rows earlier in the same statement so that
/// genuine repeats (two identical tea purchases on one day) both import.
fn generate_hash(
    date: &NaiveDate,
    description: &str,
    amount: f64,
    transaction_type: TransactionType,
    occurrence: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update(transaction_type.as_str().as_bytes());
    hasher.update(occurrence.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Builds transactions and tracks duplicate rows within one statement
struct StatementBuilder {
    bank: Bank,
    seen: HashMap<(NaiveDate, String, u64, TransactionType), u32>,
    transactions: Vec<NewTransaction>,
}

impl StatementBuilder {
    fn new(bank: Bank) -> Self {
        Self {
            bank,
            seen: HashMap::new(),
            transactions: Vec::new(),
        }
    }

    /// Debit wins when positive, otherwise the row is a credit
    fn push(&mut self, date: NaiveDate, description: &str, debit: f64, credit: f64) {
        let (amount, transaction_type) = if debit > 0.0 {
            (debit, TransactionType::Debit)
        } else {
            (credit.abs(), TransactionType::Credit)
        };
        self.push_typed(date, description, amount, transaction_type);
    }

    fn push_typed(
        &mut self,
        date: NaiveDate,
        description: &str,
        amount: f64,
        transaction_type: TransactionType,
    ) {
        let description = description.trim().to_string();
        let key = (
            date,
            description.clone(),
            amount.to_bits(),
            transaction_type,
        );
        let occurrence = self.seen.entry(key).or_insert(0);
        let import_hash =
            generate_hash(&date, &description, amount, transaction_type, *occurrence);
        *occurrence += 1;

        self.transactions.push(NewTransaction {
            date,
            description,
            amount,
            transaction_type,
            bank: self.bank,
            import_hash,
        });
    }

    fn finish(self) -> Vec<NewTransaction> {
        self.transactions
    }
}

/// Find the index of the first header matching any alias
fn find_column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(alias))
    })
}

fn require_column(headers: &StringRecord, aliases: &[&str]) -> Result<usize> {
    find_column(headers, aliases)
        .ok_or_else(|| Error::Import(format!("Missing column: {}", aliases.join(" / "))))
}

/// Parse CSV data from a bank into transactions
pub fn parse_csv<R: Read>(reader: R, bank: Bank) -> Result<Vec<NewTransaction>> {
    let layout = csv_layout(bank);
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_col = require_column(&headers, layout.date)?;
    let desc_col = require_column(&headers, layout.description)?;
    let debit_col = require_column(&headers, layout.debit)?;
    let credit_col = require_column(&headers, layout.credit)?;

    let mut builder = StatementBuilder::new(bank);

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = index + 2;

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let date_str = record.get(date_col).unwrap_or("").trim();
        if date_str.is_empty() {
            return Err(Error::Import(format!("Line {}: Missing date", line)));
        }
        let date = parse_date(date_str, layout.date_formats)
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;

        let description = record.get(desc_col).unwrap_or("");
        let debit = parse_amount(record.get(debit_col).unwrap_or(""))
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;
        let credit = parse_amount(record.get(credit_col).unwrap_or(""))
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;

        builder.push(date, description, debit, credit);
    }

    let transactions = builder.finish();
    debug!("Parsed {} {} CSV transactions", transactions.len(), bank);
    Ok(transactions)
}

/// Parse a PDF statement by extracting its text and matching statement lines
pub fn parse_pdf(bytes: &[u8], bank: Bank) -> Result<Vec<NewTransaction>> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Pdf(format!("Unable to read PDF: {}", e)))?;
    parse_statement_text(&text, bank)
}

/// Line pattern for a bank's PDF statement text
///
/// Captures the date, the description, and the run of trailing amounts.
fn line_pattern(bank: Bank) -> Result<Regex> {
    let pattern = match bank {
        Bank::Sbi => r"^\s*(\d{2}/\d{2}/\d{4})\s+(.+?)((?:\s+[\d,]+\.\d{2}){3})\s*$",
        Bank::Hdfc => r"^\s*(\d{2}/\d{2}/\d{4})\s+(.+?)((?:\s+[\d,]+\.\d{2}){2,3})\s*$",
        Bank::Axis => r"^\s*(\d{2}-\d{2}-\d{4})\s+(.+?)((?:\s+[\d,]+\.\d{2}){2,3})\s*$",
    };
    Ok(Regex::new(pattern)?)
}

/// Parse statement lines from extracted PDF text
///
/// SBI lines always carry debit, credit and balance. HDFC and Axis statements
/// leave the empty amount column blank, so a line may hold a single amount
/// followed by the balance; the balance movement then decides the direction.
pub fn parse_statement_text(text: &str, bank: Bank) -> Result<Vec<NewTransaction>> {
    let re = line_pattern(bank)?;
    let date_formats = csv_layout(bank).date_formats;
    let mut builder = StatementBuilder::new(bank);
    let mut previous_balance: Option<f64> = None;

    for line in text.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };

        // Statement text also carries headers and summaries that look like
        // rows; a line that does not parse is skipped, not fatal
        let date = match parse_date(&caps[1], date_formats) {
            Ok(date) => date,
            Err(e) => {
                warn!("Skipping PDF line: {} ({})", line.trim(), e);
                continue;
            }
        };
        let description = &caps[2];
        let amounts = match caps[3]
            .split_whitespace()
            .map(parse_amount)
            .collect::<Result<Vec<f64>>>()
        {
            Ok(amounts) => amounts,
            Err(e) => {
                warn!("Skipping PDF line: {} ({})", line.trim(), e);
                continue;
            }
        };

        match amounts.as_slice() {
            [debit, credit, balance] => {
                builder.push(date, description, *debit, *credit);
                previous_balance = Some(*balance);
            }
            [amount, balance] => {
                let transaction_type = match previous_balance {
                    Some(prev) if *balance > prev => TransactionType::Credit,
                    _ => TransactionType::Debit,
                };
                builder.push_typed(date, description, *amount, transaction_type);
                previous_balance = Some(*balance);
            }
            _ => continue,
        }
    }

    let transactions = builder.finish();
    debug!("Parsed {} {} PDF transactions", transactions.len(), bank);
    Ok(transactions)
}

/// Parse a date using the bank's formats, in order
fn parse_date(s: &str, formats: &[&str]) -> Result<NaiveDate> {
    let s = s.trim();

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency markers and commas
///
/// Empty cells are zero.
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches("INR")
        .trim_start_matches("Rs.")
        .replace(['₹', ',', ' '], "");

    if cleaned.is_empty() || cleaned == "-" {
        return Ok(0.0);
    }

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))
}
