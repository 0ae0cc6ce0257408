//! Domain models for Finsight

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Supported banks for statement import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    Sbi,
    Hdfc,
    Axis,
}

impl Bank {
    pub const ALL: [Bank; 3] = [Bank::Sbi, Bank::Hdfc, Bank::Axis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sbi => "sbi",
            Self::Hdfc => "hdfc",
            Self::Axis => "axis",
        }
    }

    /// Comma-separated list of supported bank names, for error messages
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|b| b.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::str::FromStr for Bank {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sbi" => Ok(Self::Sbi),
            "hdfc" => Ok(Self::Hdfc),
            "axis" => Ok(Self::Axis),
            other => Err(format!(
                "{}. Supported banks: {}",
                other,
                Self::supported_list()
            )),
        }
    }
}

impl std::fmt::Display for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statement file format, chosen from the upload's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Csv,
    Pdf,
}

impl StatementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }

    /// Detect the format from a filename extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename)
            .extension()?
            .to_str()?
            .to_lowercase();
        ext.parse().ok()
    }
}

impl std::str::FromStr for StatementFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "pdf" => Ok(Self::Pdf),
            _ => Err(format!("Unknown statement format: {}", s)),
        }
    }
}

impl std::fmt::Display for StatementFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money leaving the account
    Debit,
    /// Money entering the account
    Credit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spending category
///
/// Declaration order is the order built-in keyword rules are checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transportation,
    Shopping,
    Utilities,
    Entertainment,
    Health,
    Education,
    Travel,
    Housing,
    Income,
    Investment,
    Bills,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Food,
        Category::Transportation,
        Category::Shopping,
        Category::Utilities,
        Category::Entertainment,
        Category::Health,
        Category::Education,
        Category::Travel,
        Category::Housing,
        Category::Income,
        Category::Investment,
        Category::Bills,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transportation => "transportation",
            Self::Shopping => "shopping",
            Self::Utilities => "utilities",
            Self::Entertainment => "entertainment",
            Self::Health => "health",
            Self::Education => "education",
            Self::Travel => "travel",
            Self::Housing => "housing",
            Self::Income => "income",
            Self::Investment => "investment",
            Self::Bills => "bills",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a transaction's category was assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// User-defined category rule
    Rule,
    /// Built-in keyword list
    Keyword,
    /// Trained text model
    Model,
    /// Corrected by the user
    Manual,
    /// Nothing matched
    #[default]
    Fallback,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Keyword => "keyword",
            Self::Model => "model",
            Self::Manual => "manual",
            Self::Fallback => "fallback",
        }
    }
}

impl std::str::FromStr for CategorySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rule" => Ok(Self::Rule),
            "keyword" => Ok(Self::Keyword),
            "model" => Ok(Self::Model),
            "manual" => Ok(Self::Manual),
            "fallback" => Ok(Self::Fallback),
            _ => Err(format!("Unknown category source: {}", s)),
        }
    }
}

impl std::fmt::Display for CategorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pattern matching strategy for category rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Case-insensitive substring, `|` separates alternatives
    #[default]
    Contains,
    /// Regular expression
    Regex,
    /// Case-insensitive whole-description match
    Exact,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Regex => "regex",
            Self::Exact => "exact",
        }
    }
}

impl std::str::FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "regex" => Ok(Self::Regex),
            "exact" => Ok(Self::Exact),
            _ => Err(format!("Unknown pattern type: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never sent to clients
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A user to be registered
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A stored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    /// Always non-negative; direction lives in `transaction_type`
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: Category,
    pub category_source: CategorySource,
    pub is_recurring: bool,
    pub bank: Bank,
    pub import_hash: String,
    pub import_session_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_debit(&self) -> bool {
        self.transaction_type == TransactionType::Debit
    }
}

/// A parsed statement row (before DB insertion)
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub bank: Bank,
    /// Hash for deduplication
    pub import_hash: String,
}

/// A user-defined category rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: i64,
    pub user_id: i64,
    pub pattern: String,
    pub pattern_type: PatternType,
    pub category: Category,
    /// Higher priority rules are checked first
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// A record of one statement upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: i64,
    pub user_id: i64,
    pub filename: Option<String>,
    pub bank: Bank,
    pub format: StatementFormat,
    pub file_size_bytes: Option<i64>,
    pub imported_count: i64,
    pub skipped_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Data for starting an import session
#[derive(Debug, Clone)]
pub struct NewImportSession {
    pub user_id: i64,
    pub filename: Option<String>,
    pub bank: Bank,
    pub format: StatementFormat,
    pub file_size_bytes: Option<i64>,
}

// ========== Analytics ==========

/// Totals across a set of transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicStats {
    pub total_transactions: i64,
    pub total_debit: f64,
    pub total_credit: f64,
    /// credit minus debit
    pub net_cashflow: f64,
    pub average_transaction: f64,
}

/// Debit total for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub amount: f64,
}

/// Debit and credit totals for one category within a month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryFlow {
    pub debit: f64,
    pub credit: f64,
}

/// Totals for a calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// YYYY-MM
    pub month: String,
    pub total_debit: f64,
    pub total_credit: f64,
    pub categories: BTreeMap<Category, CategoryFlow>,
}

/// Debit total for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub date: NaiveDate,
    pub amount: f64,
}

/// A transaction whose amount is unusual for its category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: Category,
    pub z_score: f64,
}

/// A transaction flagged as recurring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: Category,
}

/// End-of-month spend projection for a category (or the total)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub current_spent: f64,
    pub projected_amount: f64,
    pub previous_month: f64,
    pub possible_overshoot: bool,
}

/// Projection for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProjection {
    pub category: Category,
    #[serde(flatten)]
    pub projection: Projection,
}

/// Projections for the current month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projections {
    /// Month being projected, YYYY-MM
    pub month: Option<String>,
    pub categories: Vec<CategoryProjection>,
    pub total: Option<Projection>,
}

impl Projections {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Outcome of importing one statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub import_session_id: i64,
    pub bank: Bank,
    pub format: StatementFormat,
    pub imported: i64,
    pub skipped: i64,
    /// How many imported rows were categorized by each source
    pub by_rule: i64,
    pub by_keyword: i64,
    pub by_model: i64,
    pub fallback: i64,
    /// Transactions flagged recurring after this import
    pub recurring: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_from_str() {
        assert_eq!("SBI".parse::<Bank>().unwrap(), Bank::Sbi);
        assert_eq!(" hdfc ".parse::<Bank>().unwrap(), Bank::Hdfc);
        let err = "icici".parse::<Bank>().unwrap_err();
        assert!(err.contains("sbi, hdfc, axis"));
    }

    #[test]
    fn test_bank_from_str_only_accepts_short_codes() {
        assert!("statebankofindia".parse::<Bank>().is_err());
        assert!("State Bank of India".parse::<Bank>().is_err());
    }

    #[test]
    fn test_statement_format_from_filename() {
        assert_eq!(
            StatementFormat::from_filename("april.CSV"),
            Some(StatementFormat::Csv)
        );
        assert_eq!(
            StatementFormat::from_filename("stmt.final.pdf"),
            Some(StatementFormat::Pdf)
        );
        assert_eq!(StatementFormat::from_filename("stmt.xlsx"), None);
        assert_eq!(StatementFormat::from_filename("noext"), None);
    }

    #[test]
    fn test_category_roundtrip_names() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("groceries".parse::<Category>().is_err());
    }

    #[test]
    fn test_user_hash_not_serialized() {
        let user = User {
            id: 1,
            name: "Asha".into(),
            username: "asha".into(),
            email: "asha@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
    }
}
