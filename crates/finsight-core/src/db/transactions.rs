//! Transaction operations
//!
//! Every query is scoped to a user; a transaction is never visible to or
//! editable by anyone but its owner.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, CategorySource, NewTransaction, Transaction};

/// Result of inserting a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionInsertResult {
    /// Transaction was inserted successfully, contains new transaction ID
    Inserted(i64),
    /// Transaction was a duplicate, contains existing transaction ID
    Duplicate(i64),
}

const TRANSACTION_COLUMNS: &str = "id, user_id, date, description, amount, transaction_type, \
    category, category_source, is_recurring, bank, import_hash, import_session_id, created_at";

impl Database {
    /// Insert a transaction (skips duplicates based on the user's import_hash)
    pub fn insert_transaction(
        &self,
        user_id: i64,
        tx: &NewTransaction,
        category: Category,
        source: CategorySource,
        import_session_id: Option<i64>,
    ) -> Result<TransactionInsertResult> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE user_id = ? AND import_hash = ?",
                params![user_id, tx.import_hash],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(existing_id) = existing {
            return Ok(TransactionInsertResult::Duplicate(existing_id));
        }

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, date, description, amount, transaction_type,
                category, category_source, bank, import_hash, import_session_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.date.to_string(),
                tx.description,
                tx.amount,
                tx.transaction_type.as_str(),
                category.as_str(),
                source.as_str(),
                tx.bank.as_str(),
                tx.import_hash,
                import_session_id,
            ],
        )?;

        Ok(TransactionInsertResult::Inserted(conn.last_insert_rowid()))
    }

    /// List a user's transactions in an inclusive date range, oldest first
    pub fn list_user_transactions(
        &self,
        user_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(from) = from {
            conditions.push("date >= ?".to_string());
            params.push(Box::new(from.to_string()));
        }
        if let Some(to) = to {
            conditions.push("date <= ?".to_string());
            params.push(Box::new(to.to_string()));
        }

        let sql = format!(
            "SELECT {} FROM transactions WHERE {} ORDER BY date, id",
            TRANSACTION_COLUMNS,
            conditions.join(" AND ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                Self::row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(2)?;
        let type_str: String = row.get(5)?;
        let category_str: String = row.get(6)?;
        let source_str: String = row.get(7)?;
        let recurring_int: i64 = row.get(8)?;
        let bank_str: String = row.get(9)?;
        let created_at_str: String = row.get(12)?;

        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            description: row.get(3)?,
            amount: row.get(4)?,
            transaction_type: parse_column(5, &type_str)?,
            category: category_str.parse().unwrap_or_default(),
            category_source: source_str.parse().unwrap_or_default(),
            is_recurring: recurring_int != 0,
            bank: parse_column(9, &bank_str)?,
            import_hash: row.get(10)?,
            import_session_id: row.get(11)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Get one of a user's transactions
    pub fn get_transaction(&self, user_id: i64, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id, user_id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Count a user's transactions
    pub fn count_user_transactions(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Manually set a transaction's category
    ///
    /// Fails with `NotFound` unless the transaction belongs to `user_id`.
    pub fn update_transaction_category(
        &self,
        user_id: i64,
        id: i64,
        category: Category,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET category = ?, category_source = ? WHERE id = ? AND user_id = ?",
            params![
                category.as_str(),
                CategorySource::Manual.as_str(),
                id,
                user_id
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    /// Replace the recurring flags for a user's transactions
    ///
    /// Transactions in `ids` are flagged; all others are cleared.
    pub fn set_recurring_flags(&self, user_id: i64, ids: &HashSet<i64>) -> Result<usize> {
        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;

        db_tx.execute(
            "UPDATE transactions SET is_recurring = 0 WHERE user_id = ?",
            params![user_id],
        )?;

        let mut flagged = 0;
        {
            let mut stmt = db_tx.prepare(
                "UPDATE transactions SET is_recurring = 1 WHERE id = ? AND user_id = ?",
            )?;
            for id in ids {
                flagged += stmt.execute(params![id, user_id])?;
            }
        }

        db_tx.commit()?;
        Ok(flagged)
    }

    /// Categories the user assigned by hand, keyed by transaction ID
    pub fn manual_category_labels(&self, user_id: i64) -> Result<HashMap<i64, Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, category FROM transactions WHERE user_id = ? AND category_source = ?",
        )?;

        let rows = stmt
            .query_map(params![user_id, CategorySource::Manual.as_str()], |row| {
                let id: i64 = row.get(0)?;
                let category: String = row.get(1)?;
                Ok((id, category))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, category)| category.parse().ok().map(|c| (id, c)))
            .collect())
    }
}
