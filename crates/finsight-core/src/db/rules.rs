//! Category rule operations

use rusqlite::params;

use super::{parse_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, CategoryRule, PatternType};

impl Database {
    /// Create a category rule for a user
    ///
    /// Regex patterns are compiled up front so broken rules are rejected.
    pub fn create_category_rule(
        &self,
        user_id: i64,
        pattern: &str,
        pattern_type: PatternType,
        category: Category,
        priority: i32,
    ) -> Result<i64> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::InvalidData("Rule pattern cannot be empty".to_string()));
        }
        if pattern_type == PatternType::Regex {
            regex::Regex::new(pattern)?;
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO category_rules (user_id, pattern, pattern_type, category, priority)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                pattern,
                pattern_type.as_str(),
                category.as_str(),
                priority
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List a user's rules, highest priority first
    pub fn list_category_rules(&self, user_id: i64) -> Result<Vec<CategoryRule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, pattern, pattern_type, category, priority, created_at
            FROM category_rules
            WHERE user_id = ?
            ORDER BY priority DESC, id
            "#,
        )?;

        let rules = stmt
            .query_map(params![user_id], |row| {
                let pattern_type: String = row.get(3)?;
                let category: String = row.get(4)?;
                let created_at: String = row.get(6)?;
                Ok(CategoryRule {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    pattern: row.get(2)?,
                    pattern_type: parse_column(3, &pattern_type)?,
                    category: parse_column(4, &category)?,
                    priority: row.get(5)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rules)
    }

    /// Delete one of a user's rules
    pub fn delete_category_rule(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM category_rules WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Category rule {}", id)));
        }
        Ok(())
    }
}
