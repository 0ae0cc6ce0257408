//! Import history operations

use rusqlite::{params, OptionalExtension};

use super::{parse_column, parse_datetime, Database};
use crate::error::Result;
use crate::models::{ImportSession, NewImportSession};

const IMPORT_SESSION_COLUMNS: &str = "id, user_id, filename, bank, format, file_size_bytes, \
    imported_count, skipped_count, created_at";

impl Database {
    /// Create a new import session
    pub fn create_import_session(&self, session: &NewImportSession) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO import_sessions (user_id, filename, bank, format, file_size_bytes)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                session.user_id,
                session.filename,
                session.bank.as_str(),
                session.format.as_str(),
                session.file_size_bytes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update import session with final counts
    pub fn update_import_session_results(
        &self,
        session_id: i64,
        imported: i64,
        skipped: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE import_sessions SET imported_count = ?, skipped_count = ? WHERE id = ?",
            params![imported, skipped, session_id],
        )?;
        Ok(())
    }

    fn row_to_import_session(row: &rusqlite::Row) -> rusqlite::Result<ImportSession> {
        let bank: String = row.get(3)?;
        let format: String = row.get(4)?;
        let created_at: String = row.get(8)?;
        Ok(ImportSession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            filename: row.get(2)?,
            bank: parse_column(3, &bank)?,
            format: parse_column(4, &format)?,
            file_size_bytes: row.get(5)?,
            imported_count: row.get(6)?,
            skipped_count: row.get(7)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// List a user's import sessions, newest first
    pub fn list_import_sessions(&self, user_id: i64, limit: i64) -> Result<Vec<ImportSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_sessions WHERE user_id = ? ORDER BY id DESC LIMIT ?",
            IMPORT_SESSION_COLUMNS
        ))?;

        let sessions = stmt
            .query_map(params![user_id, limit], Self::row_to_import_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Get one of a user's import sessions
    pub fn get_import_session(&self, user_id: i64, id: i64) -> Result<Option<ImportSession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_sessions WHERE id = ? AND user_id = ?",
                    IMPORT_SESSION_COLUMNS
                ),
                params![id, user_id],
                Self::row_to_import_session,
            )
            .optional()?;
        Ok(session)
    }
}
