//! User accounts and login sessions

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewUser, User};

/// Hash a password as an Argon2id PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Encryption(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

const USER_COLUMNS: &str = "id, name, username, email, password_hash, created_at";

impl Database {
    /// Register a user; username and email must be unused
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let username = user.username.trim();
        let email = user.email.trim().to_lowercase();

        if self.get_user_by_username(username)?.is_some() {
            return Err(Error::Conflict("Username already exists".to_string()));
        }

        let conn = self.conn()?;
        let email_taken: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if email_taken.is_some() {
            return Err(Error::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&user.password)?;
        conn.execute(
            "INSERT INTO users (name, username, email, password_hash) VALUES (?, ?, ?, ?)",
            params![user.name.trim(), username, email, password_hash],
        )?;
        let id = conn.last_insert_rowid();

        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    pub(crate) fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(5)?;
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            username: row.get(2)?,
            email: row.get(3)?,
            password_hash: row.get(4)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by username (case-insensitive)
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE username = ? COLLATE NOCASE",
                    USER_COLUMNS
                ),
                params![username.trim()],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List all users
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Return the user when the password matches
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        Ok(self
            .get_user_by_username(username)?
            .filter(|user| verify_password(password, &user.password_hash)))
    }

    /// Create a login session and return the bearer token
    ///
    /// The raw token is not stored; only its SHA-256 hash is.
    pub fn create_session(&self, user_id: i64, ttl: Duration) -> Result<String> {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let expires_at = format_datetime(Utc::now() + ttl);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)",
            params![hash_token(&token), user_id, expires_at],
        )?;

        Ok(token)
    }

    /// Resolve an unexpired session token to its user
    pub fn get_user_by_session(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                r#"
                SELECT u.id, u.name, u.username, u.email, u.password_hash, u.created_at
                FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token_hash = ? AND s.expires_at > ?
                "#,
                params![hash_token(token), format_datetime(Utc::now())],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// End a session; returns false if the token was unknown
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?",
            params![hash_token(token)],
        )?;
        Ok(deleted > 0)
    }

    /// Remove expired sessions, returning how many were removed
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            params![format_datetime(Utc::now())],
        )?;
        Ok(deleted)
    }
}
