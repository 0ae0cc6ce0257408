//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `find_user` - Resolve a `--user` argument
//! - `model_path` - Where the categorizer model lives
//! - `cmd_init` - Initialize the database

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use finsight_core::db::Database;
use finsight_core::models::User;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Look up a user by username
pub fn find_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)?.ok_or_else(|| {
        anyhow::anyhow!(
            "User '{}' not found. Create one with: finsight user add",
            username
        )
    })
}

/// Categorizer model location (FINSIGHT_MODEL_PATH or the default)
pub fn model_path() -> PathBuf {
    std::env::var(finsight_server::MODEL_PATH_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(finsight_server::DEFAULT_MODEL_PATH))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let users = db.list_users().context("Failed to read users")?;
    println!("   Users: {}", users.len());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a user: finsight user add --name NAME --username USER --email EMAIL");
    println!("  2. Import a statement: finsight import --file statement.csv --user USER");
    println!("  3. Start web UI: finsight serve");

    Ok(())
}
